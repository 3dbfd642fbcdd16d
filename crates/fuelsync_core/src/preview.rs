use serde::{Deserialize, Serialize};

use crate::RequestId;

const RESULT_TABLE_CLASS: &str = r#"class="result-table""#;
const INLINE_TABLE_STYLE: &str =
    r#"style="width:100%; border-collapse: collapse; border:1px solid #ccc;" border="1""#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    /// Server-rendered table fragment, passed through untouched.
    pub markup: String,
}

/// Sheets in the order the server listed them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreviewDocument {
    sheets: Vec<Sheet>,
}

impl PreviewDocument {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn from_pairs<I, N, M>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, M)>,
        N: Into<String>,
        M: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, markup)| Sheet {
                    name: name.into(),
                    markup: markup.into(),
                })
                .collect(),
        )
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Every sheet concatenated into one block: a title line followed by the
    /// table, with the stylesheet class swapped for inline borders.
    pub fn to_block_markup(&self) -> String {
        let mut html = String::new();
        for sheet in &self.sheets {
            html.push_str(r#"<div class="sheet-title">"#);
            html.push_str(&sheet.name);
            html.push_str("</div>");
            html.push_str(&sheet.markup);
        }
        html.replace(RESULT_TABLE_CLASS, INLINE_TABLE_STYLE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreviewState {
    #[default]
    NotLoaded,
    Loading,
    Loaded {
        document: PreviewDocument,
        active_sheet: usize,
    },
    /// The server answered with zero sheets.
    NoData,
    Failed(String),
}

/// Per-kind preview bookkeeping: what is shown and which request may replace it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreviewSlot {
    pub state: PreviewState,
    pub pending: Option<RequestId>,
}
