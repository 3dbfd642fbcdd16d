use scraper::{ElementRef, Html, Selector};

/// Cell text of one `<table>`, row by row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableGrid {
    pub rows: Vec<Vec<String>>,
    /// Leading rows made only of `<th>` cells.
    pub header_rows: usize,
}

/// Extracts every top-level table in a server-rendered fragment.
pub fn parse_tables(markup: &str) -> Vec<TableGrid> {
    let fragment = Html::parse_fragment(markup);
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) else {
        return Vec::new();
    };

    fragment
        .select(&table_sel)
        .filter(|table| !has_table_ancestor(*table))
        .map(|table| {
            let mut grid = TableGrid::default();
            let mut in_header = true;
            for row in table.select(&row_sel) {
                let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
                if cells.is_empty() {
                    continue;
                }
                let all_th = cells.iter().all(|cell| cell.value().name() == "th");
                if in_header && all_th {
                    grid.header_rows += 1;
                } else {
                    in_header = false;
                }
                grid.rows.push(cells.iter().map(|cell| cell_text(*cell)).collect());
            }
            grid
        })
        .collect()
}

/// Lays a grid out as aligned plain text; rows past `max_rows` are summarised.
pub fn render_grid(grid: &TableGrid, max_rows: Option<usize>) -> String {
    let columns = grid.rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }
    let mut widths = vec![0usize; columns];
    for row in &grid.rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let body_rows = grid.rows.len() - grid.header_rows;
    let shown_body = max_rows.map_or(body_rows, |limit| limit.min(body_rows));

    let mut out = String::new();
    for (index, row) in grid
        .rows
        .iter()
        .take(grid.header_rows + shown_body)
        .enumerate()
    {
        let line: Vec<String> = (0..columns)
            .map(|i| pad(row.get(i).map(String::as_str).unwrap_or(""), widths[i]))
            .collect();
        out.push_str(line.join(" | ").trim_end());
        out.push('\n');
        if index + 1 == grid.header_rows {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("-+-"));
            out.push('\n');
        }
    }
    if shown_body < body_rows {
        out.push_str(&format!("... {} more rows\n", body_rows - shown_body));
    }
    out
}

fn has_table_ancestor(table: ElementRef) -> bool {
    table
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "table")
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(text));
    format!("{text}{}", " ".repeat(fill))
}

/// Terminal column width; CJK and full-width forms take two columns.
pub fn display_width(text: &str) -> usize {
    text.chars()
        .map(|c| match c as u32 {
            0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1F64F
            | 0x20000..=0x3FFFD => 2,
            _ => 1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<table border="0" class="dataframe result-table">
  <thead><tr style="text-align: right;"><th>序号</th><th>煤种</th><th>热值</th></tr></thead>
  <tbody>
    <tr><td>1</td><td>烟煤</td><td>5,012.30</td></tr>
    <tr><td>2</td><td>无烟煤</td><td></td></tr>
  </tbody>
</table>"#;

    #[test]
    fn parses_header_and_body_rows() {
        let grids = parse_tables(SAMPLE);
        assert_eq!(grids.len(), 1);
        let grid = &grids[0];
        assert_eq!(grid.header_rows, 1);
        assert_eq!(grid.rows[0], vec!["序号", "煤种", "热值"]);
        assert_eq!(grid.rows[2], vec!["2", "无烟煤", ""]);
    }

    #[test]
    fn renders_aligned_columns_with_rule() {
        let grid = &parse_tables(SAMPLE)[0];
        let text = render_grid(grid, None);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "序号 | 煤种   | 热值");
        assert_eq!(lines[1], "-----+--------+---------");
        assert_eq!(lines[2], "1    | 烟煤   | 5,012.30");
    }

    #[test]
    fn row_limit_summarises_the_rest() {
        let grid = &parse_tables(SAMPLE)[0];
        let text = render_grid(grid, Some(1));
        assert!(text.ends_with("... 1 more rows\n"));
        assert!(!text.contains("无烟煤"));
    }

    #[test]
    fn width_counts_cjk_double() {
        assert_eq!(display_width("ab"), 2);
        assert_eq!(display_width("化验"), 4);
    }
}
