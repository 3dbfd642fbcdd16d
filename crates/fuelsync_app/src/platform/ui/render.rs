use fuelsync_core::{
    AppViewModel, LogEntry, PreviewDocument, PreviewState, SyncMode, TaskKind, TaskRowView,
    TaskStatus, Toast,
};
use fuelsync_engine::{parse_tables, render_grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Tabbed previews print every sheet, not just the active one.
    pub all_sheets: bool,
    /// Print table markup as received instead of a text grid.
    pub raw_markup: bool,
    /// Body rows shown per table before the rest is summarised.
    pub page_rows: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            all_sheets: false,
            raw_markup: false,
            page_rows: 20,
        }
    }
}

/// What has already been printed, so each render only adds the difference.
#[derive(Debug, Default)]
pub struct RenderMemo {
    last_seq: u64,
    log_len: usize,
    rows: Vec<TaskRowView>,
}

pub fn render(view: &AppViewModel, memo: &mut RenderMemo, options: &RenderOptions) -> String {
    let mut out = String::new();

    if view.logs.is_empty() && memo.log_len > 0 {
        out.push_str(">>> 日志已清除\n");
    }
    for entry in view.logs.iter() {
        if entry.seq > memo.last_seq {
            out.push_str(&format_log_line(entry));
            memo.last_seq = entry.seq;
        }
    }
    memo.log_len = view.logs.len();

    for row in &view.tasks {
        let previous = memo.rows.iter().find(|prev| prev.kind == row.kind);
        let status_changed = match previous {
            Some(prev) => prev.status != row.status,
            None => row.status != TaskStatus::Idle,
        };
        if status_changed {
            out.push_str(&format!("[{}] 状态: {}\n", row.kind.label(), row.status_label()));
        }
        if previous.map(|prev| &prev.preview) != Some(&row.preview) {
            out.push_str(&render_preview(row.kind, &row.preview, view.mode, options));
        }
    }
    memo.rows = view.tasks.clone();

    out
}

pub fn format_log_line(entry: &LogEntry) -> String {
    format!("[{}] {}\n", entry.at.format("%H:%M:%S"), entry.text)
}

pub fn render_toast(toast: &Toast) -> String {
    let mark = if toast.success { "✔" } else { "✖" };
    format!("{mark} {}\n", toast.text)
}

pub fn render_preview(
    kind: TaskKind,
    state: &PreviewState,
    mode: SyncMode,
    options: &RenderOptions,
) -> String {
    let label = kind.label();
    match state {
        PreviewState::NotLoaded => String::new(),
        PreviewState::Loading => format!("[{label}] 正在加载数据预览...\n"),
        PreviewState::NoData => format!("[{label}] 暂无数据\n"),
        PreviewState::Failed(reason) => {
            format!("[{label}] 加载失败: {reason}\n请确保已运行任务生成了报表。\n")
        }
        PreviewState::Loaded {
            document,
            active_sheet,
        } => {
            let mut out = format!("[{label}] 数据预览\n");
            match mode {
                SyncMode::Stream => {
                    out.push_str(&render_tabbed(document, *active_sheet, options));
                }
                SyncMode::Polling => out.push_str(&render_block(document, options)),
            }
            out
        }
    }
}

/// One tab per sheet; the active tab is bracketed.
fn render_tabbed(document: &PreviewDocument, active: usize, options: &RenderOptions) -> String {
    let tabs: Vec<String> = document
        .sheets()
        .iter()
        .enumerate()
        .map(|(index, sheet)| {
            if index == active {
                format!("[{}]", sheet.name)
            } else {
                format!(" {} ", sheet.name)
            }
        })
        .collect();
    let mut out = tabs.join(" ");
    out.push('\n');

    for (index, sheet) in document.sheets().iter().enumerate() {
        if !options.all_sheets && index != active {
            continue;
        }
        if options.all_sheets {
            out.push_str(&format!("== {} ==\n", sheet.name));
        }
        out.push_str(&render_markup(&sheet.markup, options));
    }
    out
}

/// Every sheet stacked under its title.
fn render_block(document: &PreviewDocument, options: &RenderOptions) -> String {
    if options.raw_markup {
        let mut out = document.to_block_markup();
        out.push('\n');
        return out;
    }
    let mut out = String::new();
    for sheet in document.sheets() {
        out.push_str(&format!("== {} ==\n", sheet.name));
        out.push_str(&render_markup(&sheet.markup, options));
    }
    out
}

fn render_markup(markup: &str, options: &RenderOptions) -> String {
    if options.raw_markup {
        return format!("{markup}\n");
    }
    let grids = parse_tables(markup);
    if grids.is_empty() {
        return "(无表格)\n".to_string();
    }
    grids
        .iter()
        .map(|grid| render_grid(grid, Some(options.page_rows)))
        .collect::<Vec<_>>()
        .join("\n")
}
