use serde::Serialize;

use crate::{LogEntry, PreviewState, StreamState, SyncMode, TaskKind, TaskStatus, Toast};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppViewModel {
    pub server_url: String,
    pub mode: SyncMode,
    pub current_tab: TaskKind,
    pub tasks: Vec<TaskRowView>,
    pub logs: Vec<LogEntry>,
    pub stream: StreamState,
    pub toast: Option<Toast>,
    pub dirty: bool,
}

impl AppViewModel {
    pub fn task(&self, kind: TaskKind) -> Option<&TaskRowView> {
        self.tasks.iter().find(|row| row.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRowView {
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub preview: PreviewState,
}

impl TaskRowView {
    pub fn status_label(&self) -> &'static str {
        match self.status {
            TaskStatus::Idle => "就绪",
            TaskStatus::Running => "运行中...",
        }
    }
}
