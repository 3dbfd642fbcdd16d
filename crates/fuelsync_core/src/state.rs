use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::preview::{PreviewSlot, PreviewState};
use crate::view_model::{AppViewModel, TaskRowView};
use crate::{RequestId, RunToken, SyncMode, SyncTimings, TaskKind, TaskStatus};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    System,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub at: NaiveTime,
    pub level: LogLevel,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StreamState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Retrying {
        attempt: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub text: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskSlot {
    pub status: TaskStatus,
    pub token: RunToken,
    pub preview: PreviewSlot,
}

/// Whole client view state. Only [`crate::update`] mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    server_url: String,
    mode: SyncMode,
    timings: SyncTimings,
    current_tab: TaskKind,
    tasks: [TaskSlot; 2],
    logs: Vec<LogEntry>,
    next_log_seq: u64,
    next_request: RequestId,
    stream: StreamState,
    toast: Option<Toast>,
    now: NaiveTime,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SyncMode::default(), SyncTimings::default())
    }
}

impl AppState {
    pub fn new(mode: SyncMode, timings: SyncTimings) -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            mode,
            timings,
            current_tab: TaskKind::Hy,
            tasks: Default::default(),
            logs: Vec::new(),
            next_log_seq: 1,
            next_request: 1,
            stream: StreamState::Disconnected,
            toast: None,
            now: NaiveTime::MIN,
            dirty: false,
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            server_url: self.server_url.clone(),
            mode: self.mode,
            current_tab: self.current_tab,
            tasks: TaskKind::ALL
                .into_iter()
                .map(|kind| {
                    let slot = self.slot(kind);
                    TaskRowView {
                        kind,
                        status: slot.status,
                        preview: slot.preview.state.clone(),
                    }
                })
                .collect(),
            logs: self.logs.clone(),
            stream: self.stream,
            toast: self.toast.clone(),
            dirty: self.dirty,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn status(&self, kind: TaskKind) -> TaskStatus {
        self.slot(kind).status
    }

    pub fn preview(&self, kind: TaskKind) -> &PreviewState {
        &self.slot(kind).preview.state
    }

    pub fn current_tab(&self) -> TaskKind {
        self.current_tab
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Hands the pending notification to the renderer exactly once.
    pub fn take_toast(&mut self) -> Option<Toast> {
        self.toast.take()
    }

    pub(crate) fn timings(&self) -> SyncTimings {
        self.timings
    }

    pub(crate) fn set_current_tab(&mut self, kind: TaskKind) {
        self.current_tab = kind;
        self.dirty = true;
    }

    pub(crate) fn set_server_url(&mut self, url: String) {
        self.server_url = url;
        self.dirty = true;
    }

    pub(crate) fn set_now(&mut self, now: NaiveTime) {
        self.now = now;
    }

    pub(crate) fn slot(&self, kind: TaskKind) -> &TaskSlot {
        &self.tasks[kind.index()]
    }

    pub(crate) fn slot_mut(&mut self, kind: TaskKind) -> &mut TaskSlot {
        self.dirty = true;
        &mut self.tasks[kind.index()]
    }

    pub(crate) fn running_kinds(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|kind| self.status(*kind) == TaskStatus::Running)
            .collect()
    }

    /// Marks a kind running and returns the token identifying this run.
    pub(crate) fn begin_run(&mut self, kind: TaskKind) -> RunToken {
        let slot = self.slot_mut(kind);
        slot.status = TaskStatus::Running;
        slot.token += 1;
        slot.token
    }

    /// Returns the kind to idle; `false` when it already was.
    pub(crate) fn finish_run(&mut self, kind: TaskKind) -> bool {
        if self.status(kind) == TaskStatus::Idle {
            return false;
        }
        self.slot_mut(kind).status = TaskStatus::Idle;
        true
    }

    pub(crate) fn is_current_run(&self, kind: TaskKind, token: RunToken) -> bool {
        let slot = self.slot(kind);
        slot.token == token && slot.status == TaskStatus::Running
    }

    pub(crate) fn allocate_request(&mut self) -> RequestId {
        let id = self.next_request;
        self.next_request += 1;
        id
    }

    pub(crate) fn set_stream(&mut self, stream: StreamState) {
        if self.stream != stream {
            self.stream = stream;
            self.dirty = true;
        }
    }

    pub(crate) fn push_log(&mut self, level: LogLevel, text: impl Into<String>) {
        let entry = LogEntry {
            seq: self.next_log_seq,
            at: self.now,
            level,
            text: text.into(),
        };
        self.next_log_seq += 1;
        self.logs.push(entry);
        self.dirty = true;
    }

    pub(crate) fn clear_logs(&mut self) {
        self.logs.clear();
        self.dirty = true;
    }

    pub(crate) fn show_toast(&mut self, text: impl Into<String>, success: bool) {
        self.toast = Some(Toast {
            text: text.into(),
            success,
        });
        self.dirty = true;
    }
}
