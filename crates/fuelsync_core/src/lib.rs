//! Fuelsync core: pure client state machine and view-model helpers.
mod completion;
mod effect;
mod msg;
mod preview;
mod state;
mod task;
mod update;
mod view_model;

pub use completion::{detect as detect_completion, CompletionSignal, StructuredStatus, FAILURE_MARKER};
pub use effect::Effect;
pub use msg::{Msg, ProbeOutcome, RequestFailure};
pub use preview::{PreviewDocument, PreviewSlot, PreviewState, Sheet};
pub use state::{
    AppState, LogEntry, LogLevel, StreamState, TaskSlot, Toast, DEFAULT_SERVER_URL,
};
pub use task::{
    RequestId, RunToken, SyncMode, SyncTimings, TaskKind, TaskStatus, TimerKind, UnknownTaskKind,
};
pub use update::{normalize_server_url, update};
pub use view_model::{AppViewModel, TaskRowView};
