use std::path::PathBuf;

use chrono::NaiveTime;

use crate::completion::StructuredStatus;
use crate::{PreviewDocument, RequestId, RunToken, TaskKind, TimerKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    /// The server answered, but not with 200.
    Status(u16),
    Unreachable(String),
}

/// Why an upload or task start did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// The server answered with an `error` field.
    Rejected(String),
    /// The request never produced a usable answer.
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Wall-clock update; later log entries carry this time.
    Tick { now: NaiveTime },
    /// The session came up; logs the welcome line.
    Started,
    /// User edited the server address.
    ServerUrlChanged(String),
    /// User asked whether the server is reachable.
    ProbeClicked,
    ProbeFinished(ProbeOutcome),
    /// User switched the main tab; also refreshes that tab's preview.
    TabSelected(TaskKind),
    /// User picked a spreadsheet to upload for a pipeline.
    UploadRequested { kind: TaskKind, path: PathBuf },
    UploadFinished {
        kind: TaskKind,
        file_name: String,
        result: Result<Option<String>, RequestFailure>,
    },
    /// User clicked the run button for a pipeline.
    RunClicked(TaskKind),
    /// Response to the start request issued for `token`.
    TaskStartFinished {
        kind: TaskKind,
        token: RunToken,
        result: Result<String, RequestFailure>,
    },
    /// A timer scheduled through [`crate::Effect::Schedule`] elapsed.
    TimerFired {
        kind: TaskKind,
        token: RunToken,
        timer: TimerKind,
    },
    StreamConnecting,
    StreamOpened,
    /// One decoded log-stream event.
    StreamMessage {
        message: String,
        structured: StructuredStatus,
    },
    /// The stream dropped; the engine reconnects on its own.
    StreamDisconnected { attempt: u32, reason: String },
    PreviewRequested(TaskKind),
    PreviewLoaded {
        kind: TaskKind,
        request: RequestId,
        result: Result<PreviewDocument, String>,
    },
    /// User picked a sheet tab inside a loaded preview.
    SheetSelected { kind: TaskKind, index: usize },
    DownloadRequested(TaskKind),
    DownloadFinished {
        kind: TaskKind,
        result: Result<PathBuf, String>,
    },
    ClearLogs,
}
