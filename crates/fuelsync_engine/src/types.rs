use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Sheet name and table markup pairs, in the order the server sent them.
pub type PreviewSheets = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedReport {
    pub bytes: Vec<u8>,
    /// Filename announced by `Content-Disposition`, if any.
    pub filename: Option<String>,
}

/// Decoded data payload of one log-stream event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LogPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub task: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Connecting,
    Opened,
    Message(LogPayload),
    Disconnected {
        attempt: u32,
        reason: String,
        retry_in: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ProbeCompleted(Result<u16, ClientError>),
    UploadCompleted {
        task: String,
        file_name: String,
        result: Result<UploadReceipt, ClientError>,
    },
    TaskStartCompleted {
        task: String,
        token: u64,
        result: Result<String, ClientError>,
    },
    PreviewCompleted {
        task: String,
        request: u64,
        result: Result<PreviewSheets, ClientError>,
    },
    DownloadCompleted {
        task: String,
        result: Result<PathBuf, ClientError>,
    },
    TimerElapsed {
        tag: u64,
    },
    Stream(StreamEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.kind, .message))]
pub struct ClientError {
    pub kind: FailureKind,
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn describe(kind: &FailureKind, message: &str) -> String {
    match kind {
        // Server-side validation text is already meant for people.
        FailureKind::Rejected => message.to_string(),
        _ if message.is_empty() => kind.to_string(),
        _ => format!("{kind}: {message}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("invalid url")]
    InvalidUrl,
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout")]
    Timeout,
    #[error("network error")]
    Network,
    /// The server answered with an `error` field.
    #[error("rejected")]
    Rejected,
    #[error("malformed response")]
    Malformed,
    #[error("io error")]
    Io,
}
