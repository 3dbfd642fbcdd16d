use std::path::PathBuf;
use std::time::Duration;

use crate::{RequestId, RunToken, TaskKind, TimerKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistServerUrl(String),
    Probe,
    Upload {
        kind: TaskKind,
        path: PathBuf,
    },
    StartTask {
        kind: TaskKind,
        token: RunToken,
    },
    /// Open the log stream if it is not already owned by the engine.
    ConnectLogStream,
    Schedule {
        kind: TaskKind,
        token: RunToken,
        timer: TimerKind,
        after: Duration,
    },
    LoadPreview {
        kind: TaskKind,
        request: RequestId,
    },
    Download {
        kind: TaskKind,
    },
}
