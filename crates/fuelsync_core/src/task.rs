use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which backend report pipeline a request concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Lab assay summary (化验).
    Hy,
    /// Weighing summary (称重).
    Cz,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::Hy, TaskKind::Cz];

    /// Wire code used in request bodies and URL paths.
    pub fn code(self) -> &'static str {
        match self {
            TaskKind::Hy => "hy",
            TaskKind::Cz => "cz",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Hy => "化验汇总",
            TaskKind::Cz => "称重汇总",
        }
    }

    /// Substring the backend writes to the log stream when this pipeline ends.
    ///
    /// Must stay byte-for-byte in sync with the server's log text.
    pub fn completion_marker(self) -> &'static str {
        match self {
            TaskKind::Hy => "化验汇总任务完成",
            TaskKind::Cz => "称重汇总任务完成",
        }
    }

    /// Filename used for a downloaded report when the server sends none.
    pub fn default_report_filename(self) -> &'static str {
        match self {
            TaskKind::Hy => "化验月报汇总.xlsx",
            TaskKind::Cz => "称重月报汇总.xlsx",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            TaskKind::Hy => 0,
            TaskKind::Cz => 1,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task type '{0}' (expected hy or cz)")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hy" => Ok(TaskKind::Hy),
            "cz" => Ok(TaskKind::Cz),
            _ => Err(UnknownTaskKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Idle,
    Running,
}

/// Generation counter for task triggers, one sequence per kind.
pub type RunToken = u64;

/// Id of a preview fetch; only the newest one per kind may apply.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// Polling mode: refresh the preview half way through the window.
    MidpointPreview,
    /// Polling mode: assume the task ended, reset status and refresh.
    FinalReset,
    /// Stream mode: give up waiting for a completion marker.
    StreamDeadline,
}

/// How the client learns about task progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Persistent server-push log stream with completion detection.
    #[default]
    Stream,
    /// Fixed-delay one-shot refreshes for environments without push.
    Polling,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" => Ok(SyncMode::Stream),
            "polling" | "poll" => Ok(SyncMode::Polling),
            other => Err(format!("unknown sync mode '{other}' (expected stream or polling)")),
        }
    }
}

/// Timer delays handed to the state machine at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTimings {
    pub midpoint_preview: Duration,
    pub final_reset: Duration,
    pub stream_deadline: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            midpoint_preview: Duration::from_secs(5),
            final_reset: Duration::from_secs(10),
            stream_deadline: Duration::from_secs(600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_parses_wire_codes() {
        assert_eq!("hy".parse::<TaskKind>(), Ok(TaskKind::Hy));
        assert_eq!(" CZ ".parse::<TaskKind>(), Ok(TaskKind::Cz));
        assert_eq!(
            "xx".parse::<TaskKind>().unwrap_err().to_string(),
            "unknown task type 'xx' (expected hy or cz)"
        );
        assert_eq!(TaskKind::Cz.to_string(), "cz");
    }

    #[test]
    fn sync_mode_accepts_short_alias() {
        assert_eq!("poll".parse::<SyncMode>(), Ok(SyncMode::Polling));
        assert_eq!("Stream".parse::<SyncMode>(), Ok(SyncMode::Stream));
        assert!("push".parse::<SyncMode>().is_err());
    }
}
