use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use fuelsync_core::{
    Effect, Msg, PreviewDocument, ProbeOutcome, RequestFailure, RunToken, StructuredStatus,
    TaskKind, TimerKind,
};
use fuelsync_engine::{ClientError, EngineEvent, EngineHandle, FailureKind, StreamEvent};
use fuelsync_logging::{sync_debug, sync_info, sync_warn};

use super::persistence;

/// Carries out effects against the engine and turns its events back into
/// messages for `update`.
pub struct EffectRunner {
    engine: EngineHandle,
    state_dir: PathBuf,
    output_dir: PathBuf,
    timers: TimerBook,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, state_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            engine,
            state_dir,
            output_dir,
            timers: TimerBook::default(),
        }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistServerUrl(url) => {
                    persistence::save_server_url(&self.state_dir, &url);
                    self.engine.set_server_url(url);
                }
                Effect::Probe => self.engine.probe(),
                Effect::Upload { kind, path } => {
                    sync_info!("Upload kind={} path={:?}", kind, path);
                    self.engine.upload(kind.code(), path);
                }
                Effect::StartTask { kind, token } => {
                    sync_info!("StartTask kind={} token={}", kind, token);
                    self.engine.start_task(kind.code(), token);
                }
                Effect::ConnectLogStream => self.engine.connect_log_stream(),
                Effect::Schedule {
                    kind,
                    token,
                    timer,
                    after,
                } => {
                    let tag = self.timers.insert(kind, token, timer);
                    sync_debug!("Schedule {:?} for {} in {:?} (tag {})", timer, kind, after, tag);
                    self.engine.schedule(tag, after);
                }
                Effect::LoadPreview { kind, request } => {
                    self.engine.preview(kind.code(), request);
                }
                Effect::Download { kind } => {
                    self.engine.download(
                        kind.code(),
                        self.output_dir.clone(),
                        kind.default_report_filename(),
                    );
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine result worth a message.
    pub fn poll(&mut self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        map_event(&mut self.timers, event)
    }
}

/// Timer tags handed to the engine, keyed back to the run they belong to.
#[derive(Debug, Default)]
struct TimerBook {
    next_tag: u64,
    pending: HashMap<u64, (TaskKind, RunToken, TimerKind)>,
}

impl TimerBook {
    fn insert(&mut self, kind: TaskKind, token: RunToken, timer: TimerKind) -> u64 {
        self.next_tag += 1;
        self.pending.insert(self.next_tag, (kind, token, timer));
        self.next_tag
    }

    fn take(&mut self, tag: u64) -> Option<(TaskKind, RunToken, TimerKind)> {
        self.pending.remove(&tag)
    }
}

fn map_event(timers: &mut TimerBook, event: EngineEvent) -> Option<Msg> {
    let msg = match event {
        EngineEvent::ProbeCompleted(result) => Msg::ProbeFinished(match result {
            Ok(200) => ProbeOutcome::Reachable,
            Ok(code) => ProbeOutcome::Status(code),
            Err(err) => ProbeOutcome::Unreachable(err.to_string()),
        }),
        EngineEvent::UploadCompleted {
            task,
            file_name,
            result,
        } => Msg::UploadFinished {
            kind: parse_kind(&task)?,
            file_name,
            result: result
                .map(|receipt| receipt.message)
                .map_err(request_failure),
        },
        EngineEvent::TaskStartCompleted {
            task,
            token,
            result,
        } => Msg::TaskStartFinished {
            kind: parse_kind(&task)?,
            token,
            result: result.map_err(request_failure),
        },
        EngineEvent::PreviewCompleted {
            task,
            request,
            result,
        } => Msg::PreviewLoaded {
            kind: parse_kind(&task)?,
            request,
            result: result
                .map(PreviewDocument::from_pairs)
                .map_err(|err| err.to_string()),
        },
        EngineEvent::DownloadCompleted { task, result } => Msg::DownloadFinished {
            kind: parse_kind(&task)?,
            result: result.map_err(|err| err.to_string()),
        },
        EngineEvent::TimerElapsed { tag } => {
            let Some((kind, token, timer)) = timers.take(tag) else {
                sync_warn!("Timer tag {} has no owner", tag);
                return None;
            };
            Msg::TimerFired { kind, token, timer }
        }
        EngineEvent::Stream(event) => match event {
            StreamEvent::Connecting => Msg::StreamConnecting,
            StreamEvent::Opened => Msg::StreamOpened,
            StreamEvent::Message(payload) => Msg::StreamMessage {
                message: payload.message.unwrap_or_default(),
                structured: StructuredStatus {
                    task: payload.task,
                    status: payload.status,
                },
            },
            StreamEvent::Disconnected {
                attempt, reason, ..
            } => Msg::StreamDisconnected { attempt, reason },
        },
    };
    Some(msg)
}

fn request_failure(err: ClientError) -> RequestFailure {
    if err.kind == FailureKind::Rejected {
        RequestFailure::Rejected(err.message)
    } else {
        RequestFailure::Transport(err.to_string())
    }
}

fn parse_kind(code: &str) -> Option<TaskKind> {
    match code.parse() {
        Ok(kind) => Some(kind),
        Err(err) => {
            sync_warn!("Dropping engine result: {}", err);
            None
        }
    }
}
