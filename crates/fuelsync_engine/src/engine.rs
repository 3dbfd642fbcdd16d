use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use fuelsync_logging::{sync_debug, sync_info};

use crate::backend::{Backend, BackendSettings, ReqwestBackend};
use crate::persist::AtomicFileWriter;
use crate::stream::{run_log_stream, ChannelStreamSink, ReconnectPolicy};
use crate::{ClientError, EngineEvent, FailureKind};

enum EngineCommand {
    SetServerUrl(String),
    Probe,
    Upload {
        task: String,
        path: PathBuf,
    },
    StartTask {
        task: String,
        token: u64,
    },
    Preview {
        task: String,
        request: u64,
    },
    Download {
        task: String,
        out_dir: PathBuf,
        fallback_name: String,
    },
    Schedule {
        tag: u64,
        after: Duration,
    },
    ConnectLogStream,
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub backend: BackendSettings,
    pub reconnect: ReconnectPolicy,
}

/// Owns the async runtime thread. Requests go in as commands, results come
/// back as [`EngineEvent`]s through [`EngineHandle::try_recv`].
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, ClientError> {
        let backend = Arc::new(ReqwestBackend::new(config.backend)?);
        let reconnect = config.reconnect;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let stream_started = Arc::new(AtomicBool::new(false));

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                if let EngineCommand::SetServerUrl(url) = &command {
                    sync_info!("Server URL set to {}", url);
                    backend.set_base_url(url);
                    continue;
                }
                let backend = backend.clone();
                let event_tx = event_tx.clone();
                let stream_started = stream_started.clone();
                runtime.spawn(async move {
                    handle_command(backend.as_ref(), command, event_tx, &stream_started, reconnect)
                        .await;
                });
            }
        });

        Ok(Self { cmd_tx, event_rx })
    }

    /// Points later requests at another server. An open log stream keeps its
    /// connection and moves over on its next reconnect.
    pub fn set_server_url(&self, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::SetServerUrl(url.into()));
    }

    pub fn probe(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Probe);
    }

    pub fn upload(&self, task: impl Into<String>, path: PathBuf) {
        let _ = self.cmd_tx.send(EngineCommand::Upload {
            task: task.into(),
            path,
        });
    }

    pub fn start_task(&self, task: impl Into<String>, token: u64) {
        let _ = self.cmd_tx.send(EngineCommand::StartTask {
            task: task.into(),
            token,
        });
    }

    pub fn preview(&self, task: impl Into<String>, request: u64) {
        let _ = self.cmd_tx.send(EngineCommand::Preview {
            task: task.into(),
            request,
        });
    }

    pub fn download(&self, task: impl Into<String>, out_dir: PathBuf, fallback_name: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Download {
            task: task.into(),
            out_dir,
            fallback_name: fallback_name.into(),
        });
    }

    /// Emits [`EngineEvent::TimerElapsed`] with `tag` once `after` has passed.
    pub fn schedule(&self, tag: u64, after: Duration) {
        let _ = self.cmd_tx.send(EngineCommand::Schedule { tag, after });
    }

    /// Starts the log stream; later calls are no-ops while it runs.
    pub fn connect_log_stream(&self) {
        let _ = self.cmd_tx.send(EngineCommand::ConnectLogStream);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn handle_command(
    backend: &dyn Backend,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
    stream_started: &AtomicBool,
    reconnect: ReconnectPolicy,
) {
    let event = match command {
        EngineCommand::SetServerUrl(_) => return,
        EngineCommand::Probe => EngineEvent::ProbeCompleted(backend.probe().await),
        EngineCommand::Upload { task, path } => {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let result = backend.upload(&task, &path).await;
            EngineEvent::UploadCompleted {
                task,
                file_name,
                result,
            }
        }
        EngineCommand::StartTask { task, token } => {
            let result = backend.start_task(&task).await;
            EngineEvent::TaskStartCompleted {
                task,
                token,
                result,
            }
        }
        EngineCommand::Preview { task, request } => {
            let result = backend.preview(&task).await;
            EngineEvent::PreviewCompleted {
                task,
                request,
                result,
            }
        }
        EngineCommand::Download {
            task,
            out_dir,
            fallback_name,
        } => {
            let result = match backend.download(&task).await {
                Ok(report) => {
                    let name = report.filename.unwrap_or(fallback_name);
                    save_report(out_dir, name, report.bytes).await
                }
                Err(err) => Err(err),
            };
            EngineEvent::DownloadCompleted { task, result }
        }
        EngineCommand::Schedule { tag, after } => {
            tokio::time::sleep(after).await;
            EngineEvent::TimerElapsed { tag }
        }
        EngineCommand::ConnectLogStream => {
            if stream_started.swap(true, Ordering::SeqCst) {
                sync_debug!("Log stream already running");
                return;
            }
            let sink = ChannelStreamSink::new(event_tx);
            run_log_stream(backend, &reconnect, &sink).await;
            stream_started.store(false, Ordering::SeqCst);
            return;
        }
    };
    let _ = event_tx.send(event);
}

/// Writes a downloaded report on the blocking pool.
async fn save_report(
    out_dir: PathBuf,
    name: String,
    bytes: Vec<u8>,
) -> Result<PathBuf, ClientError> {
    tokio::task::spawn_blocking(move || AtomicFileWriter::new(out_dir).write(&name, bytes))
        .await
        .map_err(|err| ClientError::new(FailureKind::Io, err.to_string()))?
        .map_err(|err| ClientError::new(FailureKind::Io, err.to_string()))
}
