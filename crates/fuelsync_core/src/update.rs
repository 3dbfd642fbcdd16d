use std::path::Path;

use fuelsync_logging::{sync_debug, sync_warn};

use crate::completion::{self, CompletionSignal};
use crate::msg::{ProbeOutcome, RequestFailure};
use crate::state::{LogLevel, StreamState};
use crate::{AppState, Effect, Msg, PreviewState, SyncMode, TaskKind, TaskStatus, TimerKind};

const SPREADSHEET_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Tick { now } => {
            state.set_now(now);
            Vec::new()
        }
        Msg::Started => {
            let welcome = format!(
                "欢迎使用燃料管理客户端。当前服务器: {}",
                state.server_url()
            );
            state.push_log(LogLevel::System, welcome);
            ensure_stream(&mut state).into_iter().collect()
        }
        Msg::ServerUrlChanged(raw) => match normalize_server_url(&raw) {
            Ok(url) => {
                // Persisted even when unchanged.
                if url != state.server_url() {
                    state.push_log(LogLevel::System, format!("服务器地址已更新: {url}"));
                    state.set_server_url(url.clone());
                }
                vec![Effect::PersistServerUrl(url)]
            }
            Err(reason) => {
                state.push_log(LogLevel::Error, format!("!!! 无效的服务器地址: {reason}"));
                Vec::new()
            }
        },
        Msg::ProbeClicked => vec![Effect::Probe],
        Msg::ProbeFinished(outcome) => {
            match outcome {
                ProbeOutcome::Reachable => {
                    state.show_toast("连接成功", true);
                    state.push_log(LogLevel::System, ">>> 服务器连接成功！");
                }
                ProbeOutcome::Status(code) => {
                    state.push_log(LogLevel::Error, format!("!!! 连接失败: code {code}"));
                }
                ProbeOutcome::Unreachable(reason) => {
                    state.show_toast("连接失败", false);
                    state.push_log(LogLevel::Error, format!("!!! 连接失败: {reason}"));
                }
            }
            Vec::new()
        }
        Msg::TabSelected(kind) => {
            state.set_current_tab(kind);
            request_preview(&mut state, kind)
        }
        Msg::UploadRequested { kind, path } => {
            let file_name = display_name(&path);
            if !is_spreadsheet(&path) {
                state.push_log(
                    LogLevel::Error,
                    format!("❌ 仅支持 Excel 文件 (.xls/.xlsx): {file_name}"),
                );
                return (state, Vec::new());
            }
            state.push_log(LogLevel::Info, format!("正在上传文件: {file_name}..."));
            vec![Effect::Upload { kind, path }]
        }
        Msg::UploadFinished {
            kind,
            file_name,
            result,
        } => {
            match result {
                Ok(_) => {
                    state.push_log(
                        LogLevel::System,
                        format!("✅ 上传成功! {file_name} -> {}", kind.label()),
                    );
                    state.show_toast("上传成功", true);
                }
                Err(RequestFailure::Rejected(reason)) => {
                    state.push_log(LogLevel::Error, format!("❌ 上传失败: {reason}"));
                }
                Err(RequestFailure::Transport(reason)) => {
                    state.push_log(LogLevel::Error, format!("❌ 上传错误: {reason}"));
                }
            }
            Vec::new()
        }
        Msg::RunClicked(kind) => start_task(&mut state, kind),
        Msg::TaskStartFinished {
            kind,
            token,
            result,
        } => {
            match result {
                Ok(message) => state.push_log(LogLevel::System, format!("🚀 {message}")),
                Err(failure) => {
                    let text = match failure {
                        RequestFailure::Rejected(reason) => format!("❌ 启动失败: {reason}"),
                        RequestFailure::Transport(reason) => format!("❌ 请求错误: {reason}"),
                    };
                    state.push_log(LogLevel::Error, text);
                    if state.is_current_run(kind, token) {
                        state.finish_run(kind);
                    }
                }
            }
            Vec::new()
        }
        Msg::TimerFired { kind, token, timer } => {
            if !state.is_current_run(kind, token) {
                sync_debug!("Ignoring stale {:?} timer for {} run {}", timer, kind, token);
                return (state, Vec::new());
            }
            match timer {
                TimerKind::MidpointPreview => request_preview(&mut state, kind),
                TimerKind::FinalReset => {
                    state.finish_run(kind);
                    state.push_log(
                        LogLevel::Info,
                        format!("{}: 等待窗口结束，状态已重置", kind.label()),
                    );
                    request_preview(&mut state, kind)
                }
                TimerKind::StreamDeadline => {
                    state.finish_run(kind);
                    state.push_log(
                        LogLevel::Error,
                        format!("{}: 超时未收到完成消息，状态已重置", kind.label()),
                    );
                    Vec::new()
                }
            }
        }
        Msg::StreamConnecting => {
            state.set_stream(StreamState::Connecting);
            Vec::new()
        }
        Msg::StreamOpened => {
            if matches!(state.stream_state(), StreamState::Retrying { .. }) {
                state.push_log(LogLevel::System, "日志连接已恢复");
            }
            state.set_stream(StreamState::Open);
            Vec::new()
        }
        Msg::StreamMessage {
            message,
            structured,
        } => {
            match completion::detect(&message, &structured) {
                Some(CompletionSignal::Finished(kind)) => {
                    state.finish_run(kind);
                }
                Some(CompletionSignal::Failed(Some(kind))) => {
                    state.finish_run(kind);
                }
                Some(CompletionSignal::Failed(None)) => {
                    let running = state.running_kinds();
                    if let [only] = running.as_slice() {
                        state.finish_run(*only);
                    }
                }
                None => {}
            }
            if !message.trim().is_empty() {
                state.push_log(LogLevel::Info, message);
            }
            Vec::new()
        }
        Msg::StreamDisconnected { attempt, reason } => {
            if state.stream_state() == StreamState::Open {
                sync_warn!("Log stream dropped: {}", reason);
                state.push_log(LogLevel::Error, "⚠️ 日志连接断开，尝试重连...");
            }
            state.set_stream(StreamState::Retrying { attempt });
            Vec::new()
        }
        Msg::PreviewRequested(kind) => request_preview(&mut state, kind),
        Msg::PreviewLoaded {
            kind,
            request,
            result,
        } => {
            if state.slot(kind).preview.pending != Some(request) {
                sync_debug!("Discarding stale preview {} for {}", request, kind);
                return (state, Vec::new());
            }
            let next = match result {
                Ok(document) if document.is_empty() => PreviewState::NoData,
                Ok(document) => PreviewState::Loaded {
                    document,
                    active_sheet: 0,
                },
                Err(reason) => {
                    state.push_log(LogLevel::Error, format!("❌ 加载失败: {reason}"));
                    PreviewState::Failed(reason)
                }
            };
            let preview = &mut state.slot_mut(kind).preview;
            preview.pending = None;
            preview.state = next;
            Vec::new()
        }
        Msg::SheetSelected { kind, index } => {
            if let PreviewState::Loaded {
                document,
                active_sheet,
            } = &mut state.slot_mut(kind).preview.state
            {
                if index < document.len() {
                    *active_sheet = index;
                }
            }
            Vec::new()
        }
        Msg::DownloadRequested(kind) => {
            state.push_log(LogLevel::Info, format!("正在下载{}报表...", kind.label()));
            vec![Effect::Download { kind }]
        }
        Msg::DownloadFinished { kind, result } => {
            match result {
                Ok(path) => {
                    state.push_log(
                        LogLevel::System,
                        format!("已保存{}报表: {}", kind.label(), path.display()),
                    );
                    state.show_toast("下载完成", true);
                }
                Err(reason) => {
                    state.push_log(LogLevel::Error, format!("下载失败: {reason}"));
                }
            }
            Vec::new()
        }
        Msg::ClearLogs => {
            state.clear_logs();
            Vec::new()
        }
    };

    (state, effects)
}

fn start_task(state: &mut AppState, kind: TaskKind) -> Vec<Effect> {
    if state.status(kind) == TaskStatus::Running {
        state.push_log(
            LogLevel::Info,
            format!("{}任务正在运行，请等待完成", kind.label()),
        );
        return Vec::new();
    }

    let token = state.begin_run(kind);
    state.push_log(LogLevel::System, format!("正在启动{}任务...", kind.label()));
    let timings = state.timings();

    let mut effects = Vec::with_capacity(3);
    match state.mode() {
        SyncMode::Stream => {
            effects.extend(ensure_stream(state));
            effects.push(Effect::StartTask { kind, token });
            effects.push(Effect::Schedule {
                kind,
                token,
                timer: TimerKind::StreamDeadline,
                after: timings.stream_deadline,
            });
        }
        SyncMode::Polling => {
            state.push_log(LogLevel::Info, "Checking status...");
            effects.push(Effect::StartTask { kind, token });
            effects.push(Effect::Schedule {
                kind,
                token,
                timer: TimerKind::MidpointPreview,
                after: timings.midpoint_preview,
            });
            effects.push(Effect::Schedule {
                kind,
                token,
                timer: TimerKind::FinalReset,
                after: timings.final_reset,
            });
        }
    }
    effects
}

/// In stream mode, asks the engine for the log stream once.
fn ensure_stream(state: &mut AppState) -> Option<Effect> {
    if state.mode() != SyncMode::Stream || state.stream_state() != StreamState::Disconnected {
        return None;
    }
    state.set_stream(StreamState::Connecting);
    Some(Effect::ConnectLogStream)
}

fn request_preview(state: &mut AppState, kind: TaskKind) -> Vec<Effect> {
    let request = state.allocate_request();
    let preview = &mut state.slot_mut(kind).preview;
    preview.pending = Some(request);
    preview.state = PreviewState::Loading;
    vec![Effect::LoadPreview { kind, request }]
}

/// Validates a user-typed server address and strips the trailing slash.
pub fn normalize_server_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("地址为空".to_string());
    }
    let parsed = url::Url::parse(trimmed).map_err(|err| format!("{trimmed}: {err}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("{trimmed}: unsupported scheme {other}")),
    }
    if parsed.host_str().is_none() {
        return Err(format!("{trimmed}: missing host"));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::normalize_server_url;

    #[test]
    fn server_url_is_trimmed_and_validated() {
        assert_eq!(
            normalize_server_url(" http://10.0.0.5:5000/ "),
            Ok("http://10.0.0.5:5000".to_string())
        );
        assert_eq!(
            normalize_server_url("https://fuel.example.com/api/"),
            Ok("https://fuel.example.com/api".to_string())
        );
        assert!(normalize_server_url("").is_err());
        assert!(normalize_server_url("ftp://host").is_err());
        assert!(normalize_server_url("not a url").is_err());
    }
}
