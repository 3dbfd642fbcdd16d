use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::TryRecvError;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use fuelsync_core::{update, AppState, Msg, PreviewState, ProbeOutcome, TaskKind, TaskStatus};
use fuelsync_engine::EngineHandle;
use fuelsync_logging::{sync_debug, sync_info};

use super::config::ClientConfig;
use super::console::{self, ConsoleInput};
use super::effects::EffectRunner;
use super::ui::render::{self, RenderMemo, RenderOptions};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// When a one-shot command has done its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitWhen {
    Immediately,
    Never,
    ProbeDone,
    UploadDone,
    DownloadDone,
    PreviewSettled(TaskKind),
    RunFinished { kind: TaskKind, then_preview: bool },
}

enum GoalStep {
    Pending,
    /// Finished; `false` when the command did not achieve what it asked for.
    Done(bool),
    FollowUp(Msg),
}

impl ExitWhen {
    fn progress(&mut self, msg: &Msg, state: &AppState) -> GoalStep {
        match *self {
            ExitWhen::Immediately => GoalStep::Done(true),
            ExitWhen::Never => GoalStep::Pending,
            ExitWhen::ProbeDone => match msg {
                Msg::ProbeFinished(outcome) => GoalStep::Done(*outcome == ProbeOutcome::Reachable),
                _ => GoalStep::Pending,
            },
            ExitWhen::UploadDone => match msg {
                Msg::UploadFinished { result, .. } => GoalStep::Done(result.is_ok()),
                _ => GoalStep::Pending,
            },
            ExitWhen::DownloadDone => match msg {
                Msg::DownloadFinished { result, .. } => GoalStep::Done(result.is_ok()),
                _ => GoalStep::Pending,
            },
            ExitWhen::PreviewSettled(kind) => match state.preview(kind) {
                PreviewState::NotLoaded | PreviewState::Loading => GoalStep::Pending,
                PreviewState::Failed(_) => GoalStep::Done(false),
                _ => GoalStep::Done(true),
            },
            ExitWhen::RunFinished { kind, then_preview } => {
                if state.status(kind) == TaskStatus::Running {
                    return GoalStep::Pending;
                }
                let started = !matches!(
                    msg,
                    Msg::TaskStartFinished { result: Err(_), .. }
                );
                if started && then_preview {
                    *self = ExitWhen::PreviewSettled(kind);
                    GoalStep::FollowUp(Msg::PreviewRequested(kind))
                } else {
                    GoalStep::Done(started)
                }
            }
        }
    }
}

/// Messages to feed in up front and the condition that ends the session.
#[derive(Debug, Clone)]
pub struct Plan {
    initial: Vec<Msg>,
    exit: ExitWhen,
    interactive: bool,
}

impl Plan {
    pub fn probe() -> Self {
        Self::once(vec![Msg::ProbeClicked], ExitWhen::ProbeDone)
    }

    pub fn set_server(url: String) -> Self {
        Self::once(vec![Msg::ServerUrlChanged(url)], ExitWhen::Immediately)
    }

    pub fn upload(kind: TaskKind, path: PathBuf) -> Self {
        Self::once(vec![Msg::UploadRequested { kind, path }], ExitWhen::UploadDone)
    }

    pub fn run(kind: TaskKind, then_preview: bool) -> Self {
        Self::once(
            vec![Msg::RunClicked(kind)],
            ExitWhen::RunFinished { kind, then_preview },
        )
    }

    pub fn preview(kind: TaskKind) -> Self {
        Self::once(vec![Msg::PreviewRequested(kind)], ExitWhen::PreviewSettled(kind))
    }

    pub fn download(kind: TaskKind) -> Self {
        Self::once(vec![Msg::DownloadRequested(kind)], ExitWhen::DownloadDone)
    }

    pub fn watch() -> Self {
        Self::once(vec![Msg::Started], ExitWhen::Never)
    }

    pub fn console() -> Self {
        Self {
            initial: vec![Msg::Started, Msg::PreviewRequested(TaskKind::Hy)],
            exit: ExitWhen::Never,
            interactive: true,
        }
    }

    fn once(initial: Vec<Msg>, exit: ExitWhen) -> Self {
        Self {
            initial,
            exit,
            interactive: false,
        }
    }
}

struct Session {
    state: AppState,
    runner: EffectRunner,
    memo: RenderMemo,
    render: RenderOptions,
}

impl Session {
    fn current_tab(&self) -> TaskKind {
        self.state.current_tab()
    }

    /// Applies one message; returns whether it set any effects in motion.
    fn dispatch(&mut self, msg: Msg) -> bool {
        let state = std::mem::take(&mut self.state);
        let (state, _) = update(
            state,
            Msg::Tick {
                now: Local::now().time(),
            },
        );
        let (mut state, effects) = update(state, msg);

        if state.consume_dirty() {
            let mut text = render::render(&state.view(), &mut self.memo, &self.render);
            if let Some(toast) = state.take_toast() {
                text.push_str(&render::render_toast(&toast));
            }
            print_transcript(&text);
        }
        self.state = state;
        let busy = !effects.is_empty();
        self.runner.enqueue(effects);
        busy
    }
}

fn print_transcript(text: &str) {
    if text.is_empty() {
        return;
    }
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

pub fn run(config: ClientConfig, plan: Plan) -> Result<()> {
    sync_info!(
        "fuelsync starting: server={} mode={:?}",
        config.server_url,
        config.mode
    );
    let engine = EngineHandle::new(config.engine_config()).context("starting network engine")?;
    let runner = EffectRunner::new(engine, config.state_dir.clone(), config.output_dir.clone());
    let mut session = Session {
        state: AppState::new(config.mode, config.timings).with_server_url(config.server_url),
        runner,
        memo: RenderMemo::default(),
        render: config.render,
    };

    let Plan {
        initial,
        mut exit,
        interactive,
    } = plan;

    let mut busy = false;
    for msg in initial {
        busy = session.dispatch(msg.clone());
        match exit.progress(&msg, &session.state) {
            GoalStep::Done(ok) => return finish(ok),
            GoalStep::FollowUp(next) => busy = session.dispatch(next),
            GoalStep::Pending => {}
        }
    }
    // Refused locally, e.g. an upload of the wrong file type.
    if !interactive && !busy && exit != ExitWhen::Never {
        return finish(false);
    }

    let input = interactive.then(|| {
        print_transcript(&format!("{}\n", console::HELP));
        console::spawn_stdin_reader()
    });

    let mut ok = true;
    loop {
        if let Some(lines) = &input {
            match lines.try_recv() {
                Ok(line) => match console::parse_line(&line, session.current_tab()) {
                    Ok(Some(ConsoleInput::Msg(msg))) => {
                        session.dispatch(msg);
                    }
                    Ok(Some(ConsoleInput::Help)) => {
                        print_transcript(&format!("{}\n", console::HELP))
                    }
                    Ok(Some(ConsoleInput::Quit)) => break,
                    Ok(None) => {}
                    Err(err) => print_transcript(&format!("{err}\n")),
                },
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
        }

        let Some(msg) = session.runner.poll(POLL_INTERVAL) else {
            continue;
        };
        session.dispatch(msg.clone());
        match exit.progress(&msg, &session.state) {
            GoalStep::Pending => {}
            GoalStep::Done(result) => {
                ok = result;
                break;
            }
            GoalStep::FollowUp(next) => {
                sync_debug!("Follow-up after {:?}", exit);
                session.dispatch(next);
            }
        }
    }

    finish(ok)
}

fn finish(ok: bool) -> Result<()> {
    sync_info!("fuelsync session finished (ok={})", ok);
    if !ok {
        bail!("command did not complete; see the log above");
    }
    Ok(())
}
