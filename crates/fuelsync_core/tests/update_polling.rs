use std::time::Duration;

use fuelsync_core::{
    update, AppState, Effect, Msg, PreviewState, SyncMode, SyncTimings, TaskKind, TaskStatus,
    TimerKind,
};
use pretty_assertions::assert_eq;

fn polling_state() -> AppState {
    AppState::new(SyncMode::Polling, SyncTimings::default())
}

fn fire(state: AppState, kind: TaskKind, token: u64, timer: TimerKind) -> (AppState, Vec<Effect>) {
    update(state, Msg::TimerFired { kind, token, timer })
}

#[test]
fn started_in_polling_mode_opens_no_stream() {
    let (_state, effects) = update(polling_state(), Msg::Started);
    assert!(effects.is_empty());
}

#[test]
fn run_schedules_midpoint_and_final_timers() {
    let (state, effects) = update(polling_state(), Msg::RunClicked(TaskKind::Cz));

    assert_eq!(state.status(TaskKind::Cz), TaskStatus::Running);
    assert_eq!(
        effects,
        vec![
            Effect::StartTask {
                kind: TaskKind::Cz,
                token: 1,
            },
            Effect::Schedule {
                kind: TaskKind::Cz,
                token: 1,
                timer: TimerKind::MidpointPreview,
                after: Duration::from_secs(5),
            },
            Effect::Schedule {
                kind: TaskKind::Cz,
                token: 1,
                timer: TimerKind::FinalReset,
                after: Duration::from_secs(10),
            },
        ]
    );
    assert!(state.logs().iter().any(|e| e.text == "Checking status..."));
}

#[test]
fn midpoint_refreshes_preview_without_touching_status() {
    let (state, _) = update(polling_state(), Msg::RunClicked(TaskKind::Hy));
    let (state, effects) = fire(state, TaskKind::Hy, 1, TimerKind::MidpointPreview);

    assert_eq!(state.status(TaskKind::Hy), TaskStatus::Running);
    assert_eq!(
        effects,
        vec![Effect::LoadPreview {
            kind: TaskKind::Hy,
            request: 1,
        }]
    );
    assert_eq!(
        state.view().task(TaskKind::Hy).unwrap().preview,
        PreviewState::Loading
    );
}

#[test]
fn final_timer_resets_status_and_refreshes_preview() {
    let (state, _) = update(polling_state(), Msg::RunClicked(TaskKind::Hy));
    let (state, effects) = fire(state, TaskKind::Hy, 1, TimerKind::FinalReset);

    assert_eq!(state.status(TaskKind::Hy), TaskStatus::Idle);
    assert!(matches!(
        effects.as_slice(),
        [Effect::LoadPreview {
            kind: TaskKind::Hy,
            ..
        }]
    ));
}

#[test]
fn timers_from_an_earlier_run_are_ignored() {
    let (state, _) = update(polling_state(), Msg::RunClicked(TaskKind::Hy));
    let (state, _) = fire(state, TaskKind::Hy, 1, TimerKind::FinalReset);
    let (state, _) = update(state, Msg::RunClicked(TaskKind::Hy));

    // Run 1's midpoint arriving late must not refresh run 2.
    let (state, effects) = fire(state, TaskKind::Hy, 1, TimerKind::MidpointPreview);
    assert!(effects.is_empty());
    let (state, effects) = fire(state, TaskKind::Hy, 1, TimerKind::FinalReset);
    assert!(effects.is_empty());
    assert_eq!(state.status(TaskKind::Hy), TaskStatus::Running);

    let (state, _) = fire(state, TaskKind::Hy, 2, TimerKind::FinalReset);
    assert_eq!(state.status(TaskKind::Hy), TaskStatus::Idle);
}
