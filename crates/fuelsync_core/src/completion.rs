use crate::TaskKind;

/// Prefix the backend writes when a pipeline raises.
pub const FAILURE_MARKER: &str = "任务出错";

/// What a single log-stream message says about task progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSignal {
    Finished(TaskKind),
    /// A task failed; `None` when the message does not say which one.
    Failed(Option<TaskKind>),
}

/// Structured fields some backends attach next to `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredStatus {
    pub task: Option<String>,
    pub status: Option<String>,
}

/// Classifies a stream message.
///
/// A structured `type`/`status` pair wins when both are present and
/// recognised; otherwise the free text is scanned for the per-kind markers.
pub fn detect(message: &str, structured: &StructuredStatus) -> Option<CompletionSignal> {
    if let Some(signal) = detect_structured(structured) {
        return Some(signal);
    }
    if let Some(kind) = TaskKind::ALL
        .into_iter()
        .find(|kind| message.contains(kind.completion_marker()))
    {
        return Some(CompletionSignal::Finished(kind));
    }
    if message.contains(FAILURE_MARKER) {
        return Some(CompletionSignal::Failed(None));
    }
    None
}

fn detect_structured(structured: &StructuredStatus) -> Option<CompletionSignal> {
    let kind = structured.task.as_deref()?.parse::<TaskKind>().ok()?;
    match structured.status.as_deref()?.to_ascii_lowercase().as_str() {
        "done" | "finished" | "completed" => Some(CompletionSignal::Finished(kind)),
        "failed" | "error" => Some(CompletionSignal::Failed(Some(kind))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_map_to_their_kind() {
        let none = StructuredStatus::default();
        assert_eq!(
            detect("<<< 化验汇总任务完成。", &none),
            Some(CompletionSignal::Finished(TaskKind::Hy))
        );
        assert_eq!(
            detect("<<< 称重汇总任务完成。", &none),
            Some(CompletionSignal::Finished(TaskKind::Cz))
        );
        assert_eq!(detect(">>> 开始执行化验月报汇总...", &none), None);
    }

    #[test]
    fn failure_marker_is_unattributed() {
        let none = StructuredStatus::default();
        assert_eq!(
            detect("!!! 任务出错: boom", &none),
            Some(CompletionSignal::Failed(None))
        );
    }

    #[test]
    fn structured_failure_names_its_kind() {
        let structured = StructuredStatus {
            task: Some("hy".into()),
            status: Some("failed".into()),
        };
        assert_eq!(
            detect("", &structured),
            Some(CompletionSignal::Failed(Some(TaskKind::Hy)))
        );
    }

    #[test]
    fn structured_fields_take_precedence() {
        let structured = StructuredStatus {
            task: Some("cz".into()),
            status: Some("done".into()),
        };
        assert_eq!(
            detect("化验汇总任务完成", &structured),
            Some(CompletionSignal::Finished(TaskKind::Cz))
        );
    }

    #[test]
    fn unknown_structured_status_falls_back_to_text() {
        let structured = StructuredStatus {
            task: Some("hy".into()),
            status: Some("progress".into()),
        };
        assert_eq!(detect("plain line", &structured), None);
    }
}
