use std::sync::{Arc, Mutex};
use std::time::Duration;

use fuelsync_engine::{
    run_log_stream, BackendSettings, LogPayload, ReconnectPolicy, ReqwestBackend, StreamEvent,
    StreamSink,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Collects events and closes after the first disconnect.
#[derive(Default)]
struct OneShotSink {
    events: Arc<Mutex<Vec<StreamEvent>>>,
}

impl StreamSink for OneShotSink {
    fn emit(&self, event: StreamEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn is_closed(&self) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, StreamEvent::Disconnected { .. }))
    }
}

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        jitter: Duration::ZERO,
    }
}

#[tokio::test]
async fn stream_body_is_decoded_into_messages() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"message\": \">>> 开始执行化验月报汇总...\"}\n\n",
        ": keep-alive\n\n",
        "data: {\"message\": \"<<< 化验汇总任务完成。\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = ReqwestBackend::new(BackendSettings {
        base_url: server.uri(),
        ..BackendSettings::default()
    })
    .unwrap();
    let sink = OneShotSink::default();

    run_log_stream(&backend, &fast_policy(), &sink).await;

    let events = sink.events.lock().unwrap().clone();
    assert_eq!(events[0], StreamEvent::Connecting);
    assert_eq!(events[1], StreamEvent::Opened);
    assert_eq!(
        events[2],
        StreamEvent::Message(LogPayload {
            message: Some(">>> 开始执行化验月报汇总...".to_string()),
            ..LogPayload::default()
        })
    );
    assert_eq!(
        events[3],
        StreamEvent::Message(LogPayload {
            message: Some("<<< 化验汇总任务完成。".to_string()),
            ..LogPayload::default()
        })
    );
    assert!(matches!(
        events[4],
        StreamEvent::Disconnected { attempt: 1, .. }
    ));
}

#[tokio::test]
async fn server_error_on_stream_counts_as_disconnect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let backend = ReqwestBackend::new(BackendSettings {
        base_url: server.uri(),
        ..BackendSettings::default()
    })
    .unwrap();
    let sink = OneShotSink::default();

    run_log_stream(&backend, &fast_policy(), &sink).await;

    let events = sink.events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    match &events[1] {
        StreamEvent::Disconnected {
            attempt, reason, ..
        } => {
            assert_eq!(*attempt, 1);
            assert!(reason.contains("503"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}
