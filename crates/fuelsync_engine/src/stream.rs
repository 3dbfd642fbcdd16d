use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use fuelsync_logging::{sync_debug, sync_info, sync_warn};
use futures_util::StreamExt;
use rand::Rng;

use crate::backend::Backend;
use crate::sse::SseDecoder;
use crate::{EngineEvent, LogPayload, StreamEvent};

/// Delay between reconnect attempts. Retries never stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Upper bound on `delay + jitter`.
    pub max_delay: Duration,
    /// Uniform random spread added to `delay`; zero keeps the interval fixed.
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(2),
            jitter: Duration::ZERO,
        }
    }
}

impl ReconnectPolicy {
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let spread = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rng.gen_range(0.0..=1.0))
        };
        (self.delay + spread).min(self.max_delay.max(self.delay))
    }
}

pub trait StreamSink: Send + Sync {
    fn emit(&self, event: StreamEvent);

    /// Lets the reconnect loop stop once nobody listens any more.
    fn is_closed(&self) -> bool {
        false
    }
}

pub struct ChannelStreamSink {
    tx: mpsc::Sender<EngineEvent>,
    closed: AtomicBool,
}

impl ChannelStreamSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            tx,
            closed: AtomicBool::new(false),
        }
    }
}

impl StreamSink for ChannelStreamSink {
    fn emit(&self, event: StreamEvent) {
        if self.tx.send(EngineEvent::Stream(event)).is_err() {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Keeps `GET /api/logs` open for as long as the sink listens.
///
/// Connecting -> Open -> (error or EOF) -> wait -> Connecting, forever.
/// Messages are forwarded in arrival order; nothing is replayed or
/// deduplicated across reconnects.
pub async fn run_log_stream(backend: &dyn Backend, policy: &ReconnectPolicy, sink: &dyn StreamSink) {
    let mut attempt: u32 = 0;
    loop {
        sink.emit(StreamEvent::Connecting);
        let reason = match backend.open_log_stream().await {
            Ok(mut body) => {
                attempt = 0;
                sync_info!("Log stream open");
                sink.emit(StreamEvent::Opened);
                let mut decoder = SseDecoder::new();
                loop {
                    match body.next().await {
                        Some(Ok(chunk)) => {
                            for data in decoder.push(&chunk) {
                                if let Some(payload) = parse_payload(&data) {
                                    sink.emit(StreamEvent::Message(payload));
                                }
                            }
                        }
                        Some(Err(err)) => break err.to_string(),
                        None => break "stream closed by server".to_string(),
                    }
                }
            }
            Err(err) => err.to_string(),
        };

        if sink.is_closed() {
            return;
        }
        attempt = attempt.saturating_add(1);
        let retry_in = policy.next_delay(&mut rand::thread_rng());
        sync_warn!(
            "Log stream down (attempt {}): {}; retrying in {:?}",
            attempt,
            reason,
            retry_in
        );
        sink.emit(StreamEvent::Disconnected {
            attempt,
            reason,
            retry_in,
        });
        tokio::time::sleep(retry_in).await;
        if sink.is_closed() {
            return;
        }
    }
}

/// Keeps events that have text to show or a `type`/`status` pair to act on.
fn parse_payload(data: &str) -> Option<LogPayload> {
    match serde_json::from_str::<LogPayload>(data) {
        Ok(payload) if has_text(&payload) || has_status(&payload) => Some(payload),
        Ok(_) => None,
        Err(err) => {
            sync_debug!("Skipping undecodable log event {:?}: {}", data, err);
            None
        }
    }
}

fn has_text(payload: &LogPayload) -> bool {
    payload.message.as_deref().is_some_and(|m| !m.is_empty())
}

fn has_status(payload: &LogPayload) -> bool {
    payload.task.is_some() && payload.status.is_some()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use rand::rngs::mock::StepRng;
    use tokio::time::Instant;

    use super::*;
    use crate::backend::ByteStream;
    use crate::{ClientError, DownloadedReport, FailureKind, PreviewSheets, UploadReceipt};

    /// Fails every connection attempt and records when each one happened.
    struct FlakyBackend {
        attempts: Mutex<Vec<Instant>>,
        serve_on: Option<usize>,
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        async fn probe(&self) -> Result<u16, ClientError> {
            unimplemented!()
        }
        async fn upload(&self, _: &str, _: &std::path::Path) -> Result<UploadReceipt, ClientError> {
            unimplemented!()
        }
        async fn start_task(&self, _: &str) -> Result<String, ClientError> {
            unimplemented!()
        }
        async fn preview(&self, _: &str) -> Result<PreviewSheets, ClientError> {
            unimplemented!()
        }
        async fn download(&self, _: &str) -> Result<DownloadedReport, ClientError> {
            unimplemented!()
        }
        async fn open_log_stream(&self) -> Result<ByteStream, ClientError> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Instant::now());
            if Some(attempts.len()) == self.serve_on {
                let chunks: Vec<Result<Bytes, ClientError>> = vec![
                    Ok(Bytes::from_static(b": keep-alive\n\n")),
                    Ok(Bytes::from(
                        "data: {\"message\":\"<<< 化验汇总任务完成。\"}\n\n".as_bytes(),
                    )),
                    Ok(Bytes::from_static(b"data: {\"other\":1}\n\n")),
                ];
                return Ok(stream::iter(chunks).boxed());
            }
            Err(ClientError::new(FailureKind::Network, "connection refused"))
        }
    }

    /// Records events and reports itself closed after `limit` disconnects.
    struct RecordingSink {
        events: Arc<Mutex<Vec<StreamEvent>>>,
        limit: usize,
    }

    impl StreamSink for RecordingSink {
        fn emit(&self, event: StreamEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn is_closed(&self) -> bool {
            let events = self.events.lock().unwrap();
            events
                .iter()
                .filter(|e| matches!(e, StreamEvent::Disconnected { .. }))
                .count()
                >= self.limit
        }
    }

    #[test]
    fn status_only_events_are_kept() {
        let payload = parse_payload(r#"{"type":"cz","status":"done"}"#).unwrap();
        assert_eq!(payload.message, None);
        assert_eq!(payload.task.as_deref(), Some("cz"));
        assert_eq!(parse_payload(r#"{"message":""}"#), None);
        assert_eq!(parse_payload(r#"{"type":"cz"}"#), None);
    }

    #[test]
    fn default_policy_is_a_fixed_two_seconds() {
        let policy = ReconnectPolicy::default();
        let mut rng = StepRng::new(u64::MAX / 2, 1);
        assert_eq!(policy.next_delay(&mut rng), Duration::from_secs(2));
    }

    #[test]
    fn jitter_is_capped_by_ceiling() {
        let policy = ReconnectPolicy {
            delay: Duration::from_secs(2),
            max_delay: Duration::from_millis(2500),
            jitter: Duration::from_secs(5),
        };
        let mut rng = StepRng::new(u64::MAX, 0);
        let delay = policy.next_delay(&mut rng);
        assert!(delay >= Duration::from_secs(2));
        assert!(delay <= Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_once_per_interval_until_closed() {
        let backend = FlakyBackend {
            attempts: Mutex::new(Vec::new()),
            serve_on: None,
        };
        let sink = RecordingSink {
            events: Arc::new(Mutex::new(Vec::new())),
            limit: 4,
        };

        run_log_stream(&backend, &ReconnectPolicy::default(), &sink).await;

        let attempts = backend.attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 4);
        for pair in attempts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(2));
        }
        let disconnects: Vec<u32> = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Disconnected { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(disconnects, vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_connection_forwards_messages_and_resets_attempts() {
        let backend = FlakyBackend {
            attempts: Mutex::new(Vec::new()),
            serve_on: Some(2),
        };
        let sink = RecordingSink {
            events: Arc::new(Mutex::new(Vec::new())),
            limit: 3,
        };

        run_log_stream(&backend, &ReconnectPolicy::default(), &sink).await;

        let events = sink.events.lock().unwrap().clone();
        let messages: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Message(payload) => payload.message.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(messages, vec!["<<< 化验汇总任务完成。".to_string()]);
        assert!(events.contains(&StreamEvent::Opened));

        let attempts: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Disconnected { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        // Attempt 1 fails; the open on attempt 2 resets the count.
        assert_eq!(attempts, vec![1, 1, 2]);
    }
}
