/// Incremental `text/event-stream` decoder.
///
/// Only `data` fields matter to the log stream; `event`, `id` and `retry`
/// are accepted and dropped. Bytes are buffered until a full line arrives so
/// multi-byte characters split across chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one body chunk and returns the data of every completed event.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            self.process_line(&line, &mut events);
        }
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            if !self.data.is_empty() {
                events.push(self.data.join("\n"));
                self.data.clear();
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SseDecoder;

    #[test]
    fn dispatches_on_blank_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"message\":\"a\"}\n").is_empty());
        assert_eq!(decoder.push(b"\n"), vec![r#"{"message":"a"}"#.to_string()]);
    }

    #[test]
    fn keep_alive_comments_are_skipped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b": keep-alive\n\n").is_empty());
    }

    #[test]
    fn multi_line_data_is_joined_and_crlf_accepted() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: log\r\ndata: one\r\ndata:two\r\nid: 7\r\n\r\n");
        assert_eq!(events, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn split_utf8_sequence_survives_chunking() {
        let payload = "data: 化验汇总任务完成\n\n".as_bytes();
        let (head, tail) = payload.split_at(10);
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["化验汇总任务完成".to_string()]);
    }

    #[test]
    fn several_events_in_one_chunk_keep_order() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: 1\n\ndata: 2\n\n: ping\n\ndata: 3\n\n");
        assert_eq!(events, vec!["1", "2", "3"]);
    }
}
