//! Incremental server-sent-events parser
//!
//! Feed it raw bytes off the wire in whatever chunk boundaries the transport
//! produces; it yields complete events at blank-line boundaries. Only the
//! `event` and `data` fields are interpreted, per the SSE wire format;
//! comments and unknown fields are skipped.

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; the wire default is "message"
    pub event: String,
    /// Data lines joined with newlines
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else {
                self.field(line);
            }
        }
        events
    }

    fn field(&mut self, line: &str) {
        // ":comment" keep-alive lines carry no field name
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match name {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take().unwrap_or_else(|| "message".to_string());
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: span_update\ndata: {\"a\":1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "span_update".into(),
                data: "{\"a\":1}".into(),
            }]
        );
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: span_up").is_empty());
        assert!(parser.push(b"date\ndata: x").is_empty());
        let events = parser.push(b"\n\n");
        assert_eq!(events[0].event, "span_update");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_default_event_type_is_message() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: hello\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_multi_line_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_comments_and_blank_events_skipped() {
        let mut parser = SseParser::new();
        assert!(parser.push(b": keep-alive\n\n").is_empty());
        assert!(parser.push(b"event: named\n\n").is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: x\r\n\r\n");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: 1\n\ndata: 2\n\n");
        assert_eq!(events.len(), 2);
    }
}
