//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary network chunks; a line (and a multi-byte UTF-8
//! character) may be split across two of them, so undecoded bytes stay in
//! the buffer until their terminating newline shows up.

use bytes::{Buf, BytesMut};

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network chunk; returns the `data` payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(newline);
            self.buffer.advance(1);
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.handle_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }

        events
    }

    /// Flushes a trailing line and any event left open when the body ended.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest);
            if let Some(event) = self.handle_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comments and fields other than `data` carry nothing we use.
        if line.starts_with(':') {
            return None;
        }
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if value != "[DONE]" {
                self.data.push(value.to_string());
            }
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}
