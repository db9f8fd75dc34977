//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only `data:` fields matter to the panel; `event:`, `id:`, `retry:` and
//! comment lines are skipped.  Chunks may split lines (or UTF-8 sequences)
//! anywhere, so bytes are buffered until a full line is available.
//!
//! A line or event longer than [`MAX_PENDING`] bytes is dropped with a
//! warning; decoding resumes at the next line.

use tracing::warn;

/// Upper bound on buffered bytes for one line, and for one event's data.
pub const MAX_PENDING: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    data_len: usize,
    /// Skip everything up to the next newline.
    discarding: bool,
    /// Skip lines up to the next blank line.
    dropping_event: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the data payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();

        let mut start = 0;
        while let Some(pos) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let mut line = &self.pending[start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            start = end + 1;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if let Some(payload) = self.take_line(&line) {
                out.push(payload);
            }
        }
        self.pending.drain(..start);

        if self.pending.len() > MAX_PENDING {
            warn!("event stream line exceeds {} bytes, dropped", MAX_PENDING);
            self.pending.clear();
            self.reset_event();
            self.discarding = true;
            self.dropping_event = true;
        }
        out
    }

    fn reset_event(&mut self) {
        self.data.clear();
        self.data_len = 0;
    }

    fn take_line(&mut self, line: &str) -> Option<String> {
        if self.dropping_event {
            self.dropping_event = !line.is_empty();
            return None;
        }
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.reset_event();
            return Some(payload);
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_len += value.len() + 1;
            if self.data_len > MAX_PENDING {
                warn!("event stream event exceeds {} bytes, dropped", MAX_PENDING);
                self.reset_event();
                self.dropping_event = true;
                return None;
            }
            self.data.push(value.to_string());
        }
        None
    }
}
