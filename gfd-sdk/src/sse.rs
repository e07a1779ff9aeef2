//! Incremental decoder for the `text/event-stream` format.
//!
//! Implements the parsing rules of the WHATWG server-sent events
//! specification:
//!
//! * lines end with `\n`, `\r\n` or a lone `\r`, possibly split across
//!   network chunks;
//! * `event:`, `data:`, `id:` and `retry:` fields, with one optional space
//!   after the colon stripped;
//! * lines starting with `:` are comments (the backend uses them as
//!   keep-alives);
//! * a blank line dispatches the accumulated event, unless no `data` field
//!   was seen;
//! * a leading UTF-8 byte order mark is ignored.

use std::time::Duration;

use bytes::{Buf, BytesMut};

/// Name used for frames that carry no `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, `None` for the default channel.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream at dispatch time.
    pub id: Option<String>,
    /// Reconnection delay advertised by the server so far.
    pub retry: Option<Duration>,
}

impl SseFrame {
    /// The event name, falling back to [`DEFAULT_EVENT_NAME`].
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or(DEFAULT_EVENT_NAME)
    }
}

/// Stateful decoder fed with raw body chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    started: bool,
    /// The previous chunk ended in `\r`; a leading `\n` belongs to it.
    skip_lf: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the response body and return every frame it
    /// completes, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        if !self.started {
            if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf) {
                return Vec::new();
            }
            if self.buf.starts_with(BOM) {
                self.buf.advance(BOM.len());
            }
            self.started = true;
        }

        let mut frames = Vec::new();
        loop {
            if self.skip_lf {
                match self.buf.first() {
                    None => break,
                    Some(b'\n') => self.buf.advance(1),
                    Some(_) => {}
                }
                self.skip_lf = false;
            }

            let Some(pos) = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            let line = self.buf.split_to(pos);
            if self.buf.first() == Some(&b'\r') {
                self.skip_lf = true;
            }
            self.buf.advance(1);

            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Id of the last event seen, to be sent back as `Last-Event-ID`.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay advertised via the `retry:` field.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => {
                self.last_event_id = (!value.is_empty()).then(|| value.to_owned());
            }
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take().filter(|e| !e.is_empty());
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
            retry: self.retry,
        })
    }
}
