use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use super::ClientError;
use crate::sse::{SseDecoder, SseFrame};

type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// An open event stream, yielding decoded [`SseFrame`]s.
pub struct EventStream {
    body: BodyStream,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("decoder", &self.decoder)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl EventStream {
    pub(super) fn new(resp: reqwest::Response) -> Self {
        Self {
            body: Box::pin(resp.bytes_stream()),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// Wait for the next frame.
    ///
    /// Returns `None` once the server ends the response body.
    pub async fn next_frame(&mut self) -> Option<Result<SseFrame, ClientError>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            match self.body.next().await? {
                Ok(chunk) => self.pending.extend(self.decoder.feed(&chunk)),
                Err(e) => return Some(Err(ClientError::Http(e))),
            }
        }
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.decoder.last_event_id()
    }

    pub fn retry(&self) -> Option<Duration> {
        self.decoder.retry()
    }
}
