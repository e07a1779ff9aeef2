//! Signal type definitions.

use gfd_sdk::sse::SseFrame;

use crate::connection::{ReadyState, TransportError};

/// Something a connection reader task observed on the wire.
#[derive(Debug)]
pub enum TransportSignal {
    /// The stream was (re)opened.
    Opened { generation: u64 },
    /// A complete SSE frame arrived.
    Frame { generation: u64, frame: SseFrame },
    /// The transport failed.
    ///
    /// `ready_state` is `Connecting` when the transport is about to
    /// reestablish the stream on its own, and `Closed` when it gave up.
    Failed {
        generation: u64,
        ready_state: ReadyState,
        error: TransportError,
    },
}

impl TransportSignal {
    /// Generation of the connection that produced this signal.
    pub fn generation(&self) -> u64 {
        match self {
            TransportSignal::Opened { generation }
            | TransportSignal::Frame { generation, .. }
            | TransportSignal::Failed { generation, .. } => *generation,
        }
    }
}
