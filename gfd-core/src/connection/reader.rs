//! Per-connection reader task.
//!
//! Mirrors the browser `EventSource` lifecycle: the task opens the stream,
//! forwards frames, and on a network failure reports `Connecting` and
//! reestablishes after the server-advertised delay. A rejected connection
//! is reported as `Closed` and ends the task. Whether to try again after
//! that is the caller's decision.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use super::transport::{EventTransport, OpenRequest, TransportError};
use super::{ReadyState, SharedReadyState};
use crate::events::{TransportSignal, TransportSignalSender};

/// Reestablish delay used until the server sends a `retry:` field.
pub const DEFAULT_RETRY: Duration = Duration::from_secs(3);

pub(crate) async fn drive_connection(
    transport: Arc<dyn EventTransport>,
    mut request: OpenRequest,
    generation: u64,
    ready: Arc<SharedReadyState>,
    signals: TransportSignalSender,
) {
    let mut retry = DEFAULT_RETRY;

    loop {
        ready.set(ReadyState::Connecting);

        let error = match transport.open(&request).await {
            Ok(mut frames) => {
                ready.set(ReadyState::Open);
                // The OTP is spent once the backend has paired the device.
                request.otp = None;
                if signals
                    .send(TransportSignal::Opened { generation })
                    .await
                    .is_err()
                {
                    return;
                }

                loop {
                    match frames.next().await {
                        Some(Ok(frame)) => {
                            if let Some(delay) = frame.retry {
                                retry = delay;
                            }
                            if frame.id.is_some() {
                                request.last_event_id = frame.id.clone();
                            }
                            if signals
                                .send(TransportSignal::Frame { generation, frame })
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        Some(Err(e)) => break e,
                        None => break TransportError::Ended,
                    }
                }
            }
            Err(e) => e,
        };

        if error.is_fatal() {
            ready.set(ReadyState::Closed);
            let _ = signals
                .send(TransportSignal::Failed {
                    generation,
                    ready_state: ReadyState::Closed,
                    error,
                })
                .await;
            return;
        }

        ready.set(ReadyState::Connecting);
        debug!(
            generation,
            error = %error,
            delay_ms = retry.as_millis() as u64,
            "Event stream lost, reestablishing"
        );
        if signals
            .send(TransportSignal::Failed {
                generation,
                ready_state: ReadyState::Connecting,
                error,
            })
            .await
            .is_err()
        {
            return;
        }
        tokio::time::sleep(retry).await;
    }
}
