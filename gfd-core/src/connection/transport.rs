//! Transport seam between the connection manager and the network.
//!
//! [`HttpTransport`] talks to the backend through the SDK's
//! [`DisplayClient`]; tests substitute scripted transports.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use gfd_sdk::client::{ClientError, DisplayClient};
use gfd_sdk::sse::SseFrame;
use thiserror::Error;
use url::Url;

/// Stream of decoded frames for one open connection.
///
/// Ends when the server closes the response body.
pub type FrameStream = BoxStream<'static, Result<SseFrame, TransportError>>;

/// Everything needed to open the device's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub base_url: Url,
    pub device_id: String,
    /// One-time passcode, only for the first pairing of a device.
    pub otp: Option<String>,
    /// Resume point after a transport-level reestablish.
    pub last_event_id: Option<String>,
}

/// Errors reported by an [`EventTransport`].
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The backend answered but refused the stream (bad OTP, unknown
    /// device, wrong content type). Reestablishing would fail the same way.
    #[error("connection rejected: {0}")]
    Rejected(String),

    /// The network failed before or while streaming.
    #[error("network error: {0}")]
    Network(String),

    /// The server ended the response body.
    #[error("stream ended by server")]
    Ended,
}

impl TransportError {
    /// Whether a browser `EventSource` would give up (`CLOSED`) rather
    /// than reestablish (`CONNECTING`) after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Rejected(_))
    }
}

impl From<ClientError> for TransportError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Http(e) => TransportError::Network(e.to_string()),
            other => TransportError::Rejected(other.to_string()),
        }
    }
}

/// Opens event streams and performs the explicit teardown call.
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
    /// Open the event stream described by `request`.
    async fn open(&self, request: &OpenRequest) -> Result<FrameStream, TransportError>;

    /// Ask the backend to end the device session.
    async fn disconnect(&self, base_url: &Url, device_id: &str) -> Result<(), TransportError>;
}

/// [`EventTransport`] backed by the SDK HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: DisplayClient,
}

impl HttpTransport {
    /// The client's connection pool is shared by every request; its base
    /// URL is replaced by the one in each request.
    pub fn new(client: DisplayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn open(&self, request: &OpenRequest) -> Result<FrameStream, TransportError> {
        let events = self
            .client
            .with_base_url(request.base_url.clone())
            .open_stream(
                &request.device_id,
                request.otp.as_deref(),
                request.last_event_id.as_deref(),
            )
            .await?;

        let frames = stream::unfold(events, |mut events| async move {
            let item = events.next_frame().await?;
            Some((item.map_err(TransportError::from), events))
        });
        Ok(frames.boxed())
    }

    async fn disconnect(&self, base_url: &Url, device_id: &str) -> Result<(), TransportError> {
        self.client
            .with_base_url(base_url.clone())
            .disconnect(device_id)
            .await
            .map_err(TransportError::from)
    }
}
