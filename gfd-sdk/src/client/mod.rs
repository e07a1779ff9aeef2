//! HTTP client for the GFD SSE endpoints.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod display;
mod stream;

pub use display::{
    DisplayClient, CONNECT_PATH, DEVICE_COOKIE, DISCONNECT_PATH, DISCONNECT_TIMEOUT,
    LAST_EVENT_ID_HEADER,
};
pub use stream::EventStream;

use reqwest::StatusCode;

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// The connect endpoint answered with something other than an event
    /// stream.
    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
