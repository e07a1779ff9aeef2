//! Wire types and transport helpers for the Guided Flow Display (GFD)
//! event stream.
//!
//! * [`objects`] – the JSON payloads pushed by the backend.
//! * [`sse`] – an incremental `text/event-stream` frame decoder.
//! * `client` – HTTP client for the connect/disconnect endpoints, gated
//!   behind the `client` cargo feature.

pub mod objects;
pub mod sse;

#[cfg(feature = "client")]
pub mod client;
