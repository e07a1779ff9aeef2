//! Signals flowing from connection reader tasks to the session owner.
//!
//! Reader tasks never touch view state. They forward everything they
//! observe as [`TransportSignal`]s over a bounded channel, and the single
//! owner of the [`DisplaySession`](crate::session::DisplaySession) applies
//! them strictly in arrival order.
//!
//! # Signal Flow
//!
//! 1. Reader task opens the stream -> `Opened`
//! 2. Every decoded SSE frame -> `Frame`
//! 3. Open failure or stream loss -> `Failed` with the ready state the
//!    transport ended up in
//!
//! Every signal is tagged with the generation of the connection that
//! produced it, so signals from a connection that has since been closed
//! are recognised and dropped.

pub mod channels;
pub mod types;

pub use channels::{
    transport_signal_channel, TransportSignalReceiver, TransportSignalSender,
    DEFAULT_CHANNEL_BUFFER,
};

pub use types::TransportSignal;
