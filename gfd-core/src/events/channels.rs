//! Signal channel factory and handles.

use super::types::TransportSignal;
use tokio::sync::mpsc;

/// Default buffer size for the signal channel.
///
/// Reader tasks wait on a full buffer, so a slow owner applies
/// backpressure to the stream instead of growing memory.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for TransportSignal events.
pub type TransportSignalSender = mpsc::Sender<TransportSignal>;
/// Receiver handle for TransportSignal events.
pub type TransportSignalReceiver = mpsc::Receiver<TransportSignal>;

/// Create a new TransportSignal channel.
///
/// Returns a (sender, receiver) pair. Each connection's reader task gets a
/// clone of the sender.
pub fn transport_signal_channel() -> (TransportSignalSender, TransportSignalReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
