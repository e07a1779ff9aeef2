//! SSE connection manager.
//!
//! The [`ConnectionManager`] owns at most one live connection. It:
//! - Closes any existing connection before opening a new one
//! - Spawns a reader task per connection (see [`reader`])
//! - Normalises the backend's named-event vocabulary into
//!   [`EventSink::on_event`] calls
//! - Applies the failure policy to transport errors
//!
//! All sink callbacks run synchronously on the task that owns the
//! manager, in the order the signals arrived.

mod reader;
pub mod transport;

pub use reader::DEFAULT_RETRY;
pub use transport::{EventTransport, FrameStream, HttpTransport, OpenRequest, TransportError};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use gfd_sdk::objects::{CartEvent, EventType};
use gfd_sdk::sse::{SseFrame, DEFAULT_EVENT_NAME};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::events::{TransportSignal, TransportSignalSender};

/// Liveness payload the backend sends on its heartbeat channel.
pub const HEARTBEAT_PAYLOAD: &str = "ping";

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// No connection.
    Idle,
    /// Opening, or reestablishing after a network failure.
    Connecting,
    Open,
    /// The transport gave up.
    Closed,
}

impl ReadyState {
    fn to_u8(self) -> u8 {
        match self {
            ReadyState::Idle => 0,
            ReadyState::Connecting => 1,
            ReadyState::Open => 2,
            ReadyState::Closed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ReadyState::Connecting,
            2 => ReadyState::Open,
            3 => ReadyState::Closed,
            _ => ReadyState::Idle,
        }
    }
}

/// Ready state shared between the manager and a reader task.
#[derive(Debug)]
pub(crate) struct SharedReadyState(AtomicU8);

impl SharedReadyState {
    fn new(state: ReadyState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ReadyState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// Connection failures reported to the [`EventSink`].
///
/// The display strings are what the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The front-liner ended the session (`GFD_DISCONNECTED`).
    #[error("Disconnected by Front-liner")]
    EvictedByFrontLiner,
    /// The backend refused or closed the stream.
    #[error("Connection closed by server")]
    ClosedByServer,
    #[error("Connection error: {0}")]
    Failed(String),
}

impl ConnectionError {
    /// Graceful disconnects return the display to its pre-session screen
    /// without showing an error.
    pub fn is_graceful(&self) -> bool {
        matches!(
            self,
            ConnectionError::EvictedByFrontLiner | ConnectionError::ClosedByServer
        )
    }
}

/// Receiver of normalised connection callbacks.
pub trait EventSink {
    /// The stream was opened (or reestablished).
    fn on_open(&mut self);
    /// A cart event arrived.
    fn on_event(&mut self, event: CartEvent);
    /// The connection failed and has been closed locally.
    fn on_error(&mut self, error: ConnectionError);
    /// The stream dropped on a network error and the reader is waiting to
    /// reestablish it. The connection stays in place.
    fn on_reconnecting(&mut self) {}
}

struct ActiveConnection {
    generation: u64,
    ready: Arc<SharedReadyState>,
    task: JoinHandle<()>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owns zero or one live event stream.
pub struct ConnectionManager {
    transport: Arc<dyn EventTransport>,
    signal_tx: TransportSignalSender,
    last_generation: u64,
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    /// Create a manager whose reader tasks report to `signal_tx`.
    pub fn new(transport: Arc<dyn EventTransport>, signal_tx: TransportSignalSender) -> Self {
        Self {
            transport,
            signal_tx,
            last_generation: 0,
            active: None,
        }
    }

    /// Close any existing connection, then open a new one.
    ///
    /// Returns the generation tag of the new connection. Must be called
    /// from within a Tokio runtime.
    pub fn connect(&mut self, request: OpenRequest) -> u64 {
        self.disconnect();

        self.last_generation += 1;
        let generation = self.last_generation;
        info!(
            generation,
            base_url = %request.base_url,
            with_otp = request.otp.is_some(),
            "Connecting to event stream"
        );

        let ready = Arc::new(SharedReadyState::new(ReadyState::Connecting));
        let task = tokio::spawn(reader::drive_connection(
            Arc::clone(&self.transport),
            request,
            generation,
            Arc::clone(&ready),
            self.signal_tx.clone(),
        ));
        self.active = Some(ActiveConnection {
            generation,
            ready,
            task,
        });
        generation
    }

    /// Close the local connection.
    ///
    /// Idempotent: returns `false` when there was nothing to close.
    pub fn disconnect(&mut self) -> bool {
        match self.active.take() {
            Some(conn) => {
                info!(generation = conn.generation, "Closing event stream");
                true
            }
            None => false,
        }
    }

    /// Ask the backend to end the device session, then close the local
    /// connection whatever the outcome of the request.
    pub async fn disconnect_from_server(
        &mut self,
        base_url: &Url,
        device_id: &str,
    ) -> Result<(), TransportError> {
        let result = self.transport.disconnect(base_url, device_id).await;
        match &result {
            Ok(()) => info!("Disconnected from server"),
            Err(e) => error!(error = %e, "Failed to disconnect from server"),
        }
        self.disconnect();
        result
    }

    pub fn ready_state(&self) -> ReadyState {
        self.active
            .as_ref()
            .map_or(ReadyState::Idle, |conn| conn.ready.get())
    }

    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Generation of the live connection, if any.
    pub fn generation(&self) -> Option<u64> {
        self.active.as_ref().map(|conn| conn.generation)
    }

    /// Apply one signal from a reader task, invoking `sink` as needed.
    ///
    /// Signals from connections that have since been closed are dropped.
    pub fn handle_signal(&mut self, signal: TransportSignal, sink: &mut impl EventSink) {
        if self.generation() != Some(signal.generation()) {
            trace!(
                generation = signal.generation(),
                "Dropping signal from a closed connection"
            );
            return;
        }

        match signal {
            TransportSignal::Opened { .. } => {
                info!("Event stream opened");
                sink.on_open();
            }
            TransportSignal::Frame { frame, .. } => self.dispatch_frame(frame, sink),
            TransportSignal::Failed {
                ready_state, error, ..
            } => self.handle_failure(ready_state, error, sink),
        }
    }

    fn handle_failure(
        &mut self,
        ready_state: ReadyState,
        error: TransportError,
        sink: &mut impl EventSink,
    ) {
        match ready_state {
            ReadyState::Closed => {
                warn!(error = %error, "Event stream closed by server");
                self.disconnect();
                sink.on_error(ConnectionError::ClosedByServer);
            }
            ReadyState::Connecting => {
                debug!(error = %error, "Event stream reconnecting");
                sink.on_reconnecting();
            }
            _ => {
                error!(error = %error, "Event stream failed");
                self.disconnect();
                sink.on_error(ConnectionError::Failed(error.to_string()));
            }
        }
    }

    fn dispatch_frame(&mut self, frame: SseFrame, sink: &mut impl EventSink) {
        if frame.data == HEARTBEAT_PAYLOAD {
            trace!("Received heartbeat");
            return;
        }

        let channel = frame.event_name();
        if channel != DEFAULT_EVENT_NAME {
            match channel.parse::<EventType>() {
                Ok(EventType::Heartbeat) => {
                    trace!("Received heartbeat");
                    return;
                }
                Ok(EventType::GfdDisconnected) => {
                    self.evict(sink);
                    return;
                }
                Ok(_) => {}
                Err(_) => {
                    debug!(channel, "Ignoring unregistered event");
                    return;
                }
            }
        }

        match CartEvent::decode(&frame.data) {
            Ok(event) => match event.event_type() {
                EventType::Heartbeat => trace!("Received heartbeat"),
                EventType::GfdDisconnected => self.evict(sink),
                event_type => {
                    debug!(
                        channel,
                        %event_type,
                        event_id = %event.event_id,
                        "Received event"
                    );
                    sink.on_event(event);
                }
            },
            Err(e) => warn!(channel, error = %e, "Dropping malformed event payload"),
        }
    }

    fn evict(&mut self, sink: &mut impl EventSink) {
        info!("Session ended by front-liner");
        self.disconnect();
        sink.on_error(ConnectionError::EvictedByFrontLiner);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    #![allow(clippy::unwrap_used)]

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::stream::{self, StreamExt};
    use gfd_sdk::objects::CartEvent;
    use gfd_sdk::sse::SseFrame;
    use url::Url;

    use super::{ConnectionError, EventSink, EventTransport, FrameStream, OpenRequest, TransportError};

    /// What the next `open` call does.
    pub(crate) enum Step {
        Fail(TransportError),
        /// Deliver the frames, then keep the stream open.
        Open(Vec<SseFrame>),
        /// Deliver the frames, then end the body.
        OpenThenEnd(Vec<SseFrame>),
    }

    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub(crate) steps: Mutex<VecDeque<Step>>,
        pub(crate) opened: Mutex<Vec<OpenRequest>>,
        pub(crate) disconnects: Mutex<Vec<String>>,
        pub(crate) disconnect_error: Mutex<Option<TransportError>>,
    }

    impl ScriptedTransport {
        pub(crate) fn with_steps(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                ..Self::default()
            }
        }

        pub(crate) fn opened(&self) -> Vec<OpenRequest> {
            self.opened.lock().unwrap().clone()
        }

        pub(crate) fn disconnects(&self) -> Vec<String> {
            self.disconnects.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventTransport for ScriptedTransport {
        async fn open(&self, request: &OpenRequest) -> Result<FrameStream, TransportError> {
            self.opened.lock().unwrap().push(request.clone());
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Fail(e)) => Err(e),
                Some(Step::Open(frames)) => Ok(stream::iter(frames.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed()),
                Some(Step::OpenThenEnd(frames)) => {
                    Ok(stream::iter(frames.into_iter().map(Ok)).boxed())
                }
                None => Ok(stream::pending().boxed()),
            }
        }

        async fn disconnect(&self, _base_url: &Url, device_id: &str) -> Result<(), TransportError> {
            self.disconnects.lock().unwrap().push(device_id.to_owned());
            match self.disconnect_error.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) opened: usize,
        pub(crate) events: Vec<CartEvent>,
        pub(crate) errors: Vec<ConnectionError>,
        pub(crate) reconnecting: usize,
    }

    impl EventSink for RecordingSink {
        fn on_open(&mut self) {
            self.opened += 1;
        }

        fn on_event(&mut self, event: CartEvent) {
            self.events.push(event);
        }

        fn on_error(&mut self, error: ConnectionError) {
            self.errors.push(error);
        }

        fn on_reconnecting(&mut self) {
            self.reconnecting += 1;
        }
    }

    pub(crate) fn frame(event: Option<&str>, data: &str) -> SseFrame {
        SseFrame {
            event: event.map(str::to_owned),
            data: data.to_owned(),
            id: None,
            retry: None,
        }
    }

    pub(crate) fn event_json(event_type: &str) -> String {
        serde_json::json!({
            "eventId": format!("evt-{event_type}"),
            "eventType": event_type,
            "userId": "pos-01",
            "timestamp": 1_718_000_000_000_i64,
            "cartItems": null,
            "totalAmount": null,
            "totalItems": null,
            "message": event_type,
        })
        .to_string()
    }

    pub(crate) fn base_url() -> Url {
        Url::parse("http://localhost:8081").unwrap()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use gfd_sdk::objects::EventType;

    use super::test_support::{base_url, event_json, frame, RecordingSink, ScriptedTransport, Step};
    use super::*;
    use crate::events::{transport_signal_channel, TransportSignalReceiver};

    fn request(otp: Option<&str>) -> OpenRequest {
        OpenRequest {
            base_url: base_url(),
            device_id: "gfd-1-test".to_owned(),
            otp: otp.map(str::to_owned),
            last_event_id: None,
        }
    }

    fn manager(transport: &Arc<ScriptedTransport>) -> (ConnectionManager, TransportSignalReceiver) {
        let (tx, rx) = transport_signal_channel();
        let transport: Arc<dyn EventTransport> = transport.clone();
        (ConnectionManager::new(transport, tx), rx)
    }

    async fn pump(
        manager: &mut ConnectionManager,
        rx: &mut TransportSignalReceiver,
        sink: &mut RecordingSink,
        signals: usize,
    ) {
        for _ in 0..signals {
            let signal = rx.recv().await.unwrap();
            manager.handle_signal(signal, sink);
        }
    }

    #[tokio::test]
    async fn test_frames_are_normalised() {
        let transport = Arc::new(ScriptedTransport::with_steps(vec![Step::Open(vec![
            frame(Some("CONNECTION_ESTABLISHED"), &event_json("CONNECTION_ESTABLISHED")),
            frame(Some("HEARTBEAT"), "{}"),
            frame(None, "ping"),
            frame(Some("CART_UPDATED"), "{not json"),
            frame(Some("heartbeat"), "beat"),
            frame(None, &event_json("CART_UPDATED")),
            frame(Some("CART_ITEM_ADDED"), &event_json("CART_ITEM_ADDED")),
        ])]));
        let (mut manager, mut rx) = manager(&transport);
        let mut sink = RecordingSink::default();

        manager.connect(request(Some("123456")));
        pump(&mut manager, &mut rx, &mut sink, 8).await;

        assert_eq!(sink.opened, 1);
        assert!(sink.errors.is_empty());
        let types: Vec<EventType> = sink.events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                EventType::ConnectionEstablished,
                EventType::CartUpdated,
                EventType::CartItemAdded
            ]
        );
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_front_liner_eviction_closes_locally() {
        let transport = Arc::new(ScriptedTransport::with_steps(vec![Step::Open(vec![
            frame(Some("GFD_DISCONNECTED"), "Session ended by cashier"),
        ])]));
        let (mut manager, mut rx) = manager(&transport);
        let mut sink = RecordingSink::default();

        manager.connect(request(None));
        pump(&mut manager, &mut rx, &mut sink, 2).await;

        assert_eq!(sink.errors, vec![ConnectionError::EvictedByFrontLiner]);
        assert!(sink.errors[0].is_graceful());
        assert_eq!(manager.ready_state(), ReadyState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_connection_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::with_steps(vec![Step::Fail(
            TransportError::Rejected("api error: status 400 Bad Request, body: Invalid OTP".into()),
        )]));
        let (mut manager, mut rx) = manager(&transport);
        let mut sink = RecordingSink::default();

        manager.connect(request(Some("000000")));
        pump(&mut manager, &mut rx, &mut sink, 1).await;

        assert_eq!(sink.errors, vec![ConnectionError::ClosedByServer]);
        assert_eq!(sink.errors[0].to_string(), "Connection closed by server");
        assert_eq!(manager.ready_state(), ReadyState::Idle);

        assert!(!manager.disconnect());
        assert!(!manager.disconnect());
        assert_eq!(manager.ready_state(), ReadyState::Idle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.opened().len(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(sink.opened, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failures_reestablish_like_event_source() {
        let mut resumable = frame(Some("CART_UPDATED"), &event_json("CART_UPDATED"));
        resumable.id = Some("e-9".into());
        let transport = Arc::new(ScriptedTransport::with_steps(vec![
            Step::Fail(TransportError::Network("connection refused".into())),
            Step::OpenThenEnd(vec![resumable]),
            Step::Open(vec![]),
        ]));
        let (mut manager, mut rx) = manager(&transport);
        let mut sink = RecordingSink::default();

        manager.connect(request(Some("123456")));
        // Failed(Connecting), Opened, Frame, Failed(Connecting), Opened
        pump(&mut manager, &mut rx, &mut sink, 5).await;

        assert_eq!(sink.opened, 2);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.reconnecting, 2);
        assert!(sink.errors.is_empty());
        assert!(manager.is_connected());

        let opened = transport.opened();
        assert_eq!(opened.len(), 3);
        assert_eq!(opened[0].otp.as_deref(), Some("123456"));
        assert_eq!(opened[1].otp.as_deref(), Some("123456"));
        assert_eq!(opened[2].otp, None);
        assert_eq!(opened[2].last_event_id.as_deref(), Some("e-9"));
    }

    #[tokio::test]
    async fn test_signals_from_closed_connection_are_dropped() {
        let transport = Arc::new(ScriptedTransport::default());
        let (mut manager, _rx) = manager(&transport);
        let mut sink = RecordingSink::default();

        let first = manager.connect(request(None));
        let second = manager.connect(request(None));
        assert_ne!(first, second);

        manager.handle_signal(TransportSignal::Opened { generation: first }, &mut sink);
        manager.handle_signal(
            TransportSignal::Failed {
                generation: first,
                ready_state: ReadyState::Closed,
                error: TransportError::Ended,
            },
            &mut sink,
        );
        assert_eq!(sink.opened, 0);
        assert!(sink.errors.is_empty());
        assert_eq!(manager.generation(), Some(second));

        manager.handle_signal(TransportSignal::Opened { generation: second }, &mut sink);
        assert_eq!(sink.opened, 1);
    }

    #[tokio::test]
    async fn test_unexpected_failure_reports_generic_error() {
        let transport = Arc::new(ScriptedTransport::default());
        let (mut manager, _rx) = manager(&transport);
        let mut sink = RecordingSink::default();

        let generation = manager.connect(request(None));
        manager.handle_signal(
            TransportSignal::Failed {
                generation,
                ready_state: ReadyState::Open,
                error: TransportError::Network("reset by peer".into()),
            },
            &mut sink,
        );

        assert_eq!(sink.errors.len(), 1);
        assert!(!sink.errors[0].is_graceful());
        assert_eq!(manager.ready_state(), ReadyState::Idle);
    }

    #[tokio::test]
    async fn test_server_disconnect_always_cleans_up_locally() {
        let transport = Arc::new(ScriptedTransport::default());
        *transport.disconnect_error.lock().unwrap() =
            Some(TransportError::Rejected("status 500".into()));
        let (mut manager, _rx) = manager(&transport);

        manager.connect(request(None));
        let result = manager
            .disconnect_from_server(&base_url(), "gfd-1-test")
            .await;

        assert!(result.is_err());
        assert_eq!(manager.ready_state(), ReadyState::Idle);
        assert_eq!(transport.disconnects(), vec!["gfd-1-test".to_owned()]);
    }
}
