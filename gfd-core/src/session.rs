//! Display session controller.
//!
//! The [`DisplaySession`] is the single owner of the view state. It holds
//! the [`CartStore`], the [`ConnectionManager`] and the admin gate, turns
//! UI actions into transport operations, and applies transport signals
//! in arrival order.
//!
//! [`DisplaySession::run`] drives everything from one task:
//! - UI actions arrive as [`SessionCommand`]s
//! - Transport signals arrive from the connection reader tasks
//! - The checkout result timer fires on its deadline
//!
//! After each step the current [`DisplaySnapshot`] is published on a
//! `watch` channel for the renderer.

use std::future;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::admin::{AdminError, AdminGate};
use crate::config::{AdminConfig, SessionConfig};
use crate::connection::{ConnectionManager, EventTransport, OpenRequest, ReadyState};
use crate::events::{transport_signal_channel, TransportSignal, TransportSignalReceiver};
use crate::identity::{self, IdentityError, IdentityStore};
use crate::store::{CartStore, DisplaySnapshot};

/// Errors returned by session actions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a connection attempt is already in progress")]
    AttemptInProgress,

    #[error("an OTP is required to pair this display")]
    MissingOtp,

    #[error("device identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("admin error: {0}")]
    Admin(#[from] AdminError),
}

/// UI actions accepted by [`DisplaySession::run`].
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Pair with the backend using a one-time passcode.
    Connect { otp: String },
    /// Reopen the stream of an already paired device.
    Reconnect,
    /// End the session on the backend and locally.
    Disconnect,
    ClearError,
    SetApiBaseUrl(Url),
    TapCartIcon,
    SubmitAdminPasscode(String),
    CloseAdminDialog,
    /// Replace the admin passcode after a config reload.
    SetAdminConfig(AdminConfig),
}

pub struct DisplaySession {
    store: CartStore,
    manager: ConnectionManager,
    signal_rx: TransportSignalReceiver,
    identity_store: Box<dyn IdentityStore>,
    base_url: Url,
    admin: AdminGate,
}

impl DisplaySession {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn EventTransport>,
        identity_store: Box<dyn IdentityStore>,
    ) -> Self {
        let (signal_tx, signal_rx) = transport_signal_channel();
        Self {
            store: CartStore::new(),
            manager: ConnectionManager::new(transport, signal_tx),
            signal_rx,
            identity_store,
            base_url: config.base_url,
            admin: AdminGate::new(config.admin),
        }
    }

    /// Pair the display with the backend using `otp` and open the stream.
    ///
    /// Any existing connection is closed first.
    pub fn connect(&mut self, otp: &str) -> Result<(), SessionError> {
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(SessionError::MissingOtp);
        }
        self.open(Some(otp.to_owned()))
    }

    /// Reopen the stream with the stored device id and no OTP.
    pub fn reconnect(&mut self) -> Result<(), SessionError> {
        self.open(None)
    }

    fn open(&mut self, otp: Option<String>) -> Result<(), SessionError> {
        if !self.store.begin_connection_attempt() {
            return Err(SessionError::AttemptInProgress);
        }

        let identity =
            match identity::load_or_create(self.identity_store.as_ref(), OffsetDateTime::now_utc())
            {
                Ok(identity) => identity,
                Err(e) => {
                    self.store.end_connection_attempt();
                    return Err(e.into());
                }
            };

        self.manager.connect(OpenRequest {
            base_url: self.base_url.clone(),
            device_id: identity.device_id,
            otp,
            last_event_id: None,
        });
        Ok(())
    }

    /// End the session.
    ///
    /// A paired device asks the backend to drop the session first; the
    /// local connection is closed and the view state reset regardless.
    pub async fn disconnect(&mut self) {
        match self.identity_store.load() {
            Ok(Some(identity)) => {
                if let Err(e) = self
                    .manager
                    .disconnect_from_server(&self.base_url, &identity.device_id)
                    .await
                {
                    debug!(error = %e, "Closed locally after failed server disconnect");
                }
            }
            Ok(None) => {
                self.manager.disconnect();
            }
            Err(e) => {
                warn!(error = %e, "Could not read device identity, closing locally");
                self.manager.disconnect();
            }
        }
        self.store.reset();
        self.admin.close_dialog();
        info!("Display session reset");
    }

    pub fn clear_error(&mut self) {
        self.store.clear_error();
    }

    /// Change the backend address used by the next connection attempt.
    pub fn set_api_base_url(&mut self, base_url: Url) {
        info!(base_url = %base_url, "API base URL updated");
        self.base_url = base_url;
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Register a tap on the cart icon. Returns `true` if it opened the
    /// admin dialog.
    pub fn tap_cart_icon(&mut self, now: Instant) -> bool {
        self.admin.register_tap(now)
    }

    /// Check the admin passcode and, if it matches, force a disconnect.
    pub async fn submit_admin_passcode(&mut self, passcode: &str) -> Result<(), SessionError> {
        self.admin.verify(passcode)?;
        info!("Admin forced disconnect");
        self.disconnect().await;
        Ok(())
    }

    pub fn close_admin_dialog(&mut self) {
        self.admin.close_dialog();
    }

    pub fn set_admin_config(&mut self, config: AdminConfig) {
        self.admin.set_config(config);
    }

    /// Apply one transport signal to the view state.
    pub fn handle_signal(&mut self, signal: TransportSignal) {
        self.manager.handle_signal(signal, &mut self.store);
    }

    pub fn store(&self) -> &CartStore {
        &self.store
    }

    pub fn ready_state(&self) -> ReadyState {
        self.manager.ready_state()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            admin_dialog_open: self.admin.is_dialog_open(),
            ..self.store.snapshot()
        }
    }

    /// Run the session until shutdown is signalled or the command
    /// channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut shutdown_rx: watch::Receiver<bool>,
        snapshots: watch::Sender<DisplaySnapshot>,
    ) {
        info!("Display session started");
        snapshots.send_replace(self.snapshot());

        loop {
            let checkout_deadline = self.store.checkout_deadline();

            tokio::select! {
                biased;

                // Check for shutdown
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Display session received shutdown signal");
                        break;
                    }
                }

                Some(signal) = self.signal_rx.recv() => {
                    self.handle_signal(signal);
                }

                _ = sleep_until(checkout_deadline) => {
                    self.store.expire_checkout(Instant::now());
                }

                command = commands.recv() => {
                    let Some(command) = command else {
                        info!("Command channel closed");
                        break;
                    };
                    self.execute(command).await;
                }
            }

            let snapshot = self.snapshot();
            snapshots.send_if_modified(|current| {
                if *current == snapshot {
                    return false;
                }
                *current = snapshot;
                true
            });
        }

        // The pairing is kept so the next start can resume with reconnect().
        self.manager.disconnect();
        info!("Display session shutdown complete");
    }

    async fn execute(&mut self, command: SessionCommand) {
        debug!(?command, "Executing session command");
        let result = match command {
            SessionCommand::Connect { otp } => self.connect(&otp),
            SessionCommand::Reconnect => self.reconnect(),
            SessionCommand::Disconnect => {
                self.disconnect().await;
                Ok(())
            }
            SessionCommand::ClearError => {
                self.clear_error();
                Ok(())
            }
            SessionCommand::SetApiBaseUrl(url) => {
                self.set_api_base_url(url);
                Ok(())
            }
            SessionCommand::TapCartIcon => {
                self.tap_cart_icon(Instant::now());
                Ok(())
            }
            SessionCommand::SubmitAdminPasscode(passcode) => {
                self.submit_admin_passcode(&passcode).await
            }
            SessionCommand::CloseAdminDialog => {
                self.close_admin_dialog();
                Ok(())
            }
            SessionCommand::SetAdminConfig(config) => {
                self.set_admin_config(config);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(error = %e, "Session command failed");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
