//! Hidden admin affordance.
//!
//! Tapping the cart icon [`ADMIN_TAP_COUNT`] times within a rolling
//! [`ADMIN_TAP_WINDOW`] opens a passcode dialog. A correct passcode lets
//! staff force the display off its session.

use std::collections::VecDeque;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::AdminConfig;

pub const ADMIN_TAP_COUNT: usize = 7;
pub const ADMIN_TAP_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("admin dialog is not open")]
    DialogClosed,
    #[error("incorrect passcode")]
    IncorrectPasscode,
}

/// Tap counter and passcode check behind the admin dialog.
#[derive(Debug)]
pub struct AdminGate {
    config: AdminConfig,
    taps: VecDeque<Instant>,
    dialog_open: bool,
}

impl AdminGate {
    pub fn new(config: AdminConfig) -> Self {
        Self {
            config,
            taps: VecDeque::with_capacity(ADMIN_TAP_COUNT),
            dialog_open: false,
        }
    }

    /// Record a tap on the cart icon.
    ///
    /// Returns `true` when this tap opened the dialog. Taps are ignored
    /// while the dialog is open.
    pub fn register_tap(&mut self, now: Instant) -> bool {
        if self.dialog_open {
            return false;
        }

        self.taps.push_back(now);
        while let Some(first) = self.taps.front() {
            if now.saturating_duration_since(*first) > ADMIN_TAP_WINDOW {
                self.taps.pop_front();
            } else {
                break;
            }
        }

        if self.taps.len() >= ADMIN_TAP_COUNT {
            self.taps.clear();
            self.dialog_open = true;
            info!("Admin dialog opened");
            return true;
        }
        false
    }

    /// Check a passcode entered in the dialog.
    ///
    /// The dialog closes on success and stays open on a wrong passcode.
    pub fn verify(&mut self, passcode: &str) -> Result<(), AdminError> {
        if !self.dialog_open {
            return Err(AdminError::DialogClosed);
        }
        if !self.config.verify_passcode(passcode) {
            warn!("Rejected admin passcode");
            return Err(AdminError::IncorrectPasscode);
        }
        self.dialog_open = false;
        info!("Admin passcode accepted");
        Ok(())
    }

    pub fn close_dialog(&mut self) {
        self.dialog_open = false;
        self.taps.clear();
    }

    pub fn is_dialog_open(&self) -> bool {
        self.dialog_open
    }

    /// Replace the admin config, e.g. after a config reload.
    pub fn set_config(&mut self, config: AdminConfig) {
        self.config = config;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::admin_config;
    use super::*;

    fn tap_every(gate: &mut AdminGate, start: Instant, interval: Duration, taps: u32) -> bool {
        (0..taps).any(|i| gate.register_tap(start + interval * i))
    }

    #[test]
    fn test_seven_quick_taps_open_dialog() {
        let mut gate = AdminGate::new(admin_config("123456"));
        let start = Instant::now();

        assert!(!tap_every(&mut gate, start, Duration::from_millis(200), 6));
        assert!(!gate.is_dialog_open());
        assert!(gate.register_tap(start + Duration::from_millis(1200)));
        assert!(gate.is_dialog_open());

        // Further taps are ignored while the dialog is up.
        assert!(!gate.register_tap(start + Duration::from_millis(1300)));
    }

    #[test]
    fn test_slow_taps_never_open_dialog() {
        let mut gate = AdminGate::new(admin_config("123456"));
        assert!(!tap_every(
            &mut gate,
            Instant::now(),
            Duration::from_millis(400),
            20
        ));
        assert!(!gate.is_dialog_open());
    }

    #[test]
    fn test_passcode_check() {
        let mut gate = AdminGate::new(admin_config("123456"));
        assert_eq!(gate.verify("123456"), Err(AdminError::DialogClosed));

        tap_every(&mut gate, Instant::now(), Duration::from_millis(100), 7);
        assert_eq!(gate.verify("000000"), Err(AdminError::IncorrectPasscode));
        assert!(gate.is_dialog_open());

        assert_eq!(gate.verify("123456"), Ok(()));
        assert!(!gate.is_dialog_open());
    }

    #[test]
    fn test_close_dialog_resets_taps() {
        let mut gate = AdminGate::new(admin_config("123456"));
        let start = Instant::now();
        tap_every(&mut gate, start, Duration::from_millis(100), 7);
        gate.close_dialog();
        assert!(!gate.is_dialog_open());
        assert!(!gate.register_tap(start + Duration::from_millis(800)));
    }
}
