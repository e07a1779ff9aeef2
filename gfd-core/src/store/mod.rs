//! Cart state reducer.
//!
//! [`CartStore`] folds the cart events of one session into the state the
//! display renders: cart lines, totals, the active voucher and discount,
//! and the checkout overlay. It also tracks the connection state reported
//! by the [`ConnectionManager`](crate::connection::ConnectionManager)
//! through its [`EventSink`] implementation.

mod reconcile;

pub use reconcile::UNKNOWN_ITEM_NAME;

use std::time::Duration;

use gfd_sdk::objects::{
    CartEvent, CartItem, CheckoutData, Discount, EventDetail, EventType, ItemHint, Voucher,
};
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionError, EventSink};

/// How long the checkout result stays on screen before it is cleared.
pub const CHECKOUT_RESULT_DISPLAY: Duration = Duration::from_secs(3);

/// Connection state as seen by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub is_connected: bool,
    /// Deprecated by the backend; filled from `CONNECTION_ESTABLISHED`.
    pub user_id: Option<String>,
    pub error: Option<String>,
}

/// Everything the display renders, captured at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplaySnapshot {
    pub is_connected: bool,
    pub connection_attempt_in_progress: bool,
    pub user_id: Option<String>,
    pub connection_error: Option<String>,
    pub cart_items: Vec<CartItem>,
    pub total_amount: Decimal,
    pub total_items: u32,
    pub subtotal: Decimal,
    pub total_savings: Decimal,
    pub voucher: Option<Voucher>,
    pub discount: Option<Discount>,
    pub original_amount: Option<Decimal>,
    pub last_event_type: Option<EventType>,
    pub last_message: String,
    pub is_checkout_mode: bool,
    pub checkout_data: Option<CheckoutData>,
    pub admin_dialog_open: bool,
}

/// View state of one display session.
#[derive(Debug, Default)]
pub struct CartStore {
    connection: ConnectionState,
    connection_attempt_in_progress: bool,
    cart_items: Vec<CartItem>,
    total_amount: Decimal,
    total_items: u32,
    last_message: String,
    last_event_type: Option<EventType>,
    voucher: Option<Voucher>,
    discount: Option<Discount>,
    original_amount: Option<Decimal>,
    /// `metadata.subtotal` of the latest event that carried one.
    authoritative_subtotal: Option<Decimal>,
    is_checkout_mode: bool,
    checkout_data: Option<CheckoutData>,
    checkout_reset_at: Option<Instant>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one cart event.
    pub fn apply_event(&mut self, event: CartEvent, now: Instant) {
        let event_type = event.event_type();
        debug!(%event_type, event_id = %event.event_id, "Applying cart event");

        self.last_event_type = Some(event_type);
        self.last_message = event.message.clone().unwrap_or_default();

        if let Some(subtotal) = event.subtotal {
            self.authoritative_subtotal = Some(subtotal);
        }

        match event.cart_items {
            Some(items) => self.cart_items = items,
            None => {
                if let EventDetail::CartItemAdded(hint) | EventDetail::CartUpdated(hint) =
                    &event.detail
                {
                    self.reconcile_item(hint, event.total_amount, event.total_items);
                }
            }
        }

        if let Some(amount) = event.total_amount
            && accepts_total(amount.is_zero(), event_type)
        {
            self.total_amount = amount;
        }
        if let Some(items) = event.total_items
            && accepts_total(items == 0, event_type)
        {
            self.total_items = items;
        }

        match event.detail {
            EventDetail::ConnectionEstablished => {
                if event.user_id.is_some() {
                    self.connection.user_id = event.user_id;
                }
            }
            EventDetail::VoucherApplied {
                voucher,
                original_amount,
            } => {
                match voucher {
                    Some(voucher) => self.voucher = Some(voucher),
                    None => warn!("VOUCHER_APPLIED without a voucher"),
                }
                if original_amount.is_some() {
                    self.original_amount = original_amount;
                }
            }
            EventDetail::VoucherUnapplied => {
                self.voucher = None;
                self.clear_original_amount_if_unused();
            }
            EventDetail::DiscountApplied {
                discount,
                original_amount,
            } => {
                match discount {
                    Some(discount) => self.discount = Some(discount),
                    None => warn!("DISCOUNT_APPLIED without a discount"),
                }
                if original_amount.is_some() {
                    self.original_amount = original_amount;
                }
            }
            EventDetail::DiscountRemoved => {
                self.discount = None;
                self.clear_original_amount_if_unused();
            }
            EventDetail::CheckoutInitiated(data) => {
                self.is_checkout_mode = true;
                self.checkout_data = Some(data);
                self.checkout_reset_at = None;
            }
            EventDetail::CheckoutCancelled => {
                self.is_checkout_mode = false;
                self.checkout_data = None;
                self.checkout_reset_at = None;
            }
            EventDetail::CheckoutCompleted(data) | EventDetail::CheckoutFailed(data) => {
                if !data.is_empty() {
                    self.checkout_data = Some(data);
                }
                if self.checkout_reset_at.is_none() {
                    self.checkout_reset_at = Some(now + CHECKOUT_RESULT_DISPLAY);
                }
            }
            _ => {}
        }
    }

    fn reconcile_item(
        &mut self,
        hint: &ItemHint,
        total_amount: Option<Decimal>,
        total_items: Option<u32>,
    ) {
        match reconcile::placeholder_item(hint, total_amount, total_items) {
            Some(item) => {
                debug!(product_id = item.product_id, "Merging item from metadata");
                reconcile::merge_item(&mut self.cart_items, item);
            }
            None => debug!("Item event without cart snapshot or product id"),
        }
    }

    fn clear_original_amount_if_unused(&mut self) {
        if self.voucher.is_none() && self.discount.is_none() {
            self.original_amount = None;
        }
    }

    /// When the checkout result should be cleared, if one is showing.
    pub fn checkout_deadline(&self) -> Option<Instant> {
        self.checkout_reset_at
    }

    /// Clear the checkout result once its display window has passed.
    ///
    /// Returns `true` if anything was cleared.
    pub fn expire_checkout(&mut self, now: Instant) -> bool {
        match self.checkout_reset_at {
            Some(deadline) if deadline <= now => {
                self.checkout_reset_at = None;
                self.is_checkout_mode = false;
                self.checkout_data = None;
                self.voucher = None;
                self.discount = None;
                self.original_amount = None;
                self.authoritative_subtotal = None;
                debug!("Checkout result cleared");
                true
            }
            _ => false,
        }
    }

    /// Mark a connection attempt as started.
    ///
    /// Returns `false` if one is already in progress.
    pub fn begin_connection_attempt(&mut self) -> bool {
        if self.connection_attempt_in_progress {
            return false;
        }
        self.connection_attempt_in_progress = true;
        self.connection.error = None;
        true
    }

    /// Mark the current connection attempt as finished without an outcome.
    pub fn end_connection_attempt(&mut self) {
        self.connection_attempt_in_progress = false;
    }

    pub fn clear_error(&mut self) {
        self.connection.error = None;
    }

    /// Return to the pre-connection state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn connection_attempt_in_progress(&self) -> bool {
        self.connection_attempt_in_progress
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected
    }

    pub fn user_id(&self) -> Option<&str> {
        self.connection.user_id.as_deref()
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.connection.error.as_deref()
    }

    pub fn cart_items(&self) -> &[CartItem] {
        &self.cart_items
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    pub fn last_event_type(&self) -> Option<EventType> {
        self.last_event_type
    }

    pub fn voucher(&self) -> Option<&Voucher> {
        self.voucher.as_ref()
    }

    pub fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }

    pub fn original_amount(&self) -> Option<Decimal> {
        self.original_amount
    }

    pub fn is_checkout_mode(&self) -> bool {
        self.is_checkout_mode
    }

    pub fn checkout_data(&self) -> Option<&CheckoutData> {
        self.checkout_data.as_ref()
    }

    /// The backend's subtotal if it sent one, else the sum of line subtotals.
    pub fn subtotal(&self) -> Decimal {
        self.authoritative_subtotal
            .unwrap_or_else(|| {
                self.cart_items
                    .iter()
                    .fold(Decimal::ZERO, |sum, item| sum.saturating_add(item.subtotal))
            })
    }

    /// Amount deducted by the active voucher and discount.
    pub fn total_savings(&self) -> Decimal {
        let voucher = self.voucher.as_ref().map_or(Decimal::ZERO, |v| v.discount_amount);
        let discount = self.discount.as_ref().map_or(Decimal::ZERO, |d| d.discount_amount);
        voucher.saturating_add(discount)
    }

    pub fn has_voucher(&self) -> bool {
        self.voucher.is_some()
    }

    pub fn has_discount(&self) -> bool {
        self.discount.is_some()
    }

    pub fn is_cart_empty(&self) -> bool {
        self.cart_items.is_empty()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            is_connected: self.connection.is_connected,
            connection_attempt_in_progress: self.connection_attempt_in_progress,
            user_id: self.connection.user_id.clone(),
            connection_error: self.connection.error.clone(),
            cart_items: self.cart_items.clone(),
            total_amount: self.total_amount,
            total_items: self.total_items,
            subtotal: self.subtotal(),
            total_savings: self.total_savings(),
            voucher: self.voucher.clone(),
            discount: self.discount.clone(),
            original_amount: self.original_amount,
            last_event_type: self.last_event_type,
            last_message: self.last_message.clone(),
            is_checkout_mode: self.is_checkout_mode,
            checkout_data: self.checkout_data.clone(),
            admin_dialog_open: false,
        }
    }
}

/// Zero totals are ignored on events that are known to omit them.
fn accepts_total(is_zero: bool, event_type: EventType) -> bool {
    !is_zero || !event_type.omits_totals()
}

impl EventSink for CartStore {
    fn on_open(&mut self) {
        self.connection.is_connected = true;
        self.connection.error = None;
        self.connection_attempt_in_progress = false;
    }

    fn on_event(&mut self, event: CartEvent) {
        self.apply_event(event, Instant::now());
    }

    fn on_reconnecting(&mut self) {
        self.connection_attempt_in_progress = false;
    }

    fn on_error(&mut self, error: ConnectionError) {
        self.connection_attempt_in_progress = false;
        if error.is_graceful() {
            info!(reason = %error, "Session ended, returning to pairing screen");
            self.reset();
        } else {
            self.connection.is_connected = false;
            self.connection.error = Some(error.to_string());
        }
    }
}
