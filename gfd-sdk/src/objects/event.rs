//! Cart event payloads pushed over the SSE stream.
//!
//! The backend emits one JSON object per SSE frame:
//!
//! ```json
//! {
//!   "eventId": "5d0c…",
//!   "eventType": "CART_ITEM_ADDED",
//!   "userId": "pos-01",
//!   "timestamp": 1718000000000,
//!   "cartItems": null,
//!   "totalAmount": 500,
//!   "totalItems": 1,
//!   "message": "Item added",
//!   "metadata": { "productId": 7, "productName": "Kopi Susu" }
//! }
//! ```
//!
//! `metadata` is a loosely defined bag on the wire. [`CartEvent::decode`]
//! validates it against an optional-field schema and folds it into an
//! [`EventDetail`] variant per event type, so nothing downstream has to
//! inspect untyped JSON.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::cart::CartItem;
use super::promotion::{Discount, Voucher};

/// Every event type the backend can emit, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ConnectionEstablished,
    ProductViewed,
    CartItemAdded,
    CartItemRemoved,
    CartUpdated,
    VoucherApplied,
    VoucherUnapplied,
    DiscountApplied,
    DiscountRemoved,
    CheckoutInitiated,
    CheckoutCancelled,
    CheckoutCompleted,
    CheckoutFailed,
    Heartbeat,
    /// The front-liner ended the session from the POS side.
    GfdDisconnected,
}

impl EventType {
    /// All event types, in the order the backend documents them.
    pub const ALL: [EventType; 15] = [
        EventType::ConnectionEstablished,
        EventType::ProductViewed,
        EventType::CartItemAdded,
        EventType::CartItemRemoved,
        EventType::CartUpdated,
        EventType::VoucherApplied,
        EventType::VoucherUnapplied,
        EventType::DiscountApplied,
        EventType::DiscountRemoved,
        EventType::CheckoutInitiated,
        EventType::CheckoutCancelled,
        EventType::CheckoutCompleted,
        EventType::CheckoutFailed,
        EventType::Heartbeat,
        EventType::GfdDisconnected,
    ];

    /// The SSE event name / JSON `eventType` value.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ConnectionEstablished => "CONNECTION_ESTABLISHED",
            EventType::ProductViewed => "PRODUCT_VIEWED",
            EventType::CartItemAdded => "CART_ITEM_ADDED",
            EventType::CartItemRemoved => "CART_ITEM_REMOVED",
            EventType::CartUpdated => "CART_UPDATED",
            EventType::VoucherApplied => "VOUCHER_APPLIED",
            EventType::VoucherUnapplied => "VOUCHER_UNAPPLIED",
            EventType::DiscountApplied => "DISCOUNT_APPLIED",
            EventType::DiscountRemoved => "DISCOUNT_REMOVED",
            EventType::CheckoutInitiated => "CHECKOUT_INITIATED",
            EventType::CheckoutCancelled => "CHECKOUT_CANCELLED",
            EventType::CheckoutCompleted => "CHECKOUT_COMPLETED",
            EventType::CheckoutFailed => "CHECKOUT_FAILED",
            EventType::Heartbeat => "HEARTBEAT",
            EventType::GfdDisconnected => "GFD_DISCONNECTED",
        }
    }

    /// Events on which the backend is known to omit cart totals.
    ///
    /// A zero total on one of these must not blank the displayed cart.
    pub fn omits_totals(self) -> bool {
        matches!(
            self,
            EventType::CheckoutInitiated | EventType::CheckoutCancelled
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an SSE event name is not part of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_owned()))
    }
}

/// Errors produced while validating an inbound payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("negative amount in field {0}")]
    NegativeAmount(&'static str),
}

/// Product hints carried in `metadata` of item events.
///
/// Present when the backend sends a partial update without the full
/// `cartItems` snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemHint {
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub item_sku: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
}

/// Checkout details shown on the overlay while a payment is in progress.
///
/// Only `order_id`, `payment_method` and `timestamp` are interpreted; the
/// remaining metadata keys are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutData {
    pub order_id: Option<String>,
    pub payment_method: Option<String>,
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CheckoutData {
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.payment_method.is_none()
            && self.timestamp.is_none()
            && self.extra.is_empty()
    }
}

/// Event-specific part of a [`CartEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetail {
    ConnectionEstablished,
    ProductViewed(ItemHint),
    CartItemAdded(ItemHint),
    CartItemRemoved(ItemHint),
    CartUpdated(ItemHint),
    VoucherApplied {
        voucher: Option<Voucher>,
        original_amount: Option<Decimal>,
    },
    VoucherUnapplied,
    DiscountApplied {
        discount: Option<Discount>,
        original_amount: Option<Decimal>,
    },
    DiscountRemoved,
    CheckoutInitiated(CheckoutData),
    CheckoutCancelled,
    CheckoutCompleted(CheckoutData),
    CheckoutFailed(CheckoutData),
    Heartbeat,
    GfdDisconnected,
}

impl EventDetail {
    pub fn event_type(&self) -> EventType {
        match self {
            EventDetail::ConnectionEstablished => EventType::ConnectionEstablished,
            EventDetail::ProductViewed(_) => EventType::ProductViewed,
            EventDetail::CartItemAdded(_) => EventType::CartItemAdded,
            EventDetail::CartItemRemoved(_) => EventType::CartItemRemoved,
            EventDetail::CartUpdated(_) => EventType::CartUpdated,
            EventDetail::VoucherApplied { .. } => EventType::VoucherApplied,
            EventDetail::VoucherUnapplied => EventType::VoucherUnapplied,
            EventDetail::DiscountApplied { .. } => EventType::DiscountApplied,
            EventDetail::DiscountRemoved => EventType::DiscountRemoved,
            EventDetail::CheckoutInitiated(_) => EventType::CheckoutInitiated,
            EventDetail::CheckoutCancelled => EventType::CheckoutCancelled,
            EventDetail::CheckoutCompleted(_) => EventType::CheckoutCompleted,
            EventDetail::CheckoutFailed(_) => EventType::CheckoutFailed,
            EventDetail::Heartbeat => EventType::Heartbeat,
            EventDetail::GfdDisconnected => EventType::GfdDisconnected,
        }
    }
}

/// A validated cart event.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEvent {
    pub event_id: String,
    /// Deprecated by the backend; devices are identified by cookie now.
    pub user_id: Option<String>,
    /// Unix timestamp in milliseconds.
    pub timestamp: Option<i64>,
    /// Full cart snapshot, when the backend sends one.
    pub cart_items: Option<Vec<CartItem>>,
    pub total_amount: Option<Decimal>,
    pub total_items: Option<u32>,
    pub message: Option<String>,
    /// Authoritative cart subtotal from `metadata.subtotal`.
    pub subtotal: Option<Decimal>,
    pub detail: EventDetail,
}

impl CartEvent {
    /// Parse and validate a single SSE `data` payload.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let raw: RawCartEvent = serde_json::from_str(payload)?;
        Self::try_from(raw)
    }

    pub fn event_type(&self) -> EventType {
        self.detail.event_type()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCartEvent {
    #[serde(default)]
    event_id: String,
    event_type: EventType,
    user_id: Option<String>,
    timestamp: Option<i64>,
    cart_items: Option<Vec<CartItem>>,
    total_amount: Option<Decimal>,
    total_items: Option<u32>,
    message: Option<String>,
    metadata: Option<RawMetadata>,
    voucher: Option<Voucher>,
    discount: Option<Discount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    product_id: Option<i64>,
    product_name: Option<String>,
    item_sku: Option<String>,
    price: Option<Decimal>,
    quantity: Option<u32>,
    subtotal: Option<Decimal>,
    original_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "string_or_number")]
    order_id: Option<String>,
    payment_method: Option<String>,
    timestamp: Option<i64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RawMetadata {
    fn item_hint(&self) -> ItemHint {
        ItemHint {
            product_id: self.product_id,
            product_name: self.product_name.clone(),
            item_sku: self.item_sku.clone(),
            price: self.price,
            quantity: self.quantity,
        }
    }

    fn checkout_data(self) -> CheckoutData {
        CheckoutData {
            order_id: self.order_id,
            payment_method: self.payment_method,
            timestamp: self.timestamp,
            extra: self.extra,
        }
    }
}

impl TryFrom<RawCartEvent> for CartEvent {
    type Error = DecodeError;

    fn try_from(raw: RawCartEvent) -> Result<Self, Self::Error> {
        let metadata = raw.metadata.unwrap_or_default();

        non_negative(raw.total_amount, "totalAmount")?;
        non_negative(metadata.price, "metadata.price")?;
        non_negative(metadata.subtotal, "metadata.subtotal")?;
        non_negative(metadata.original_amount, "metadata.originalAmount")?;

        let subtotal = metadata.subtotal;
        let detail = match raw.event_type {
            EventType::ConnectionEstablished => EventDetail::ConnectionEstablished,
            EventType::ProductViewed => EventDetail::ProductViewed(metadata.item_hint()),
            EventType::CartItemAdded => EventDetail::CartItemAdded(metadata.item_hint()),
            EventType::CartItemRemoved => EventDetail::CartItemRemoved(metadata.item_hint()),
            EventType::CartUpdated => EventDetail::CartUpdated(metadata.item_hint()),
            EventType::VoucherApplied => EventDetail::VoucherApplied {
                voucher: raw.voucher,
                original_amount: metadata.original_amount,
            },
            EventType::VoucherUnapplied => EventDetail::VoucherUnapplied,
            EventType::DiscountApplied => EventDetail::DiscountApplied {
                discount: raw.discount,
                original_amount: metadata.original_amount,
            },
            EventType::DiscountRemoved => EventDetail::DiscountRemoved,
            EventType::CheckoutInitiated => {
                EventDetail::CheckoutInitiated(metadata.checkout_data())
            }
            EventType::CheckoutCancelled => EventDetail::CheckoutCancelled,
            EventType::CheckoutCompleted => {
                EventDetail::CheckoutCompleted(metadata.checkout_data())
            }
            EventType::CheckoutFailed => EventDetail::CheckoutFailed(metadata.checkout_data()),
            EventType::Heartbeat => EventDetail::Heartbeat,
            EventType::GfdDisconnected => EventDetail::GfdDisconnected,
        };

        Ok(CartEvent {
            event_id: raw.event_id,
            user_id: raw.user_id,
            timestamp: raw.timestamp,
            cart_items: raw.cart_items,
            total_amount: raw.total_amount,
            total_items: raw.total_items,
            message: raw.message,
            subtotal,
            detail,
        })
    }
}

fn non_negative(value: Option<Decimal>, field: &'static str) -> Result<(), DecodeError> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(DecodeError::NegativeAmount(field)),
        _ => Ok(()),
    }
}

/// Order ids are strings on newer backends and numbers on older ones.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(Option::<Repr>::deserialize(deserializer)?.map(|repr| match repr {
        Repr::Text(s) => s,
        Repr::Integer(i) => i.to_string(),
        Repr::Float(f) => f.to_string(),
    }))
}
