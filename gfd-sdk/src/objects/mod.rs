//! JSON payloads exchanged with the GFD backend.
//!
//! All objects use the backend's camelCase field naming. Monetary values
//! are [`rust_decimal::Decimal`] because the backend serializes
//! `BigDecimal` amounts as JSON numbers.

pub mod cart;
pub mod event;
pub mod promotion;

pub use cart::CartItem;
pub use event::{CartEvent, CheckoutData, DecodeError, EventDetail, EventType, ItemHint};
pub use promotion::{Discount, DiscountType, Voucher, VoucherType};
