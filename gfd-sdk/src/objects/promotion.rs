//! Voucher and discount payloads.
//!
//! At most one voucher and one discount are active on a cart at any time.
//! Both are attached to the top level of a [`CartEvent`](super::CartEvent)
//! on the corresponding `*_APPLIED` event.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a voucher reduces the cart total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherType {
    Percentage,
    FixedAmount,
    FreeShipping,
}

/// How a discount reduces the cart total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
    BuyXGetY,
}

/// A customer-entered voucher applied to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub voucher_code: String,
    pub voucher_type: VoucherType,
    /// Percentage points or a fixed amount, depending on `voucher_type`.
    pub discount_value: Decimal,
    /// The amount actually deducted from the cart.
    pub discount_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unix timestamp (milliseconds) of when the voucher was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<i64>,
}

/// A store-side promotion applied to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    /// Automatic promotions carry no code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<i64>,
}
