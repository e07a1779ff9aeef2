use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single line of the customer's cart as shown on the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: i64,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}
