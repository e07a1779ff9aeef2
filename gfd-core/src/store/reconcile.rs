//! Cart reconciliation for events that carry no `cartItems` snapshot.
//!
//! Some item events only describe the touched product in `metadata`. The
//! store then synthesizes a line for that product and merges it into the
//! cart it already shows, keyed by product id.

use gfd_sdk::objects::{CartItem, ItemHint};
use rust_decimal::Decimal;
use tracing::warn;

/// Name shown when the backend sent neither a product name nor a SKU.
pub const UNKNOWN_ITEM_NAME: &str = "Unknown Item";

/// Build a cart line from item metadata.
///
/// Returns `None` without a `productId`, since the line could never be
/// matched against the cart, or when the line subtotal overflows.
pub(crate) fn placeholder_item(
    hint: &ItemHint,
    total_amount: Option<Decimal>,
    total_items: Option<u32>,
) -> Option<CartItem> {
    let product_id = hint.product_id?;

    let product_name = hint
        .product_name
        .clone()
        .or_else(|| hint.item_sku.clone())
        .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_owned());

    let price = hint
        .price
        .or_else(|| match (total_amount, total_items) {
            (Some(amount), Some(items)) => amount.checked_div(Decimal::from(items)),
            _ => None,
        })
        .unwrap_or(Decimal::ZERO);

    let quantity = hint.quantity.or(total_items).unwrap_or(1);

    let Some(subtotal) = price.checked_mul(Decimal::from(quantity)) else {
        warn!(product_id, %price, quantity, "Item subtotal overflows, skipping line");
        return None;
    };

    Some(CartItem {
        product_id,
        product_name,
        price,
        quantity,
        subtotal,
    })
}

/// Replace the line with the same product id in place, or append.
pub(crate) fn merge_item(items: &mut Vec<CartItem>, item: CartItem) {
    match items.iter_mut().find(|line| line.product_id == item.product_id) {
        Some(line) => *line = item,
        None => items.push(item),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn hint(product_id: Option<i64>) -> ItemHint {
        ItemHint {
            product_id,
            ..ItemHint::default()
        }
    }

    #[test]
    fn test_placeholder_falls_back_to_totals() {
        let item = placeholder_item(&hint(Some(7)), Some(Decimal::from(500)), Some(1)).unwrap();
        assert_eq!(item.product_id, 7);
        assert_eq!(item.product_name, UNKNOWN_ITEM_NAME);
        assert_eq!(item.price, Decimal::from(500));
        assert_eq!(item.quantity, 1);
        assert_eq!(item.subtotal, Decimal::from(500));
    }

    #[test]
    fn test_placeholder_prefers_metadata() {
        let hint = ItemHint {
            product_id: Some(3),
            product_name: None,
            item_sku: Some("SKU-3".into()),
            price: Some(Decimal::from(1200)),
            quantity: Some(3),
        };
        let item = placeholder_item(&hint, Some(Decimal::from(99)), Some(9)).unwrap();
        assert_eq!(item.product_name, "SKU-3");
        assert_eq!(item.price, Decimal::from(1200));
        assert_eq!(item.quantity, 3);
        assert_eq!(item.subtotal, Decimal::from(3600));
    }

    #[test]
    fn test_placeholder_requires_product_id() {
        assert!(placeholder_item(&hint(None), Some(Decimal::from(500)), Some(1)).is_none());
    }

    #[test]
    fn test_zero_item_count_does_not_divide() {
        let item = placeholder_item(&hint(Some(1)), Some(Decimal::from(500)), Some(0)).unwrap();
        assert_eq!(item.price, Decimal::ZERO);
        assert_eq!(item.quantity, 0);
    }

    #[test]
    fn test_overflowing_subtotal_is_skipped() {
        let hint = ItemHint {
            product_id: Some(7),
            price: Some(Decimal::MAX),
            quantity: Some(10),
            ..ItemHint::default()
        };
        assert!(placeholder_item(&hint, None, None).is_none());
    }

    #[test]
    fn test_merge_replaces_in_place() {
        let mut items = Vec::new();
        for (id, qty) in [(1, 1), (2, 1), (1, 4)] {
            let hint = ItemHint {
                product_id: Some(id),
                price: Some(Decimal::from(10)),
                quantity: Some(qty),
                ..ItemHint::default()
            };
            merge_item(&mut items, placeholder_item(&hint, None, None).unwrap());
        }
        let lines: Vec<(i64, u32)> = items.iter().map(|i| (i.product_id, i.quantity)).collect();
        assert_eq!(lines, vec![(1, 4), (2, 1)]);
    }
}
