//! Text rendering of the display state.
//!
//! The kiosk screen itself is out of scope; the binary logs a one-line
//! summary whenever the session publishes a new snapshot and prints the
//! full cart on the console's `status` command.

use gfd_core::store::DisplaySnapshot;
use std::fmt::Write;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One-line summary of the screen the display would show.
pub fn summary(snapshot: &DisplaySnapshot) -> String {
    let mut line = if snapshot.is_connected {
        let mut line = String::from("connected");
        if let Some(user_id) = &snapshot.user_id {
            let _ = write!(line, " to {user_id}");
        }
        let _ = write!(
            line,
            " | {} lines, {} items | subtotal {} | total {}",
            snapshot.cart_items.len(),
            snapshot.total_items,
            snapshot.subtotal,
            snapshot.total_amount
        );
        if let Some(voucher) = &snapshot.voucher {
            let _ = write!(line, " | voucher {}", voucher.voucher_code);
        }
        if let Some(discount) = &snapshot.discount {
            let label = discount.discount_code.as_deref().unwrap_or("auto");
            let _ = write!(line, " | discount {label}");
        }
        if !snapshot.total_savings.is_zero() {
            let _ = write!(line, " | savings {}", snapshot.total_savings);
        }
        if snapshot.is_checkout_mode {
            let order = snapshot
                .checkout_data
                .as_ref()
                .and_then(|data| data.order_id.as_deref())
                .unwrap_or("-");
            let _ = write!(line, " | checkout {order}");
        }
        line
    } else if snapshot.connection_attempt_in_progress {
        String::from("connecting")
    } else if let Some(error) = &snapshot.connection_error {
        format!("disconnected: {error}")
    } else {
        String::from("waiting for pairing")
    };

    if snapshot.admin_dialog_open {
        line.push_str(" | admin dialog open");
    }
    line
}

/// Summary followed by one line per cart item.
pub fn describe(snapshot: &DisplaySnapshot) -> String {
    let mut text = summary(snapshot);
    for item in &snapshot.cart_items {
        let _ = write!(
            text,
            "\n  {} x {} @ {} = {}",
            item.quantity, item.product_name, item.price, item.subtotal
        );
    }
    if let Some(event_type) = snapshot.last_event_type {
        let _ = write!(text, "\n  last event: {event_type}");
        if !snapshot.last_message.is_empty() {
            let _ = write!(text, " ({})", snapshot.last_message);
        }
    }
    text
}

/// Log a summary every time the session publishes a new snapshot.
pub fn spawn_renderer(mut snapshots: watch::Receiver<DisplaySnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let line = summary(&snapshots.borrow_and_update());
            tracing::info!(target: "gfd_display::screen", "{line}");
        }
        tracing::debug!("Snapshot channel closed, renderer stopping");
    })
}
