//! Evaluation order of competing orders within one pass.
//!
//! Orders are ranked by type first (market, stop-loss market, stop-loss limit,
//! limit) and then by a type-specific key:
//!
//! | type             | key                         |
//! |------------------|-----------------------------|
//! | market           | order id, ascending         |
//! | stop-loss market | stop price, descending      |
//! | stop-loss limit  | stop price, descending      |
//! | limit            | limit price, ascending      |
//!
//! Equal keys fall back to the order id so the ordering is total.

use std::cmp::Ordering;

use bourse_core::{Order, OrderKind};
use rust_decimal::Decimal;

/// Primary rank of an order kind; lower ranks are evaluated first.
#[must_use]
pub fn rank(kind: &OrderKind) -> u8 {
    match kind {
        OrderKind::Market => 1,
        OrderKind::StopLossMarket { .. } => 2,
        OrderKind::StopLossLimit { .. } => 3,
        OrderKind::Limit => 4,
    }
}

/// `(rank, secondary)` sort key of an order.
#[must_use]
pub fn priority_key(order: &Order) -> (u8, Decimal) {
    let secondary = match order.kind {
        OrderKind::Market => Decimal::from(order.id.as_raw()),
        OrderKind::StopLossMarket { stop_price } | OrderKind::StopLossLimit { stop_price } => {
            -stop_price
        }
        OrderKind::Limit => order.price,
    };
    (rank(&order.kind), secondary)
}

/// Total order over live orders.
#[must_use]
pub fn compare(a: &Order, b: &Order) -> Ordering {
    priority_key(a)
        .cmp(&priority_key(b))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort orders into evaluation order.
pub fn prioritize(orders: &mut [Order]) {
    orders.sort_by(compare);
}
