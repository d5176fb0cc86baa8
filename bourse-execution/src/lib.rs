//! Live order management for simulated exchanges.
//!
//! [`LiveOrderCache`] is the reference order/trade store: the simulator reads
//! it through [`bourse_broker::OrderStore`] and feeds it the updates it emits
//! through [`bourse_broker::ExchangeListener`]. Applying a fill can cancel
//! sibling orders or spawn exit orders, which is what makes the simulator
//! iterate several passes over one candle.

mod cache;
mod exits;

use bourse_core::{OrderId, OrderState, TradeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::LiveOrderCache;

/// Result alias for order cache operations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Errors surfaced by the order cache.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),
    #[error("no live order carries client reference '{0}'")]
    UnknownReference(String),
    #[error("unknown trade: {0}")]
    UnknownTrade(TradeId),
    #[error("order {0} is already live")]
    DuplicateOrder(OrderId),
    #[error("client reference '{0}' is already in use")]
    DuplicateReference(String),
    #[error("trade {0} is already live")]
    DuplicateTrade(TradeId),
    /// Raised when an update would move an order along an edge the lifecycle does not allow.
    #[error("order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderState,
        to: OrderState,
    },
}

/// Reactions the cache performs when it applies a fill.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OrderCacheConfig {
    /// Request cancellation of every other live order of the trade once one order fills.
    #[serde(default = "default_true")]
    pub cancel_siblings_on_fill: bool,
    /// Spawn take-profit / stop-loss children for filled orders that carry exit prices.
    #[serde(default = "default_true")]
    pub spawn_exit_orders: bool,
}

impl Default for OrderCacheConfig {
    fn default() -> Self {
        Self {
            cancel_siblings_on_fill: true,
            spawn_exit_orders: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Returns true when an order may move from `from` to `to`.
#[must_use]
pub fn is_valid_transition(from: OrderState, to: OrderState) -> bool {
    use OrderState::*;
    matches!(
        (from, to),
        (OpenPendingExt, Opened)
            | (OpenPendingExt, CancelPendingExt)
            | (Opened, CancelPendingExt)
            | (Opened, Filled)
            | (CancelPendingExt, Canceled)
    )
}
