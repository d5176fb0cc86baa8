//! Per-order state transitions against a single candle.

use bourse_core::{
    Candle, Order, OrderKind, OrderState, OrderUpdate, Price, Side, Trade,
};
use rust_decimal::Decimal;

/// What the simulated exchange does with one order in one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Acknowledge a pending opening.
    Confirm,
    /// Acknowledge a pending cancellation.
    Cancel,
    /// Execute the full quantity.
    Fill(FillTrigger),
}

/// Reason an opened order was filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillTrigger {
    Market,
    LimitCrossed,
    StopTouched,
}

impl Transition {
    /// State reported for the order once the transition is applied.
    #[must_use]
    pub fn target_state(self) -> OrderState {
        match self {
            Self::Confirm => OrderState::Opened,
            Self::Cancel => OrderState::Canceled,
            Self::Fill(_) => OrderState::Filled,
        }
    }
}

/// Returns true when a limit order at `price` executes on this candle's close.
#[must_use]
pub fn limit_crossed(side: Side, price: Price, candle: &Candle) -> bool {
    match side {
        Side::Sell => candle.close >= price,
        Side::Buy => candle.close <= price,
    }
}

/// Returns true when the candle range reaches a stop at `stop_price`.
#[must_use]
pub fn stop_touched(side: Side, stop_price: Price, candle: &Candle) -> bool {
    match side {
        Side::Sell => candle.low <= stop_price,
        Side::Buy => candle.high >= stop_price,
    }
}

/// Decide the transition, if any, an order undergoes on this candle.
///
/// Terminal orders never transition.
#[must_use]
pub fn evaluate(order: &Order, candle: &Candle) -> Option<Transition> {
    match order.state {
        OrderState::OpenPendingExt => Some(Transition::Confirm),
        OrderState::CancelPendingExt => Some(Transition::Cancel),
        OrderState::Opened => {
            let trigger = match order.kind {
                OrderKind::Market => Some(FillTrigger::Market),
                OrderKind::Limit => limit_crossed(order.side, order.price, candle)
                    .then_some(FillTrigger::LimitCrossed),
                OrderKind::StopLossMarket { stop_price }
                | OrderKind::StopLossLimit { stop_price } => {
                    stop_touched(order.side, stop_price, candle)
                        .then_some(FillTrigger::StopTouched)
                }
            };
            trigger.map(Transition::Fill)
        }
        OrderState::Canceled | OrderState::Filled => None,
    }
}

/// Build the exchange report for a transition.
///
/// Confirmations carry the order's initiation time, market fills the time the
/// order was opened (the candle close when it was never stamped), and every
/// other transition the candle close time. Fills always execute the full
/// quantity at the order's own price.
#[must_use]
pub fn build_update(
    order: &Order,
    trade: &Trade,
    transition: Transition,
    candle: &Candle,
) -> OrderUpdate {
    let (executed, timestamp) = match transition {
        Transition::Confirm => (Decimal::ZERO, order.init_at),
        Transition::Cancel => (Decimal::ZERO, candle.close_time),
        Transition::Fill(FillTrigger::Market) => (
            order.quantity,
            order.opened_at.unwrap_or(candle.close_time),
        ),
        Transition::Fill(_) => (order.quantity, candle.close_time),
    };
    OrderUpdate {
        base_asset: trade.base_asset,
        quote_asset: trade.quote_asset,
        side: order.side,
        order_type: order.order_type(),
        orig_qty: order.quantity,
        last_executed_qty: executed,
        cum_executed_qty: executed,
        price: order.price,
        state: transition.target_state(),
        timestamp,
        client_order_id: order.client_order_id.clone(),
        ext_order_ref: order.client_order_id.clone(),
    }
}
