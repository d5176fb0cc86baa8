use bourse_core::{Order, OrderId, OrderKind, OrderState};
use chrono::{DateTime, Utc};

/// Build the take-profit and stop-loss children of a filled order.
///
/// Children close the parent's exposure: opposite side, same quantity, same
/// trade. Client references embed the child id. The take-profit rests as a
/// limit at its price; the stop-loss is a stop market order that settles at
/// its stop price.
pub(crate) fn exit_orders(
    parent: &Order,
    mut allocate: impl FnMut() -> OrderId,
    at: DateTime<Utc>,
) -> Vec<Order> {
    let mut children = Vec::new();
    let exit_side = parent.side.inverse();

    if let Some(price) = parent.take_profit {
        let id = allocate();
        children.push(Order {
            id,
            trade_id: parent.trade_id,
            client_order_id: format!("{}-tp-{id}", parent.client_order_id),
            side: exit_side,
            kind: OrderKind::Limit,
            price,
            quantity: parent.quantity,
            state: OrderState::OpenPendingExt,
            init_at: at,
            opened_at: None,
            take_profit: None,
            stop_loss: None,
        });
    }

    if let Some(stop_price) = parent.stop_loss {
        let id = allocate();
        children.push(Order {
            id,
            trade_id: parent.trade_id,
            client_order_id: format!("{}-sl-{id}", parent.client_order_id),
            side: exit_side,
            kind: OrderKind::StopLossMarket { stop_price },
            price: stop_price,
            quantity: parent.quantity,
            state: OrderState::OpenPendingExt,
            init_at: at,
            opened_at: None,
            take_profit: None,
            stop_loss: None,
        });
    }

    children
}
