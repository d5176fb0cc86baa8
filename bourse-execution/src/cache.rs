use std::collections::HashMap;

use bourse_broker::{ExchangeListener, OrderStore};
use bourse_core::{Order, OrderId, OrderState, OrderUpdate, Position, Trade, TradeId};
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::exits::exit_orders;
use crate::{is_valid_transition, ExecutionError, ExecutionResult, OrderCacheConfig};

/// In-memory live order and trade caches.
///
/// Terminal orders leave the live cache as soon as their final update is
/// applied and are kept in a history; a trade leaves the live cache once it has
/// no live orders left.
pub struct LiveOrderCache {
    config: OrderCacheConfig,
    state: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    orders: HashMap<OrderId, Order>,
    trades: HashMap<TradeId, Trade>,
    refs: HashMap<String, OrderId>,
    history: Vec<Order>,
    closed_trades: Vec<Trade>,
    last_order_id: OrderId,
}

impl Default for LiveOrderCache {
    fn default() -> Self {
        Self::new(OrderCacheConfig::default())
    }
}

impl LiveOrderCache {
    pub fn new(config: OrderCacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> OrderCacheConfig {
        self.config
    }

    /// Register a trade so its orders can be submitted.
    pub fn open_trade(&self, trade: Trade) -> ExecutionResult<()> {
        let mut state = self.state.write();
        if state.trades.contains_key(&trade.id) {
            return Err(ExecutionError::DuplicateTrade(trade.id));
        }
        debug!(trade_id = %trade.id, base = %trade.base_asset, quote = %trade.quote_asset, "trade opened");
        state.trades.insert(trade.id, trade);
        Ok(())
    }

    /// Add a non-terminal order belonging to a live trade.
    pub fn submit(&self, order: Order) -> ExecutionResult<OrderId> {
        let mut state = self.state.write();
        if !state.trades.contains_key(&order.trade_id) {
            return Err(ExecutionError::UnknownTrade(order.trade_id));
        }
        if state.orders.contains_key(&order.id) {
            return Err(ExecutionError::DuplicateOrder(order.id));
        }
        if state.refs.contains_key(&order.client_order_id) {
            return Err(ExecutionError::DuplicateReference(
                order.client_order_id.clone(),
            ));
        }
        if order.is_terminal() {
            return Err(ExecutionError::InvalidTransition {
                order_id: order.id,
                from: order.state,
                to: order.state,
            });
        }
        let id = order.id;
        debug!(order_id = %id, order_type = %order.order_type(), state = %order.state, "order submitted");
        state.insert(order);
        Ok(id)
    }

    /// Identifier one above the highest identifier seen so far.
    #[must_use]
    pub fn next_order_id(&self) -> OrderId {
        self.state.read().last_order_id.next()
    }

    /// Ask the exchange to cancel a live order.
    pub fn request_cancel(&self, id: OrderId) -> ExecutionResult<()> {
        let mut state = self.state.write();
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(ExecutionError::UnknownOrder(id))?;
        transition(order, OrderState::CancelPendingExt)?;
        debug!(order_id = %id, "cancel requested");
        Ok(())
    }

    /// Drop a live order without an exchange acknowledgement.
    pub fn remove(&self, id: OrderId) -> Option<Order> {
        let mut state = self.state.write();
        let order = state.orders.remove(&id)?;
        state.refs.remove(&order.client_order_id);
        state.close_trade_if_idle(order.trade_id);
        debug!(order_id = %id, "order removed from live cache");
        Some(order)
    }

    /// Apply an exchange update to the order carrying its client reference.
    pub fn apply_update(&self, update: &OrderUpdate) -> ExecutionResult<()> {
        let mut state = self.state.write();
        let id = *state
            .refs
            .get(&update.client_order_id)
            .ok_or_else(|| ExecutionError::UnknownReference(update.client_order_id.clone()))?;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(ExecutionError::UnknownOrder(id))?;
        transition(order, update.state)?;
        if update.state == OrderState::Opened {
            order.opened_at = Some(update.timestamp);
        }
        if !update.state.is_terminal() {
            return Ok(());
        }

        let Some(retired) = state.retire(id) else {
            return Ok(());
        };
        if update.is_fill() {
            info!(
                order_id = %id,
                trade_id = %retired.trade_id,
                price = %update.price,
                qty = %update.cum_executed_qty,
                "order filled"
            );
            if self.config.cancel_siblings_on_fill {
                state.cancel_siblings(&retired);
            }
            if self.config.spawn_exit_orders {
                let children = {
                    let mut next = state.last_order_id;
                    exit_orders(
                        &retired,
                        || {
                            next = next.next();
                            next
                        },
                        update.timestamp,
                    )
                };
                for child in children {
                    if state.refs.contains_key(&child.client_order_id) {
                        error!(
                            order_id = %child.id,
                            parent_id = %retired.id,
                            client_order_id = %child.client_order_id,
                            "exit order reference already in use; not spawned"
                        );
                        continue;
                    }
                    debug!(
                        order_id = %child.id,
                        parent_id = %retired.id,
                        order_type = %child.order_type(),
                        "exit order spawned"
                    );
                    state.insert(child);
                }
            }
        }
        state.close_trade_if_idle(retired.trade_id);
        Ok(())
    }

    /// Orders that have left the live cache, in retirement order.
    #[must_use]
    pub fn order_history(&self) -> Vec<Order> {
        self.state.read().history.clone()
    }

    /// Trades that have left the live cache, in closing order.
    #[must_use]
    pub fn closed_trades(&self) -> Vec<Trade> {
        self.state.read().closed_trades.clone()
    }

    /// Number of live orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().orders.is_empty()
    }
}

impl CacheState {
    fn insert(&mut self, order: Order) {
        self.last_order_id = self.last_order_id.max(order.id);
        self.refs.insert(order.client_order_id.clone(), order.id);
        self.orders.insert(order.id, order);
    }

    fn retire(&mut self, id: OrderId) -> Option<Order> {
        let order = self.orders.remove(&id)?;
        self.refs.remove(&order.client_order_id);
        self.history.push(order.clone());
        Some(order)
    }

    fn cancel_siblings(&mut self, filled: &Order) {
        for sibling in self.orders.values_mut() {
            if sibling.trade_id != filled.trade_id || sibling.id == filled.id {
                continue;
            }
            if matches!(
                sibling.state,
                OrderState::OpenPendingExt | OrderState::Opened
            ) {
                sibling.state = OrderState::CancelPendingExt;
                debug!(order_id = %sibling.id, filled_id = %filled.id, "sibling cancel requested");
            }
        }
    }

    fn close_trade_if_idle(&mut self, trade_id: TradeId) {
        if self.orders.values().any(|order| order.trade_id == trade_id) {
            return;
        }
        if let Some(trade) = self.trades.remove(&trade_id) {
            debug!(trade_id = %trade_id, "trade closed");
            self.closed_trades.push(trade);
        }
    }
}

fn transition(order: &mut Order, to: OrderState) -> ExecutionResult<()> {
    if !is_valid_transition(order.state, to) {
        return Err(ExecutionError::InvalidTransition {
            order_id: order.id,
            from: order.state,
            to,
        });
    }
    order.state = to;
    Ok(())
}

impl OrderStore for LiveOrderCache {
    fn live_order_ids(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self.state.read().orders.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn order(&self, id: OrderId) -> Option<Order> {
        self.state.read().orders.get(&id).cloned()
    }

    fn trade(&self, id: TradeId) -> Option<Trade> {
        self.state.read().trades.get(&id).cloned()
    }
}

impl ExchangeListener for LiveOrderCache {
    fn on_order_update(&self, update: &OrderUpdate) {
        if let Err(err) = self.apply_update(update) {
            error!(client_order_id = %update.client_order_id, state = %update.state, error = %err, "failed to apply order update");
        }
    }

    fn on_position_update(&self, _position: &Position) {}
}
