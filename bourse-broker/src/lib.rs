//! Exchange-agnostic contracts between the simulator and its collaborators.
//!
//! The simulator never owns order, trade or balance state. It reads orders and
//! trades through an [`OrderStore`], borrows live balances from a
//! [`PortfolioStore`], and reports everything it decides to an
//! [`ExchangeListener`].

use std::sync::Arc;

use bourse_core::{AssetId, Order, OrderId, OrderUpdate, Position, Trade, TradeId};
use parking_lot::Mutex;

/// Live balance handle shared between the portfolio store and the simulator.
///
/// Every call to [`PortfolioStore::position`] for the same asset must return a
/// clone of the same `Arc`, so a mutation made through one handle is observed by
/// every other holder.
pub type SharedPosition = Arc<Mutex<Position>>;

/// Read access to the live order and trade caches.
///
/// Entries may appear or vanish between any two calls; lookups report absence
/// through `None` rather than failing.
pub trait OrderStore: Send + Sync {
    /// Keys of every order currently live.
    fn live_order_ids(&self) -> Vec<OrderId>;

    /// Current state of a live order.
    fn order(&self, id: OrderId) -> Option<Order>;

    /// Trade owning the given identifier, if still live.
    fn trade(&self, id: TradeId) -> Option<Trade>;

    /// Snapshot of every live order.
    fn live_orders(&self) -> Vec<Order> {
        self.live_order_ids()
            .into_iter()
            .filter_map(|id| self.order(id))
            .collect()
    }
}

/// Source of live, mutable per-asset balances.
pub trait PortfolioStore: Send + Sync {
    /// Shared balance for `asset`, created empty on first access.
    fn position(&self, asset: AssetId) -> SharedPosition;
}

/// Sink for everything the simulated exchange reports.
///
/// Calls are synchronous and fire-and-forget. Implementations may mutate the
/// order store from inside these callbacks.
pub trait ExchangeListener: Send + Sync {
    fn on_order_update(&self, update: &OrderUpdate);

    fn on_position_update(&self, position: &Position);
}

impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    fn live_order_ids(&self) -> Vec<OrderId> {
        (**self).live_order_ids()
    }

    fn order(&self, id: OrderId) -> Option<Order> {
        (**self).order(id)
    }

    fn trade(&self, id: TradeId) -> Option<Trade> {
        (**self).trade(id)
    }

    fn live_orders(&self) -> Vec<Order> {
        (**self).live_orders()
    }
}

impl<T: PortfolioStore + ?Sized> PortfolioStore for Arc<T> {
    fn position(&self, asset: AssetId) -> SharedPosition {
        (**self).position(asset)
    }
}

impl<T: ExchangeListener + ?Sized> ExchangeListener for Arc<T> {
    fn on_order_update(&self, update: &OrderUpdate) {
        (**self).on_order_update(update);
    }

    fn on_position_update(&self, position: &Position) {
        (**self).on_position_update(position);
    }
}

impl<T: OrderStore + ?Sized> OrderStore for &T {
    fn live_order_ids(&self) -> Vec<OrderId> {
        (**self).live_order_ids()
    }

    fn order(&self, id: OrderId) -> Option<Order> {
        (**self).order(id)
    }

    fn trade(&self, id: TradeId) -> Option<Trade> {
        (**self).trade(id)
    }

    fn live_orders(&self) -> Vec<Order> {
        (**self).live_orders()
    }
}

impl<T: PortfolioStore + ?Sized> PortfolioStore for &T {
    fn position(&self, asset: AssetId) -> SharedPosition {
        (**self).position(asset)
    }
}

impl<T: ExchangeListener + ?Sized> ExchangeListener for &T {
    fn on_order_update(&self, update: &OrderUpdate) {
        (**self).on_order_update(update);
    }

    fn on_position_update(&self, position: &Position) {
        (**self).on_position_update(position);
    }
}

/// Forwards every event to each registered listener in registration order.
#[derive(Default)]
pub struct ListenerFanout {
    listeners: Vec<Arc<dyn ExchangeListener>>,
}

impl ListenerFanout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; it receives events after every listener added before it.
    #[must_use]
    pub fn with(mut self, listener: Arc<dyn ExchangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn push(&mut self, listener: Arc<dyn ExchangeListener>) {
        self.listeners.push(listener);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl ExchangeListener for ListenerFanout {
    fn on_order_update(&self, update: &OrderUpdate) {
        for listener in &self.listeners {
            listener.on_order_update(update);
        }
    }

    fn on_position_update(&self, position: &Position) {
        for listener in &self.listeners {
            listener.on_position_update(position);
        }
    }
}

/// Listener that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl ExchangeListener for NoopListener {
    fn on_order_update(&self, _update: &OrderUpdate) {}

    fn on_position_update(&self, _position: &Position) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[derive(Default)]
    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ExchangeListener for Tagged {
        fn on_order_update(&self, _update: &OrderUpdate) {
            self.log.lock().push(format!("{}:order", self.tag));
        }

        fn on_position_update(&self, position: &Position) {
            self.log
                .lock()
                .push(format!("{}:{}", self.tag, position.asset));
        }
    }

    #[test]
    fn fanout_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fanout = ListenerFanout::new()
            .with(Arc::new(Tagged {
                tag: "first",
                log: log.clone(),
            }))
            .with(Arc::new(Tagged {
                tag: "second",
                log: log.clone(),
            }));
        assert_eq!(fanout.len(), 2);

        let position = Position::with_free(AssetId::from("ETH"), Decimal::ONE);
        fanout.on_position_update(&position);
        assert_eq!(
            *log.lock(),
            vec!["first:ETH".to_string(), "second:ETH".to_string()]
        );
    }
}
