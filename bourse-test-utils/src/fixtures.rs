use bourse_core::{
    AssetId, Candle, Order, OrderId, OrderKind, OrderState, Price, Quantity, Side, Trade, TradeId,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

/// Fixed reference instant used by every fixture.
#[must_use]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Candle closing one minute after [`base_time`].
#[must_use]
pub fn candle(
    open: impl Into<Price>,
    high: impl Into<Price>,
    low: impl Into<Price>,
    close: impl Into<Price>,
) -> Candle {
    candle_at(1, open, high, low, close)
}

/// Candle closing `minute` minutes after [`base_time`].
#[must_use]
pub fn candle_at(
    minute: i64,
    open: impl Into<Price>,
    high: impl Into<Price>,
    low: impl Into<Price>,
    close: impl Into<Price>,
) -> Candle {
    Candle {
        open: open.into(),
        high: high.into(),
        low: low.into(),
        close: close.into(),
        close_time: base_time() + Duration::minutes(minute),
    }
}

/// Trade on the given pair.
#[must_use]
pub fn trade(id: u64, base: &str, quote: &str) -> Trade {
    Trade {
        id: TradeId(id),
        base_asset: AssetId::from(base),
        quote_asset: AssetId::from(quote),
    }
}

/// Fluent constructor for orders. Defaults to trade 1, quantity 1, state OPENED.
#[derive(Clone, Debug)]
pub struct OrderBuilder {
    order: Order,
}

impl OrderBuilder {
    fn new(id: u64, side: Side, kind: OrderKind, price: Price) -> Self {
        Self {
            order: Order {
                id: OrderId(id),
                trade_id: TradeId(1),
                client_order_id: format!("order-{id}"),
                side,
                kind,
                price,
                quantity: Decimal::ONE,
                state: OrderState::Opened,
                init_at: base_time(),
                opened_at: Some(base_time()),
                take_profit: None,
                stop_loss: None,
            },
        }
    }

    pub fn market(id: u64, side: Side, price: impl Into<Price>) -> Self {
        Self::new(id, side, OrderKind::Market, price.into())
    }

    pub fn limit(id: u64, side: Side, price: impl Into<Price>) -> Self {
        Self::new(id, side, OrderKind::Limit, price.into())
    }

    /// Stop-loss market order settling at its stop price.
    pub fn stop_loss_market(id: u64, side: Side, stop_price: impl Into<Price>) -> Self {
        let stop_price = stop_price.into();
        Self::new(id, side, OrderKind::StopLossMarket { stop_price }, stop_price)
    }

    pub fn stop_loss_limit(
        id: u64,
        side: Side,
        stop_price: impl Into<Price>,
        price: impl Into<Price>,
    ) -> Self {
        Self::new(
            id,
            side,
            OrderKind::StopLossLimit {
                stop_price: stop_price.into(),
            },
            price.into(),
        )
    }

    #[must_use]
    pub fn trade(mut self, trade_id: u64) -> Self {
        self.order.trade_id = TradeId(trade_id);
        self
    }

    #[must_use]
    pub fn quantity(mut self, quantity: impl Into<Quantity>) -> Self {
        self.order.quantity = quantity.into();
        self
    }

    #[must_use]
    pub fn state(mut self, state: OrderState) -> Self {
        self.order.state = state;
        if state == OrderState::OpenPendingExt {
            self.order.opened_at = None;
        }
        self
    }

    #[must_use]
    pub fn init_at(mut self, at: DateTime<Utc>) -> Self {
        self.order.init_at = at;
        self
    }

    #[must_use]
    pub fn opened_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.order.opened_at = at;
        self
    }

    #[must_use]
    pub fn client_order_id(mut self, reference: impl Into<String>) -> Self {
        self.order.client_order_id = reference.into();
        self
    }

    #[must_use]
    pub fn take_profit(mut self, price: impl Into<Price>) -> Self {
        self.order.take_profit = Some(price.into());
        self
    }

    #[must_use]
    pub fn stop_loss(mut self, price: impl Into<Price>) -> Self {
        self.order.stop_loss = Some(price.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Order {
        self.order
    }
}
