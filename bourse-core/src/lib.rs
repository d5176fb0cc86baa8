//! Fundamental data types shared across the entire workspace.

pub mod identifiers;

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use identifiers::{AssetId, IdentifierParseError, OrderId, TradeId};

/// Alias for price precision.
pub type Price = Decimal;
/// Alias for quantity precision.
pub type Quantity = Decimal;

/// The side of an order.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    /// Buy the base asset.
    Buy,
    /// Sell the base asset.
    Sell,
}

impl Side {
    /// Returns the opposite side (buy <-> sell).
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// Flat order type tag carried by emitted updates.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLossMarket,
    StopLossLimit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLossMarket => "STOP_LOSS_MARKET",
            Self::StopLossLimit => "STOP_LOSS_LIMIT",
        };
        f.write_str(label)
    }
}

/// Order execution style together with the fields only that style uses.
///
/// Deserialization is driven by a `type` tag; any tag outside the four
/// supported styles is rejected at parse time.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Filled unconditionally once opened.
    Market,
    /// Filled when the candle closes on the favourable side of the order price.
    Limit,
    /// Filled when the candle range touches the stop price.
    StopLossMarket { stop_price: Price },
    /// Filled when the candle range touches the stop price.
    StopLossLimit { stop_price: Price },
}

impl OrderKind {
    #[must_use]
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::Market => OrderType::Market,
            Self::Limit => OrderType::Limit,
            Self::StopLossMarket { .. } => OrderType::StopLossMarket,
            Self::StopLossLimit { .. } => OrderType::StopLossLimit,
        }
    }

    /// Trigger price for stop orders.
    #[must_use]
    pub fn stop_price(&self) -> Option<Price> {
        match self {
            Self::StopLossMarket { stop_price } | Self::StopLossLimit { stop_price } => {
                Some(*stop_price)
            }
            Self::Market | Self::Limit => None,
        }
    }
}

/// Order lifecycle as seen by the simulated exchange.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Submitted, waiting for the exchange to acknowledge the opening.
    OpenPendingExt,
    /// Resting on the exchange.
    Opened,
    /// Cancel requested, waiting for the exchange to acknowledge it.
    CancelPendingExt,
    Canceled,
    Filled,
}

impl OrderState {
    /// Returns true for states that no transition can leave.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Filled)
    }

    /// Returns true while the exchange still owes an acknowledgement.
    #[must_use]
    pub fn is_pending_ext(self) -> bool {
        matches!(self, Self::OpenPendingExt | Self::CancelPendingExt)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::OpenPendingExt => "OPEN_PENDING_EXT",
            Self::Opened => "OPENED",
            Self::CancelPendingExt => "CANCEL_PENDING_EXT",
            Self::Canceled => "CANCELED",
            Self::Filled => "FILLED",
        };
        f.write_str(label)
    }
}

/// A single trading instruction owned by the order store.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub trade_id: TradeId,
    /// Opaque reference echoed back on every update for this order.
    pub client_order_id: String,
    pub side: Side,
    #[serde(flatten)]
    pub kind: OrderKind,
    /// Limit price for limit-style orders, recorded reference price otherwise.
    /// Fills always settle at this price.
    pub price: Price,
    pub quantity: Quantity,
    pub state: OrderState,
    pub init_at: DateTime<Utc>,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    /// Exit price for a take-profit child spawned once this order fills.
    #[serde(default)]
    pub take_profit: Option<Price>,
    /// Stop price for a stop-loss child spawned once this order fills.
    #[serde(default)]
    pub stop_loss: Option<Price>,
}

impl Order {
    #[must_use]
    pub fn order_type(&self) -> OrderType {
        self.kind.order_type()
    }

    #[must_use]
    pub fn stop_price(&self) -> Option<Price> {
        self.kind.stop_price()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns true when the order must still be resolved within the current candle:
    /// an outstanding exchange acknowledgement or an opened market order.
    #[must_use]
    pub fn awaits_resolution(&self) -> bool {
        self.state.is_pending_ext()
            || (self.state == OrderState::Opened && matches!(self.kind, OrderKind::Market))
    }
}

/// Groups orders under a traded pair.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Trade {
    pub id: TradeId,
    pub base_asset: AssetId,
    pub quote_asset: AssetId,
}

/// One OHLC price bar.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Candle {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub close_time: DateTime<Utc>,
}

impl fmt::Display for Candle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "O:{} H:{} L:{} C:{} @ {}",
            self.open,
            self.high,
            self.low,
            self.close,
            self.close_time.to_rfc3339()
        )
    }
}

/// Exchange report describing a state change of one order.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrderUpdate {
    pub base_asset: AssetId,
    pub quote_asset: AssetId,
    pub side: Side,
    pub order_type: OrderType,
    pub orig_qty: Quantity,
    pub last_executed_qty: Quantity,
    pub cum_executed_qty: Quantity,
    pub price: Price,
    pub state: OrderState,
    pub timestamp: DateTime<Utc>,
    pub client_order_id: String,
    pub ext_order_ref: String,
}

impl OrderUpdate {
    /// Returns true when the update reports an execution.
    #[must_use]
    pub fn is_fill(&self) -> bool {
        self.state == OrderState::Filled
    }

    /// Quote amount exchanged by this update.
    #[must_use]
    pub fn notional(&self) -> Price {
        self.last_executed_qty * self.price
    }
}

/// Balance of a single asset.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Position {
    pub asset: AssetId,
    pub free: Quantity,
    #[serde(default)]
    pub locked: Quantity,
}

impl Position {
    /// Empty balance for an asset.
    #[must_use]
    pub fn flat(asset: AssetId) -> Self {
        Self {
            asset,
            free: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }

    /// Balance holding `free` units of the asset.
    #[must_use]
    pub fn with_free(asset: AssetId, free: Quantity) -> Self {
        Self {
            free,
            ..Self::flat(asset)
        }
    }

    #[must_use]
    pub fn total(&self) -> Quantity {
        self.free + self.locked
    }
}
