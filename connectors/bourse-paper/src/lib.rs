//! Candle-driven exchange simulator used by backtests.
//!
//! [`ExchangeEventSimulator::simulate`] plays the role of the exchange for one
//! candle: it confirms pending openings, acknowledges pending cancellations and
//! fills opened orders whose trigger the candle reaches, then repeats over the
//! live orders until nothing is left awaiting resolution for that candle.

pub mod positions;
pub mod priority;
pub mod rules;

use bourse_broker::{ExchangeListener, OrderStore, PortfolioStore};
use bourse_core::{Candle, OrderId, TradeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, debug_span, info};
use uuid::Uuid;

pub use positions::balance_deltas;
pub use rules::{FillTrigger, Transition};

/// Convenience alias for simulator results.
pub type SimulatorResult<T> = Result<T, SimulatorError>;

/// Faults that abort a `simulate` call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulatorError {
    /// A live order points at a trade the store does not know.
    #[error("order {order_id} references unknown trade {trade_id}")]
    TradeNotFound { order_id: OrderId, trade_id: TradeId },
    /// Orders kept awaiting resolution after the configured number of passes.
    #[error("candle did not settle after {passes} passes")]
    PassLimitExceeded { passes: usize },
    /// A fill's notional or resulting free balance exceeds the decimal range.
    #[error("balance update for order '{client_order_id}' overflows")]
    BalanceOverflow { client_order_id: String },
}

/// What to do when an order disappears between the pass snapshot and its turn.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingOrderPolicy {
    /// Stop the current pass; the next pass re-reads the store.
    #[default]
    AbandonPass,
    /// Skip only the vanished order and continue the pass.
    SkipOrder,
}

/// Simulator tuning.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub missing_order_policy: MissingOrderPolicy,
    /// Upper bound on passes per candle. `None` iterates until the candle settles.
    #[serde(default)]
    pub max_passes: Option<usize>,
}

/// Counters describing one `simulate` call.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SimulationReport {
    pub passes: usize,
    pub confirmed: usize,
    pub canceled: usize,
    pub filled: usize,
    pub abandoned_passes: usize,
    pub skipped_orders: usize,
}

impl SimulationReport {
    /// Total number of order updates emitted.
    #[must_use]
    pub fn transitions(&self) -> usize {
        self.confirmed + self.canceled + self.filled
    }
}

/// Simulated exchange reacting to live orders one candle at a time.
pub struct ExchangeEventSimulator<O, P, L> {
    orders: O,
    portfolio: P,
    listener: L,
    config: SimulatorConfig,
    run_id: Option<Uuid>,
}

impl<O, P, L> ExchangeEventSimulator<O, P, L>
where
    O: OrderStore,
    P: PortfolioStore,
    L: ExchangeListener,
{
    /// Create a simulator with default settings.
    pub fn new(orders: O, portfolio: P, listener: L) -> Self {
        Self::with_config(orders, portfolio, listener, SimulatorConfig::default())
    }

    pub fn with_config(orders: O, portfolio: P, listener: L, config: SimulatorConfig) -> Self {
        Self {
            orders,
            portfolio,
            listener,
            config,
            run_id: None,
        }
    }

    /// Tag every subsequent `simulate` span with a backtest run identifier.
    pub fn set_run_id(&mut self, run_id: Uuid) {
        self.run_id = Some(run_id);
    }

    #[must_use]
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    #[must_use]
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    pub fn portfolio(&self) -> &P {
        &self.portfolio
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Run passes over the live orders until none awaits resolution for `candle`.
    pub fn simulate(&self, candle: &Candle) -> SimulatorResult<SimulationReport> {
        let span = debug_span!("simulate", close_time = %candle.close_time, run_id = ?self.run_id);
        let _entered = span.enter();

        let mut report = SimulationReport::default();
        loop {
            self.run_pass(candle, &mut report)?;
            report.passes += 1;
            if !self.awaits_resolution() {
                break;
            }
            if let Some(limit) = self.config.max_passes {
                if report.passes >= limit {
                    return Err(SimulatorError::PassLimitExceeded {
                        passes: report.passes,
                    });
                }
            }
        }
        debug!(
            passes = report.passes,
            confirmed = report.confirmed,
            canceled = report.canceled,
            filled = report.filled,
            "candle settled"
        );
        Ok(report)
    }

    fn run_pass(&self, candle: &Candle, report: &mut SimulationReport) -> SimulatorResult<()> {
        for id in self.prioritized_order_ids() {
            let Some(order) = self.orders.order(id) else {
                match self.config.missing_order_policy {
                    MissingOrderPolicy::AbandonPass => {
                        debug!(order_id = %id, "order left the live cache; abandoning pass");
                        report.abandoned_passes += 1;
                        break;
                    }
                    MissingOrderPolicy::SkipOrder => {
                        debug!(order_id = %id, "order left the live cache; skipping");
                        report.skipped_orders += 1;
                        continue;
                    }
                }
            };
            let trade = self
                .orders
                .trade(order.trade_id)
                .ok_or(SimulatorError::TradeNotFound {
                    order_id: order.id,
                    trade_id: order.trade_id,
                })?;

            let Some(transition) = rules::evaluate(&order, candle) else {
                continue;
            };
            let update = rules::build_update(&order, &trade, transition, candle);
            match transition {
                Transition::Confirm => {
                    debug!(%candle, order_id = %order.id, "confirming order");
                    report.confirmed += 1;
                }
                Transition::Cancel => {
                    debug!(%candle, order_id = %order.id, "cancelling order");
                    report.canceled += 1;
                }
                Transition::Fill(trigger) => {
                    info!(
                        %candle,
                        order_id = %order.id,
                        order_type = %order.order_type(),
                        side = %order.side,
                        price = %update.price,
                        qty = %update.cum_executed_qty,
                        ?trigger,
                        "filling order"
                    );
                    report.filled += 1;
                }
            }
            self.listener.on_order_update(&update);
            if update.is_fill() {
                positions::apply_fill(&self.portfolio, &self.listener, &update)?;
            }
        }
        Ok(())
    }

    fn prioritized_order_ids(&self) -> Vec<OrderId> {
        let mut orders: Vec<_> = self
            .orders
            .live_order_ids()
            .into_iter()
            .filter_map(|id| self.orders.order(id))
            .collect();
        priority::prioritize(&mut orders);
        orders.into_iter().map(|order| order.id).collect()
    }

    fn awaits_resolution(&self) -> bool {
        self.orders
            .live_orders()
            .iter()
            .any(|order| order.awaits_resolution())
    }
}
