use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use bourse_broker::{ExchangeListener, ListenerFanout};
use bourse_config::{load_config_from, AppConfig};
use bourse_core::Candle;
use bourse_execution::LiveOrderCache;
use bourse_paper::{ExchangeEventSimulator, SimulationReport, SimulatorResult};
use bourse_portfolio::Portfolio;
use tracing::info;
use uuid::Uuid;

use crate::telemetry;

/// Simulator wired to in-memory order and balance stores.
pub type CacheSimulator = ExchangeEventSimulator<Arc<LiveOrderCache>, Arc<Portfolio>, ListenerFanout>;

/// One backtest run: an order cache, a portfolio and the simulator driving both.
///
/// The cache is always the first listener so it has applied each update
/// before any observer registered later sees it.
pub struct SimulationSession {
    run_id: Uuid,
    cache: Arc<LiveOrderCache>,
    portfolio: Arc<Portfolio>,
    simulator: CacheSimulator,
}

impl SimulationSession {
    /// Load configuration from `config_dir`, install tracing and build a session.
    pub fn bootstrap(
        config_dir: &Path,
        env: Option<&str>,
        observers: impl IntoIterator<Item = Arc<dyn ExchangeListener>>,
    ) -> Result<Self> {
        let config = load_config_from(config_dir, env)?;
        telemetry::init_from_config(&config)?;
        Ok(Self::from_config(&config, observers))
    }

    /// Build a session from configuration, notifying `observers` after the cache.
    pub fn from_config(
        config: &AppConfig,
        observers: impl IntoIterator<Item = Arc<dyn ExchangeListener>>,
    ) -> Self {
        let run_id = Uuid::new_v4();
        let cache = Arc::new(LiveOrderCache::new(config.orders));
        let portfolio = Arc::new(Portfolio::new(&config.portfolio_config()));

        let mut listener = ListenerFanout::new().with(cache.clone());
        for observer in observers {
            listener.push(observer);
        }
        let mut simulator = ExchangeEventSimulator::with_config(
            cache.clone(),
            portfolio.clone(),
            listener,
            config.simulator.clone(),
        );
        simulator.set_run_id(run_id);
        info!(
            %run_id,
            policy = ?config.simulator.missing_order_policy,
            max_passes = ?config.simulator.max_passes,
            assets = portfolio.len(),
            "simulation session created"
        );

        Self {
            run_id,
            cache,
            portfolio,
            simulator,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cache(&self) -> &Arc<LiveOrderCache> {
        &self.cache
    }

    pub fn portfolio(&self) -> &Arc<Portfolio> {
        &self.portfolio
    }

    pub fn simulator(&self) -> &CacheSimulator {
        &self.simulator
    }

    /// Settle every candle in order, stopping at the first failure.
    pub fn run<'a>(
        &self,
        candles: impl IntoIterator<Item = &'a Candle>,
    ) -> SimulatorResult<Vec<SimulationReport>> {
        let reports = candles
            .into_iter()
            .map(|candle| self.simulator.simulate(candle))
            .collect::<SimulatorResult<Vec<_>>>()?;
        info!(run_id = %self.run_id, candles = reports.len(), "simulation finished");
        Ok(reports)
    }
}
