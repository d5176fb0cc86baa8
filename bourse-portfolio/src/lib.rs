//! Portfolio accounting primitives.

use std::collections::HashMap;
use std::sync::Arc;

use bourse_broker::{PortfolioStore, SharedPosition};
use bourse_core::{AssetId, Position, Quantity};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration used when instantiating a portfolio.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PortfolioConfig {
    /// Starting free balance per asset code.
    #[serde(default)]
    pub initial_balances: HashMap<String, Decimal>,
}

/// Stores live balances keyed by asset.
///
/// Positions are handed out as shared handles; the portfolio keeps the same
/// handle for the lifetime of the asset, so in-place updates made by the
/// simulator are visible here immediately.
#[derive(Default)]
pub struct Portfolio {
    positions: RwLock<HashMap<AssetId, SharedPosition>>,
}

impl Portfolio {
    /// Instantiate a portfolio seeded from configuration.
    pub fn new(config: &PortfolioConfig) -> Self {
        let portfolio = Self::default();
        for (code, amount) in &config.initial_balances {
            portfolio.set_free(AssetId::from(code.as_str()), *amount);
        }
        portfolio
    }

    /// Overwrite the free balance of an asset.
    pub fn set_free(&self, asset: AssetId, amount: Quantity) {
        let handle = self.position(asset);
        handle.lock().free = amount;
        debug!(%asset, %amount, "seeded free balance");
    }

    /// Free balance of an asset, zero when never touched.
    #[must_use]
    pub fn free(&self, asset: AssetId) -> Quantity {
        self.positions
            .read()
            .get(&asset)
            .map(|handle| handle.lock().free)
            .unwrap_or(Decimal::ZERO)
    }

    /// Owned copies of every tracked balance, ordered by asset code.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .positions
            .read()
            .values()
            .map(|handle| handle.lock().clone())
            .collect();
        positions.sort_by(|a, b| a.asset.code().cmp(b.asset.code()));
        positions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}

impl PortfolioStore for Portfolio {
    fn position(&self, asset: AssetId) -> SharedPosition {
        if let Some(handle) = self.positions.read().get(&asset) {
            return handle.clone();
        }
        self.positions
            .write()
            .entry(asset)
            .or_insert_with(|| Arc::new(Mutex::new(Position::flat(asset))))
            .clone()
    }
}
