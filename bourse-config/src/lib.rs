//! Layered configuration loading utilities.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use bourse_execution::OrderCacheConfig;
use bourse_paper::SimulatorConfig;
use bourse_portfolio::PortfolioConfig;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

mod deserializer;

/// Root application configuration deserialized from layered sources.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON log file written alongside stdout when set.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub portfolio: PortfolioSection,
    #[serde(default)]
    pub orders: OrderCacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_path: None,
            simulator: SimulatorConfig::default(),
            portfolio: PortfolioSection::default(),
            orders: OrderCacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Portfolio settings with asset codes already normalised.
    #[must_use]
    pub fn portfolio_config(&self) -> PortfolioConfig {
        PortfolioConfig {
            initial_balances: self.portfolio.initial_balances.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct PortfolioSection {
    #[serde(default, with = "deserializer::uppercase_key")]
    pub initial_balances: HashMap<String, Decimal>,
}

fn default_log_level() -> String {
    "info".into()
}

/// Loads configuration by merging files and environment variables.
///
/// Order of precedence (lowest to highest):
/// 1. `config/default.toml`
/// 2. `config/{env}.toml` (if provided)
/// 3. `config/local.toml` (ignored if missing)
/// 4. Environment variables prefixed with `BOURSE__`
pub fn load_config(env: Option<&str>) -> Result<AppConfig> {
    load_config_from(Path::new("config"), env)
}

/// Same as [`load_config`] with the configuration directory supplied by the caller.
pub fn load_config_from(base_path: &Path, env: Option<&str>) -> Result<AppConfig> {
    let mut builder =
        Config::builder().add_source(File::from(base_path.join("default.toml")).required(true));
    if let Some(env_name) = env {
        builder = builder
            .add_source(File::from(base_path.join(format!("{env_name}.toml"))).required(false));
    }

    builder = builder.add_source(File::from(base_path.join("local.toml")).required(false));

    builder = builder.add_source(
        Environment::with_prefix("BOURSE")
            .prefix_separator("__")
            .separator("__")
            .ignore_empty(true),
    );

    let config = builder.build()?;
    config
        .try_deserialize()
        .map_err(|err: ConfigError| err.into())
}
