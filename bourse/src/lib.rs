//! Bourse aggregate crate that re-exports the main components for downstream users.

pub mod session;
pub mod telemetry;

pub use bourse_broker as broker;
pub use bourse_config as config;
pub use bourse_core as core;
pub use bourse_execution as execution;
pub use bourse_paper as paper;
pub use bourse_portfolio as portfolio;

pub use session::SimulationSession;

/// Convenience prelude to pull commonly used items into scope.
pub mod prelude {
    pub use crate::session::SimulationSession;
    pub use bourse_broker::*;
    pub use bourse_config::{load_config, AppConfig};
    pub use bourse_core::*;
    pub use bourse_execution::*;
    pub use bourse_paper::*;
    pub use bourse_portfolio::*;
}
