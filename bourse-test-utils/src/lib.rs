//! Utilities for exercising the bourse simulator end to end.

pub mod fixtures;
pub mod recorder;

pub use fixtures::{base_time, candle, candle_at, trade, OrderBuilder};
pub use recorder::{RecordedEvent, RecordingListener};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn` so passing tests stay quiet.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
