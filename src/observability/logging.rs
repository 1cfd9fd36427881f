//! Structured logging.
//!
//! # Design Decisions
//! - `tracing` events with key/value fields throughout the crate
//! - `RUST_LOG` wins over the configured level when set
//! - Initialisation is idempotent so tests and demos can both call it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `level` is used when `RUST_LOG` is unset.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("arbor={level},tower_http={level}")));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(level, "Logging initialised");
    }
}
