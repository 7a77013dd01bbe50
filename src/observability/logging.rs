//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable through `RUST_LOG`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Filter applying `level` to this crate and `warn` to everything else.
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::new(format!("warn,site_unblock={level}"))
}

