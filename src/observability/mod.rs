//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server and workers produce:
//!     → logging.rs (structured log events, connection id in span)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
