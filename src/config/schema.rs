//! Configuration schema definitions.
//!
//! There is no configuration file; the binary fills these from its
//! command line and everything else falls back to `Default`.

use crate::http::DEFAULT_MAX_HEADER_BYTES;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Root configuration for the relay.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Deadlines for each worker phase.
    pub timeouts: TimeoutConfig,

    /// Framing limits.
    pub limits: LimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration. Zero disables a deadline.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed to send the spliced request and read both responses.
    pub exchange_secs: u64,

    /// Time a client connection may sit without sending a request.
    pub idle_secs: u64,

    /// How long shutdown waits for live connections to finish.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            exchange_secs: 30,
            idle_secs: 60,
            drain_secs: 10,
        }
    }
}

/// Framing limits.
#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Largest header section accepted from either peer.
    pub max_header_bytes: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus scrape address; metrics export is off when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}
