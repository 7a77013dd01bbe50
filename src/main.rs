//! site-unblock: decoy-splicing HTTP relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                        RELAY                         │
//!   Client request    │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   ──────────────────┼─▶│ listener │──▶│  worker  │──▶│ framer (request) │  │
//!                     │  └──────────┘   └────┬─────┘   └──────────────────┘  │
//!                     │                      │                               │
//!                     │                      ▼                               │
//!                     │               ┌──────────────┐  decoy ++ request     │
//!                     │               │ dialer +     │───────────────────────┼──▶ Host
//!                     │               │ decoy splice │◀──────────────────────┼─── 2 responses
//!                     │               └──────┬───────┘                       │
//!   Real response     │                      │ response #1 dropped          │
//!   ◀─────────────────┼──────────────────────┘ response #2 relayed          │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use site_unblock::config::{validate_config, ProxyConfig, DEFAULT_PORT};
use site_unblock::lifecycle::{signals, Shutdown};
use site_unblock::net::{Listener, ProxyServer};
use site_unblock::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP relay that splices a decoy request in front of every request")]
struct Args {
    /// Port to listen on.
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, default_value_t = 10_000)]
    max_connections: usize,

    /// Upstream connect timeout in seconds (0 disables).
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,

    /// Timeout for sending a request and reading both responses (0 disables).
    #[arg(long, default_value_t = 30)]
    exchange_timeout: u64,

    /// How long a client may stay silent between requests (0 disables).
    #[arg(long, default_value_t = 60)]
    idle_timeout: u64,

    #[arg(long, default_value_t = site_unblock::http::DEFAULT_MAX_HEADER_BYTES)]
    max_header_bytes: usize,

    /// Prometheus scrape address, e.g. 127.0.0.1:9090.
    #[arg(long)]
    metrics_address: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, short = 'v')]
    verbose: bool,

    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = format!("{}:{}", self.bind, self.port);
        config.listener.max_connections = self.max_connections;
        config.timeouts.connect_secs = self.connect_timeout;
        config.timeouts.exchange_secs = self.exchange_timeout;
        config.timeouts.idle_secs = self.idle_timeout;
        config.limits.max_header_bytes = self.max_header_bytes;
        config.observability.metrics_address = self.metrics_address;
        config.observability.log_level = if self.quiet {
            "error".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
        };
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config();

    logging::init_logging(&config.observability.log_level);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        std::process::exit(2);
    }

    tracing::info!("site-unblock v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        connect_secs = config.timeouts.connect_secs,
        exchange_secs = config.timeouts.exchange_secs,
        idle_secs = config.timeouts.idle_secs,
        max_header_bytes = config.limits.max_header_bytes,
        "Configuration loaded"
    );

    if let Some(addr) = &config.observability.metrics_address {
        metrics::init_metrics(addr.parse()?)?;
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match signals::wait_for_signal().await {
            Ok(signal) => {
                tracing::info!(signal, "Shutdown signal received");
                trigger.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });

    ProxyServer::new(config).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
