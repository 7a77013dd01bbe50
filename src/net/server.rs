//! Relay server: accept loop and worker spawning.
//!
//! # Responsibilities
//! - Accept client connections from the bounded listener
//! - Spawn one independent worker task per connection
//! - Stop accepting on shutdown and wait for workers to drain

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::worker::{CloseReason, ConnectionWorker, RelayContext};
use crate::resilience::timeouts;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// The relay server.
pub struct ProxyServer {
    config: ProxyConfig,
    context: RelayContext,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let context = RelayContext::from_config(&config);
        Self {
            config,
            context,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle on the live-connection count.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, "Relay accepting connections");

        let mut stop = shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_worker(stream, peer, permit, &shutdown),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    }
                    Err(e) => return Err(e),
                },
                _ = stop.recv() => break,
            }
        }

        let live = self.tracker.active_count();
        tracing::info!(live_connections = live, "Shutdown requested, draining connections");

        let drain = timeouts::from_secs(self.config.timeouts.drain_secs);
        if !self.tracker.wait_for_drain(drain).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain deadline passed, abandoning connections"
            );
        }

        tracing::info!("Relay stopped");
        Ok(())
    }

    fn spawn_worker(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        shutdown: &Shutdown,
    ) {
        let guard = self.tracker.track();
        let id = guard.id();
        let worker = ConnectionWorker::new(id, stream, self.context.clone())
            .with_shutdown(shutdown.subscribe());
        let span = tracing::debug_span!("connection", %id, %peer);

        tokio::spawn(
            async move {
                let report = worker.run().await;
                match &report.close {
                    CloseReason::FramingViolation(_) | CloseReason::ClientWriteFailed(_) => {
                        tracing::info!(
                            relayed = report.relayed,
                            failed = report.failed,
                            close = ?report.close,
                            "Connection closed"
                        );
                    }
                    _ => {
                        tracing::debug!(
                            relayed = report.relayed,
                            failed = report.failed,
                            close = ?report.close,
                            "Connection closed"
                        );
                    }
                }
                drop(guard);
                drop(permit);
            }
            .instrument(span),
        );
    }
}
