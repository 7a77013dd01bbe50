//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming client connections
//! - Enforce max_connections limit via semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// The connection limit semaphore was closed.
    #[error("Listener closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, accepting waits until a worker finishes.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_tcp(listener, config.max_connections))
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(inner: TcpListener, max_connections: usize) -> Self {
        if let Ok(addr) = inner.local_addr() {
            tracing::info!(address = %addr, max_connections, "Listener bound");
        }

        Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_released_on_drop() {
        let config = ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 2,
        };
        let listener = Listener::bind(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), 2);
        assert_eq!(listener.max_connections(), 2);
    }

    #[tokio::test]
    async fn bad_address_is_bind_error() {
        let config = ListenerConfig {
            bind_address: "not-an-address".into(),
            max_connections: 1,
        };
        assert!(matches!(Listener::bind(&config).await, Err(ListenerError::Bind(_))));
    }
}
