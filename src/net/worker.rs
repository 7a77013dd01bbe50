//! Per-connection relay state machine.
//!
//! # States
//! ```text
//! AwaitRequest ──request──▶ Splicing ──sent──▶ Relaying ──relayed──┐
//!      ▲                        │                  │               │
//!      └────────exchange failed─┴──────────────────┘◀──────────────┘
//!
//! any state ──▶ Closed
//! ```
//!
//! # Failure policy
//! - Anything that goes wrong while reading a client request closes the
//!   connection: the stream can no longer be trusted to sit on a message
//!   boundary.
//! - Anything that goes wrong against the single-use upstream connection
//!   loses only the current request; the client stream is still aligned and
//!   the next request is read normally.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::http::{Frame, FrameError, MessageFramer};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::resilience::timeouts::{self, DeadlineElapsed, Deadlines};
use crate::splice::{DecoySplicer, SpliceError, UpstreamDialer};

/// Everything a worker needs besides its client stream. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub splicer: Arc<DecoySplicer>,
    pub dialer: UpstreamDialer,
    pub deadlines: Deadlines,
}

impl RelayContext {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let deadlines = Deadlines::from_config(&config.timeouts);
        let framer = MessageFramer::new(config.limits.max_header_bytes);
        Self {
            splicer: Arc::new(DecoySplicer::new(framer)),
            dialer: UpstreamDialer::new(deadlines.connect),
            deadlines,
        }
    }
}

impl Default for RelayContext {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

/// Why a client connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its side before sending another complete request.
    ClientDisconnected,
    /// The client sent something that cannot be framed.
    FramingViolation(FrameError),
    /// No request arrived within the idle deadline.
    IdleTimeout,
    /// The relayed response could not be written back.
    ClientWriteFailed(std::io::ErrorKind),
    /// The server is shutting down.
    Shutdown,
}

/// Summary of one connection's life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Requests whose real response reached the client.
    pub relayed: u64,
    /// Requests lost to an upstream failure.
    pub failed: u64,
    pub close: CloseReason,
}

enum State {
    AwaitRequest,
    Splicing(Frame),
    Relaying {
        upstream: BufReader<TcpStream>,
        started: Instant,
        expiry: Option<tokio::time::Instant>,
    },
    Closed(CloseReason),
}

/// Drives one client connection from accept to close.
pub struct ConnectionWorker<S> {
    id: ConnectionId,
    client: BufReader<S>,
    context: RelayContext,
    shutdown: Option<broadcast::Receiver<()>>,
    relayed: u64,
    failed: u64,
}

impl<S> ConnectionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(id: ConnectionId, client: S, context: RelayContext) -> Self {
        Self {
            id,
            client: BufReader::new(client),
            context,
            shutdown: None,
            relayed: 0,
            failed: 0,
        }
    }

    /// Close the connection, instead of reading another request, once
    /// `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Serve requests until the connection closes.
    pub async fn run(mut self) -> WorkerReport {
        let mut state = State::AwaitRequest;
        loop {
            state = match state {
                State::AwaitRequest => self.await_request().await,
                State::Splicing(request) => self.splice(request).await,
                State::Relaying { upstream, started, expiry } => {
                    self.relay(upstream, started, expiry).await
                }
                State::Closed(close) => {
                    return WorkerReport {
                        relayed: self.relayed,
                        failed: self.failed,
                        close,
                    };
                }
            };
        }
    }

    async fn await_request(&mut self) -> State {
        let read = timeouts::with_deadline(
            self.context.deadlines.idle,
            self.context.splicer.framer().read_request(&mut self.client),
        );
        let result = match self.shutdown.as_mut() {
            Some(shutdown) => tokio::select! {
                result = read => result,
                _ = shutdown.recv() => return State::Closed(CloseReason::Shutdown),
            },
            None => read.await,
        };

        match result {
            Ok(Ok(Some(request))) => {
                tracing::debug!(
                    connection_id = %self.id,
                    host = %String::from_utf8_lossy(request.host().unwrap_or_default()),
                    bytes = request.len(),
                    "Request framed"
                );
                State::Splicing(request)
            }
            Ok(Ok(None)) => State::Closed(CloseReason::ClientDisconnected),
            Ok(Err(e)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    kind = e.kind(),
                    error = %e,
                    "Framing violation, closing connection"
                );
                metrics::record_framing_violation(e.kind());
                State::Closed(CloseReason::FramingViolation(e))
            }
            Err(DeadlineElapsed) => {
                tracing::debug!(connection_id = %self.id, "Client idle, closing connection");
                State::Closed(CloseReason::IdleTimeout)
            }
        }
    }

    async fn splice(&mut self, request: Frame) -> State {
        let started = Instant::now();
        let host = request.host().unwrap_or_default();

        let upstream = match self.context.dialer.dial(host).await {
            Ok(stream) => stream,
            Err(e) => return self.abandon(SpliceError::Dial(e), started),
        };

        let expiry = timeouts::expires_at(self.context.deadlines.exchange);
        let mut upstream = BufReader::new(upstream);
        let sent = timeouts::until(expiry, self.context.splicer.send(upstream.get_mut(), &request)).await;

        match sent {
            Ok(Ok(())) => State::Relaying { upstream, started, expiry },
            Ok(Err(e)) => self.abandon(SpliceError::Send(e), started),
            Err(DeadlineElapsed) => self.abandon(SpliceError::Timeout, started),
        }
    }

    async fn relay(
        &mut self,
        mut upstream: BufReader<TcpStream>,
        started: Instant,
        expiry: Option<tokio::time::Instant>,
    ) -> State {
        let received = timeouts::until(expiry, self.context.splicer.receive(&mut upstream)).await;
        let response = match received {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return self.abandon(e, started),
            Err(DeadlineElapsed) => return self.abandon(SpliceError::Timeout, started),
        };

        let client = self.client.get_mut();
        let write = async {
            client.write_all(response.as_bytes()).await?;
            client.flush().await
        };
        let written = timeouts::with_deadline(self.context.deadlines.exchange, write).await;
        drop(upstream);

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %self.id, error = %e, "Client write failed");
                return State::Closed(CloseReason::ClientWriteFailed(e.kind()));
            }
            Err(DeadlineElapsed) => {
                tracing::debug!(connection_id = %self.id, "Client write timed out");
                return State::Closed(CloseReason::ClientWriteFailed(std::io::ErrorKind::TimedOut));
            }
        }

        self.relayed += 1;
        metrics::record_exchange("relayed", started);
        tracing::debug!(connection_id = %self.id, bytes = response.len(), "Response relayed");
        State::AwaitRequest
    }

    /// Drop the current request and go back to reading the next one.
    fn abandon(&mut self, error: SpliceError, started: Instant) -> State {
        self.failed += 1;
        metrics::record_exchange(error.outcome(), started);
        tracing::warn!(
            connection_id = %self.id,
            error = %error,
            "Exchange failed, awaiting next request"
        );
        State::AwaitRequest
    }
}
