//! Deadline enforcement.
//!
//! # Responsibilities
//! - Bound how long a worker waits for the next client request
//! - Bound upstream connect and the splice exchange
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A zero-second setting disables the deadline
//! - Expiry is its own error, distinct from I/O failures

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::TimeoutConfig;

/// A deadline expired before the guarded operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline elapsed")]
pub struct DeadlineElapsed;

/// Per-connection deadlines derived from [`TimeoutConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadlines {
    /// Dialing the upstream host.
    pub connect: Option<Duration>,
    /// Sending the spliced buffer and reading both responses.
    pub exchange: Option<Duration>,
    /// Waiting for the next client request.
    pub idle: Option<Duration>,
}

impl Deadlines {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            connect: from_secs(config.connect_secs),
            exchange: from_secs(config.exchange_secs),
            idle: from_secs(config.idle_secs),
        }
    }
}

/// Seconds to an optional duration, treating zero as "no deadline".
pub fn from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// The instant a deadline of `limit` starting now expires at.
pub fn expires_at(limit: Option<Duration>) -> Option<Instant> {
    limit.map(|limit| Instant::now() + limit)
}

/// Run `fut` until it completes or `expiry` passes.
pub async fn until<F>(expiry: Option<Instant>, fut: F) -> Result<F::Output, DeadlineElapsed>
where
    F: Future,
{
    match expiry {
        Some(at) => tokio::time::timeout_at(at, fut).await.map_err(|_| DeadlineElapsed),
        None => Ok(fut.await),
    }
}

/// Run `fut` for at most `limit`.
pub async fn with_deadline<F>(limit: Option<Duration>, fut: F) -> Result<F::Output, DeadlineElapsed>
where
    F: Future,
{
    until(expires_at(limit), fut).await
}
