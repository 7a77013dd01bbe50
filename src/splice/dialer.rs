//! Upstream dialing.
//!
//! One fresh TCP connection per forwarded request, to the host named by the
//! request's Host header. Nothing is pooled: the connection is dropped as
//! soon as its exchange ends, so a half-read decoy response can never leak
//! into an unrelated request.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::resilience::timeouts::with_deadline;

/// Port appended to a Host value that does not name one.
pub const HTTP_PORT: u16 = 80;

/// Opening the upstream connection failed.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("Host value {0:?} cannot be dialed")]
    InvalidHost(String),

    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {target}")]
    Timeout { target: String },
}

/// Opens single-use upstream connections.
#[derive(Debug, Clone, Default)]
pub struct UpstreamDialer {
    connect_timeout: Option<Duration>,
}

impl UpstreamDialer {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    /// Connect to the host named by a raw Host header value.
    pub async fn dial(&self, host: &[u8]) -> Result<TcpStream, DialError> {
        let target = dial_target(host)?;

        let stream = with_deadline(self.connect_timeout, TcpStream::connect(target.as_str()))
            .await
            .map_err(|_| DialError::Timeout { target: target.clone() })?
            .map_err(|source| DialError::Connect { target: target.clone(), source })?;

        // Keep the spliced buffer in as few segments as possible.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(target = %target, error = %e, "Could not set TCP_NODELAY");
        }

        tracing::trace!(target = %target, "Upstream connected");
        Ok(stream)
    }
}

/// Turn a Host value into a `host:port` dial target.
///
/// An existing port suffix is trusted verbatim; otherwise port 80 is added.
pub fn dial_target(host: &[u8]) -> Result<String, DialError> {
    let host = std::str::from_utf8(host)
        .map_err(|_| DialError::InvalidHost(String::from_utf8_lossy(host).into_owned()))?;
    if host.is_empty() {
        return Err(DialError::InvalidHost(String::new()));
    }

    if has_port(host) {
        Ok(host.to_string())
    } else {
        Ok(format!("{}:{}", host, HTTP_PORT))
    }
}

fn has_port(host: &str) -> bool {
    match host.strip_prefix('[') {
        Some(bracketed) => bracketed.contains("]:"),
        None => host.contains(':'),
    }
}
