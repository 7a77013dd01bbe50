//! Decoy splicing.
//!
//! The decoy request goes out first and the real request rides directly
//! behind it in the same write, so a filter that inspects only the first
//! request of a segment sees the decoy's Host. Upstream answers both; the
//! first response belongs to the decoy and is thrown away.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::http::{Frame, FrameError, MessageFramer};
use crate::resilience::timeouts::with_deadline;
use crate::splice::dialer::DialError;

/// The decoy: a request line with no target and a placeholder Host.
pub const DECOY_REQUEST: &[u8] = b"GET HTTP/1.1\r\nHost: dummy.example.org\r\n\r\n";

/// Which of the two upstream responses an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSlot {
    Decoy,
    Real,
}

impl std::fmt::Display for ResponseSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSlot::Decoy => write!(f, "decoy"),
            ResponseSlot::Real => write!(f, "real"),
        }
    }
}

/// One splice exchange failed. Only the current request is lost.
#[derive(Debug, Error)]
pub enum SpliceError {
    #[error(transparent)]
    Dial(#[from] DialError),

    #[error("failed to send spliced request: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to read {slot} response: {source}")]
    Receive {
        slot: ResponseSlot,
        #[source]
        source: FrameError,
    },

    #[error("exchange deadline elapsed")]
    Timeout,
}

impl SpliceError {
    /// Outcome label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            SpliceError::Dial(_) => "dial_failed",
            SpliceError::Send(_) => "send_failed",
            SpliceError::Receive { .. } => "receive_failed",
            SpliceError::Timeout => "timeout",
        }
    }
}

/// Owns the decoy and performs splice exchanges over upstream connections.
///
/// Holds no mutable state; one instance is shared by every worker.
#[derive(Debug, Clone)]
pub struct DecoySplicer {
    decoy: &'static [u8],
    framer: MessageFramer,
}

impl DecoySplicer {
    pub fn new(framer: MessageFramer) -> Self {
        Self {
            decoy: DECOY_REQUEST,
            framer,
        }
    }

    pub fn decoy(&self) -> &'static [u8] {
        self.decoy
    }

    pub fn framer(&self) -> &MessageFramer {
        &self.framer
    }

    /// The outbound buffer: decoy bytes immediately followed by the request.
    pub fn splice(&self, request: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.decoy.len() + request.len());
        buf.extend_from_slice(self.decoy);
        buf.extend_from_slice(request);
        buf
    }

    /// Write the spliced buffer upstream as a single write.
    pub async fn send<W>(&self, upstream: &mut W, request: &Frame) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = self.splice(request.as_bytes());
        upstream.write_all(&buf).await?;
        upstream.flush().await
    }

    /// Read both responses and return the real one.
    ///
    /// The decoy's response is fully consumed before the real one is parsed
    /// and never leaves this function.
    pub async fn receive<R>(&self, upstream: &mut R) -> Result<Frame, SpliceError>
    where
        R: AsyncBufRead + Unpin,
    {
        let decoy = self
            .framer
            .read_response(upstream)
            .await
            .map_err(|source| SpliceError::Receive { slot: ResponseSlot::Decoy, source })?;
        tracing::trace!(bytes = decoy.len(), "Discarded decoy response");

        self.framer
            .read_response(upstream)
            .await
            .map_err(|source| SpliceError::Receive { slot: ResponseSlot::Real, source })
    }

    /// Send and receive over `upstream`, consuming (and so closing) it.
    pub async fn exchange<S>(
        &self,
        upstream: S,
        request: &Frame,
        deadline: Option<Duration>,
    ) -> Result<Frame, SpliceError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut upstream = BufReader::new(upstream);
        let round_trip = async {
            self.send(upstream.get_mut(), request).await.map_err(SpliceError::Send)?;
            self.receive(&mut upstream).await
        };
        with_deadline(deadline, round_trip)
            .await
            .map_err(|_| SpliceError::Timeout)?
    }
}

impl Default for DecoySplicer {
    fn default() -> Self {
        Self::new(MessageFramer::default())
    }
}
