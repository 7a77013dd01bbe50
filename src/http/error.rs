//! Framing failures.

use thiserror::Error;

/// A message could not be cut out of the byte stream.
///
/// On the client side every variant means the stream is no longer aligned on
/// message boundaries. On the upstream side the same variants only spoil the
/// exchange they occurred in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("request carries more than one Host header")]
    DuplicateHost,

    #[error("request carries no Host header")]
    MissingHost,

    #[error("message carries more than one Content-Length header")]
    DuplicateContentLength,

    #[error("Content-Length value {0:?} is not a non-negative integer")]
    BadContentLength(String),

    #[error("body ended after {received} of {expected} bytes")]
    TruncatedBody { expected: usize, received: usize },

    #[error("upstream closed before the response headers were complete")]
    TruncatedResponse,

    #[error("header section exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },
}

impl FrameError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::DuplicateHost => "duplicate_host",
            FrameError::MissingHost => "missing_host",
            FrameError::DuplicateContentLength => "duplicate_content_length",
            FrameError::BadContentLength(_) => "bad_content_length",
            FrameError::TruncatedBody { .. } => "truncated_body",
            FrameError::TruncatedResponse => "truncated_response",
            FrameError::HeaderTooLarge { .. } => "header_too_large",
        }
    }
}
