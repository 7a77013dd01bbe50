//! Message framing.
//!
//! Cuts one HTTP message off a buffered byte stream using nothing but the
//! header lines and an optional `Content-Length`. The same routine frames
//! client requests and upstream responses.
//!
//! # Frame layout
//! ```text
//! <line>\r\n          appended verbatim, scanned for Host / Content-Length
//! <line>\r\n
//! \r\n                end of headers
//! <N body bytes>      only when Content-Length: N with N > 0
//! ```

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::error::FrameError;

/// Default upper bound on the header section of a single message.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

const HOST_PREFIX: &[u8] = b"Host: ";
const CONTENT_LENGTH_PREFIX: &[u8] = b"Content-Length: ";
const BLANK_LINE: &[u8] = b"\r\n";

/// Which direction a frame is read for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Client request: Host is captured and required; stream end is a clean close.
    Request,
    /// Upstream response: Host is ignored; stream end is a failure.
    Response,
}

/// One complete message, byte-for-byte as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    host: Option<Vec<u8>>,
}

impl Frame {
    /// The exact bytes of the message (headers, blank line, body).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The captured Host value. Always present on request frames.
    pub fn host(&self) -> Option<&[u8]> {
        self.host.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reads single messages off a stream.
#[derive(Debug, Clone)]
pub struct MessageFramer {
    max_header_bytes: usize,
}

impl Default for MessageFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_BYTES)
    }
}

impl MessageFramer {
    pub fn new(max_header_bytes: usize) -> Self {
        Self { max_header_bytes }
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    /// Read the next client request.
    ///
    /// `Ok(None)` means the client went away before a complete header section
    /// arrived; there is nothing left to recover on that connection.
    pub async fn read_request<R>(&self, reader: &mut R) -> Result<Option<Frame>, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.parse(reader, FrameMode::Request).await
    }

    /// Read the next upstream response.
    pub async fn read_response<R>(&self, reader: &mut R) -> Result<Frame, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.parse(reader, FrameMode::Response)
            .await?
            .ok_or(FrameError::TruncatedResponse)
    }

    /// Read one message in the given mode.
    ///
    /// The reader is left positioned on the first byte after the frame.
    pub async fn parse<R>(&self, reader: &mut R, mode: FrameMode) -> Result<Option<Frame>, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut bytes = Vec::with_capacity(256);
        let mut host: Option<Vec<u8>> = None;
        let mut content_length: Option<usize> = None;

        loop {
            let start = bytes.len();
            let budget = self.max_header_bytes.saturating_sub(start);
            if budget == 0 {
                return Err(FrameError::HeaderTooLarge { limit: self.max_header_bytes });
            }

            let mut limited = (&mut *reader).take(budget as u64);
            if let Err(e) = limited.read_until(b'\n', &mut bytes).await {
                tracing::debug!(error = %e, ?mode, "Read failed inside header section");
                return end_of_stream(mode);
            }

            let line = &bytes[start..];
            if !line.ends_with(b"\n") {
                if bytes.len() >= self.max_header_bytes {
                    return Err(FrameError::HeaderTooLarge { limit: self.max_header_bytes });
                }
                return end_of_stream(mode);
            }

            if line == BLANK_LINE {
                break;
            }

            if mode == FrameMode::Request {
                if let Some(value) = header_value(line, HOST_PREFIX) {
                    if host.is_some() {
                        return Err(FrameError::DuplicateHost);
                    }
                    host = Some(value.to_vec());
                    continue;
                }
            }

            if let Some(value) = header_value(line, CONTENT_LENGTH_PREFIX) {
                if content_length.is_some() {
                    return Err(FrameError::DuplicateContentLength);
                }
                content_length = Some(parse_content_length(value)?);
            }
        }

        if mode == FrameMode::Request && host.is_none() {
            return Err(FrameError::MissingHost);
        }

        let expected = content_length.unwrap_or(0);
        if expected > 0 {
            let header_len = bytes.len();
            let mut body = (&mut *reader).take(expected as u64);
            if let Err(e) = body.read_to_end(&mut bytes).await {
                tracing::debug!(error = %e, ?mode, "Read failed inside body");
            }
            let received = bytes.len() - header_len;
            if received < expected {
                return Err(FrameError::TruncatedBody { expected, received });
            }
        }

        Ok(Some(Frame { bytes, host }))
    }
}

fn end_of_stream(mode: FrameMode) -> Result<Option<Frame>, FrameError> {
    match mode {
        FrameMode::Request => Ok(None),
        FrameMode::Response => Err(FrameError::TruncatedResponse),
    }
}

/// Value of a header line starting with `prefix`, without the line ending.
fn header_value<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    let value = line.strip_prefix(prefix)?;
    let value = value.strip_suffix(b"\n").unwrap_or(value);
    Some(value.strip_suffix(b"\r").unwrap_or(value))
}

fn parse_content_length(value: &[u8]) -> Result<usize, FrameError> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|text| text.parse::<usize>().ok())
        .ok_or_else(|| FrameError::BadContentLength(String::from_utf8_lossy(value).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn request(input: &mut &[u8]) -> Result<Option<Frame>, FrameError> {
        MessageFramer::default().read_request(input).await
    }

    #[tokio::test]
    async fn header_only_request_stops_after_blank_line() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\nNEXT";
        let frame = request(&mut input).await.unwrap().unwrap();

        assert_eq!(frame.as_bytes(), b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert_eq!(frame.host(), Some(&b"example.com"[..]));
        assert_eq!(input, b"NEXT");
    }

    #[tokio::test]
    async fn body_is_exactly_content_length_bytes() {
        let mut input: &[u8] =
            b"POST /f HTTP/1.1\r\nHost: a.test\r\nContent-Length: 3\r\n\r\nabcdef";
        let frame = request(&mut input).await.unwrap().unwrap();

        assert!(frame.as_bytes().ends_with(b"\r\n\r\nabc"));
        assert_eq!(input, b"def");
    }

    #[tokio::test]
    async fn explicit_zero_length_has_no_body() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\nContent-Length: 0\r\n\r\nX";
        let frame = request(&mut input).await.unwrap().unwrap();

        assert!(frame.as_bytes().ends_with(b"\r\n\r\n"));
        assert_eq!(input, b"X");
    }

    #[tokio::test]
    async fn short_body_is_truncated() {
        let mut input: &[u8] = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 10\r\n\r\nabc";
        assert_eq!(
            request(&mut input).await,
            Err(FrameError::TruncatedBody { expected: 10, received: 3 })
        );
    }

    #[tokio::test]
    async fn two_host_headers_rejected() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\nHost: b\r\n\r\n";
        assert_eq!(request(&mut input).await, Err(FrameError::DuplicateHost));
    }

    #[tokio::test]
    async fn missing_host_rejected() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n";
        assert_eq!(request(&mut input).await, Err(FrameError::MissingHost));
    }

    #[tokio::test]
    async fn duplicate_content_length_rejected_even_when_zero() {
        let mut input: &[u8] =
            b"GET / HTTP/1.1\r\nHost: a\r\nContent-Length: 0\r\nContent-Length: 0\r\n\r\n";
        assert_eq!(request(&mut input).await, Err(FrameError::DuplicateContentLength));
    }

    #[tokio::test]
    async fn non_numeric_content_length_rejected() {
        let mut input: &[u8] = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: abc\r\n\r\n";
        assert_eq!(
            request(&mut input).await,
            Err(FrameError::BadContentLength("abc".into()))
        );

        let mut input: &[u8] = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: -4\r\n\r\n";
        assert!(matches!(
            request(&mut input).await,
            Err(FrameError::BadContentLength(_))
        ));
    }

    #[tokio::test]
    async fn clean_close_means_no_request() {
        let mut input: &[u8] = b"";
        assert_eq!(request(&mut input).await, Ok(None));

        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\n";
        assert_eq!(request(&mut input).await, Ok(None));
    }

    #[tokio::test]
    async fn header_prefixes_are_exact() {
        // Lowercase names are carried through but not interpreted.
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nhost: a\r\nHost: b\r\ncontent-length: 9\r\n\r\n";
        let frame = request(&mut input).await.unwrap().unwrap();
        assert_eq!(frame.host(), Some(&b"b"[..]));
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn response_mode_ignores_host() {
        let framer = MessageFramer::default();
        let mut input: &[u8] = b"HTTP/1.0 200 OK\r\nHost: a\r\nHost: b\r\nContent-Length: 2\r\n\r\nhi";
        let frame = framer.read_response(&mut input).await.unwrap();

        assert_eq!(frame.host(), None);
        assert!(frame.as_bytes().ends_with(b"hi"));
    }

    #[tokio::test]
    async fn response_mode_close_is_truncation() {
        let framer = MessageFramer::default();

        let mut input: &[u8] = b"";
        assert_eq!(framer.read_response(&mut input).await, Err(FrameError::TruncatedResponse));

        let mut input: &[u8] = b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n";
        assert_eq!(framer.read_response(&mut input).await, Err(FrameError::TruncatedResponse));
    }

    #[tokio::test]
    async fn oversized_header_section_rejected() {
        let framer = MessageFramer::new(32);
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\nX-Padding: aaaaaaaaaaaaaaaa\r\n\r\n";
        assert_eq!(
            framer.read_request(&mut input).await,
            Err(FrameError::HeaderTooLarge { limit: 32 })
        );
    }

    #[tokio::test]
    async fn frames_are_read_back_to_back() {
        let framer = MessageFramer::default();
        let mut input: &[u8] =
            b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\nHTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nHello";

        let first = framer.read_response(&mut input).await.unwrap();
        let second = framer.read_response(&mut input).await.unwrap();

        assert_eq!(first.as_bytes(), b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(second.as_bytes(), b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nHello");
        assert!(input.is_empty());
    }
}
