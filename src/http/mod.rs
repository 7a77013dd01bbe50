//! HTTP message framing subsystem.
//!
//! # Data Flow
//! ```text
//! client stream   → framer.rs (FrameMode::Request)  → Frame + Host
//! upstream stream → framer.rs (FrameMode::Response) → Frame
//! ```
//!
//! # Design Decisions
//! - Frames are raw bytes; nothing is re-serialised on the way through
//! - Only `Host: ` and `Content-Length: ` lines are interpreted
//! - No chunked transfer-encoding, no keep-alive negotiation

pub mod error;
pub mod framer;

pub use error::FrameError;
pub use framer::{Frame, FrameMode, MessageFramer, DEFAULT_MAX_HEADER_BYTES};
