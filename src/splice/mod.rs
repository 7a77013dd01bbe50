//! Decoy splice subsystem.
//!
//! # Data Flow
//! ```text
//! request Frame (with Host)
//!     → dialer.rs (fresh TcpStream to Host, :80 when no port)
//!     → decoy.rs send    (DECOY_REQUEST ++ request, one write)
//!     → decoy.rs receive (response #1 dropped, response #2 returned)
//!     → upstream dropped
//! ```
//!
//! # Design Decisions
//! - Exactly one decoy per request
//! - Upstream connections are single-use, never pooled or shared
//! - Any failure voids the whole exchange; nothing partial is relayed

pub mod decoy;
pub mod dialer;

pub use decoy::{DecoySplicer, ResponseSlot, SpliceError, DECOY_REQUEST};
pub use dialer::{dial_target, DialError, UpstreamDialer, HTTP_PORT};
