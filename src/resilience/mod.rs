//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Worker phase:
//!     AwaitRequest → timeouts.rs (idle deadline)
//!     Splicing     → timeouts.rs (connect deadline, then exchange deadline)
//!     Relaying     → timeouts.rs (remainder of the exchange deadline)
//! ```
//!
//! # Design Decisions
//! - Every wait on a peer has a deadline unless explicitly disabled
//! - No retries: a failed exchange is only retried by the client sending again

pub mod timeouts;
