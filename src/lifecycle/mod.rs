//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loop stops → idle workers close → drain wait → exit
//! ```
//!
//! # Design Decisions
//! - An exchange already in flight is finished, not cut
//! - Drain has a deadline: remaining connections are abandoned after it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
