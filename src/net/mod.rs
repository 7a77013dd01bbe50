//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limit)
//!     → server.rs (one spawned task per connection)
//!     → connection.rs (id, live-connection tracking)
//!     → worker.rs (AwaitRequest → Splicing → Relaying → AwaitRequest … → Closed)
//! ```
//!
//! # Design Decisions
//! - Workers share nothing mutable; the splicer is behind an `Arc`
//! - At most one upstream connection and one request in flight per worker
//! - Bounded accept prevents resource exhaustion

pub mod connection;
pub mod listener;
pub mod server;
pub mod worker;

pub use listener::{Listener, ListenerError};
pub use server::ProxyServer;
pub use worker::{CloseReason, ConnectionWorker, RelayContext, WorkerReport};
