//! Decoy-splicing HTTP relay library.
//!
//! Every client request is sent upstream glued behind a fixed decoy request
//! in one write; the decoy's response is read and dropped before the real
//! response is relayed back to the client.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod splice;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use net::server::ProxyServer;
