//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line (binary)
//!     → schema.rs (ProxyConfig, defaults for everything unset)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to ProxyServer, which derives per-worker settings
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server starts
//! - All fields have defaults so an empty command line is a valid setup
//! - The decoy request is a constant, never configuration

pub mod schema;
pub mod validation;

pub use schema::{
    LimitConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig, DEFAULT_PORT,
};
pub use validation::{validate_config, ValidationError};
