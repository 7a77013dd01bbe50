//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of values the command line cannot type-check
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before the listener binds

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("bind address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("max_header_bytes must be greater than zero")]
    ZeroMaxHeaderBytes,

    #[error("metrics address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.limits.max_header_bytes == 0 {
        errors.push(ValidationError::ZeroMaxHeaderBytes);
    }
    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn all_errors_reported() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.listener.max_connections = 0;
        config.limits.max_header_bytes = 0;
        config.observability.metrics_address = Some("9090".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("nowhere".into()),
                ValidationError::ZeroMaxConnections,
                ValidationError::ZeroMaxHeaderBytes,
                ValidationError::MetricsAddress("9090".into()),
            ]
        );
    }
}
