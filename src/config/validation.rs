//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges and cross-section consistency
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use std::net::SocketAddr;

use hyper::Method;

use crate::config::schema::{ListenerMode, RelayConfig};
use crate::routing::RoutePattern;

/// A single semantic problem found in a config.
#[derive(Debug)]
pub enum ValidationError {
    InvalidBindAddress(String),
    InvalidMetricsAddress(String),
    ZeroMaxConnections,
    InvalidUpstream(String),
    InvalidRoutePattern { pattern: String, reason: String },
    InvalidMethod { pattern: String, method: String },
    NoRoutes,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "listener.bind_address {:?} is not a socket address", addr)
            }
            ValidationError::InvalidMetricsAddress(addr) => {
                write!(f, "observability.metrics_address {:?} is not a socket address", addr)
            }
            ValidationError::ZeroMaxConnections => {
                write!(f, "listener.max_connections must be greater than zero")
            }
            ValidationError::InvalidUpstream(url) => {
                write!(f, "forward.upstream {:?} is not an http URL", url)
            }
            ValidationError::InvalidRoutePattern { pattern, reason } => {
                write!(f, "route pattern {:?}: {}", pattern, reason)
            }
            ValidationError::InvalidMethod { pattern, method } => {
                write!(f, "route {:?}: unknown method {:?}", pattern, method)
            }
            ValidationError::NoRoutes => {
                write!(f, "http mode requires at least one route")
            }
        }
    }
}

/// Validate a deserialized config, collecting every problem.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.listener.mode == ListenerMode::Http {
        if config.routes.is_empty() {
            errors.push(ValidationError::NoRoutes);
        }

        match url::Url::parse(&config.forward.upstream) {
            Ok(url) if url.scheme() == "http" => {}
            _ => errors.push(ValidationError::InvalidUpstream(config.forward.upstream.clone())),
        }

        for route in &config.routes {
            if let Err(err) = RoutePattern::parse(&route.pattern) {
                errors.push(ValidationError::InvalidRoutePattern {
                    pattern: route.pattern.clone(),
                    reason: err.to_string(),
                });
            }
            for method in &route.methods {
                if Method::from_bytes(method.as_bytes()).is_err() {
                    errors.push(ValidationError::InvalidMethod {
                        pattern: route.pattern.clone(),
                        method: method.clone(),
                    });
                }
            }
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
    use crate::config::schema::{RouteAction, RouteConfig};

    fn http_config_with_route() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.routes.push(RouteConfig {
            pattern: "/api/*".to_string(),
            methods: vec!["GET".to_string()],
            action: RouteAction::Forward,
        });
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate_config(&http_config_with_route()).is_ok());
    }

    #[test]
    fn rejects_http_mode_without_routes() {
        let config = RelayConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoRoutes)));
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = http_config_with_route();
        config.listener.bind_address = "not-an-address".to_string();
        config.listener.max_connections = 0;
        config.forward.upstream = "ftp://nope".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn rejects_interior_wildcard() {
        let mut config = http_config_with_route();
        config.routes.push(RouteConfig {
            pattern: "/a/*/b".to_string(),
            methods: vec![],
            action: RouteAction::Forward,
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidRoutePattern { .. })));
    }
}
