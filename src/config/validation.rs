//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Route manifest integrity (ids, parents, index and splat rules)
//! - Session cookie secret requirements
//! - Value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::cookies::crypto::MIN_ENCRYPTION_SECRET_LEN;
use crate::routing::tree::check_routes;
use crate::routing::RouteTreeError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("routes: {0}")]
    Route(#[from] RouteTreeError),

    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    RequestTimeout,

    #[error("security.max_body_size must be greater than zero")]
    BodySize,

    #[error("basename `{0}` must start with `/`")]
    Basename(String),

    #[error("sessions.cookie.name must not be empty")]
    SessionCookieName,

    #[error("sessions.cookie.encrypt requires at least one secret")]
    MissingSecret,

    #[error("sessions.cookie.secrets must be at least {MIN_ENCRYPTION_SECRET_LEN} bytes when encrypting")]
    WeakSecret,
}

/// Check a parsed config; collects every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors: Vec<ValidationError> = check_routes(&config.routes)
        .into_iter()
        .map(ValidationError::from)
        .collect();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::BodySize);
    }

    if let Some(basename) = &config.basename {
        if !basename.starts_with('/') {
            errors.push(ValidationError::Basename(basename.clone()));
        }
    }

    let cookie = &config.sessions.cookie;
    if cookie.name.trim().is_empty() {
        errors.push(ValidationError::SessionCookieName);
    }
    if cookie.encrypt {
        if cookie.secrets.is_empty() {
            errors.push(ValidationError::MissingSecret);
        } else if cookie.secrets.iter().any(|s| s.len() < MIN_ENCRYPTION_SECRET_LEN) {
            errors.push(ValidationError::WeakSecret);
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
    use crate::routing::RouteDefinition;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.timeouts.request_secs = 0;
        config.basename = Some("app".into());
        config.sessions.cookie.encrypt = true;
        config.sessions.cookie.secrets = vec!["short".into()];
        config.routes = vec![
            RouteDefinition::new("root").path("/"),
            RouteDefinition::new("orphan").parent("missing"),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Route(RouteTreeError::MissingParent {
                    route: "orphan".into(),
                    parent: "missing".into(),
                }),
                ValidationError::BindAddress("nowhere".into()),
                ValidationError::RequestTimeout,
                ValidationError::Basename("app".into()),
                ValidationError::WeakSecret,
            ]
        );
    }

    #[test]
    fn test_encrypt_without_secrets() {
        let mut config = ServerConfig::default();
        config.sessions.cookie.encrypt = true;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::MissingSecret]));
    }
}
