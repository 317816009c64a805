//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Check credential material is complete and unambiguous
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EnforcerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::EnforcerConfig;

/// A single semantic problem, with the config path it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &EnforcerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "listener.max_body_bytes",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "`{}` is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    for (i, issuer) in config.credentials.jwt_issuers.iter().enumerate() {
        let field = format!("credentials.jwt_issuers[{}]", i);
        if issuer.issuer.trim().is_empty() {
            errors.push(ValidationError::new(&field, "issuer must not be empty"));
        }
        match (&issuer.secret, &issuer.public_key_file) {
            (Some(_), Some(_)) => errors.push(ValidationError::new(
                &field,
                "set either `secret` or `public_key_file`, not both",
            )),
            (None, None) => errors.push(ValidationError::new(
                &field,
                "one of `secret` or `public_key_file` is required",
            )),
            (Some(secret), None) if secret.is_empty() => {
                errors.push(ValidationError::new(&field, "secret must not be empty"))
            }
            _ => {}
        }
    }

    let mut keys = HashSet::new();
    for (i, entry) in config.credentials.api_keys.iter().enumerate() {
        let field = format!("credentials.api_keys[{}]", i);
        if entry.key.is_empty() {
            errors.push(ValidationError::new(&field, "key must not be empty"));
        } else if !keys.insert(entry.key.as_str()) {
            errors.push(ValidationError::new(&field, "duplicate key"));
        }
        if entry.subject.is_empty() {
            errors.push(ValidationError::new(&field, "subject must not be empty"));
        }
    }

    if config
        .backend_jwt
        .secret
        .as_deref()
        .is_some_and(str::is_empty)
    {
        errors.push(ValidationError::new(
            "backend_jwt.secret",
            "must not be empty when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
