//! Configuration schema definitions.
//!
//! This module defines the process-level configuration of the enforcer.
//! Per-API settings live in descriptor files (see `api::descriptor`).
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filter::auth::ApiKeyEntry;

/// Root configuration for the enforcer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EnforcerConfig {
    /// Listener configuration for the decision endpoint.
    pub listener: ListenerConfig,

    /// Where API descriptors are loaded from.
    pub apis: ApisConfig,

    /// Analytics publishing.
    pub analytics: AnalyticsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Trusted token issuers and issued API keys.
    pub credentials: CredentialsConfig,

    /// Signing material for tokens forwarded to backends.
    pub backend_jwt: BackendJwtSigningConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9095").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest accepted request description, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9095".to_string(),
            request_timeout_secs: 10,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// API descriptor source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApisConfig {
    /// Directory scanned for `*.toml` descriptors.
    pub directory: PathBuf,

    /// Reload descriptors when the directory changes.
    pub watch: bool,
}

impl Default for ApisConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("apis"),
            watch: true,
        }
    }
}

/// Analytics configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Publish an event per request.
    pub enabled: bool,

    /// Error codes never reported as failures.
    pub skipped_error_codes: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Credential material shared by every API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Trusted JWT issuers, tried in order.
    pub jwt_issuers: Vec<JwtIssuerConfig>,

    /// Issued API keys.
    pub api_keys: Vec<ApiKeyEntry>,
}

/// One trusted JWT issuer. Exactly one of `secret` or `public_key_file`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwtIssuerConfig {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim, if any.
    #[serde(default)]
    pub audience: Option<String>,

    /// HS256 shared secret.
    #[serde(default)]
    pub secret: Option<String>,

    /// RS256 public key (PEM).
    #[serde(default)]
    pub public_key_file: Option<PathBuf>,
}

/// Backend JWT signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendJwtSigningConfig {
    /// HS256 signing secret. Backend JWT is unavailable without one.
    pub secret: Option<String>,

    /// `iss` claim of minted tokens.
    pub issuer: String,
}

impl Default for BackendJwtSigningConfig {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: "api-enforcer".to_string(),
        }
    }
}
