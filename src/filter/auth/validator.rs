//! Credential validator seam.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::api::model::ApiConfig;
use crate::filter::auth::Claims;
use crate::request::description::ClientCertificate;

/// A credential lifted from the request.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    Bearer(&'a str),
    ApiKey(&'a str),
    ClientCertificate(&'a ClientCertificate),
}

/// How the caller was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Jwt,
    ApiKey,
    Mtls,
    Anonymous,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Jwt => "jwt",
            AuthType::ApiKey => "api_key",
            AuthType::Mtls => "mtls",
            AuthType::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity resolved by a validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    /// Client application the credential was issued to.
    pub application: Option<String>,
    /// Subscription tier bound to the credential.
    pub tier: Option<String>,
    pub claims: Claims,
}

impl AuthenticatedIdentity {
    pub fn anonymous() -> Self {
        Self {
            subject: "anonymous".to_string(),
            ..Default::default()
        }
    }

    /// Scopes granted by the `scope` claim: a space separated string or an
    /// array of strings.
    pub fn scopes(&self) -> Vec<&str> {
        match self.claims.get("scope") {
            Some(Value::String(s)) => s.split_whitespace().collect(),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credential of the expected kind")]
    Missing,

    #[error("invalid credential: {0}")]
    Invalid(String),

    #[error("credential expired")]
    Expired,

    #[error("access forbidden: {0}")]
    Forbidden(String),

    /// The validator cannot answer right now; not a verdict on the caller.
    #[error("validator unavailable: {0}")]
    Unavailable(String),
}

/// Validates one kind of credential.
///
/// Implementations are shared by every chain and must be cheap to call
/// concurrently.
pub trait CredentialValidator: Send + Sync + fmt::Debug {
    fn kind(&self) -> AuthType;

    fn validate(
        &self,
        credential: &Credential<'_>,
        api: &ApiConfig,
    ) -> Result<AuthenticatedIdentity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scopes_from_string_and_array() {
        let mut identity = AuthenticatedIdentity::anonymous();
        identity.claims.insert("scope".into(), json!("pets:read pets:write"));
        assert_eq!(identity.scopes(), vec!["pets:read", "pets:write"]);

        identity.claims.insert("scope".into(), json!(["a", 1, "b"]));
        assert_eq!(identity.scopes(), vec!["a", "b"]);

        identity.claims.remove("scope");
        assert!(identity.scopes().is_empty());
    }
}
