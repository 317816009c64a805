//! Backend JWT minting.
//!
//! The token tells the upstream service who called, through which API,
//! without it having to trust the original credential.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use crate::api::model::ApiConfig;
use crate::error::FilterError;
use crate::filter::auth::{AuthenticationContext, Claims};

/// Caller claims that are not copied into the backend token.
const RESERVED_CLAIMS: &[&str] = &["iss", "exp", "iat", "nbf", "aud", "jti"];

pub struct BackendJwtIssuer {
    issuer: String,
    encoding_key: EncodingKey,
    algorithm: Algorithm,
}

impl BackendJwtIssuer {
    /// HS256 issuer signing with a shared secret.
    pub fn hmac(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            encoding_key: EncodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Mint a token for an authenticated call.
    pub fn mint(&self, api: &ApiConfig, context: &AuthenticationContext) -> Result<String, FilterError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let settings = &api.security.backend_jwt;

        let mut claims: Claims = context
            .identity
            .claims
            .iter()
            .filter(|(name, _)| !RESERVED_CLAIMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        claims.insert("iss".into(), json!(self.issuer));
        claims.insert("sub".into(), json!(context.identity.subject));
        claims.insert("iat".into(), json!(now));
        claims.insert("exp".into(), json!(now + settings.ttl_secs));
        claims.insert("api_name".into(), json!(api.name));
        claims.insert("api_version".into(), json!(api.version));
        claims.insert("api_context".into(), json!(api.base_path));
        claims.insert("organization".into(), json!(api.organization_id));
        claims.insert("auth_type".into(), json!(context.auth_type.as_str()));
        if let Some(app) = &context.identity.application {
            claims.insert("application".into(), json!(app));
        }
        if let Some(tier) = &context.identity.tier {
            claims.insert("tier".into(), Value::String(tier.clone()));
        }
        for (name, value) in &settings.custom_claims {
            claims.insert(name.clone(), value.clone());
        }

        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?)
    }
}

impl fmt::Debug for BackendJwtIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendJwtIssuer")
            .field("issuer", &self.issuer)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
