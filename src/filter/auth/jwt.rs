//! Bearer JWT validation.

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;

use crate::api::model::ApiConfig;
use crate::error::InitError;
use crate::filter::auth::validator::{
    AuthError, AuthType, AuthenticatedIdentity, Credential, CredentialValidator,
};
use crate::filter::auth::Claims;

/// Keys and checks for one trusted issuer.
struct IssuerKey {
    issuer: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

/// Validates signed JWTs against a list of trusted issuers.
#[derive(Default)]
pub struct JwtValidator {
    issuers: Vec<IssuerKey>,
}

impl JwtValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single HS256 issuer with a shared secret.
    pub fn hmac(secret: &[u8], issuer: &str, audience: Option<&str>) -> Self {
        Self::new().with_hmac(secret, issuer, audience)
    }

    pub fn with_hmac(mut self, secret: &[u8], issuer: &str, audience: Option<&str>) -> Self {
        self.issuers.push(IssuerKey {
            issuer: issuer.to_string(),
            decoding_key: DecodingKey::from_secret(secret),
            validation: validation(Algorithm::HS256, issuer, audience),
        });
        self
    }

    /// RS256 issuer with a PEM encoded public key.
    pub fn with_rsa_pem(mut self, pem: &[u8], issuer: &str, audience: Option<&str>) -> Result<Self, InitError> {
        let decoding_key = DecodingKey::from_rsa_pem(pem).map_err(|e| {
            InitError::InvalidTrustStore(format!("issuer `{}` public key: {}", issuer, e))
        })?;
        self.issuers.push(IssuerKey {
            issuer: issuer.to_string(),
            decoding_key,
            validation: validation(Algorithm::RS256, issuer, audience),
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }
}

fn validation(algorithm: Algorithm, issuer: &str, audience: Option<&str>) -> Validation {
    let mut validation = Validation::new(algorithm);
    if !issuer.is_empty() {
        validation.set_issuer(&[issuer]);
    }
    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    validation
}

impl fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtValidator")
            .field(
                "issuers",
                &self.issuers.iter().map(|i| i.issuer.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidIssuer => AuthError::Invalid("token issuer is not trusted".into()),
        ErrorKind::InvalidAudience => AuthError::Invalid("token audience mismatch".into()),
        _ => AuthError::Invalid(err.to_string()),
    }
}

impl CredentialValidator for JwtValidator {
    fn kind(&self) -> AuthType {
        AuthType::Jwt
    }

    fn validate(
        &self,
        credential: &Credential<'_>,
        _api: &ApiConfig,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let Credential::Bearer(token) = credential else {
            return Err(AuthError::Missing);
        };

        // First issuer whose key and checks accept the token wins. An expiry
        // reported by any issuer is more useful than a signature mismatch.
        let mut failure = AuthError::Invalid("no trusted issuer configured".into());
        let mut claims = None;
        for key in &self.issuers {
            match decode::<Claims>(token, &key.decoding_key, &key.validation) {
                Ok(data) => {
                    claims = Some(data.claims);
                    break;
                }
                Err(e) => {
                    let err = classify(&e);
                    if failure != AuthError::Expired {
                        failure = err;
                    }
                }
            }
        }
        let claims = claims.ok_or(failure)?;

        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Invalid("token has no subject".into()))?
            .to_string();
        let application = ["azp", "client_id"]
            .iter()
            .find_map(|name| claims.get(*name).and_then(Value::as_str))
            .map(str::to_string);
        let tier = claims.get("tier").and_then(Value::as_str).map(str::to_string);

        Ok(AuthenticatedIdentity {
            subject,
            application,
            tier,
            claims,
        })
    }
}
