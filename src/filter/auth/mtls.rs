//! Client certificate checks against the API trust store.

use serde_json::{json, Map};

use crate::api::model::ApiConfig;
use crate::filter::auth::validator::{
    AuthError, AuthType, AuthenticatedIdentity, Credential, CredentialValidator,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct MtlsValidator;

impl CredentialValidator for MtlsValidator {
    fn kind(&self) -> AuthType {
        AuthType::Mtls
    }

    fn validate(
        &self,
        credential: &Credential<'_>,
        api: &ApiConfig,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let Credential::ClientCertificate(cert) = credential else {
            return Err(AuthError::Missing);
        };
        let trusted = api
            .security
            .trust_store
            .lookup(&cert.fingerprint)
            .ok_or_else(|| AuthError::Invalid("client certificate is not trusted".into()))?;

        let subject = cert.subject.clone().unwrap_or_else(|| trusted.alias.clone());
        let mut claims = Map::new();
        claims.insert("sub".into(), json!(subject));
        claims.insert("certificate_alias".into(), json!(trusted.alias));

        Ok(AuthenticatedIdentity {
            subject,
            application: None,
            tier: trusted.tier.clone(),
            claims,
        })
    }
}
