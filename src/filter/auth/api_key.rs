//! Static API key table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::api::model::ApiConfig;
use crate::filter::auth::validator::{
    AuthError, AuthType, AuthenticatedIdentity, Credential, CredentialValidator,
};

/// One issued API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub subject: String,
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// API names the key is subscribed to; empty means every API.
    #[serde(default)]
    pub apis: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiKeyValidator {
    keys: HashMap<String, ApiKeyEntry>,
}

impl ApiKeyValidator {
    pub fn new(entries: impl IntoIterator<Item = ApiKeyEntry>) -> Self {
        Self {
            keys: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl CredentialValidator for ApiKeyValidator {
    fn kind(&self) -> AuthType {
        AuthType::ApiKey
    }

    fn validate(
        &self,
        credential: &Credential<'_>,
        api: &ApiConfig,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let Credential::ApiKey(key) = credential else {
            return Err(AuthError::Missing);
        };
        let entry = self
            .keys
            .get(*key)
            .ok_or_else(|| AuthError::Invalid("API key is not recognized".into()))?;

        if !entry.apis.is_empty() && !entry.apis.iter().any(|name| name == &api.name) {
            return Err(AuthError::Forbidden(format!(
                "API key is not subscribed to {}",
                api.display_name()
            )));
        }

        let mut claims = Map::new();
        claims.insert("sub".into(), json!(entry.subject));
        if !entry.scopes.is_empty() {
            claims.insert("scope".into(), json!(entry.scopes.join(" ")));
        }
        if let Some(app) = &entry.application {
            claims.insert("application".into(), json!(app));
        }
        if let Some(tier) = &entry.tier {
            claims.insert("tier".into(), json!(tier));
        }

        Ok(AuthenticatedIdentity {
            subject: entry.subject.clone(),
            application: entry.application.clone(),
            tier: entry.tier.clone(),
            claims,
        })
    }
}
