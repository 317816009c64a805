//! Immutable per-API configuration.
//!
//! Values here are produced by the descriptor compiler and shared read-only
//! (`Arc<ApiConfig>`) across all in-flight requests of one API snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InitError;
use crate::graphql::schema::GraphQlSchema;
use crate::throttling::policy::ThrottlePolicy;

/// Protocol family of an API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    #[default]
    Rest,
    #[serde(rename = "graphql")]
    GraphQl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleState {
    Created,
    Prototyped,
    #[default]
    Published,
    Blocked,
    Deprecated,
    Retired,
}

/// Mutual-TLS enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutualSsl {
    #[default]
    Disabled,
    Optional,
    Mandatory,
}

/// A certificate accepted for mutual TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificate {
    pub alias: String,
    /// Throttling tier bound to the certificate, if any.
    pub tier: Option<String>,
}

/// Accepted client certificates, keyed by lowercase SHA-256 fingerprint.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certificates: HashMap<String, TrustedCertificate>,
}

impl TrustStore {
    /// Build a trust store from `(fingerprint, certificate)` pairs.
    ///
    /// Fingerprints must be 64 hex characters; `:` separators are accepted.
    pub fn from_fingerprints<I>(entries: I) -> Result<Self, InitError>
    where
        I: IntoIterator<Item = (String, TrustedCertificate)>,
    {
        let mut certificates = HashMap::new();
        for (fingerprint, cert) in entries {
            let normalized = normalize_fingerprint(&fingerprint);
            if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(InitError::InvalidTrustStore(format!(
                    "certificate `{}` has a malformed SHA-256 fingerprint",
                    cert.alias
                )));
            }
            certificates.insert(normalized, cert);
        }
        Ok(Self { certificates })
    }

    pub fn lookup(&self, fingerprint: &str) -> Option<&TrustedCertificate> {
        self.certificates.get(&normalize_fingerprint(fingerprint))
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

pub(crate) fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Upstream endpoints for an API or an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCluster {
    pub urls: Vec<String>,
}

/// Backend JWT settings for one API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendJwtConfig {
    pub enabled: bool,
    /// Header carrying the minted token upstream.
    pub header: String,
    pub ttl_secs: u64,
    pub custom_claims: BTreeMap<String, Value>,
}

impl Default for BackendJwtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header: "x-jwt-assertion".to_string(),
            ttl_secs: 3600,
            custom_claims: BTreeMap::new(),
        }
    }
}

/// Security settings.
#[derive(Debug, Clone, Default)]
pub struct SecuritySettings {
    pub mutual_ssl: MutualSsl,
    pub application_security: bool,
    pub disable_authentication: bool,
    pub disable_scopes: bool,
    pub trust_store: Arc<TrustStore>,
    pub backend_jwt: BackendJwtConfig,
}

/// CORS policy for one API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsPolicy {
    pub enabled: bool,
    /// Allowed origins; `*` allows any.
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: Option<u64>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "PUT", "POST", "DELETE", "PATCH", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: ["authorization", "access-control-allow-origin", "content-type", "apikey"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: None,
        }
    }
}

impl CorsPolicy {
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allow_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin))
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.allow_methods
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }
}

/// GraphQL specifics: compiled schema and query ceilings.
#[derive(Clone)]
pub struct GraphQlSettings {
    pub schema: Arc<GraphQlSchema>,
    pub max_depth: Option<u32>,
    pub max_complexity: Option<u64>,
}

impl fmt::Debug for GraphQlSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQlSettings")
            .field("types", &self.schema.type_count())
            .field("max_depth", &self.max_depth)
            .field("max_complexity", &self.max_complexity)
            .finish()
    }
}

/// One routable operation.
#[derive(Debug, Clone, Default)]
pub struct ResourceConfig {
    /// Path template relative to the base path (REST), or the top-level
    /// field name (GraphQL).
    pub path_template: String,
    /// HTTP method (REST) or operation type `QUERY`/`MUTATION`/`SUBSCRIPTION` (GraphQL).
    pub method: String,
    pub endpoint: Option<EndpointCluster>,
    pub scopes: Vec<String>,
    /// Operation-level throttling overriding the API's policy.
    pub throttling: Option<ThrottlePolicy>,
}

/// Fully compiled API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub uuid: String,
    pub name: String,
    pub version: String,
    pub organization_id: String,
    pub base_path: String,
    pub vhost: String,
    pub api_type: ApiType,
    pub resources: Vec<ResourceConfig>,
    pub endpoints: EndpointCluster,
    pub security: SecuritySettings,
    pub lifecycle_state: LifecycleState,
    pub cors: CorsPolicy,
    pub graphql: Option<GraphQlSettings>,
    pub throttling: ThrottlePolicy,
}

impl ApiConfig {
    /// `name:version`, used in logs and metrics labels.
    pub fn display_name(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}
