//! On-disk API descriptors and their compilation into `ApiConfig`.
//!
//! One TOML file per API. Compilation validates every field before the
//! immutable config is built; nothing partially built escapes.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::model::{
    ApiConfig, ApiType, BackendJwtConfig, CorsPolicy, EndpointCluster, GraphQlSettings,
    LifecycleState, MutualSsl, ResourceConfig, SecuritySettings, TrustStore, TrustedCertificate,
};
use crate::error::InitError;
use crate::graphql::schema::{FieldComplexity, GraphQlSchema};
use crate::throttling::policy::ThrottlePolicy;

const REST_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];
const GRAPHQL_OPERATIONS: &[&str] = &["QUERY", "MUTATION", "SUBSCRIPTION"];

/// API descriptor as written by operators.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiDescriptor {
    pub uuid: String,
    pub name: String,
    pub version: String,
    pub organization_id: String,
    pub base_path: String,
    pub vhost: String,
    pub api_type: ApiType,
    pub lifecycle_state: LifecycleState,
    pub endpoints: Vec<String>,
    pub security: SecurityDescriptor,
    pub cors: CorsPolicy,
    pub graphql: Option<GraphQlDescriptor>,
    pub throttling: ThrottlePolicy,
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityDescriptor {
    pub mutual_ssl: MutualSsl,
    pub application_security: bool,
    pub disable_authentication: bool,
    pub disable_scopes: bool,
    pub trusted_certificates: Vec<TrustedCertificateDescriptor>,
    pub backend_jwt: BackendJwtConfig,
}

impl Default for SecurityDescriptor {
    fn default() -> Self {
        Self {
            mutual_ssl: MutualSsl::Disabled,
            application_security: true,
            disable_authentication: false,
            disable_scopes: false,
            trusted_certificates: Vec::new(),
            backend_jwt: BackendJwtConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrustedCertificateDescriptor {
    pub alias: String,
    /// SHA-256 fingerprint, hex, `:` separators allowed.
    pub fingerprint: String,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphQlDescriptor {
    /// Inline SDL.
    pub schema: Option<String>,
    /// SDL file, relative to the descriptor.
    pub schema_file: Option<String>,
    pub max_depth: Option<u32>,
    pub max_complexity: Option<u64>,
    pub complexity: Vec<FieldComplexity>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceDescriptor {
    /// Path template (REST) or top-level field name (GraphQL).
    pub path: String,
    /// HTTP method (REST) or operation type (GraphQL).
    pub method: String,
    pub endpoints: Vec<String>,
    pub scopes: Vec<String>,
    pub throttling: Option<ThrottlePolicy>,
}

impl ApiDescriptor {
    pub fn from_toml(content: &str) -> Result<Self, InitError> {
        toml::from_str(content).map_err(|e| InitError::Descriptor(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, InitError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate and build the immutable config. `base_dir` resolves
    /// relative schema files.
    pub fn compile(self, base_dir: &Path) -> Result<ApiConfig, InitError> {
        require(&self.uuid, "uuid")?;
        require(&self.name, "name")?;
        require(&self.version, "version")?;
        require(&self.base_path, "base_path")?;
        if !self.base_path.starts_with('/') {
            return Err(InitError::Descriptor(format!(
                "base_path `{}` must start with '/'",
                self.base_path
            )));
        }

        let resources = self
            .resources
            .into_iter()
            .map(|r| compile_resource(r, self.api_type))
            .collect::<Result<Vec<_>, _>>()?;

        self.throttling.validate()?;

        let trust_store = TrustStore::from_fingerprints(
            self.security
                .trusted_certificates
                .into_iter()
                .map(|c| {
                    (
                        c.fingerprint,
                        TrustedCertificate {
                            alias: c.alias,
                            tier: c.tier,
                        },
                    )
                }),
        )?;

        let graphql = match (self.api_type, self.graphql) {
            (ApiType::GraphQl, Some(descriptor)) => Some(compile_graphql(descriptor, base_dir)?),
            (ApiType::GraphQl, None) => return Err(InitError::MissingField("graphql.schema")),
            (ApiType::Rest, _) => None,
        };

        let vhost = if self.vhost.is_empty() {
            "*".to_string()
        } else {
            self.vhost.to_ascii_lowercase()
        };

        Ok(ApiConfig {
            uuid: self.uuid,
            name: self.name,
            version: self.version,
            organization_id: self.organization_id,
            base_path: self.base_path.trim_end_matches('/').to_string(),
            vhost,
            api_type: self.api_type,
            resources,
            endpoints: EndpointCluster {
                urls: self.endpoints,
            },
            security: SecuritySettings {
                mutual_ssl: self.security.mutual_ssl,
                application_security: self.security.application_security,
                disable_authentication: self.security.disable_authentication,
                disable_scopes: self.security.disable_scopes,
                trust_store: Arc::new(trust_store),
                backend_jwt: self.security.backend_jwt,
            },
            lifecycle_state: self.lifecycle_state,
            cors: self.cors,
            graphql,
            throttling: self.throttling,
        })
    }
}

fn require(value: &str, field: &'static str) -> Result<(), InitError> {
    if value.trim().is_empty() {
        Err(InitError::MissingField(field))
    } else {
        Ok(())
    }
}

fn compile_resource(resource: ResourceDescriptor, api_type: ApiType) -> Result<ResourceConfig, InitError> {
    require(&resource.method, "resources.method")?;
    let method = resource.method.to_ascii_uppercase();
    let allowed = match api_type {
        ApiType::Rest => REST_METHODS,
        ApiType::GraphQl => GRAPHQL_OPERATIONS,
    };
    if !allowed.contains(&method.as_str()) {
        return Err(InitError::Descriptor(format!(
            "resource `{}` has unsupported method `{}`",
            resource.path, resource.method
        )));
    }
    require(&resource.path, "resources.path")?;

    if let Some(policy) = &resource.throttling {
        policy.validate()?;
    }

    Ok(ResourceConfig {
        path_template: resource.path,
        method,
        endpoint: (!resource.endpoints.is_empty()).then(|| EndpointCluster {
            urls: resource.endpoints,
        }),
        scopes: resource.scopes,
        throttling: resource.throttling,
    })
}

fn compile_graphql(descriptor: GraphQlDescriptor, base_dir: &Path) -> Result<GraphQlSettings, InitError> {
    let sdl = match (descriptor.schema, descriptor.schema_file) {
        (Some(inline), _) => inline,
        (None, Some(file)) => fs::read_to_string(base_dir.join(file))?,
        (None, None) => return Err(InitError::MissingField("graphql.schema")),
    };

    let schema = GraphQlSchema::from_sdl(&sdl)?.with_complexity(descriptor.complexity)?;
    Ok(GraphQlSettings {
        schema: Arc::new(schema),
        max_depth: descriptor.max_depth,
        max_complexity: descriptor.max_complexity,
    })
}
