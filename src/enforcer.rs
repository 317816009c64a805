//! The enforcement entry point: find the API, run its chain, decide.
//!
//! # Data Flow
//! ```text
//! RequestDescription
//!     → normalize, assign a request id when the caller sent none
//!     → ApiRegistry::find (vhost + longest base path)
//!         miss → 404 direct response
//!     → DeployedApi::process (route → chain → assemble → analytics)
//!     → EnforcementDecision
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::analytics::AnalyticsPublisher;
use crate::api::{ApiConfig, ApiRegistry, DeployedApi};
use crate::config::schema::{BackendJwtSigningConfig, CredentialsConfig, EnforcerConfig};
use crate::config::{load_descriptors, ConfigError};
use crate::error::{InitError, Rejection};
use crate::filter::auth::{ApiKeyValidator, BackendJwtIssuer, CredentialValidator, JwtValidator};
use crate::filter::FilterDependencies;
use crate::observability::metrics;
use crate::request::description::RequestDescription;
use crate::response::{EnforcementDecision, ResponseAssembler};

/// Label used for requests that matched no API.
const UNMATCHED_API: &str = "unmatched";

#[derive(Debug)]
pub struct Enforcer {
    registry: ApiRegistry,
    assembler: ResponseAssembler,
    publisher: Arc<dyn AnalyticsPublisher>,
    deps: FilterDependencies,
    api_dir: Option<PathBuf>,
}

/// Result of loading a descriptor directory.
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// Display names of the APIs now published from the directory.
    pub published: Vec<String>,
    /// Descriptors that failed; their previous version stays published.
    pub failed: Vec<(PathBuf, String)>,
}

impl Enforcer {
    pub fn new(
        assembler: ResponseAssembler,
        publisher: Arc<dyn AnalyticsPublisher>,
        deps: FilterDependencies,
    ) -> Self {
        Self {
            registry: ApiRegistry::new(),
            assembler,
            publisher,
            deps,
            api_dir: None,
        }
    }

    /// Build from process config. APIs are not loaded yet; call [`Enforcer::reload`].
    pub fn from_config(
        config: &EnforcerConfig,
        publisher: Arc<dyn AnalyticsPublisher>,
    ) -> Result<Self, InitError> {
        let deps = build_dependencies(&config.credentials, &config.backend_jwt)?;
        let mut enforcer = Self::new(ResponseAssembler::new(&config.analytics), publisher, deps);
        enforcer.api_dir = Some(config.apis.directory.clone());
        Ok(enforcer)
    }

    pub fn registry(&self) -> &ApiRegistry {
        &self.registry
    }

    pub fn api_dir(&self) -> Option<&Path> {
        self.api_dir.as_deref()
    }

    /// Enforce one request. Never fails: every outcome is a decision.
    pub fn enforce(&self, request: RequestDescription) -> EnforcementDecision {
        let mut request = request.normalized();
        if request.request_id.is_empty() {
            request.request_id = uuid::Uuid::new_v4().to_string();
        }

        match self.registry.find(&request.vhost, &request.path) {
            Some(api) => api.process(request, &self.assembler, self.publisher.as_ref()),
            None => {
                let start = Instant::now();
                let decision = EnforcementDecision::rejected(
                    &request.request_id,
                    &request.path,
                    &Rejection::not_found(),
                );
                tracing::debug!(
                    request_id = %request.request_id,
                    vhost = %request.vhost,
                    path = %request.path,
                    "No API matches request"
                );
                metrics::record_decision(UNMATCHED_API, decision.outcome(), decision.status_code, start);
                decision
            }
        }
    }

    /// Deploy and publish one API. A failed deploy, or a base path another
    /// API already serves, leaves the registry untouched.
    pub fn deploy(&self, config: ApiConfig) -> Result<Arc<DeployedApi>, InitError> {
        let api = Arc::new(DeployedApi::deploy(config, &self.deps)?);
        self.registry.publish(api.clone())?;
        Ok(api)
    }

    /// Reload the configured descriptor directory.
    pub fn reload(&self) -> Result<ReloadReport, ConfigError> {
        match &self.api_dir {
            Some(dir) => self.load_directory(dir),
            None => Ok(ReloadReport::default()),
        }
    }

    /// Replace the published set with the APIs described in `dir`.
    pub fn load_directory(&self, dir: &Path) -> Result<ReloadReport, ConfigError> {
        let mut report = ReloadReport::default();
        let mut deployed = Vec::new();

        for load in load_descriptors(dir)? {
            let result = load
                .result
                .and_then(|config| DeployedApi::deploy(config, &self.deps));
            match result {
                Ok(api) => deployed.push(Arc::new(api.with_source(load.path))),
                Err(e) => {
                    tracing::error!(
                        path = %load.path.display(),
                        error = %e,
                        "API descriptor rejected, keeping previous version"
                    );
                    report.failed.push((load.path, e.to_string()));
                }
            }
        }

        let failed: Vec<PathBuf> = report.failed.iter().map(|(p, _)| p.clone()).collect();
        let rejected = self.registry.replace_all(deployed.clone(), &failed);

        for (api, err) in &rejected {
            if let Some(path) = api.source() {
                tracing::error!(path = %path.display(), error = %err, "API descriptor rejected");
                report.failed.push((path.clone(), err.to_string()));
            }
        }
        report.published = deployed
            .iter()
            .filter(|api| !rejected.iter().any(|(r, _)| Arc::ptr_eq(r, api)))
            .map(|api| api.config().display_name())
            .collect();

        tracing::info!(
            dir = %dir.display(),
            published = report.published.len(),
            failed = report.failed.len(),
            total = self.registry.len(),
            "API descriptors loaded"
        );
        Ok(report)
    }
}

/// Build the shared credential validators and backend token issuer.
pub fn build_dependencies(
    credentials: &CredentialsConfig,
    backend_jwt: &BackendJwtSigningConfig,
) -> Result<FilterDependencies, InitError> {
    let mut jwt = JwtValidator::new();
    for issuer in &credentials.jwt_issuers {
        let audience = issuer.audience.as_deref();
        jwt = match (&issuer.secret, &issuer.public_key_file) {
            (Some(secret), _) => jwt.with_hmac(secret.as_bytes(), &issuer.issuer, audience),
            (None, Some(path)) => {
                let pem = fs::read(path)?;
                jwt.with_rsa_pem(&pem, &issuer.issuer, audience)?
            }
            (None, None) => {
                return Err(InitError::InvalidTrustStore(format!(
                    "issuer `{}` has no key material",
                    issuer.issuer
                )))
            }
        };
    }

    let jwt: Option<Arc<dyn CredentialValidator>> = if jwt.is_empty() {
        None
    } else {
        Some(Arc::new(jwt))
    };
    let api_key: Option<Arc<dyn CredentialValidator>> = if credentials.api_keys.is_empty() {
        None
    } else {
        Some(Arc::new(ApiKeyValidator::new(credentials.api_keys.iter().cloned())))
    };
    let backend_jwt = backend_jwt
        .secret
        .as_ref()
        .map(|secret| Arc::new(BackendJwtIssuer::hmac(secret.as_bytes(), backend_jwt.issuer.clone())));

    Ok(FilterDependencies {
        jwt,
        api_key,
        backend_jwt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::NoopPublisher;
    use crate::api::model::test_support::rest_config;
    use crate::config::schema::JwtIssuerConfig;
    use crate::filter::auth::ApiKeyEntry;

    fn credentials() -> CredentialsConfig {
        CredentialsConfig {
            jwt_issuers: vec![JwtIssuerConfig {
                issuer: "https://idp.example".into(),
                audience: None,
                secret: Some("s3cret".into()),
                public_key_file: None,
            }],
            api_keys: vec![ApiKeyEntry {
                key: "k".into(),
                subject: "ci".into(),
                application: None,
                tier: None,
                scopes: vec![],
                apis: vec![],
            }],
        }
    }

    fn enforcer() -> Enforcer {
        let deps = build_dependencies(&credentials(), &BackendJwtSigningConfig::default()).unwrap();
        Enforcer::new(ResponseAssembler::default(), Arc::new(NoopPublisher), deps)
    }

    #[test]
    fn test_build_dependencies() {
        let deps = build_dependencies(&credentials(), &BackendJwtSigningConfig::default()).unwrap();
        assert!(deps.jwt.is_some());
        assert!(deps.api_key.is_some());
        assert!(deps.backend_jwt.is_none());

        let signing = BackendJwtSigningConfig {
            secret: Some("b".into()),
            issuer: "gw".into(),
        };
        let deps = build_dependencies(&CredentialsConfig::default(), &signing).unwrap();
        assert!(deps.jwt.is_none());
        assert_eq!(deps.backend_jwt.unwrap().issuer(), "gw");
    }

    #[test]
    fn test_missing_public_key_file() {
        let mut creds = credentials();
        creds.jwt_issuers[0].secret = None;
        creds.jwt_issuers[0].public_key_file = Some(PathBuf::from("/nope/key.pem"));
        assert!(matches!(
            build_dependencies(&creds, &BackendJwtSigningConfig::default()),
            Err(InitError::Io(_))
        ));
    }

    #[test]
    fn test_unmatched_request_is_404_with_generated_id() {
        let decision = enforcer().enforce(RequestDescription {
            method: "get".into(),
            path: "/nothing".into(),
            ..Default::default()
        });
        assert!(decision.direct_response);
        assert_eq!(decision.status_code, 404);
        assert_eq!(decision.error_code.as_deref(), Some("404"));
        assert!(uuid::Uuid::parse_str(&decision.request_id).is_ok());
    }

    #[test]
    fn test_deploy_and_enforce() {
        let enforcer = enforcer();
        enforcer.deploy(rest_config()).unwrap();

        let decision = enforcer.enforce(RequestDescription {
            request_id: "r1".into(),
            method: "GET".into(),
            path: "/petstore/1.0.0/pets".into(),
            vhost: "localhost".into(),
            headers: [("ApiKey".to_string(), "k".to_string())].into_iter().collect(),
            ..Default::default()
        });
        assert!(decision.is_allowed());
        assert_eq!(decision.request_id, "r1");
    }
}
