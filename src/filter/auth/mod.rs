//! Authentication and authorization.
//!
//! # Data Flow
//! ```text
//! RequestScratch
//!     → lifecycle check (blocked APIs answer 503)
//!     → mtls.rs (client certificate vs. API trust store)
//!     → jwt.rs / api_key.rs (application credential)
//!     → scope check against the matched resource
//!     → throttling tier selection
//!     → backend_jwt.rs (token for the upstream, when enabled)
//! ```
//!
//! # Design Decisions
//! - Validators sit behind the `CredentialValidator` trait and are shared
//!   across chains (`Arc`)
//! - The credential that authenticated the call is stripped before the
//!   request goes upstream

pub mod api_key;
pub mod backend_jwt;
pub mod jwt;
pub mod mtls;
pub mod validator;

pub use api_key::{ApiKeyEntry, ApiKeyValidator};
pub use backend_jwt::BackendJwtIssuer;
pub use jwt::JwtValidator;
pub use mtls::MtlsValidator;
pub use validator::{AuthError, AuthType, AuthenticatedIdentity, Credential, CredentialValidator};

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::model::{ApiConfig, LifecycleState, MutualSsl};
use crate::error::{FilterError, InitError, Rejection};
use crate::filter::chain::FilterDependencies;
use crate::filter::FilterVerdict;
use crate::request::scratch::RequestScratch;
use crate::throttling::policy::select_for_request;

/// Decoded token claims.
pub type Claims = serde_json::Map<String, Value>;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const API_KEY_NAME: &str = "apikey";

/// Who the caller is and how that was established.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticationContext {
    pub auth_type: AuthType,
    pub identity: AuthenticatedIdentity,
}

impl AuthenticationContext {
    pub fn anonymous() -> Self {
        Self {
            auth_type: AuthType::Anonymous,
            identity: AuthenticatedIdentity::anonymous(),
        }
    }
}

/// Where an application credential was found, so it can be stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialSource {
    Header(&'static str),
    QueryParam(&'static str),
}

enum Outcome {
    Authenticated(AuthenticationContext),
    Rejected(Rejection),
}

#[derive(Debug)]
pub struct AuthFilter {
    api: Arc<ApiConfig>,
    jwt: Option<Arc<dyn CredentialValidator>>,
    api_key: Option<Arc<dyn CredentialValidator>>,
    mtls: MtlsValidator,
    backend_jwt: Option<Arc<BackendJwtIssuer>>,
}

impl AuthFilter {
    pub const NAME: &'static str = "auth";

    pub fn init(api: Arc<ApiConfig>, deps: &FilterDependencies) -> Result<Self, InitError> {
        let security = &api.security;

        if security.mutual_ssl != MutualSsl::Disabled && security.trust_store.is_empty() {
            return Err(InitError::InvalidTrustStore(format!(
                "mutual TLS is {:?} for {} but the trust store is empty",
                security.mutual_ssl,
                api.display_name()
            )));
        }

        let app_security = security.application_security && !security.disable_authentication;
        if app_security && deps.jwt.is_none() && deps.api_key.is_none() {
            return Err(InitError::filter(
                Self::NAME,
                "application security is enabled but no credential validator is configured",
            ));
        }

        if security.backend_jwt.enabled && deps.backend_jwt.is_none() {
            return Err(InitError::filter(
                Self::NAME,
                "backend JWT is enabled but no signing key is configured",
            ));
        }

        Ok(Self {
            jwt: deps.jwt.clone(),
            api_key: deps.api_key.clone(),
            mtls: MtlsValidator,
            backend_jwt: deps.backend_jwt.clone(),
            api,
        })
    }

    pub fn handle_request(&self, scratch: &mut RequestScratch) -> Result<FilterVerdict, FilterError> {
        if self.api.lifecycle_state == LifecycleState::Blocked {
            scratch.reject(&Rejection::api_blocked());
            return Ok(FilterVerdict::Stop);
        }

        // Only OPTIONS requests reach the chain without a resource
        let Some(required_scopes) = scratch.matched_resource().map(|r| r.scopes.clone()) else {
            return Ok(FilterVerdict::Continue);
        };

        let context = match self.authenticate(scratch)? {
            Outcome::Authenticated(context) => context,
            Outcome::Rejected(rejection) => {
                tracing::debug!(
                    request_id = %scratch.request.request_id,
                    api = %self.api.display_name(),
                    code = rejection.error_code,
                    "Authentication failed"
                );
                scratch.reject(&rejection);
                return Ok(FilterVerdict::Stop);
            }
        };

        if !self.scopes_satisfied(&context, &required_scopes) {
            tracing::debug!(
                request_id = %scratch.request.request_id,
                subject = %context.identity.subject,
                required = ?required_scopes,
                "Scope validation failed"
            );
            scratch.reject(&Rejection::invalid_scope());
            return Ok(FilterVerdict::Stop);
        }

        if self.api.security.backend_jwt.enabled && context.auth_type != AuthType::Anonymous {
            if let Some(issuer) = &self.backend_jwt {
                let token = issuer.mint(&self.api, &context)?;
                scratch.add_header(self.api.security.backend_jwt.header.clone(), token);
            }
        }

        scratch
            .metadata
            .insert("auth.type".into(), context.auth_type.as_str().to_string());
        if let Some(app) = &context.identity.application {
            scratch.metadata.insert("auth.application".into(), app.clone());
        }
        scratch.properties.authentication = Some(context);

        if let Some(selected) = select_for_request(scratch) {
            scratch
                .metadata
                .insert("ratelimit.policy".into(), selected.limit.policy_id.clone());
            scratch
                .metadata
                .insert("ratelimit.requests".into(), selected.limit.request_count.to_string());
            scratch.metadata.insert(
                "ratelimit.unit_time_secs".into(),
                selected.limit.unit_time_secs.to_string(),
            );
            scratch.properties.throttle = Some(selected);
        }

        Ok(FilterVerdict::Continue)
    }

    fn authenticate(&self, scratch: &mut RequestScratch) -> Result<Outcome, FilterError> {
        let security = &self.api.security;

        let mut mtls_identity = None;
        if security.mutual_ssl != MutualSsl::Disabled {
            match scratch.request.client_certificate.as_ref() {
                Some(cert) => {
                    match self.mtls.validate(&Credential::ClientCertificate(cert), &self.api) {
                        Ok(identity) => mtls_identity = Some(identity),
                        Err(err) => return rejection_for(err).map(Outcome::Rejected),
                    }
                }
                None if security.mutual_ssl == MutualSsl::Mandatory => {
                    return Ok(Outcome::Rejected(Rejection::invalid_credentials(
                        "A trusted client certificate is required for this API",
                    )));
                }
                None => {}
            }
        }

        if !security.application_security || security.disable_authentication {
            return Ok(Outcome::Authenticated(match mtls_identity {
                Some(identity) => AuthenticationContext {
                    auth_type: AuthType::Mtls,
                    identity,
                },
                None => AuthenticationContext::anonymous(),
            }));
        }

        let (credential, validator, source) = match self.extract_credential(scratch) {
            Some(found) => found,
            None => return Ok(Outcome::Rejected(Rejection::missing_credentials())),
        };
        let Some(validator) = validator else {
            return Ok(Outcome::Rejected(Rejection::invalid_credentials(
                "This credential type is not accepted by the gateway",
            )));
        };

        let identity = match validator.validate(&credential, &self.api) {
            Ok(identity) => identity,
            Err(err) => return rejection_for(err).map(Outcome::Rejected),
        };
        let auth_type = validator.kind();

        match source {
            CredentialSource::Header(name) => scratch.remove_header(name),
            CredentialSource::QueryParam(name) => scratch.remove_query_param(name),
        }

        Ok(Outcome::Authenticated(AuthenticationContext { auth_type, identity }))
    }

    /// Bearer token first, then API key header, then API key query parameter.
    #[allow(clippy::type_complexity)]
    fn extract_credential<'a>(
        &self,
        scratch: &'a RequestScratch,
    ) -> Option<(Credential<'a>, Option<&Arc<dyn CredentialValidator>>, CredentialSource)> {
        let request = &scratch.request;

        if let Some(token) = request.header(AUTHORIZATION_HEADER).and_then(bearer_token) {
            return Some((
                Credential::Bearer(token),
                self.jwt.as_ref(),
                CredentialSource::Header(AUTHORIZATION_HEADER),
            ));
        }
        if let Some(key) = request.header(API_KEY_NAME).filter(|k| !k.is_empty()) {
            return Some((
                Credential::ApiKey(key),
                self.api_key.as_ref(),
                CredentialSource::Header(API_KEY_NAME),
            ));
        }
        request
            .query_param(API_KEY_NAME)
            .filter(|k| !k.is_empty())
            .map(|key| {
                (
                    Credential::ApiKey(key),
                    self.api_key.as_ref(),
                    CredentialSource::QueryParam(API_KEY_NAME),
                )
            })
    }

    fn scopes_satisfied(&self, context: &AuthenticationContext, required: &[String]) -> bool {
        if required.is_empty() || self.api.security.disable_scopes {
            return true;
        }
        // No application credential means no scopes to check
        if matches!(context.auth_type, AuthType::Anonymous | AuthType::Mtls) {
            return true;
        }
        let granted = context.identity.scopes();
        required.iter().any(|scope| granted.contains(&scope.as_str()))
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn rejection_for(err: AuthError) -> Result<Rejection, FilterError> {
    Ok(match err {
        AuthError::Missing => Rejection::missing_credentials(),
        AuthError::Invalid(reason) => Rejection::invalid_credentials(reason),
        AuthError::Expired => Rejection::invalid_credentials("The credential has expired"),
        AuthError::Forbidden(reason) => Rejection::forbidden(reason),
        AuthError::Unavailable(reason) => return Err(FilterError::ValidatorUnavailable(reason)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::model::test_support::rest_config;
    use crate::api::model::{TrustStore, TrustedCertificate};
    use crate::request::description::{ClientCertificate, RequestDescription};
    use crate::throttling::condition::ThrottleCondition;
    use crate::throttling::policy::{ConditionalGroup, ThrottleLimit, ThrottlePolicy};

    #[derive(Debug)]
    struct DownValidator;

    impl CredentialValidator for DownValidator {
        fn kind(&self) -> AuthType {
            AuthType::ApiKey
        }

        fn validate(
            &self,
            _credential: &Credential<'_>,
            _api: &ApiConfig,
        ) -> Result<AuthenticatedIdentity, AuthError> {
            Err(AuthError::Unavailable("key service timed out".into()))
        }
    }

    fn deps() -> FilterDependencies {
        FilterDependencies {
            jwt: None,
            api_key: Some(Arc::new(ApiKeyValidator::new(vec![
                ApiKeyEntry {
                    key: "reader-key".into(),
                    subject: "reader".into(),
                    application: Some("reader-app".into()),
                    tier: Some("Gold".into()),
                    scopes: vec!["pets:read".into()],
                    apis: vec![],
                },
                ApiKeyEntry {
                    key: "writer-key".into(),
                    subject: "writer".into(),
                    application: None,
                    tier: None,
                    scopes: vec!["pets:write".into()],
                    apis: vec![],
                },
            ]))),
            backend_jwt: Some(Arc::new(BackendJwtIssuer::hmac(b"s", "api-enforcer"))),
        }
    }

    fn scratch(api: &Arc<ApiConfig>, resource: usize, method: &str) -> RequestScratch {
        let req = RequestDescription {
            request_id: "r1".into(),
            method: method.into(),
            path: "/petstore/1.0.0/pets".into(),
            ..Default::default()
        };
        let mut s = RequestScratch::new(req, api.clone());
        s.set_matched_resource(Some(resource));
        s
    }

    #[test]
    fn test_missing_credentials() {
        let api = Arc::new(rest_config());
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = scratch(&api, 0, "GET");

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Stop);
        assert_eq!(s.properties.status_code, Some(401));
        assert_eq!(s.properties.error_code.as_deref(), Some("900902"));
    }

    #[test]
    fn test_api_key_header_accepted_and_stripped() {
        let api = Arc::new(rest_config());
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = scratch(&api, 0, "GET");
        s.request.headers.insert("apikey".into(), "reader-key".into());

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
        assert!(s.headers_to_remove.contains("apikey"));
        let auth = s.properties.authentication.as_ref().unwrap();
        assert_eq!(auth.auth_type, AuthType::ApiKey);
        assert_eq!(auth.identity.subject, "reader");
        assert_eq!(s.metadata.get("auth.type").map(String::as_str), Some("api_key"));
    }

    #[test]
    fn test_api_key_query_param_stripped() {
        let api = Arc::new(rest_config());
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = scratch(&api, 0, "GET");
        s.request.query_params.insert("apikey".into(), "reader-key".into());

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
        assert!(s.query_params_to_remove.contains("apikey"));
        assert!(s.headers_to_remove.is_empty());
    }

    #[test]
    fn test_invalid_key() {
        let api = Arc::new(rest_config());
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = scratch(&api, 0, "GET");
        s.request.headers.insert("apikey".into(), "bogus".into());

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Stop);
        assert_eq!(s.properties.error_code.as_deref(), Some("900901"));
    }

    #[test]
    fn test_scope_check() {
        let api = Arc::new(rest_config());
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();

        let mut s = scratch(&api, 1, "DELETE");
        s.request.headers.insert("apikey".into(), "reader-key".into());
        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Stop);
        assert_eq!(s.properties.status_code, Some(403));
        assert_eq!(s.properties.error_code.as_deref(), Some("900910"));

        let mut s = scratch(&api, 1, "DELETE");
        s.request.headers.insert("apikey".into(), "writer-key".into());
        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
    }

    #[test]
    fn test_blocked_api() {
        let mut config = rest_config();
        config.lifecycle_state = LifecycleState::Blocked;
        let api = Arc::new(config);
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = scratch(&api, 0, "GET");

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Stop);
        assert_eq!(s.properties.status_code, Some(503));
        assert_eq!(s.properties.error_code.as_deref(), Some("900907"));
    }

    #[test]
    fn test_unmatched_resource_continues() {
        let api = Arc::new(rest_config());
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = RequestScratch::new(RequestDescription::default(), api);
        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
        assert!(s.properties.authentication.is_none());
    }

    #[test]
    fn test_disabled_authentication_still_throttles() {
        let mut config = rest_config();
        config.security.disable_authentication = true;
        config.throttling = ThrottlePolicy {
            groups: vec![],
            default_limit: Some(ThrottleLimit {
                policy_id: "10PerMin".into(),
                request_count: 10,
                unit_time_secs: 60,
                max_query_depth: None,
                max_query_complexity: None,
            }),
        };
        let api = Arc::new(config);
        let filter = AuthFilter::init(api.clone(), &FilterDependencies::default()).unwrap();
        let mut s = scratch(&api, 1, "DELETE");

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
        assert_eq!(
            s.properties.authentication.as_ref().unwrap().auth_type,
            AuthType::Anonymous
        );
        assert_eq!(s.metadata.get("ratelimit.policy").map(String::as_str), Some("10PerMin"));
        assert_eq!(s.metadata.get("ratelimit.requests").map(String::as_str), Some("10"));
    }

    #[test]
    fn test_claim_condition_sees_authenticated_identity() {
        let mut config = rest_config();
        config.throttling = ThrottlePolicy {
            groups: vec![ConditionalGroup {
                description: "gold apps".into(),
                conditions: vec![ThrottleCondition::JwtClaims {
                    claim_uri: "tier".into(),
                    expected_value: "Gold".into(),
                    invert: false,
                }],
                limit: ThrottleLimit {
                    policy_id: "Gold".into(),
                    request_count: 1000,
                    unit_time_secs: 60,
                    max_query_depth: None,
                    max_query_complexity: None,
                },
            }],
            default_limit: None,
        };
        let api = Arc::new(config);
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = scratch(&api, 0, "GET");
        s.request.headers.insert("apikey".into(), "reader-key".into());

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
        assert_eq!(s.properties.throttle.as_ref().unwrap().limit.policy_id, "Gold");
    }

    #[test]
    fn test_backend_jwt_added() {
        let mut config = rest_config();
        config.security.backend_jwt.enabled = true;
        let api = Arc::new(config);
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();
        let mut s = scratch(&api, 0, "GET");
        s.request.headers.insert("apikey".into(), "reader-key".into());

        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
        assert!(s.headers_to_add.contains_key("x-jwt-assertion"));
    }

    #[test]
    fn test_mandatory_mtls() {
        let mut config = rest_config();
        config.security.mutual_ssl = MutualSsl::Mandatory;
        config.security.application_security = false;
        config.security.trust_store = Arc::new(
            TrustStore::from_fingerprints(vec![(
                "aa".repeat(32),
                TrustedCertificate {
                    alias: "partner".into(),
                    tier: None,
                },
            )])
            .unwrap(),
        );
        let api = Arc::new(config);
        let filter = AuthFilter::init(api.clone(), &deps()).unwrap();

        let mut s = scratch(&api, 0, "GET");
        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Stop);
        assert_eq!(s.properties.error_code.as_deref(), Some("900901"));

        let mut s = scratch(&api, 0, "GET");
        s.request.client_certificate = Some(ClientCertificate {
            fingerprint: "AA".repeat(32),
            subject: None,
        });
        assert_eq!(filter.handle_request(&mut s).unwrap(), FilterVerdict::Continue);
        assert_eq!(
            s.properties.authentication.as_ref().unwrap().auth_type,
            AuthType::Mtls
        );
    }

    #[test]
    fn test_unavailable_validator_is_fault() {
        let api = Arc::new(rest_config());
        let deps = FilterDependencies {
            api_key: Some(Arc::new(DownValidator)),
            ..Default::default()
        };
        let filter = AuthFilter::init(api.clone(), &deps).unwrap();
        let mut s = scratch(&api, 0, "GET");
        s.request.headers.insert("apikey".into(), "k".into());

        assert!(matches!(
            filter.handle_request(&mut s),
            Err(FilterError::ValidatorUnavailable(_))
        ));
    }

    #[test]
    fn test_init_failures() {
        let api = Arc::new(rest_config());
        assert!(AuthFilter::init(api, &FilterDependencies::default()).is_err());

        let mut config = rest_config();
        config.security.mutual_ssl = MutualSsl::Optional;
        assert!(matches!(
            AuthFilter::init(Arc::new(config), &deps()),
            Err(InitError::InvalidTrustStore(_))
        ));

        let mut config = rest_config();
        config.security.backend_jwt.enabled = true;
        let no_signer = FilterDependencies {
            backend_jwt: None,
            ..deps()
        };
        assert!(AuthFilter::init(Arc::new(config), &no_signer).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
