//! End-to-end enforcement through the public `Enforcer` API.

use std::net::IpAddr;
use std::sync::Arc;

use api_enforcer::analytics::{ChannelPublisher, EventKind, NoopPublisher};
use api_enforcer::api::model::ApiConfig;
use api_enforcer::config::AnalyticsConfig;
use api_enforcer::error::InitError;
use api_enforcer::filter::auth::{
    AuthError, AuthType, AuthenticatedIdentity, Credential, CredentialValidator,
};
use api_enforcer::filter::{Filter, FilterDependencies};
use api_enforcer::response::ResponseAssembler;
use api_enforcer::{Enforcer, RequestDescription};

mod common;
use common::*;

fn pets_get(headers: &[(&str, &str)]) -> RequestDescription {
    with_headers(
        request("GET", "api.example.com", "/petstore/1.0.0/pets"),
        headers,
    )
}

fn query_analysis_count(enforcer: &Enforcer) -> u64 {
    let api = enforcer.registry().get("starwars").unwrap();
    api.chain()
        .filters()
        .iter()
        .find_map(|filter| match filter {
            Filter::QueryAnalysis(f) => Some(f.requests_analyzed()),
            _ => None,
        })
        .unwrap()
}

#[test]
fn test_allowed_rest_request_forwards_upstream() {
    let decision = default_enforcer().enforce(pets_get(&[("apikey", API_KEY)]));

    assert!(!decision.direct_response);
    assert_eq!(decision.status_code, 200);
    assert!(decision.error_code.is_none());
    assert_eq!(decision.organization_id.as_deref(), Some("org-1"));
    assert!(decision.headers_to_remove.contains("apikey"));
    assert_eq!(decision.metadata.get("auth.type").map(String::as_str), Some("api_key"));
    assert_eq!(
        decision.metadata.get("auth.application").map(String::as_str),
        Some("pet-shop-web")
    );
}

#[test]
fn test_unmatched_resource_is_not_found() {
    let enforcer = default_enforcer();

    // Inside a published API, but no resource matches
    let decision = enforcer.enforce(with_headers(
        request("GET", "api.example.com", "/petstore/1.0.0/owners"),
        &[("apikey", API_KEY)],
    ));
    assert!(decision.direct_response);
    assert_eq!(decision.status_code, 404);
    assert_eq!(decision.error_code.as_deref(), Some("404"));

    // No API at all
    let decision = enforcer.enforce(request("GET", "api.example.com", "/unknown"));
    assert_eq!(decision.status_code, 404);
    assert_eq!(decision.error_code.as_deref(), Some("404"));

    // Wrong method on a known path
    let decision = enforcer.enforce(with_headers(
        request("POST", "api.example.com", "/petstore/1.0.0/pets"),
        &[("apikey", API_KEY)],
    ));
    assert_eq!(decision.status_code, 404);
}

#[test]
fn test_authentication_failures() {
    let enforcer = default_enforcer();

    let missing = enforcer.enforce(pets_get(&[]));
    assert!(missing.direct_response);
    assert_eq!(missing.status_code, 401);
    assert_eq!(missing.error_code.as_deref(), Some("900902"));

    let invalid = enforcer.enforce(pets_get(&[("apikey", "nope")]));
    assert_eq!(invalid.status_code, 401);
    assert_eq!(invalid.error_code.as_deref(), Some("900901"));
    // Deny decisions carry no upstream directives
    assert!(invalid.headers_to_remove.is_empty());
    assert!(invalid.metadata.is_empty());
}

#[test]
fn test_missing_scope_is_forbidden() {
    let decision = default_enforcer().enforce(with_headers(
        request("DELETE", "api.example.com", "/petstore/1.0.0/pets/7"),
        &[("apikey", API_KEY)],
    ));
    assert!(decision.direct_response);
    assert_eq!(decision.status_code, 403);
    assert_eq!(decision.error_code.as_deref(), Some("900910"));
}

#[test]
fn test_cors_preflight_answered_directly() {
    let enforcer = default_enforcer();
    let preflight = with_headers(
        request("OPTIONS", "api.example.com", "/petstore/1.0.0/pets"),
        &[
            ("Origin", "https://app.example"),
            ("Access-Control-Request-Method", "GET"),
        ],
    );

    let decision = enforcer.enforce(preflight.clone());
    assert!(decision.direct_response);
    assert_eq!(decision.status_code, 204);
    assert!(decision.error_code.is_none());
    assert_eq!(
        decision.headers_to_add.get("access-control-allow-origin").map(String::as_str),
        Some("https://app.example")
    );

    let rejected = enforcer.enforce(with_headers(preflight, &[("Origin", "https://evil.example")]));
    assert!(rejected.direct_response);
    assert_eq!(rejected.status_code, 403);
    assert_eq!(rejected.error_code.as_deref(), Some("cors_origin_not_allowed"));
}

#[test]
fn test_cors_headers_added_to_allowed_request() {
    let decision = default_enforcer().enforce(pets_get(&[
        ("apikey", API_KEY),
        ("origin", "https://app.example"),
    ]));
    assert!(decision.is_allowed());
    assert_eq!(
        decision.headers_to_add.get("access-control-allow-origin").map(String::as_str),
        Some("https://app.example")
    );
}

#[test]
fn test_throttling_group_selection() {
    let enforcer = default_enforcer();
    let policy = |decision: &api_enforcer::EnforcementDecision| {
        decision.metadata.get("ratelimit.policy").cloned()
    };

    let host = enforcer.enforce(pets_get(&[("apikey", API_KEY), ("Host", "10.0.0.1")]));
    assert_eq!(policy(&host).as_deref(), Some("HostTier"));
    assert_eq!(host.metadata.get("ratelimit.requests").map(String::as_str), Some("50"));

    let mut inside = pets_get(&[("apikey", API_KEY), ("Host", "other")]);
    inside.client_ip = Some("10.0.0.5".parse::<IpAddr>().unwrap());
    assert_eq!(policy(&enforcer.enforce(inside)).as_deref(), Some("Internal"));

    let mut outside = pets_get(&[("apikey", API_KEY), ("Host", "other")]);
    outside.client_ip = Some("10.0.0.11".parse::<IpAddr>().unwrap());
    assert_eq!(policy(&enforcer.enforce(outside)).as_deref(), Some("Bronze"));
}

#[test]
fn test_inverted_header_condition() {
    let enforcer = default_enforcer();
    let items = |headers: &[(&str, &str)]| {
        let mut all = vec![("apikey", API_KEY)];
        all.extend_from_slice(headers);
        enforcer.enforce(with_headers(request("GET", "any.host", "/inventory/items"), &all))
    };

    let staging = items(&[("x-env", "staging")]);
    assert_eq!(staging.metadata.get("ratelimit.policy").map(String::as_str), Some("Sandbox"));

    let prod = items(&[("x-env", "prod")]);
    assert!(prod.is_allowed());
    assert!(prod.metadata.get("ratelimit.policy").is_none());

    // Absent header never matches, inverted or not
    let absent = items(&[]);
    assert!(absent.is_allowed());
    assert!(absent.metadata.get("ratelimit.policy").is_none());
}

#[test]
fn test_graphql_complexity_ceiling() {
    let enforcer = default_enforcer();

    let decision = enforcer.enforce(with_headers(
        graphql_request(&deep_query()),
        &[("apikey", API_KEY)],
    ));
    assert!(decision.direct_response);
    assert_eq!(decision.status_code, 400);
    assert_eq!(decision.error_code.as_deref(), Some("900821"));

    let shallow = enforcer.enforce(with_headers(
        graphql_request("{ hero { name } }"),
        &[("apikey", API_KEY)],
    ));
    assert!(shallow.is_allowed());
    assert_eq!(shallow.metadata.get("graphql.complexity").map(String::as_str), Some("2"));
    assert_eq!(query_analysis_count(&enforcer), 2);
}

#[test]
fn test_auth_rejection_skips_query_analysis() {
    let enforcer = default_enforcer();

    let decision = enforcer.enforce(graphql_request(&deep_query()));
    assert_eq!(decision.status_code, 401);
    assert_eq!(decision.error_code.as_deref(), Some("900902"));
    assert_eq!(query_analysis_count(&enforcer), 0);
}

#[derive(Debug)]
struct PanickingValidator;

impl CredentialValidator for PanickingValidator {
    fn kind(&self) -> AuthType {
        AuthType::ApiKey
    }

    fn validate(
        &self,
        _credential: &Credential<'_>,
        _api: &ApiConfig,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        panic!("key store corrupted");
    }
}

#[test]
fn test_filter_panic_becomes_internal_error() {
    let enforcer = enforcer(
        FilterDependencies {
            api_key: Some(Arc::new(PanickingValidator)),
            ..Default::default()
        },
        ResponseAssembler::default(),
        Arc::new(NoopPublisher),
        &[PETSTORE],
    );

    let decision = enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    assert!(decision.direct_response);
    assert_eq!(decision.status_code, 500);
    assert_eq!(decision.error_code.as_deref(), Some("900967"));

    // The chain stays usable for later requests
    let again = enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    assert_eq!(again.status_code, 500);
}

#[derive(Debug)]
struct UnreachableKeyStore;

impl CredentialValidator for UnreachableKeyStore {
    fn kind(&self) -> AuthType {
        AuthType::ApiKey
    }

    fn validate(
        &self,
        _credential: &Credential<'_>,
        _api: &ApiConfig,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        Err(AuthError::Unavailable("key store timed out".into()))
    }
}

#[test]
fn test_filter_error_becomes_internal_error() {
    let enforcer = enforcer(
        FilterDependencies {
            api_key: Some(Arc::new(UnreachableKeyStore)),
            ..Default::default()
        },
        ResponseAssembler::default(),
        Arc::new(NoopPublisher),
        &[PETSTORE],
    );

    let decision = enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    assert!(decision.direct_response);
    assert_eq!(decision.status_code, 500);
    assert_eq!(decision.error_code.as_deref(), Some("900967"));
    assert!(!decision.is_allowed());
}

#[test]
fn test_analytics_events_per_outcome() {
    let (publisher, mut rx) = ChannelPublisher::new();
    let assembler = ResponseAssembler::new(&AnalyticsConfig {
        enabled: true,
        skipped_error_codes: vec!["900902".into()],
    });
    let enforcer = enforcer(api_key_deps(), assembler, Arc::new(publisher), &[PETSTORE]);

    enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    let success = rx.try_recv().unwrap();
    assert_eq!(success.kind, EventKind::Success);
    assert_eq!(success.subject.as_deref(), Some("alice"));
    assert_eq!(success.throttle_policy.as_deref(), Some("Bronze"));

    enforcer.enforce(pets_get(&[("apikey", "nope")]));
    let failure = rx.try_recv().unwrap();
    assert_eq!(failure.kind, EventKind::Failure);
    assert_eq!(failure.error_code.as_deref(), Some("900901"));

    // Suppressed code: no event at all
    enforcer.enforce(pets_get(&[]));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_dropped_analytics_consumer_does_not_change_decision() {
    let (publisher, rx) = ChannelPublisher::new();
    drop(rx);
    let assembler = ResponseAssembler::new(&AnalyticsConfig {
        enabled: true,
        skipped_error_codes: vec![],
    });
    let enforcer = enforcer(api_key_deps(), assembler, Arc::new(publisher), &[PETSTORE]);

    assert!(enforcer.enforce(pets_get(&[("apikey", API_KEY)])).is_allowed());
}

#[test]
fn test_same_request_same_decision() {
    let enforcer = default_enforcer();
    let first = enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    let second = enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn test_blocked_api_unavailable() {
    let blocked = PETSTORE.replace(
        "organization_id = \"org-1\"",
        "organization_id = \"org-1\"\n    lifecycle_state = \"BLOCKED\"",
    );
    let enforcer = enforcer(
        api_key_deps(),
        ResponseAssembler::default(),
        Arc::new(NoopPublisher),
        &[&blocked],
    );

    let decision = enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    assert_eq!(decision.status_code, 503);
    assert_eq!(decision.error_code.as_deref(), Some("900907"));
}

#[test]
fn test_reload_keeps_previous_version_of_broken_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let petstore = dir.path().join("petstore.toml");
    std::fs::write(&petstore, PETSTORE).unwrap();
    std::fs::write(dir.path().join("inventory.toml"), INVENTORY).unwrap();

    let enforcer = Enforcer::new(ResponseAssembler::default(), Arc::new(NoopPublisher), api_key_deps());
    let report = enforcer.load_directory(dir.path()).unwrap();
    assert_eq!(report.published.len(), 2);
    assert!(report.failed.is_empty());

    // Break one descriptor, delete the other
    std::fs::write(&petstore, "uuid = \"petstore\"").unwrap();
    std::fs::remove_file(dir.path().join("inventory.toml")).unwrap();
    let report = enforcer.load_directory(dir.path()).unwrap();
    assert_eq!(report.failed.len(), 1);

    assert!(enforcer.registry().get("petstore").is_some());
    assert!(enforcer.registry().get("inventory").is_none());
    assert!(enforcer.enforce(pets_get(&[("apikey", API_KEY)])).is_allowed());
}

#[test]
fn test_deploy_onto_served_base_path_is_refused() {
    let enforcer = default_enforcer();

    let mut v2 = compile(PETSTORE);
    v2.uuid = "petstore-v2".into();
    let err = enforcer.deploy(v2).unwrap_err();
    assert!(matches!(err, InitError::RouteConflict { .. }));

    assert!(enforcer.registry().get("petstore-v2").is_none());
    let decision = enforcer.enforce(pets_get(&[("apikey", API_KEY)]));
    assert!(decision.is_allowed());
    assert_eq!(enforcer.registry().len(), 3);
}

#[test]
fn test_reload_reports_conflicting_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a-petstore.toml"), PETSTORE).unwrap();
    std::fs::write(
        dir.path().join("b-petstore-copy.toml"),
        PETSTORE.replace("uuid = \"petstore\"", "uuid = \"petstore-copy\""),
    )
    .unwrap();

    let enforcer = Enforcer::new(ResponseAssembler::default(), Arc::new(NoopPublisher), api_key_deps());
    let report = enforcer.load_directory(dir.path()).unwrap();

    assert_eq!(report.published, vec!["petstore:1.0.0".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("b-petstore-copy.toml"));
    assert!(enforcer.registry().get("petstore").is_some());
    assert!(enforcer.registry().get("petstore-copy").is_none());
}
