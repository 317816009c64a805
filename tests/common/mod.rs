//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use api_enforcer::analytics::{AnalyticsPublisher, NoopPublisher};
use api_enforcer::api::{ApiConfig, ApiDescriptor};
use api_enforcer::filter::auth::{ApiKeyEntry, ApiKeyValidator};
use api_enforcer::filter::FilterDependencies;
use api_enforcer::response::ResponseAssembler;
use api_enforcer::{Enforcer, RequestDescription};

pub const API_KEY: &str = "petstore-key";

/// REST API with CORS, scopes and conditional throttling.
pub const PETSTORE: &str = r#"
    uuid = "petstore"
    name = "petstore"
    version = "1.0.0"
    organization_id = "org-1"
    base_path = "/petstore/1.0.0"
    vhost = "api.example.com"
    endpoints = ["http://pets.internal:8080"]

    [cors]
    enabled = true
    allow_origins = ["https://app.example"]
    allow_methods = ["GET", "DELETE"]
    allow_headers = ["apikey", "content-type"]

    [throttling.default_limit]
    policy_id = "Bronze"
    request_count = 100
    unit_time_secs = 60

    [[throttling.groups]]
    description = "loopback host"
    limit = { policy_id = "HostTier", request_count = 50, unit_time_secs = 60 }
    conditions = [{ type = "header", name = "Host", value = "10.0.0.1" }]

    [[throttling.groups]]
    description = "internal network"
    limit = { policy_id = "Internal", request_count = 10000, unit_time_secs = 60 }
    conditions = [{ type = "ip", ip = { kind = "range", start = "10.0.0.1", end = "10.0.0.10" } }]

    [[resources]]
    path = "/pets"
    method = "GET"

    [[resources]]
    path = "/pets/{id}"
    method = "DELETE"
    scopes = ["pets:write"]
"#;

/// REST API whose only throttling group is an inverted header condition.
pub const INVENTORY: &str = r#"
    uuid = "inventory"
    name = "inventory"
    version = "2.0.0"
    base_path = "/inventory"

    [[throttling.groups]]
    description = "non-production callers"
    limit = { policy_id = "Sandbox", request_count = 5, unit_time_secs = 60 }
    conditions = [{ type = "header", name = "x-env", value = "prod", invert = true }]

    [[resources]]
    path = "/items"
    method = "GET"
"#;

/// GraphQL API with a complexity ceiling of 100.
pub const STARWARS: &str = r#"
    uuid = "starwars"
    name = "starwars"
    version = "1"
    base_path = "/graphql"
    api_type = "graphql"

    [graphql]
    schema = """
        type Query { node: Node hero: Hero }
        type Node { child: Node value: Int }
        type Hero { name: String }
    """
    max_complexity = 100
    complexity = [{ type = "Node", field = "child", complexity = 10 }]

    [[resources]]
    path = "node"
    method = "query"

    [[resources]]
    path = "hero"
    method = "query"
"#;

pub fn compile(descriptor: &str) -> ApiConfig {
    ApiDescriptor::from_toml(descriptor)
        .unwrap()
        .compile(Path::new("."))
        .unwrap()
}

pub fn api_key_entry() -> ApiKeyEntry {
    ApiKeyEntry {
        key: API_KEY.into(),
        subject: "alice".into(),
        application: Some("pet-shop-web".into()),
        tier: Some("Gold".into()),
        scopes: vec!["pets:read".into()],
        apis: vec![],
    }
}

pub fn api_key_deps() -> FilterDependencies {
    FilterDependencies {
        api_key: Some(Arc::new(ApiKeyValidator::new(vec![api_key_entry()]))),
        ..Default::default()
    }
}

/// An enforcer with every descriptor deployed.
pub fn enforcer(
    deps: FilterDependencies,
    assembler: ResponseAssembler,
    publisher: Arc<dyn AnalyticsPublisher>,
    descriptors: &[&str],
) -> Enforcer {
    let enforcer = Enforcer::new(assembler, publisher, deps);
    for descriptor in descriptors {
        enforcer.deploy(compile(descriptor)).unwrap();
    }
    enforcer
}

pub fn default_enforcer() -> Enforcer {
    enforcer(
        api_key_deps(),
        ResponseAssembler::default(),
        Arc::new(NoopPublisher),
        &[PETSTORE, INVENTORY, STARWARS],
    )
}

pub fn request(method: &str, vhost: &str, path: &str) -> RequestDescription {
    RequestDescription {
        request_id: "req-1".into(),
        method: method.into(),
        path: path.into(),
        vhost: vhost.into(),
        ..Default::default()
    }
}

pub fn with_headers(mut request: RequestDescription, headers: &[(&str, &str)]) -> RequestDescription {
    let extra: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    request.headers.extend(extra);
    request
}

/// Eleven nested `child` selections under `node`: complexity 112.
pub fn deep_query() -> String {
    let mut query = String::from("{ node {");
    for _ in 0..11 {
        query.push_str(" child {");
    }
    query.push_str(" value");
    for _ in 0..11 {
        query.push_str(" }");
    }
    query.push_str(" } }");
    query
}

pub fn graphql_request(query: &str) -> RequestDescription {
    RequestDescription {
        body: Some(serde_json::json!({ "query": query }).to_string()),
        ..request("POST", "localhost", "/graphql")
    }
}
