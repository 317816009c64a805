//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeouts, body limit, request ID)
//! - Bind server to listener
//! - Hand request descriptions to the enforcer
//!
//! # Endpoints
//! - `POST /enforce`: `RequestDescription` in, `EnforcementDecision` out
//! - `GET /health`: liveness plus published API count
//! - `GET /apis`: summary of every published API

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::ApiSummary;
use crate::config::ListenerConfig;
use crate::enforcer::Enforcer;
use crate::request::description::RequestDescription;
use crate::response::EnforcementDecision;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub enforcer: Arc<Enforcer>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub apis: usize,
}

/// HTTP server exposing the decision endpoint.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(enforcer: Arc<Enforcer>, config: &ListenerConfig) -> Self {
        let router = Self::build_router(config, AppState { enforcer });
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        let header = axum::http::HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .route("/enforce", post(enforce_handler))
            .route("/health", get(health_handler))
            .route("/apis", get(apis_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.request_timeout_secs,
                    )))
                    .layer(PropagateRequestIdLayer::new(header)),
            )
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn enforce_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<RequestDescription>,
) -> Json<EnforcementDecision> {
    // Fall back to the id assigned by the request-id layer
    if request.request_id.is_empty() {
        if let Some(id) = headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
            request.request_id = id.to_string();
        }
    }
    Json(state.enforcer.enforce(request))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok".to_string(),
        apis: state.enforcer.registry().len(),
    })
}

async fn apis_handler(State(state): State<AppState>) -> Json<Vec<ApiSummary>> {
    let mut summaries: Vec<ApiSummary> = state
        .enforcer
        .registry()
        .snapshot()
        .apis()
        .map(|api| api.summary())
        .collect();
    summaries.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
    Json(summaries)
}
