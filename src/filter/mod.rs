//! Request filter subsystem.
//!
//! # Data Flow
//! ```text
//! ApiConfig (at publication)
//!     → chain.rs (fixed order: cors → auth → protocol filters)
//!     → each filter init (fatal InitError on unusable config)
//!
//! Per request:
//!     RequestScratch
//!     → cors.rs (preflight answers, CORS response headers)
//!     → auth/ (credentials, scopes, throttling tier, backend JWT)
//!     → query_analysis.rs (GraphQL depth/complexity, GraphQL APIs only)
//!     → stop at first rejection
//! ```
//!
//! # Design Decisions
//! - Filters are a closed enum, dispatch is an exhaustive match
//! - A rejecting filter stages status and error properties before stopping
//! - Faults and panics never escape the executor; they become a 500

pub mod auth;
pub mod chain;
pub mod cors;
pub mod query_analysis;

pub use auth::AuthFilter;
pub use chain::{FilterChain, FilterDependencies};
pub use cors::CorsFilter;
pub use query_analysis::QueryAnalysisFilter;

use std::sync::Arc;

use crate::api::model::{ApiConfig, ApiType};
use crate::error::{FilterError, InitError};
use crate::request::scratch::RequestScratch;

/// What a filter wants the chain to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Continue,
    /// Terminate the chain; the property record holds the response.
    Stop,
}

/// The filter kinds a chain can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Cors,
    Auth,
    GraphQlQueryAnalysis,
}

impl FilterKind {
    /// Full chain order for an API type. CORS always comes first and
    /// authentication second; protocol filters follow in declaration order.
    pub fn chain_order(api_type: ApiType) -> Vec<FilterKind> {
        let mut order = vec![FilterKind::Cors, FilterKind::Auth];
        match api_type {
            ApiType::Rest => {}
            ApiType::GraphQl => order.push(FilterKind::GraphQlQueryAnalysis),
        }
        order
    }
}

/// A configured filter instance.
#[derive(Debug)]
pub enum Filter {
    Cors(CorsFilter),
    Auth(AuthFilter),
    QueryAnalysis(QueryAnalysisFilter),
}

impl Filter {
    /// One-time initialization against an API snapshot.
    pub fn init(
        kind: FilterKind,
        api: &Arc<ApiConfig>,
        deps: &FilterDependencies,
    ) -> Result<Self, InitError> {
        Ok(match kind {
            FilterKind::Cors => Filter::Cors(CorsFilter::init(api)?),
            FilterKind::Auth => Filter::Auth(AuthFilter::init(api.clone(), deps)?),
            FilterKind::GraphQlQueryAnalysis => {
                Filter::QueryAnalysis(QueryAnalysisFilter::init(api)?)
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::Cors(_) => CorsFilter::NAME,
            Filter::Auth(_) => AuthFilter::NAME,
            Filter::QueryAnalysis(_) => QueryAnalysisFilter::NAME,
        }
    }

    pub fn handle_request(&self, scratch: &mut RequestScratch) -> Result<FilterVerdict, FilterError> {
        match self {
            Filter::Cors(f) => Ok(f.handle_request(scratch)),
            Filter::Auth(f) => f.handle_request(scratch),
            Filter::QueryAnalysis(f) => Ok(f.handle_request(scratch)),
        }
    }
}
