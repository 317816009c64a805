//! GraphQL query depth and complexity enforcement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::api::model::{ApiConfig, GraphQlSettings};
use crate::error::{InitError, Rejection};
use crate::filter::FilterVerdict;
use crate::graphql::{analyze_within, AnalysisError, GraphQlPayload};
use crate::request::scratch::RequestScratch;

#[derive(Debug)]
pub struct QueryAnalysisFilter {
    settings: GraphQlSettings,
    analyzed: AtomicU64,
}

impl QueryAnalysisFilter {
    pub const NAME: &'static str = "graphql_query_analysis";

    pub fn init(api: &Arc<ApiConfig>) -> Result<Self, InitError> {
        let settings = api.graphql.clone().ok_or_else(|| {
            InitError::filter(Self::NAME, format!("{} has no GraphQL schema", api.display_name()))
        })?;
        Ok(Self {
            settings,
            analyzed: AtomicU64::new(0),
        })
    }

    /// Number of requests this filter has inspected.
    pub fn requests_analyzed(&self) -> u64 {
        self.analyzed.load(Ordering::Relaxed)
    }

    pub fn handle_request(&self, scratch: &mut RequestScratch) -> FilterVerdict {
        // Unmatched OPTIONS requests carry no operation
        if scratch.matched_resource().is_none() {
            return FilterVerdict::Continue;
        }
        self.analyzed.fetch_add(1, Ordering::Relaxed);

        let (max_depth, max_complexity) = self.ceilings(scratch);

        let analysis = match GraphQlPayload::from_request(&scratch.request)
            .and_then(|payload| analyze_within(&self.settings.schema, &payload, max_complexity))
        {
            Ok(analysis) => analysis,
            // Reported cost is a lower bound: the walk stopped at the ceiling
            Err(AnalysisError::TooComplex { complexity, max }) => {
                scratch.reject(&Rejection::query_too_complex(complexity, max));
                return FilterVerdict::Stop;
            }
            Err(err) => {
                tracing::debug!(
                    request_id = %scratch.request.request_id,
                    error = %err,
                    "GraphQL query rejected"
                );
                scratch.reject(&Rejection::invalid_query(err.to_string()));
                return FilterVerdict::Stop;
            }
        };

        if let Some(max) = max_depth.filter(|max| analysis.depth > *max) {
            scratch.reject(&Rejection::query_too_deep(analysis.depth, max));
            return FilterVerdict::Stop;
        }
        if let Some(max) = max_complexity.filter(|max| analysis.complexity > *max) {
            scratch.reject(&Rejection::query_too_complex(analysis.complexity, max));
            return FilterVerdict::Stop;
        }

        scratch
            .metadata
            .insert("graphql.operation".into(), analysis.operation.as_str().to_string());
        scratch
            .metadata
            .insert("graphql.depth".into(), analysis.depth.to_string());
        scratch
            .metadata
            .insert("graphql.complexity".into(), analysis.complexity.to_string());
        scratch.properties.query_analysis = Some(analysis);
        FilterVerdict::Continue
    }

    /// The selected throttling tier's ceilings win over the API's.
    fn ceilings(&self, scratch: &RequestScratch) -> (Option<u32>, Option<u64>) {
        let tier = scratch.properties.throttle.as_ref().map(|t| &t.limit);
        (
            tier.and_then(|l| l.max_query_depth).or(self.settings.max_depth),
            tier.and_then(|l| l.max_query_complexity)
                .or(self.settings.max_complexity),
        )
    }
}
