//! A published API: config snapshot, resource router and filter chain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsPublisher;
use crate::api::model::{ApiConfig, ApiType, LifecycleState};
use crate::error::InitError;
use crate::filter::{FilterChain, FilterDependencies};
use crate::observability::metrics;
use crate::request::description::RequestDescription;
use crate::request::scratch::RequestScratch;
use crate::response::{EnforcementDecision, ResponseAssembler};
use crate::routing::ResourceRouter;

#[derive(Debug)]
pub struct DeployedApi {
    config: Arc<ApiConfig>,
    router: ResourceRouter,
    chain: FilterChain,
    /// Descriptor file the API was compiled from, if any.
    source: Option<PathBuf>,
}

impl DeployedApi {
    /// Compile the router and initialize every filter. Fails without side effects.
    pub fn deploy(config: ApiConfig, deps: &FilterDependencies) -> Result<Self, InitError> {
        let config = Arc::new(config);
        let router = ResourceRouter::compile(&config)?;
        let chain = FilterChain::build(&config, deps)?;
        Ok(Self {
            config,
            router,
            chain,
            source: None,
        })
    }

    pub fn with_source(mut self, source: PathBuf) -> Self {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &Arc<ApiConfig> {
        &self.config
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    /// Route, run the chain, assemble, publish analytics.
    pub fn process(
        &self,
        request: RequestDescription,
        assembler: &ResponseAssembler,
        publisher: &dyn AnalyticsPublisher,
    ) -> EnforcementDecision {
        let start = Instant::now();
        let matched = self.router.route(&request);
        let mut scratch = RequestScratch::new(request, self.config.clone());
        scratch.set_matched_resource(matched);

        if scratch.matched_resource().is_some() || scratch.request.is_options() {
            self.chain.run(&mut scratch);
        }

        let decision = assembler.assemble(&scratch);
        assembler.publish(publisher, &scratch, &decision);

        tracing::debug!(
            request_id = %decision.request_id,
            api = %self.config.display_name(),
            method = %scratch.request.method,
            path = %scratch.request.path,
            status = decision.status_code,
            outcome = decision.outcome(),
            chain = ?scratch.chain,
            "Request enforced"
        );
        metrics::record_decision(
            &self.config.display_name(),
            decision.outcome(),
            decision.status_code,
            start,
        );
        decision
    }

    pub fn summary(&self) -> ApiSummary {
        ApiSummary {
            uuid: self.config.uuid.clone(),
            name: self.config.name.clone(),
            version: self.config.version.clone(),
            vhost: self.config.vhost.clone(),
            base_path: self.config.base_path.clone(),
            api_type: self.config.api_type,
            lifecycle_state: self.config.lifecycle_state,
            resources: self.config.resources.len(),
            filters: self
                .chain
                .filter_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// What `GET /apis` reports per published API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSummary {
    pub uuid: String,
    pub name: String,
    pub version: String,
    pub vhost: String,
    pub base_path: String,
    pub api_type: ApiType,
    pub lifecycle_state: LifecycleState,
    pub resources: usize,
    pub filters: Vec<String>,
}
