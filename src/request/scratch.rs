//! Per-request scratch state shared by the filters of one chain run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::api::model::{ApiConfig, ResourceConfig};
use crate::error::Rejection;
use crate::filter::auth::AuthenticationContext;
use crate::graphql::analysis::QueryAnalysis;
use crate::request::description::RequestDescription;
use crate::throttling::policy::SelectedThrottle;

/// How a chain run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every filter continued.
    Completed,
    /// The named filter stopped the chain.
    Stopped { filter: &'static str },
}

/// Typed property record used to signal between filters and the assembler.
///
/// The four error fields are the only ones the assembler reads for a
/// direct response.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    pub status_code: Option<u16>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub error_description: Option<String>,

    pub authentication: Option<AuthenticationContext>,
    pub throttle: Option<SelectedThrottle>,
    pub query_analysis: Option<QueryAnalysis>,
}

impl Properties {
    /// Stage all four error properties at once.
    pub fn stage(&mut self, rejection: &Rejection) {
        self.status_code = Some(rejection.status_code);
        self.error_code = Some(rejection.error_code.to_string());
        self.error_message = Some(rejection.message.to_string());
        self.error_description = Some(rejection.description.clone());
    }

    /// Stage a non-error direct response (e.g. an answered preflight).
    pub fn stage_status(&mut self, status_code: u16) {
        self.status_code = Some(status_code);
    }

    pub fn has_error(&self) -> bool {
        self.error_code.is_some()
    }
}

/// Scratch record for one request. Owned by the worker processing it.
#[derive(Debug, Clone)]
pub struct RequestScratch {
    pub request: RequestDescription,
    pub api: Arc<ApiConfig>,
    matched_resource: Option<usize>,
    pub properties: Properties,
    pub headers_to_add: BTreeMap<String, String>,
    pub headers_to_remove: BTreeSet<String>,
    /// Part of the decision contract; no built-in filter adds query params.
    pub query_params_to_add: BTreeMap<String, String>,
    pub query_params_to_remove: BTreeSet<String>,
    pub metadata: BTreeMap<String, String>,
    pub chain: Option<ChainOutcome>,
}

impl RequestScratch {
    pub fn new(request: RequestDescription, api: Arc<ApiConfig>) -> Self {
        Self {
            request,
            api,
            matched_resource: None,
            properties: Properties::default(),
            headers_to_add: BTreeMap::new(),
            headers_to_remove: BTreeSet::new(),
            query_params_to_add: BTreeMap::new(),
            query_params_to_remove: BTreeSet::new(),
            metadata: BTreeMap::new(),
            chain: None,
        }
    }

    /// Record the route matcher's result as an index into the API's resources.
    pub fn set_matched_resource(&mut self, index: Option<usize>) {
        self.matched_resource = index.filter(|i| *i < self.api.resources.len());
    }

    pub fn matched_resource(&self) -> Option<&ResourceConfig> {
        self.matched_resource.map(|i| &self.api.resources[i])
    }

    pub fn organization_id(&self) -> &str {
        &self.api.organization_id
    }

    pub fn reject(&mut self, rejection: &Rejection) {
        self.properties.stage(rejection);
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers_to_add
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn remove_header(&mut self, name: impl Into<String>) {
        self.headers_to_remove.insert(name.into().to_ascii_lowercase());
    }

    pub fn remove_query_param(&mut self, name: impl Into<String>) {
        self.query_params_to_remove.insert(name.into());
    }
}
