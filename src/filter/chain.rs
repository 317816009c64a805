//! Filter chain construction and execution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::api::model::ApiConfig;
use crate::error::{FilterError, InitError, Rejection};
use crate::filter::auth::{BackendJwtIssuer, CredentialValidator};
use crate::filter::{Filter, FilterKind, FilterVerdict};
use crate::observability::metrics;
use crate::request::scratch::{ChainOutcome, RequestScratch};

/// Process-wide collaborators handed to filters at init time.
#[derive(Debug, Clone, Default)]
pub struct FilterDependencies {
    pub jwt: Option<Arc<dyn CredentialValidator>>,
    pub api_key: Option<Arc<dyn CredentialValidator>>,
    pub backend_jwt: Option<Arc<BackendJwtIssuer>>,
}

/// The ordered filters of one API. Built once per publication.
#[derive(Debug)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    /// Initialize every filter in chain order. Any init failure aborts the build.
    pub fn build(api: &Arc<ApiConfig>, deps: &FilterDependencies) -> Result<Self, InitError> {
        let filters = FilterKind::chain_order(api.api_type)
            .into_iter()
            .map(|kind| Filter::init(kind, api, deps))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            api = %api.display_name(),
            filters = ?filters.iter().map(Filter::name).collect::<Vec<_>>(),
            "Filter chain built"
        );
        Ok(Self { filters })
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(Filter::name).collect()
    }

    /// Run the filters in order until one stops.
    ///
    /// Returns `true` when every filter continued. Faults and panics are
    /// turned into a staged 500.
    pub fn run(&self, scratch: &mut RequestScratch) -> bool {
        for filter in &self.filters {
            let name = filter.name();
            let result = panic::catch_unwind(AssertUnwindSafe(|| filter.handle_request(scratch)));

            match result {
                Ok(Ok(FilterVerdict::Continue)) => continue,
                Ok(Ok(FilterVerdict::Stop)) => {
                    if scratch.properties.status_code.is_none() {
                        tracing::error!(
                            request_id = %scratch.request.request_id,
                            filter = name,
                            "Filter stopped the chain without staging a response"
                        );
                        scratch.reject(&Rejection::internal());
                    }
                }
                Ok(Err(err)) => fault(scratch, name, &err),
                Err(payload) => {
                    let err = FilterError::Internal(panic_message(payload.as_ref()));
                    fault(scratch, name, &err);
                }
            }

            if let Some(code) = scratch.properties.error_code.as_deref() {
                metrics::record_filter_rejection(name, code);
            }
            scratch.chain = Some(ChainOutcome::Stopped { filter: name });
            return false;
        }

        scratch.chain = Some(ChainOutcome::Completed);
        true
    }
}

fn fault(scratch: &mut RequestScratch, filter: &'static str, err: &FilterError) {
    tracing::error!(
        request_id = %scratch.request.request_id,
        api = %scratch.api.display_name(),
        filter,
        error = %err,
        "Filter fault"
    );
    scratch.reject(&Rejection::internal());
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
