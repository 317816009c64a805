//! Turns a finished request scratch into a decision.
//!
//! # Responsibilities
//! - Allow decisions: copy mutation directives and metadata verbatim
//! - Direct decisions: read the four staged error properties
//! - Synthesize a 404 when nothing matched and nothing was staged
//! - Pick the analytics hook for a decision
//!
//! # Design Decisions
//! - `assemble` is pure; hook invocation is a separate step
//! - Direct responses keep added headers (CORS) but no other directives

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::analytics::{AnalyticsEvent, AnalyticsPublisher, EventKind};
use crate::config::schema::AnalyticsConfig;
use crate::error::Rejection;
use crate::request::scratch::{ChainOutcome, RequestScratch};
use crate::response::decision::EnforcementDecision;

const ALLOW_STATUS: u16 = 200;

#[derive(Debug, Clone, Default)]
pub struct ResponseAssembler {
    analytics_enabled: bool,
    skipped_error_codes: HashSet<String>,
}

impl ResponseAssembler {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            analytics_enabled: config.enabled,
            skipped_error_codes: config.skipped_error_codes.iter().cloned().collect(),
        }
    }

    /// Build the decision for a scratch. Same scratch, same decision.
    pub fn assemble(&self, scratch: &RequestScratch) -> EnforcementDecision {
        if scratch.chain == Some(ChainOutcome::Completed) {
            return EnforcementDecision {
                request_id: scratch.request.request_id.clone(),
                path: scratch.request.path.clone(),
                direct_response: false,
                status_code: ALLOW_STATUS,
                error_code: None,
                error_message: None,
                error_description: None,
                organization_id: Some(scratch.organization_id().to_string()),
                headers_to_add: scratch.headers_to_add.clone(),
                headers_to_remove: scratch.headers_to_remove.clone(),
                query_params_to_add: scratch.query_params_to_add.clone(),
                query_params_to_remove: scratch.query_params_to_remove.clone(),
                metadata: scratch.metadata.clone(),
            };
        }

        let properties = &scratch.properties;
        let Some(status_code) = properties.status_code else {
            let rejection = if scratch.matched_resource().is_none() && !scratch.request.is_options() {
                Rejection::not_found()
            } else {
                Rejection::internal()
            };
            return EnforcementDecision::rejected(
                &scratch.request.request_id,
                &scratch.request.path,
                &rejection,
            );
        };

        let mut decision = EnforcementDecision {
            request_id: scratch.request.request_id.clone(),
            path: scratch.request.path.clone(),
            direct_response: true,
            status_code,
            error_code: properties.error_code.clone(),
            error_message: properties.error_message.clone(),
            error_description: properties.error_description.clone(),
            organization_id: None,
            headers_to_add: scratch.headers_to_add.clone(),
            headers_to_remove: BTreeSet::new(),
            query_params_to_add: BTreeMap::new(),
            query_params_to_remove: BTreeSet::new(),
            metadata: BTreeMap::new(),
        };
        if status_code >= 400 && decision.error_code.is_none() {
            let internal = Rejection::internal();
            decision.error_code = Some(internal.error_code.to_string());
            decision.error_message = Some(internal.message.to_string());
        }
        decision
    }

    /// The analytics event a decision calls for, if any.
    pub fn analytics_event(
        &self,
        scratch: &RequestScratch,
        decision: &EnforcementDecision,
    ) -> Option<AnalyticsEvent> {
        if !self.analytics_enabled {
            return None;
        }
        let kind = if decision.is_allowed() {
            EventKind::Success
        } else {
            let code = decision.error_code.as_ref()?;
            if self.skipped_error_codes.contains(code) {
                return None;
            }
            EventKind::Failure
        };

        let auth = scratch.properties.authentication.as_ref();
        Some(AnalyticsEvent {
            kind,
            request_id: decision.request_id.clone(),
            api_uuid: scratch.api.uuid.clone(),
            api_name: scratch.api.name.clone(),
            api_version: scratch.api.version.clone(),
            organization_id: scratch.api.organization_id.clone(),
            method: scratch.request.method.clone(),
            path: scratch.request.path.clone(),
            status_code: decision.status_code,
            error_code: decision.error_code.clone(),
            subject: auth.map(|a| a.identity.subject.clone()),
            application: auth.and_then(|a| a.identity.application.clone()),
            throttle_policy: scratch
                .properties
                .throttle
                .as_ref()
                .map(|t| t.limit.policy_id.clone()),
            timestamp_ms: AnalyticsEvent::now_ms(),
        })
    }

    /// Fire the analytics hook for a decision. Errors are logged, never returned.
    pub fn publish(
        &self,
        publisher: &dyn AnalyticsPublisher,
        scratch: &RequestScratch,
        decision: &EnforcementDecision,
    ) {
        let Some(event) = self.analytics_event(scratch, decision) else {
            return;
        };
        let result = match event.kind {
            EventKind::Success => publisher.handle_success(event),
            EventKind::Failure => publisher.handle_failure(event),
        };
        if let Err(e) = result {
            tracing::warn!(
                request_id = %decision.request_id,
                error = %e,
                "Analytics event dropped"
            );
        }
    }
}
