//! The decision handed back to the interception layer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Rejection;

/// Outcome of enforcing one request.
///
/// `direct_response == false` means forward upstream with status 200 and the
/// mutation directives applied. `direct_response == true` means answer the
/// client directly with `status_code`; any status of 400 or above carries an
/// error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementDecision {
    pub request_id: String,
    pub path: String,
    pub direct_response: bool,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub headers_to_add: BTreeMap<String, String>,
    #[serde(default)]
    pub headers_to_remove: BTreeSet<String>,
    #[serde(default)]
    pub query_params_to_add: BTreeMap<String, String>,
    #[serde(default)]
    pub query_params_to_remove: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl EnforcementDecision {
    /// A direct response built from a rejection, with no directives.
    pub fn rejected(request_id: &str, path: &str, rejection: &Rejection) -> Self {
        Self {
            request_id: request_id.to_string(),
            path: path.to_string(),
            direct_response: true,
            status_code: rejection.status_code,
            error_code: Some(rejection.error_code.to_string()),
            error_message: Some(rejection.message.to_string()),
            error_description: Some(rejection.description.clone()),
            organization_id: None,
            headers_to_add: BTreeMap::new(),
            headers_to_remove: BTreeSet::new(),
            query_params_to_add: BTreeMap::new(),
            query_params_to_remove: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        !self.direct_response
    }

    /// `allow`, `deny` (error status) or `direct` (answered without error).
    pub fn outcome(&self) -> &'static str {
        if !self.direct_response {
            "allow"
        } else if self.error_code.is_some() {
            "deny"
        } else {
            "direct"
        }
    }
}
