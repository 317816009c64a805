//! Conditional throttling policy evaluation.

use serde::{Deserialize, Serialize};

use crate::error::InitError;
use crate::request::scratch::RequestScratch;
use crate::throttling::condition::{RequestAttributes, ThrottleCondition};

/// A rate-limit tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleLimit {
    pub policy_id: String,
    pub request_count: u64,
    pub unit_time_secs: u64,
    /// GraphQL ceilings that override the API's own when this tier is selected.
    #[serde(default)]
    pub max_query_depth: Option<u32>,
    #[serde(default)]
    pub max_query_complexity: Option<u64>,
}

impl ThrottleLimit {
    fn validate(&self) -> Result<(), InitError> {
        if self.policy_id.is_empty() {
            return Err(InitError::InvalidPolicy("limit has an empty policy_id".into()));
        }
        if self.request_count == 0 || self.unit_time_secs == 0 {
            return Err(InitError::InvalidPolicy(format!(
                "limit `{}` needs a non-zero request_count and unit_time_secs",
                self.policy_id
            )));
        }
        Ok(())
    }
}

/// A named rule: all conditions must hold for its limit to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalGroup {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: Vec<ThrottleCondition>,
    pub limit: ThrottleLimit,
}

impl ConditionalGroup {
    /// AND across conditions. A group without conditions always matches.
    pub fn matches(&self, attrs: &RequestAttributes<'_>) -> bool {
        self.conditions.iter().all(|c| c.matches(attrs))
    }
}

/// Ordered groups plus an optional unconditional tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrottlePolicy {
    #[serde(default)]
    pub groups: Vec<ConditionalGroup>,
    #[serde(default)]
    pub default_limit: Option<ThrottleLimit>,
}

/// Where a selected limit came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleSource {
    Group { index: usize, description: String },
    Default,
}

/// Result of evaluating a policy for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedThrottle {
    pub limit: ThrottleLimit,
    pub source: ThrottleSource,
}

impl ThrottlePolicy {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.default_limit.is_none()
    }

    /// First fully-matching group wins; later groups are never consulted.
    /// Falls back to the default tier, then to `None` (global defaults apply).
    pub fn evaluate(&self, attrs: &RequestAttributes<'_>) -> Option<SelectedThrottle> {
        for (index, group) in self.groups.iter().enumerate() {
            if group.matches(attrs) {
                return Some(SelectedThrottle {
                    limit: group.limit.clone(),
                    source: ThrottleSource::Group {
                        index,
                        description: group.description.clone(),
                    },
                });
            }
        }

        self.default_limit.as_ref().map(|limit| SelectedThrottle {
            limit: limit.clone(),
            source: ThrottleSource::Default,
        })
    }

    /// Reject unusable policies before an API is published.
    pub fn validate(&self) -> Result<(), InitError> {
        for group in &self.groups {
            group.limit.validate()?;
            for condition in &group.conditions {
                match condition {
                    ThrottleCondition::Ip { ip, .. } if !ip.is_well_formed() => {
                        return Err(InitError::InvalidPolicy(format!(
                            "group `{}` has an invalid IP range",
                            group.description
                        )));
                    }
                    ThrottleCondition::Header { name, .. }
                    | ThrottleCondition::QueryParameter { name, .. }
                        if name.is_empty() =>
                    {
                        return Err(InitError::InvalidPolicy(format!(
                            "group `{}` has a condition without a name",
                            group.description
                        )));
                    }
                    ThrottleCondition::JwtClaims { claim_uri, .. } if claim_uri.is_empty() => {
                        return Err(InitError::InvalidPolicy(format!(
                            "group `{}` has a claim condition without a claim URI",
                            group.description
                        )));
                    }
                    _ => {}
                }
            }
        }
        if let Some(limit) = &self.default_limit {
            limit.validate()?;
        }
        Ok(())
    }
}

/// Evaluate the policy that applies to a scratch: the matched resource's own
/// policy when it has one, otherwise the API's.
pub fn select_for_request(scratch: &RequestScratch) -> Option<SelectedThrottle> {
    let policy = scratch
        .matched_resource()
        .and_then(|r| r.throttling.as_ref())
        .unwrap_or(&scratch.api.throttling);

    if policy.is_empty() {
        return None;
    }

    let attrs = RequestAttributes {
        headers: &scratch.request.headers,
        client_ip: scratch.request.client_ip,
        query_params: &scratch.request.query_params,
        claims: scratch
            .properties
            .authentication
            .as_ref()
            .map(|auth| &auth.identity.claims),
    };

    let selected = policy.evaluate(&attrs);
    tracing::debug!(
        request_id = %scratch.request.request_id,
        policy = ?selected.as_ref().map(|s| s.limit.policy_id.as_str()),
        "Throttling policy evaluated"
    );
    selected
}
