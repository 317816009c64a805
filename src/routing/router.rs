//! Resource lookup inside one API.
//!
//! # Responsibilities
//! - Store compiled resource matchers
//! - Strip the API base path and look up the matching resource
//! - Return the matched resource index or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over resources (acceptable for typical API sizes)
//! - GraphQL requests whose operation cannot be read fall through to the
//!   first resource so query analysis reports the error

use crate::api::model::{ApiConfig, ApiType};
use crate::error::InitError;
use crate::graphql::{summarize, GraphQlPayload};
use crate::request::description::{RequestDescription, OPTIONS};
use crate::routing::matcher::ResourceMatcher;

#[derive(Debug, Clone)]
pub struct ResourceRouter {
    api_type: ApiType,
    base_path: String,
    matchers: Vec<ResourceMatcher>,
}

impl ResourceRouter {
    pub fn compile(api: &ApiConfig) -> Result<Self, InitError> {
        let matchers = api
            .resources
            .iter()
            .map(|r| match api.api_type {
                ApiType::Rest => ResourceMatcher::rest(&r.method, &r.path_template),
                ApiType::GraphQl => ResourceMatcher::graphql(&r.method, &r.path_template),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            api_type: api.api_type,
            base_path: api.base_path.trim_end_matches('/').to_string(),
            matchers,
        })
    }

    /// Index of the resource serving this request.
    pub fn route(&self, request: &RequestDescription) -> Option<usize> {
        match self.api_type {
            ApiType::Rest => self.route_rest(request),
            ApiType::GraphQl => self.route_graphql(request),
        }
    }

    fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.base_path.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    fn route_rest(&self, request: &RequestDescription) -> Option<usize> {
        let relative = self.relative_path(&request.path)?;
        let mut best: Option<(usize, (usize, usize, bool))> = None;
        for (index, matcher) in self.matchers.iter().enumerate() {
            if !matcher.matches_rest(&request.method, relative) {
                continue;
            }
            let ResourceMatcher::Rest { template, .. } = matcher else {
                continue;
            };
            let score = template.specificity();
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    fn route_graphql(&self, request: &RequestDescription) -> Option<usize> {
        self.relative_path(&request.path)?;
        if request.method.eq_ignore_ascii_case(OPTIONS) || self.matchers.is_empty() {
            return None;
        }

        let summary = match GraphQlPayload::from_request(request).and_then(|p| summarize(&p)) {
            Ok(summary) => summary,
            Err(_) => return Some(0),
        };

        let exact = self.matchers.iter().position(|m| {
            matches!(m, ResourceMatcher::GraphQl { field: Some(_), .. }) && m.matches_operation(&summary)
        });
        exact.or_else(|| self.matchers.iter().position(|m| m.matches_operation(&summary)))
    }
}
