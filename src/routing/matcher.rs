//! Resource matching logic.
//!
//! # Responsibilities
//! - Match REST paths against templates (`/pets/{id}`, `/files/*`)
//! - Match REST methods (case-insensitive)
//! - Match GraphQL operations by type and top-level field
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A trailing `*` segment matches any remainder, including none
//! - No regex to guarantee O(n) matching

use crate::error::InitError;
use crate::graphql::{OperationSummary, OperationType};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Wildcard,
}

/// A compiled REST path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, InitError> {
        if !template.starts_with('/') {
            return Err(InitError::Descriptor(format!(
                "path template `{}` must start with '/'",
                template
            )));
        }

        let raw: Vec<&str> = split_path(template).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (i, part) in raw.iter().enumerate() {
            let segment = if *part == "*" {
                if i + 1 != raw.len() {
                    return Err(InitError::Descriptor(format!(
                        "path template `{}` may only end with '*'",
                        template
                    )));
                }
                Segment::Wildcard
            } else if part.starts_with('{') && part.ends_with('}') && part.len() > 2 {
                Segment::Param
            } else if part.contains(['{', '}', '*']) {
                return Err(InitError::Descriptor(format!(
                    "path template `{}` has a malformed segment `{}`",
                    template, part
                )));
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut parts = split_path(path);
        for segment in &self.segments {
            match segment {
                Segment::Wildcard => return true,
                Segment::Param => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(lit) => {
                    if parts.next() != Some(lit.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }

    /// Literal segments outrank parameters, parameters outrank wildcards.
    pub fn specificity(&self) -> (usize, usize, bool) {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let wildcard = self.segments.last() == Some(&Segment::Wildcard);
        (literals, self.segments.len(), !wildcard)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Matcher compiled from one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceMatcher {
    Rest {
        method: String,
        template: PathTemplate,
    },
    GraphQl {
        operation: OperationType,
        /// `None` matches any field of the operation type.
        field: Option<String>,
    },
}

impl ResourceMatcher {
    pub fn rest(method: &str, template: &str) -> Result<Self, InitError> {
        Ok(ResourceMatcher::Rest {
            method: method.to_ascii_uppercase(),
            template: PathTemplate::parse(template)?,
        })
    }

    pub fn graphql(operation: &str, field: &str) -> Result<Self, InitError> {
        let operation = match operation.to_ascii_uppercase().as_str() {
            "QUERY" => OperationType::Query,
            "MUTATION" => OperationType::Mutation,
            "SUBSCRIPTION" => OperationType::Subscription,
            other => {
                return Err(InitError::Descriptor(format!(
                    "`{}` is not a GraphQL operation type",
                    other
                )))
            }
        };
        let field = field.trim_start_matches('/');
        Ok(ResourceMatcher::GraphQl {
            operation,
            field: (!field.is_empty() && field != "*").then(|| field.to_string()),
        })
    }

    /// Match a REST request, `relative_path` being the path below the base path.
    pub fn matches_rest(&self, method: &str, relative_path: &str) -> bool {
        match self {
            ResourceMatcher::Rest {
                method: expected,
                template,
            } => expected.eq_ignore_ascii_case(method) && template.matches(relative_path),
            ResourceMatcher::GraphQl { .. } => false,
        }
    }

    /// Match a GraphQL operation by type and first top-level field.
    pub fn matches_operation(&self, summary: &OperationSummary) -> bool {
        match self {
            ResourceMatcher::GraphQl { operation, field } => {
                *operation == summary.operation
                    && match field {
                        None => true,
                        Some(name) => summary.root_fields.first() == Some(name),
                    }
            }
            ResourceMatcher::Rest { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_param_templates() {
        let t = PathTemplate::parse("/pets/{id}").unwrap();
        assert!(t.matches("/pets/42"));
        assert!(t.matches("/pets/42/"));
        assert!(!t.matches("/pets"));
        assert!(!t.matches("/pets/42/photos"));
        assert!(!t.matches("/Pets/42"));
    }

    #[test]
    fn test_wildcard_template() {
        let t = PathTemplate::parse("/files/*").unwrap();
        assert!(t.matches("/files"));
        assert!(t.matches("/files/a/b/c"));
        assert!(!t.matches("/other"));

        let root = PathTemplate::parse("/*").unwrap();
        assert!(root.matches("/"));
        assert!(root.matches("/anything"));
    }

    #[test]
    fn test_malformed_templates() {
        assert!(PathTemplate::parse("pets").is_err());
        assert!(PathTemplate::parse("/*/pets").is_err());
        assert!(PathTemplate::parse("/pe{ts").is_err());
    }

    #[test]
    fn test_specificity_order() {
        let literal = PathTemplate::parse("/pets/mine").unwrap();
        let param = PathTemplate::parse("/pets/{id}").unwrap();
        let wildcard = PathTemplate::parse("/pets/*").unwrap();
        assert!(literal.specificity() > param.specificity());
        assert!(param.specificity() > wildcard.specificity());
    }

    #[test]
    fn test_rest_matcher_method() {
        let m = ResourceMatcher::rest("get", "/pets").unwrap();
        assert!(m.matches_rest("GET", "/pets"));
        assert!(!m.matches_rest("POST", "/pets"));
    }

    #[test]
    fn test_graphql_matcher() {
        let summary = OperationSummary {
            operation: OperationType::Query,
            root_fields: vec!["hero".into()],
        };
        assert!(ResourceMatcher::graphql("QUERY", "hero").unwrap().matches_operation(&summary));
        assert!(ResourceMatcher::graphql("query", "*").unwrap().matches_operation(&summary));
        assert!(!ResourceMatcher::graphql("QUERY", "books").unwrap().matches_operation(&summary));
        assert!(!ResourceMatcher::graphql("MUTATION", "*").unwrap().matches_operation(&summary));
        assert!(ResourceMatcher::graphql("FETCH", "x").is_err());
    }
}
