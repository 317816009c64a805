//! Throttle condition predicates.
//!
//! # Responsibilities
//! - Match one request attribute category (header, IP, query, JWT claim)
//! - Apply the per-condition invert flag
//!
//! # Design Decisions
//! - Header names are case-insensitive (RFC 9110), values are exact
//! - An attribute absent on the request never matches, inverted or not
//! - IP ranges are inclusive and never cross address families

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::auth::Claims;

/// The request attributes throttle conditions can look at.
#[derive(Debug, Clone, Copy)]
pub struct RequestAttributes<'a> {
    /// Header map with lowercase names.
    pub headers: &'a HashMap<String, String>,
    pub client_ip: Option<IpAddr>,
    pub query_params: &'a HashMap<String, String>,
    /// Decoded JWT claims, when the caller authenticated with a token.
    pub claims: Option<&'a Claims>,
}

/// IP condition flavours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IpCondition {
    Specific { ip: IpAddr },
    Range { start: IpAddr, end: IpAddr },
}

impl IpCondition {
    fn matches(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        match self {
            IpCondition::Specific { ip: expected } => expected.to_canonical() == ip,
            IpCondition::Range { start, end } => {
                match (ip, start.to_canonical(), end.to_canonical()) {
                    (IpAddr::V4(ip), IpAddr::V4(start), IpAddr::V4(end)) => {
                        (u32::from(start)..=u32::from(end)).contains(&u32::from(ip))
                    }
                    (IpAddr::V6(ip), IpAddr::V6(start), IpAddr::V6(end)) => {
                        (u128::from(start)..=u128::from(end)).contains(&u128::from(ip))
                    }
                    _ => false,
                }
            }
        }
    }

    /// Range bounds must share a family and be ordered.
    pub fn is_well_formed(&self) -> bool {
        match self {
            IpCondition::Specific { .. } => true,
            IpCondition::Range { start, end } => match (start.to_canonical(), end.to_canonical()) {
                (IpAddr::V4(s), IpAddr::V4(e)) => u32::from(s) <= u32::from(e),
                (IpAddr::V6(s), IpAddr::V6(e)) => u128::from(s) <= u128::from(e),
                _ => false,
            },
        }
    }
}

/// A single throttling condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThrottleCondition {
    Header {
        name: String,
        value: String,
        #[serde(default)]
        invert: bool,
    },
    Ip {
        ip: IpCondition,
        #[serde(default)]
        invert: bool,
    },
    QueryParameter {
        name: String,
        value: String,
        #[serde(default)]
        invert: bool,
    },
    JwtClaims {
        claim_uri: String,
        expected_value: String,
        #[serde(default)]
        invert: bool,
    },
}

impl ThrottleCondition {
    pub fn invert(&self) -> bool {
        match self {
            ThrottleCondition::Header { invert, .. }
            | ThrottleCondition::Ip { invert, .. }
            | ThrottleCondition::QueryParameter { invert, .. }
            | ThrottleCondition::JwtClaims { invert, .. } => *invert,
        }
    }

    /// Evaluate against the request, invert flag applied.
    pub fn matches(&self, attrs: &RequestAttributes<'_>) -> bool {
        match self.compare(attrs) {
            Some(matched) => matched != self.invert(),
            None => false,
        }
    }

    /// Raw comparison. `None` when the attribute is absent on the request.
    fn compare(&self, attrs: &RequestAttributes<'_>) -> Option<bool> {
        match self {
            ThrottleCondition::Header { name, value, .. } => attrs
                .headers
                .get(&name.to_ascii_lowercase())
                .map(|actual| actual == value),
            ThrottleCondition::Ip { ip, .. } => attrs.client_ip.map(|actual| ip.matches(actual)),
            ThrottleCondition::QueryParameter { name, value, .. } => {
                attrs.query_params.get(name).map(|actual| actual == value)
            }
            ThrottleCondition::JwtClaims {
                claim_uri,
                expected_value,
                ..
            } => match attrs.claims?.get(claim_uri)? {
                Value::Null => None,
                claim => Some(claim_matches(claim, expected_value)),
            },
        }
    }
}

fn claim_matches(claim: &Value, expected: &str) -> bool {
    match claim {
        Value::String(s) => s == expected,
        Value::Array(items) => items.iter().any(|item| claim_matches(item, expected)),
        Value::Object(_) | Value::Null => false,
        other => other.to_string() == expected,
    }
}
