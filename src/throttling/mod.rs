//! Conditional throttling subsystem.
//!
//! # Data Flow
//! ```text
//! Request attributes (headers, client IP, query params, JWT claims)
//!     → condition.rs (one predicate per attribute category, invert applied)
//!     → policy.rs (AND within a group, first matching group wins)
//!     → SelectedThrottle (or none: global defaults apply downstream)
//! ```
//!
//! # Design Decisions
//! - Conditions are a closed enum; evaluation is an exhaustive match
//! - Groups without conditions act as a default tier
//! - Policies are validated when the API is compiled, never per request

pub mod condition;
pub mod policy;

pub use condition::{IpCondition, RequestAttributes, ThrottleCondition};
pub use policy::{ConditionalGroup, SelectedThrottle, ThrottleLimit, ThrottlePolicy, ThrottleSource};
