//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming RequestDescription (vhost, path, method, body)
//!     → api::registry (longest base path for the vhost)
//!     → router.rs (resource lookup inside the API)
//!     → matcher.rs (path templates, GraphQL operation matching)
//!     → Return: index of the matched ResourceConfig, or no match
//!
//! Route compilation (at publication):
//!     ResourceConfig[]
//!     → Compile matchers (template segments, operation/field pairs)
//!     → Freeze as immutable ResourceRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled once per API snapshot, immutable at runtime
//! - No regex in the hot path (segment comparison only)
//! - Deterministic: the most specific template wins, ties go to declaration order

pub mod matcher;
pub mod router;

pub use matcher::{PathTemplate, ResourceMatcher};
pub use router::ResourceRouter;
