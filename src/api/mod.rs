//! API publication subsystem.
//!
//! # Data Flow
//! ```text
//! descriptor file (TOML)
//!     → descriptor.rs (parse, validate, compile)
//!     → model.rs ApiConfig (immutable, Arc-shared)
//!     → deployed.rs (resource router + filter chain, fatal on InitError)
//!     → registry.rs (atomic snapshot swap)
//!
//! Per request:
//!     registry.find(vhost, path) → DeployedApi::process → EnforcementDecision
//! ```
//!
//! # Design Decisions
//! - An API that fails to compile or initialize is never routable
//! - Redeploys replace the whole ApiConfig; nothing is patched in place

pub mod deployed;
pub mod descriptor;
pub mod model;
pub mod registry;

pub use deployed::{ApiSummary, DeployedApi};
pub use descriptor::ApiDescriptor;
pub use model::{ApiConfig, ApiType, ResourceConfig};
pub use registry::{ApiRegistry, RegistrySnapshot};
