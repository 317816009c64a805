//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! enforcer.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EnforcerConfig (validated, immutable)
//!
//! apis/*.toml
//!     → loader.rs (one compile result per descriptor)
//!     → Enforcer::reload publishes the set that compiled
//!
//! On change:
//!     watcher.rs detects a descriptor change
//!     → debounce
//!     → Enforcer::reload
//! ```
//!
//! # Design Decisions
//! - Process config is immutable once loaded; only descriptors hot-reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_descriptors, ConfigError, DescriptorLoad};
pub use schema::{
    AnalyticsConfig, ApisConfig, BackendJwtSigningConfig, CredentialsConfig, EnforcerConfig,
    JwtIssuerConfig, ListenerConfig, LogFormat, ObservabilityConfig,
};
pub use watcher::DescriptorWatcher;
