//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (decision counters, latency histogram, API gauge)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for production)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log event of a decision
//! - Metrics are cheap (atomic increments behind the `metrics` facade)
//! - Without an installed recorder, metric calls are no-ops

pub mod logging;
pub mod metrics;
