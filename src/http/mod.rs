//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout, body limit)
//!     → POST /enforce: JSON RequestDescription
//!     → Enforcer::enforce
//!     → JSON EnforcementDecision
//! ```

pub mod server;

pub use server::{AppState, HealthReport, HttpServer, X_REQUEST_ID};
