//! Request subsystem.
//!
//! # Data Flow
//! ```text
//! RequestDescription (from the interception layer)
//!     → description.rs (normalize header names, method)
//!     → scratch.rs (fresh RequestScratch bound to one ApiConfig snapshot)
//!     → mutated by the filter chain
//!     → read by the response assembler, then dropped
//! ```
//!
//! # Design Decisions
//! - Scratch is never shared across requests
//! - Error signalling uses a typed property record, not an untyped map

pub mod description;
pub mod scratch;

pub use description::{ClientCertificate, RequestDescription};
pub use scratch::{ChainOutcome, Properties, RequestScratch};
