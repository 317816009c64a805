//! GraphQL protocol support.
//!
//! # Data Flow
//! ```text
//! API compilation:
//!     SDL text → schema.rs (GraphQlSchema handle + complexity weights)
//!
//! Per request:
//!     body / query params → payload.rs (query, variables, operationName)
//!     → analysis.rs (validate against schema, depth, complexity)
//!     → QueryAnalysis consumed by the query-analysis filter
//! ```

pub mod analysis;
pub mod payload;
pub mod schema;

pub use analysis::{analyze, analyze_within, summarize, AnalysisError, OperationSummary, QueryAnalysis};
pub use payload::GraphQlPayload;
pub use schema::{FieldComplexity, GraphQlSchema, OperationType};
