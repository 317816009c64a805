//! Response assembly.
//!
//! # Data Flow
//! ```text
//! terminal RequestScratch
//!     → assembler.rs (pure: allow / direct / synthesized 404)
//!     → decision.rs (EnforcementDecision, serialized back to the proxy)
//!     → assembler.rs publish (analytics hook, best effort)
//! ```

pub mod assembler;
pub mod decision;

pub use assembler::ResponseAssembler;
pub use decision::EnforcementDecision;
