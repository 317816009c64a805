//! API Enforcer Library
//!
//! Request enforcement for an API gateway: an ordered, short-circuiting
//! filter chain per published API (CORS, authentication, GraphQL query
//! analysis), throttling tier selection and a single enforcement decision
//! per request.

pub mod analytics;
pub mod api;
pub mod config;
pub mod enforcer;
pub mod error;
pub mod filter;
pub mod graphql;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod request;
pub mod response;
pub mod routing;
pub mod throttling;

pub use config::schema::EnforcerConfig;
pub use enforcer::Enforcer;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use request::description::RequestDescription;
pub use response::EnforcementDecision;
