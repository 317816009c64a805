//! Error types and the stable error codes carried by deny decisions.

use thiserror::Error;

/// Error codes written into `ERROR_CODE` by rejecting filters.
pub mod codes {
    pub const NOT_FOUND: &str = "404";
    pub const INVALID_CREDENTIALS: &str = "900901";
    pub const MISSING_CREDENTIALS: &str = "900902";
    pub const API_BLOCKED: &str = "900907";
    pub const RESOURCE_FORBIDDEN: &str = "900908";
    pub const INVALID_SCOPE: &str = "900910";
    pub const INTERNAL_ERROR: &str = "900967";
    pub const GRAPHQL_INVALID_QUERY: &str = "900422";
    pub const GRAPHQL_QUERY_TOO_DEEP: &str = "900820";
    pub const GRAPHQL_QUERY_TOO_COMPLEX: &str = "900821";
    pub const CORS_ORIGIN_NOT_ALLOWED: &str = "cors_origin_not_allowed";
}

/// Raised while turning an API definition into a publishable API.
///
/// Always fatal for that API: it is never made routable.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid GraphQL schema: {0}")]
    InvalidSchema(String),

    #[error("invalid trust store material: {0}")]
    InvalidTrustStore(String),

    #[error("invalid throttling policy: {0}")]
    InvalidPolicy(String),

    #[error("filter `{filter}` cannot be initialized: {reason}")]
    Filter {
        filter: &'static str,
        reason: String,
    },

    #[error("invalid API descriptor: {0}")]
    Descriptor(String),

    #[error("{vhost}{base_path} is already served by {existing}")]
    RouteConflict {
        vhost: String,
        base_path: String,
        existing: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InitError {
    pub fn filter<S: Into<String>>(filter: &'static str, reason: S) -> Self {
        Self::Filter {
            filter,
            reason: reason.into(),
        }
    }
}

/// A fault inside a filter that is not a deliberate rejection.
///
/// The chain executor converts these into a 500 deny decision.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("credential validator unavailable: {0}")]
    ValidatorUnavailable(String),

    #[error("backend token could not be issued: {0}")]
    BackendToken(#[from] jsonwebtoken::errors::Error),

    #[error("internal filter error: {0}")]
    Internal(String),
}

/// The four error properties a rejecting filter stages on the scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status_code: u16,
    pub error_code: &'static str,
    pub message: &'static str,
    pub description: String,
}

impl Rejection {
    pub fn not_found() -> Self {
        Self {
            status_code: 404,
            error_code: codes::NOT_FOUND,
            message: "Not Found",
            description: "The requested resource is not available.".to_string(),
        }
    }

    pub fn missing_credentials() -> Self {
        Self {
            status_code: 401,
            error_code: codes::MISSING_CREDENTIALS,
            message: "Missing Credentials",
            description: "Make sure your API invocation call has a header: 'Authorization : Bearer ACCESS_TOKEN' or 'apikey : API_KEY'".to_string(),
        }
    }

    pub fn invalid_credentials(description: impl Into<String>) -> Self {
        Self {
            status_code: 401,
            error_code: codes::INVALID_CREDENTIALS,
            message: "Invalid Credentials",
            description: description.into(),
        }
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self {
            status_code: 403,
            error_code: codes::RESOURCE_FORBIDDEN,
            message: "Resource forbidden",
            description: description.into(),
        }
    }

    pub fn invalid_scope() -> Self {
        Self {
            status_code: 403,
            error_code: codes::INVALID_SCOPE,
            message: "The access token does not allow you to access the requested resource",
            description: "User is NOT authorized to access the Resource. Scope validation failed.".to_string(),
        }
    }

    pub fn api_blocked() -> Self {
        Self {
            status_code: 503,
            error_code: codes::API_BLOCKED,
            message: "API blocked",
            description: "This API has been blocked temporarily. Please try again later or contact the system administrators.".to_string(),
        }
    }

    pub fn cors_forbidden(origin: &str) -> Self {
        Self {
            status_code: 403,
            error_code: codes::CORS_ORIGIN_NOT_ALLOWED,
            message: "CORS request rejected",
            description: format!("Origin '{}' is not allowed by the CORS policy of this API", origin),
        }
    }

    pub fn invalid_query(description: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            error_code: codes::GRAPHQL_INVALID_QUERY,
            message: "Invalid query",
            description: description.into(),
        }
    }

    pub fn query_too_deep(depth: u32, max: u32) -> Self {
        Self {
            status_code: 400,
            error_code: codes::GRAPHQL_QUERY_TOO_DEEP,
            message: "QUERY TOO DEEP",
            description: format!("maximum query depth exceeded {} > {}", depth, max),
        }
    }

    pub fn query_too_complex(complexity: u64, max: u64) -> Self {
        Self {
            status_code: 400,
            error_code: codes::GRAPHQL_QUERY_TOO_COMPLEX,
            message: "QUERY TOO COMPLEX",
            description: format!("maximum query complexity exceeded {} > {}", complexity, max),
        }
    }

    pub fn internal() -> Self {
        Self {
            status_code: 500,
            error_code: codes::INTERNAL_ERROR,
            message: "Internal Server Error",
            description: "The gateway could not process the request.".to_string(),
        }
    }
}
