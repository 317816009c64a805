//! Extraction of the GraphQL operation from a request.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::graphql::analysis::AnalysisError;
use crate::request::description::RequestDescription;

/// `query` / `variables` / `operationName` of a GraphQL request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphQlPayload {
    pub query: String,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

impl GraphQlPayload {
    /// Read the payload from a JSON body, or from the `query` query
    /// parameter for GET requests.
    pub fn from_request(request: &RequestDescription) -> Result<Self, AnalysisError> {
        if let Some(body) = request.body.as_deref().filter(|b| !b.trim().is_empty()) {
            return serde_json::from_str(body)
                .map_err(|e| AnalysisError::Payload(format!("body is not a GraphQL JSON payload: {}", e)));
        }

        match request.query_param("query") {
            Some(query) => {
                let variables = match request.query_param("variables") {
                    Some(raw) => Some(serde_json::from_str(raw).map_err(|e| {
                        AnalysisError::Payload(format!("variables are not a JSON object: {}", e))
                    })?),
                    None => None,
                };
                Ok(Self {
                    query: query.to_string(),
                    variables,
                    operation_name: request.query_param("operationName").map(str::to_string),
                })
            }
            None => Err(AnalysisError::Payload("request carries no GraphQL query".into())),
        }
    }
}
