//! The request description handed over by the interception layer.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub const OPTIONS: &str = "OPTIONS";

/// Client certificate presented on a mutual-TLS connection.
///
/// TLS is terminated by the proxy; only the verified identity reaches us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCertificate {
    /// Hex encoded SHA-256 fingerprint.
    pub fingerprint: String,
    #[serde(default)]
    pub subject: Option<String>,
}

/// A parsed incoming request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDescription {
    pub request_id: String,
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    pub vhost: String,
    /// Header names are normalized to lowercase by [`RequestDescription::normalized`].
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub client_ip: Option<IpAddr>,
    pub client_certificate: Option<ClientCertificate>,
    pub body: Option<String>,
}

impl RequestDescription {
    /// Lowercase header names and uppercase the method.
    pub fn normalized(mut self) -> Self {
        self.method = self.method.to_ascii_uppercase();
        self.headers = self
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn is_options(&self) -> bool {
        self.method.eq_ignore_ascii_case(OPTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_headers() {
        let mut req = RequestDescription {
            method: "get".into(),
            ..Default::default()
        };
        req.headers.insert("X-Custom".into(), "v".into());
        let req = req.normalized();

        assert_eq!(req.method, "GET");
        assert_eq!(req.header("x-custom"), Some("v"));
        assert_eq!(req.header("X-CUSTOM"), Some("v"));
        assert!(!req.is_options());
    }

    #[test]
    fn test_deserialize_minimal() {
        let json = r#"{"method":"OPTIONS","path":"/pets","client_ip":"10.0.0.5"}"#;
        let req: RequestDescription = serde_json::from_str(json).unwrap();
        assert!(req.is_options());
        assert_eq!(req.client_ip, Some("10.0.0.5".parse().unwrap()));
        assert!(req.headers.is_empty());
    }
}
