//! CORS handling.
//!
//! # Responsibilities
//! - Answer CORS preflight requests at the gateway (bypassing authentication)
//! - Add CORS response headers for allowed origins on actual requests
//!
//! # Design Decisions
//! - Never rejects a non-preflight request
//! - An OPTIONS resource declared on the API takes precedence over preflight handling

use crate::api::model::{ApiConfig, CorsPolicy};
use crate::error::{InitError, Rejection};
use crate::filter::FilterVerdict;
use crate::request::description::OPTIONS;
use crate::request::scratch::RequestScratch;

const PREFLIGHT_STATUS: u16 = 204;

#[derive(Debug)]
pub struct CorsFilter {
    policy: CorsPolicy,
}

impl CorsFilter {
    pub const NAME: &'static str = "cors";

    pub fn init(api: &ApiConfig) -> Result<Self, InitError> {
        let policy = api.cors.clone();
        if policy.enabled && policy.allow_credentials && policy.allow_origins.iter().any(|o| o == "*") {
            return Err(InitError::filter(
                Self::NAME,
                "credentials cannot be allowed together with a wildcard origin",
            ));
        }
        Ok(Self { policy })
    }

    pub fn handle_request(&self, scratch: &mut RequestScratch) -> FilterVerdict {
        let origin = scratch.request.header("origin").map(str::to_string);

        if scratch.request.is_options() {
            return self.handle_options(scratch, origin);
        }

        if let Some(origin) = origin.filter(|o| self.policy.enabled && self.policy.allows_origin(o)) {
            self.add_origin_headers(scratch, &origin);
            if !self.policy.expose_headers.is_empty() {
                scratch.add_header(
                    "access-control-expose-headers",
                    self.policy.expose_headers.join(", "),
                );
            }
        }
        FilterVerdict::Continue
    }

    fn handle_options(&self, scratch: &mut RequestScratch, origin: Option<String>) -> FilterVerdict {
        let declares_options = scratch
            .matched_resource()
            .is_some_and(|r| r.method.eq_ignore_ascii_case(OPTIONS));
        if declares_options || !self.policy.enabled {
            return FilterVerdict::Continue;
        }

        let requested_method = scratch
            .request
            .header("access-control-request-method")
            .map(str::to_string);
        let (origin, requested_method) = match (origin, requested_method) {
            (Some(origin), Some(method)) => (origin, method),
            // Plain OPTIONS, not a CORS preflight
            _ => return FilterVerdict::Continue,
        };

        if !self.policy.allows_origin(&origin) || !self.policy.allows_method(&requested_method) {
            tracing::debug!(
                request_id = %scratch.request.request_id,
                origin = %origin,
                method = %requested_method,
                "CORS preflight rejected"
            );
            scratch.reject(&Rejection::cors_forbidden(&origin));
            return FilterVerdict::Stop;
        }

        self.add_origin_headers(scratch, &origin);
        scratch.add_header("access-control-allow-methods", self.policy.allow_methods.join(", "));
        if !self.policy.allow_headers.is_empty() {
            scratch.add_header("access-control-allow-headers", self.policy.allow_headers.join(", "));
        }
        if let Some(max_age) = self.policy.max_age_secs {
            scratch.add_header("access-control-max-age", max_age.to_string());
        }
        scratch.properties.stage_status(PREFLIGHT_STATUS);
        FilterVerdict::Stop
    }

    fn add_origin_headers(&self, scratch: &mut RequestScratch, origin: &str) {
        let wildcard = self.policy.allow_origins.iter().any(|o| o == "*");
        if wildcard && !self.policy.allow_credentials {
            scratch.add_header("access-control-allow-origin", "*");
        } else {
            scratch.add_header("access-control-allow-origin", origin);
            scratch.add_header("vary", "Origin");
        }
        if self.policy.allow_credentials {
            scratch.add_header("access-control-allow-credentials", "true");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::model::test_support::rest_config;
    use crate::api::model::ResourceConfig;
    use crate::request::description::RequestDescription;
    use std::sync::Arc;

    fn cors_api(origins: &[&str]) -> Arc<ApiConfig> {
        let mut api = rest_config();
        api.cors = CorsPolicy {
            enabled: true,
            allow_origins: origins.iter().map(|o| o.to_string()).collect(),
            max_age_secs: Some(600),
            ..CorsPolicy::default()
        };
        Arc::new(api)
    }

    fn scratch(api: Arc<ApiConfig>, method: &str, headers: &[(&str, &str)]) -> RequestScratch {
        let mut req = RequestDescription {
            request_id: "r1".into(),
            method: method.into(),
            path: "/petstore/1.0.0/pets".into(),
            ..Default::default()
        };
        for (k, v) in headers {
            req.headers.insert(k.to_string(), v.to_string());
        }
        RequestScratch::new(req.normalized(), api)
    }

    #[test]
    fn test_preflight_answered() {
        let api = cors_api(&["https://app.example"]);
        let filter = CorsFilter::init(&api).unwrap();
        let mut s = scratch(
            api,
            "OPTIONS",
            &[
                ("Origin", "https://app.example"),
                ("Access-Control-Request-Method", "GET"),
            ],
        );

        assert_eq!(filter.handle_request(&mut s), FilterVerdict::Stop);
        assert_eq!(s.properties.status_code, Some(204));
        assert!(!s.properties.has_error());
        assert_eq!(
            s.headers_to_add.get("access-control-allow-origin").map(String::as_str),
            Some("https://app.example")
        );
        assert_eq!(
            s.headers_to_add.get("access-control-max-age").map(String::as_str),
            Some("600")
        );
    }

    #[test]
    fn test_preflight_disallowed_origin() {
        let api = cors_api(&["https://app.example"]);
        let filter = CorsFilter::init(&api).unwrap();
        let mut s = scratch(
            api,
            "OPTIONS",
            &[
                ("Origin", "https://evil.example"),
                ("Access-Control-Request-Method", "GET"),
            ],
        );

        assert_eq!(filter.handle_request(&mut s), FilterVerdict::Stop);
        assert_eq!(s.properties.status_code, Some(403));
        assert_eq!(s.properties.error_code.as_deref(), Some("cors_origin_not_allowed"));
    }

    #[test]
    fn test_declared_options_resource_continues() {
        let mut api = rest_config();
        api.cors.enabled = true;
        api.resources.push(ResourceConfig {
            path_template: "/pets".into(),
            method: "OPTIONS".into(),
            ..Default::default()
        });
        let index = api.resources.len() - 1;
        let api = Arc::new(api);
        let filter = CorsFilter::init(&api).unwrap();
        let mut s = scratch(
            api,
            "OPTIONS",
            &[("Origin", "https://a"), ("Access-Control-Request-Method", "GET")],
        );
        s.set_matched_resource(Some(index));

        assert_eq!(filter.handle_request(&mut s), FilterVerdict::Continue);
    }

    #[test]
    fn test_simple_request_gets_headers() {
        let api = cors_api(&["*"]);
        let filter = CorsFilter::init(&api).unwrap();
        let mut s = scratch(api, "GET", &[("Origin", "https://any.example")]);

        assert_eq!(filter.handle_request(&mut s), FilterVerdict::Continue);
        assert_eq!(
            s.headers_to_add.get("access-control-allow-origin").map(String::as_str),
            Some("*")
        );
    }

    #[test]
    fn test_disabled_policy_is_passthrough() {
        let api = Arc::new(rest_config());
        let filter = CorsFilter::init(&api).unwrap();
        let mut s = scratch(
            api,
            "OPTIONS",
            &[("Origin", "https://a"), ("Access-Control-Request-Method", "GET")],
        );
        assert_eq!(filter.handle_request(&mut s), FilterVerdict::Continue);
        assert!(s.headers_to_add.is_empty());
    }

    #[test]
    fn test_wildcard_with_credentials_fails_init() {
        let mut api = rest_config();
        api.cors.enabled = true;
        api.cors.allow_credentials = true;
        assert!(CorsFilter::init(&api).is_err());
    }
}
