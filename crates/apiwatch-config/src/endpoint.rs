//! Endpoint definitions: the static list of logical endpoints to watch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One logical HTTP operation being watched.
///
/// Immutable for the process lifetime; owned by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    /// Request path relative to the API base url, e.g. `/v3/profiles`.
    pub path: String,

    /// HTTP method (defaults to GET).
    #[serde(default = "default_method", alias = "http_method")]
    pub method: String,

    /// Query parameters sent with every probe.
    #[serde(default, alias = "query_params")]
    pub params: BTreeMap<String, String>,

    /// Human readable description.
    #[serde(default)]
    pub description: String,
}

impl EndpointDefinition {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: default_method(),
            params: BTreeMap::new(),
            description: String::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Stable registry key: `METHOD /normalized/path`.
    pub fn endpoint_id(&self) -> String {
        endpoint_id(&self.method, &self.path)
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// Build the registry key for a method and path.
///
/// The method is uppercased, the path is trimmed, stripped of any query
/// string, given a leading `/` and stripped of trailing `/` (except root).
pub fn endpoint_id(method: &str, path: &str) -> String {
    let method = method.trim();
    let method = if method.is_empty() {
        "GET".to_string()
    } else {
        method.to_ascii_uppercase()
    };
    format!("{method} {}", normalize_path(path))
}

/// Normalize a request path for use in an endpoint id.
pub(crate) fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');

    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Accept either a full endpoint id (`GET /x`) or a bare path (`/x`).
pub fn parse_endpoint_ref(reference: &str) -> String {
    let reference = reference.trim();
    match reference.split_once(char::is_whitespace) {
        Some((method, path))
            if !method.is_empty()
                && method.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            endpoint_id(method, path)
        }
        _ => endpoint_id("GET", reference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_method_and_path() {
        assert_eq!(endpoint_id("get", "/v3/profiles/"), "GET /v3/profiles");
        assert_eq!(endpoint_id("POST", "v3/feed"), "POST /v3/feed");
        assert_eq!(endpoint_id("", "/x?page=1"), "GET /x");
        assert_eq!(endpoint_id("get", "///"), "GET /");
    }

    #[test]
    fn definition_id_uses_default_method() {
        let def = EndpointDefinition::new("/v4/stats/me");
        assert_eq!(def.endpoint_id(), "GET /v4/stats/me");
    }

    #[test]
    fn parses_id_or_bare_path() {
        assert_eq!(parse_endpoint_ref("/v3/profiles"), "GET /v3/profiles");
        assert_eq!(parse_endpoint_ref("post /v3/x/"), "POST /v3/x");
        assert_eq!(parse_endpoint_ref("  GET   /a "), "GET /a");
    }
}
