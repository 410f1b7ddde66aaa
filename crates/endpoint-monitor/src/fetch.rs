//! Fetch seam between the scheduler and the upstream API.

use std::collections::BTreeMap;
use std::time::Duration;

use apiwatch_config::{ApiConfig, EndpointDefinition};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::errors::{FetchError, FetchResult, MonitorError, MonitorResult};

/// One outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

impl From<&EndpointDefinition> for FetchRequest {
    fn from(def: &EndpointDefinition) -> Self {
        Self {
            method: def.method.to_ascii_uppercase(),
            path: def.path.clone(),
            params: def.params.clone(),
        }
    }
}

/// Answer from the upstream API.
///
/// `body` is only decoded for 2xx answers; it is `Null` otherwise and for
/// empty bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Value,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse>;
}

/// reqwest-backed fetcher resolving paths against a base url.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(api: &ApiConfig, timeout: Duration) -> MonitorResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &api.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| MonitorError::Client(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| MonitorError::Client(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Connection(err.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::Connection(format!("invalid method: {e}")))?;
        let url = self.url(&request.path);
        debug!(%method, %url, "fetching");

        let mut req = self.client.request(method, &url);
        if !request.params.is_empty() {
            req = req.query(&request.params);
        }
        let resp = req.send().await.map_err(classify)?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Ok(FetchResponse {
                status,
                body: Value::Null,
            });
        }

        let bytes = resp.bytes().await.map_err(classify)?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| FetchError::Decode(e.to_string()))?
        };

        Ok(FetchResponse { status, body })
    }
}
