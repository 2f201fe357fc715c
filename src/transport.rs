//! HTTP transport seam for token endpoint calls
//!
//! The engine only ever issues a single POST per exchange through the
//! [`Transport`] trait. [`ReqwestTransport`] is the production implementation;
//! tests substitute in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::providers::ContentType;
use crate::secret::REDACTED;

/// Outbound token endpoint request.
#[derive(Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Body parameters in send order
    pub body: Vec<(String, String)>,
    pub content_type: ContentType,
    pub timeout: Duration,
}

impl TransportRequest {
    /// Value of body parameter `key`, if present.
    pub fn body_param(&self, key: &str) -> Option<&str> {
        self.body
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of header `name` (case-insensitive), if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header and body values carry credentials; only names are printed.
impl std::fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        let body_keys: Vec<&str> = self.body.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("TransportRequest")
            .field("url", &self.url.as_str())
            .field("headers", &header_names)
            .field("body", &body_keys)
            .field("values", &REDACTED)
            .field("content_type", &self.content_type)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Response from a token endpoint, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed JSON body; non-JSON payloads are carried as `Value::String`
    pub body: Value,
    /// `Retry-After` delay in seconds, when sent as an integer
    pub retry_after: Option<u64>,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before any HTTP status was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// Performs token endpoint POSTs.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
///
/// Redirects are never followed: a 3xx from a token endpoint is returned to
/// the engine as a non-success status, and credentials are never re-posted to
/// the `Location` target.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with its own connection pool.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("token-exchange/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .post(request.url.clone())
            .timeout(timeout)
            .header(reqwest::header::ACCEPT, "application/json");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.content_type {
            ContentType::Form => builder.form(&request.body),
            ContentType::Json => {
                let body: Map<String, Value> = request
                    .body
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                builder.json(&body)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|err| classify_reqwest_error(err, timeout))?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let text = response
            .text()
            .await
            .map_err(|err| classify_reqwest_error(err, timeout))?;

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(TransportResponse {
            status,
            body,
            retry_after,
        })
    }
}

// HTTP-date values are ignored; token endpoints send delta-seconds.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn classify_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    // Drop the URL so nothing request-specific leaks into messages.
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
