//! # Error Handling
//!
//! Typed token-exchange failures ([`ExchangeError`]) and the problem+json
//! [`ApiError`] the HTTP surface renders them as.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::secret::truncate_snippet;
use crate::telemetry;

/// Maximum number of upstream body characters kept on an error.
pub const BODY_SNIPPET_MAX_CHARS: usize = 200;

/// Classification of a token exchange failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeErrorKind {
    /// No adapter is registered under the requested identifier
    UnknownProvider,
    /// The request is missing fields required by the grant type
    ValidationFailure,
    /// Network failure or non-2xx status from the token endpoint
    TransportFailure,
    /// The provider answered 2xx but the body lacks required fields
    MalformedResponse,
}

impl ExchangeErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ExchangeErrorKind::UnknownProvider => "unknown_provider",
            ExchangeErrorKind::ValidationFailure => "validation_failure",
            ExchangeErrorKind::TransportFailure => "transport_failure",
            ExchangeErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

impl std::fmt::Display for ExchangeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory hint for callers deciding whether to retry. The engine never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    /// Retrying the same request cannot succeed (e.g. `invalid_grant`)
    Permanent,
    /// Network issues or upstream 5xx; a later retry may succeed
    Transient,
    /// Upstream answered 429
    RateLimited,
}

/// A failed token exchange.
///
/// `message` and `body_snippet` never contain client secrets, codes or tokens;
/// upstream bodies are scrubbed before they are attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} for provider '{provider}': {message}")]
pub struct ExchangeError {
    pub kind: ExchangeErrorKind,
    pub provider: String,
    pub message: String,
    /// HTTP status returned by the token endpoint, when one was received
    pub status: Option<u16>,
    /// Truncated, redacted upstream response body
    pub body_snippet: Option<String>,
    /// OAuth `error` code from the upstream body (e.g. `invalid_grant`)
    pub oauth_error: Option<String>,
    /// Upstream `Retry-After` delay in seconds
    pub retry_after: Option<u64>,
}

impl ExchangeError {
    fn new(kind: ExchangeErrorKind, provider: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.to_string(),
            message: message.into(),
            status: None,
            body_snippet: None,
            oauth_error: None,
            retry_after: None,
        }
    }

    pub fn unknown_provider(provider: &str) -> Self {
        Self::new(
            ExchangeErrorKind::UnknownProvider,
            provider,
            "provider is not registered",
        )
    }

    pub fn validation(provider: &str, message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorKind::ValidationFailure, provider, message)
    }

    /// Network-level failure before any HTTP status was received.
    pub fn transport(provider: &str, message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorKind::TransportFailure, provider, message)
    }

    /// Non-2xx answer from the token endpoint. `body` must already be redacted.
    pub fn upstream_status(provider: &str, status: u16, body: Option<String>) -> Self {
        let oauth_error = body.as_deref().and_then(extract_oauth_error);
        let mut error = Self::new(
            ExchangeErrorKind::TransportFailure,
            provider,
            match &oauth_error {
                Some(code) => format!("token endpoint returned status {} ({})", status, code),
                None => format!("token endpoint returned status {}", status),
            },
        );
        error.status = Some(status);
        error.body_snippet = body.map(|b| truncate_snippet(&b, BODY_SNIPPET_MAX_CHARS));
        error.oauth_error = oauth_error;
        error
    }

    /// Attach the upstream `Retry-After` hint.
    pub fn with_retry_after(mut self, seconds: Option<u64>) -> Self {
        self.retry_after = seconds;
        self
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorKind::MalformedResponse, provider, message)
    }

    /// Whether a caller may reasonably retry the same exchange later.
    pub fn retry_classification(&self) -> RetryClassification {
        match self.kind {
            ExchangeErrorKind::UnknownProvider | ExchangeErrorKind::ValidationFailure => {
                RetryClassification::Permanent
            }
            ExchangeErrorKind::MalformedResponse => RetryClassification::Transient,
            ExchangeErrorKind::TransportFailure => match self.status {
                Some(429) => RetryClassification::RateLimited,
                Some(status) if (400..500).contains(&status) => RetryClassification::Permanent,
                _ => RetryClassification::Transient,
            },
        }
    }
}

/// Pull the RFC 6749 `error` field out of a JSON error body.
fn extract_oauth_error(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Extract current trace ID from the active tracing span (falls back to generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Upstream provider error information
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderError {
    /// Provider identifier (e.g., "teams", "quickbooks")
    pub provider: String,
    /// HTTP status code from upstream, absent for network failures
    pub status: Option<u16>,
    /// Response body snippet from upstream (truncated and redacted)
    pub body_snippet: Option<String>,
    /// OAuth error code reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_error: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<ExchangeError> for ApiError {
    fn from(error: ExchangeError) -> Self {
        match error.kind {
            ExchangeErrorKind::UnknownProvider => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Provider '{}' not found", error.provider),
            ),
            ExchangeErrorKind::ValidationFailure => validation_error(
                &error.message,
                json!({ "provider": error.provider }),
            ),
            ExchangeErrorKind::TransportFailure if error.status == Some(429) => {
                let api_error = Self::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    &format!("Provider {} rate limited the token request", error.provider),
                )
                .with_details(json!(provider_details(&error)));
                match error.retry_after {
                    Some(seconds) => api_error.with_retry_after(seconds),
                    None => api_error,
                }
            }
            ExchangeErrorKind::TransportFailure | ExchangeErrorKind::MalformedResponse => {
                provider_error(&error)
            }
        }
    }
}

fn provider_details(error: &ExchangeError) -> ProviderError {
    ProviderError {
        provider: error.provider.clone(),
        status: error.status,
        body_snippet: error.body_snippet.clone(),
        oauth_error: error.oauth_error.clone(),
    }
}

/// Create a provider upstream error (502 PROVIDER_ERROR)
pub fn provider_error(error: &ExchangeError) -> ApiError {
    let message = match error.status {
        Some(status) => format!(
            "Provider {} returned error status {}",
            error.provider, status
        ),
        None => format!("Provider {} token exchange failed: {}", error.provider, error.message),
    };

    ApiError::new(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", &message)
        .with_details(json!(provider_details(error)))
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create an unauthorized error (401) with explicit trace_id
pub fn unauthorized_with_trace_id(message: Option<&str>, trace_id: String) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    let mut error = ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg);
    error.trace_id = Some(trace_id.into_boxed_str());
    error
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Test error message",
        );

        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.message, Box::from("Test error message"));
        assert_eq!(error.details, None);
        assert_eq!(error.retry_after, None);
    }

    #[test]
    fn test_upstream_status_extracts_oauth_error() {
        let error = ExchangeError::upstream_status(
            "teams",
            400,
            Some(r#"{"error":"invalid_grant","error_description":"AADSTS70000"}"#.to_string()),
        );

        assert_eq!(error.kind, ExchangeErrorKind::TransportFailure);
        assert_eq!(error.status, Some(400));
        assert_eq!(error.oauth_error.as_deref(), Some("invalid_grant"));
        assert!(error.message.contains("invalid_grant"));
        assert_eq!(error.retry_classification(), RetryClassification::Permanent);
    }

    #[test]
    fn test_upstream_status_plain_text_body() {
        let error =
            ExchangeError::upstream_status("apollo", 503, Some("upstream unavailable".to_string()));

        assert_eq!(error.oauth_error, None);
        assert_eq!(error.body_snippet.as_deref(), Some("upstream unavailable"));
        assert_eq!(error.retry_classification(), RetryClassification::Transient);
    }

    #[test]
    fn test_retry_classification() {
        assert_eq!(
            ExchangeError::unknown_provider("x").retry_classification(),
            RetryClassification::Permanent
        );
        assert_eq!(
            ExchangeError::validation("teams", "missing").retry_classification(),
            RetryClassification::Permanent
        );
        assert_eq!(
            ExchangeError::transport("teams", "connection reset").retry_classification(),
            RetryClassification::Transient
        );
        assert_eq!(
            ExchangeError::upstream_status("teams", 429, None).retry_classification(),
            RetryClassification::RateLimited
        );
        assert_eq!(
            ExchangeError::malformed("teams", "missing access_token").retry_classification(),
            RetryClassification::Transient
        );
    }

    #[test]
    fn test_display_includes_kind_and_provider() {
        let error = ExchangeError::unknown_provider("unknown-provider");
        assert_eq!(
            error.to_string(),
            "unknown_provider for provider 'unknown-provider': provider is not registered"
        );
    }

    #[test]
    fn test_exchange_error_status_mapping() {
        let not_found: ApiError = ExchangeError::unknown_provider("nope").into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.code, Box::from("NOT_FOUND"));

        let invalid: ApiError = ExchangeError::validation("teams", "refresh_token is required").into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code, Box::from("VALIDATION_FAILED"));

        let rate_limited: ApiError = ExchangeError::upstream_status("teams", 429, None).into();
        assert_eq!(rate_limited.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rate_limited.code, Box::from("RATE_LIMITED"));

        let malformed: ApiError = ExchangeError::malformed("apollo", "missing access_token").into();
        assert_eq!(malformed.status, StatusCode::BAD_GATEWAY);
        assert_eq!(malformed.code, Box::from("PROVIDER_ERROR"));
    }

    #[test]
    fn test_provider_error_details() {
        let error = provider_error(&ExchangeError::upstream_status(
            "quickbooks",
            401,
            Some(r#"{"error":"invalid_client"}"#.to_string()),
        ));

        assert_eq!(error.code, Box::from("PROVIDER_ERROR"));
        assert_eq!(error.status, StatusCode::BAD_GATEWAY);
        assert!(error.message.contains("quickbooks"));

        let details = error.details.unwrap();
        let details_obj = details.as_object().unwrap();
        assert_eq!(details_obj.get("provider").unwrap(), "quickbooks");
        assert_eq!(details_obj.get("status").unwrap(), 401);
        assert_eq!(details_obj.get("oauth_error").unwrap(), "invalid_client");
    }

    #[test]
    fn test_network_failure_has_no_status() {
        let error = provider_error(&ExchangeError::transport("teams", "dns lookup failed"));
        let details = error.details.unwrap();
        assert_eq!(details.get("status").unwrap(), &json!(null));
        assert!(error.message.contains("dns lookup failed"));
    }

    #[test]
    fn test_content_type_header() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "Test error");

        let response = error.into_response();

        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let error =
            ExchangeError::upstream_status("quickbooks", 429, None).with_retry_after(Some(60));
        let api_error: ApiError = error.into();
        assert_eq!(api_error.retry_after, Some(60));

        let response = api_error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "60");
    }

    #[test]
    fn test_rate_limited_without_retry_after_has_no_header() {
        let api_error: ApiError = ExchangeError::upstream_status("teams", 429, None).into();
        let response = api_error.into_response();
        assert!(response.headers().get("retry-after").is_none());
    }

    #[test]
    fn test_trace_id_generation() {
        let error = ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Test error",
        );

        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[test]
    fn test_utf8_safe_truncation() {
        let body = "测试中文字符🚀 token endpoint failure with multibyte characters. ".repeat(10);
        let error = ExchangeError::upstream_status("teams", 500, Some(body));

        let snippet = error.body_snippet.unwrap();
        assert!(snippet.chars().count() <= BODY_SNIPPET_MAX_CHARS + 3);
        assert!(snippet.ends_with("..."));
        assert!(snippet.starts_with("测试中文字符🚀"));
    }

    #[test]
    fn test_validation_error_with_details() {
        let field_errors = json!({ "refresh_token": "required" });
        let error = validation_error("Validation failed", field_errors.clone());

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.details, Some(Box::new(field_errors)));
    }
}
