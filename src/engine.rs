//! Token exchange engine
//!
//! Resolves a provider adapter, validates the request against the grant it
//! names, performs exactly one token endpoint call through the [`Transport`]
//! and normalizes the outcome. Nothing is retried here; callers decide using
//! [`ExchangeError::retry_classification`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::ExchangeError;
use crate::models::{ExchangeRequest, GrantType, OAuthResult};
use crate::normalization::normalize;
use crate::providers::{ProviderAdapter, ProviderRegistry};
use crate::secret::redact_secrets;
use crate::transport::{Transport, TransportRequest};

/// Timeout applied when none is configured.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Stateless exchange service; cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct TokenExchangeEngine {
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl TokenExchangeEngine {
    pub fn new(registry: Arc<ProviderRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    /// Per-call timeout handed to the transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exchange an authorization code or refresh token with `provider_id`.
    #[instrument(skip_all, fields(provider = %provider_id, grant_type = %request.grant_type))]
    pub async fn exchange(
        &self,
        provider_id: &str,
        request: ExchangeRequest,
    ) -> Result<OAuthResult, ExchangeError> {
        let started = Instant::now();
        counter!("token_exchange_attempts_total", "provider" => provider_id.to_string())
            .increment(1);

        let outcome = self.run(provider_id, &request).await;

        let elapsed = started.elapsed();
        histogram!("token_exchange_duration_seconds", "provider" => provider_id.to_string())
            .record(elapsed.as_secs_f64());

        match &outcome {
            Ok(result) => {
                counter!("token_exchange_success_total", "provider" => provider_id.to_string())
                    .increment(1);
                info!(
                    expires_in = result.expires_in,
                    refresh_token_returned = result.refresh_token.is_some(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Token exchange succeeded"
                );
            }
            Err(err) => {
                counter!(
                    "token_exchange_failure_total",
                    "provider" => provider_id.to_string(),
                    "kind" => err.kind.as_str()
                )
                .increment(1);
                warn!(
                    kind = %err.kind,
                    status = ?err.status,
                    oauth_error = ?err.oauth_error,
                    retry = ?err.retry_classification(),
                    duration_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "Token exchange failed"
                );
            }
        }

        outcome
    }

    async fn run(
        &self,
        provider_id: &str,
        request: &ExchangeRequest,
    ) -> Result<OAuthResult, ExchangeError> {
        let adapter = self.registry.lookup(provider_id)?;
        validate_request(&adapter, request)?;

        let transport_request = self.build_transport_request(&adapter, request);
        debug!(request = ?transport_request, "Calling token endpoint");

        let response = self
            .transport
            .post(transport_request)
            .await
            .map_err(|err| ExchangeError::transport(&adapter.id, err.to_string()))?;

        if !response.is_success() {
            let body = redact_secrets(&body_text(&response.body), request.secrets());
            let body = (!body.trim().is_empty()).then_some(body);
            return Err(
                ExchangeError::upstream_status(&adapter.id, response.status, body)
                    .with_retry_after(response.retry_after),
            );
        }

        normalize(
            &adapter,
            &response.body,
            &request.context(&adapter.id),
            Utc::now(),
        )
    }

    fn build_transport_request(
        &self,
        adapter: &ProviderAdapter,
        request: &ExchangeRequest,
    ) -> TransportRequest {
        let auth = adapter
            .auth_strategy
            .build(&request.client_id, &request.client_secret);

        let mut body = adapter.build_body(request);
        body.extend(auth.body);

        TransportRequest {
            url: adapter.token_url.clone(),
            headers: auth.headers,
            body,
            content_type: adapter.content_type,
            timeout: self.timeout,
        }
    }
}

impl std::fmt::Debug for TokenExchangeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchangeEngine")
            .field("providers", &self.registry.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Check the request carries exactly what its grant needs.
pub fn validate_request(
    adapter: &ProviderAdapter,
    request: &ExchangeRequest,
) -> Result<(), ExchangeError> {
    let provider = adapter.id.as_str();

    if !adapter.supports(request.grant_type) {
        return Err(ExchangeError::validation(
            provider,
            format!("grant type '{}' is not supported", request.grant_type),
        ));
    }
    if request.client_id.trim().is_empty() {
        return Err(ExchangeError::validation(provider, "client_id is required"));
    }
    if request.client_secret.is_empty() {
        return Err(ExchangeError::validation(
            provider,
            "client_secret is required",
        ));
    }

    let has_code = request.code.as_ref().is_some_and(|c| !c.is_empty());
    let has_refresh_token = request.refresh_token.as_ref().is_some_and(|t| !t.is_empty());

    match request.grant_type {
        GrantType::AuthorizationCode => {
            if !has_code {
                return Err(ExchangeError::validation(provider, "code is required"));
            }
            if request
                .redirect_uri
                .as_deref()
                .is_none_or(|uri| uri.trim().is_empty())
            {
                return Err(ExchangeError::validation(
                    provider,
                    "redirect_uri is required",
                ));
            }
            if has_refresh_token {
                return Err(ExchangeError::validation(
                    provider,
                    "refresh_token must not be sent with authorization_code",
                ));
            }
        }
        GrantType::RefreshToken => {
            if !has_refresh_token {
                return Err(ExchangeError::validation(
                    provider,
                    "refresh_token is required",
                ));
            }
            if has_code {
                return Err(ExchangeError::validation(
                    provider,
                    "code must not be sent with refresh_token",
                ));
            }
        }
    }

    Ok(())
}

fn body_text(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
