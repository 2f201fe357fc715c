//! # Token Exchange Handler
//!
//! `POST /providers/{provider}/token` runs a single exchange using the client
//! credentials configured for the provider.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::OperatorAuth;
use crate::error::{ApiError, validation_error};
use crate::models::{ExchangeRequest, GrantType, Metadata, OAuthResult};
use crate::secret::SecretString;
use crate::server::AppState;

/// Body of a token exchange call
#[derive(Deserialize, ToSchema)]
pub struct TokenExchangeBody {
    /// `authorization_code` or `refresh_token`
    pub grant_type: GrantType,
    /// Authorization code (authorization_code grant)
    #[schema(value_type = Option<String>)]
    pub code: Option<SecretString>,
    /// Redirect URI used in the authorization request (authorization_code grant)
    pub redirect_uri: Option<String>,
    /// Refresh token (refresh_token grant)
    #[schema(value_type = Option<String>)]
    pub refresh_token: Option<SecretString>,
    /// Provider-specific values such as the Quickbooks `realmId`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

/// Token exchange response
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenExchangeResponse {
    pub provider: String,
    pub token: OAuthResult,
}

/// Exchange an authorization code or refresh token with a provider
#[utoipa::path(
    post,
    path = "/providers/{provider}/token",
    params(
        ("provider" = String, Path, description = "Provider identifier (e.g. teams, apollo, quickbooks)")
    ),
    request_body = TokenExchangeBody,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Normalized token set", body = TokenExchangeResponse),
        (status = 400, description = "Invalid request or missing client credentials", body = ApiError),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 404, description = "Unknown provider", body = ApiError),
        (status = 429, description = "Provider rate limited the request", body = ApiError),
        (status = 502, description = "Provider error or malformed response", body = ApiError)
    ),
    tag = "token"
)]
pub async fn exchange_token(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(provider): Path<String>,
    body: Result<Json<TokenExchangeBody>, JsonRejection>,
) -> Result<Json<TokenExchangeResponse>, ApiError> {
    let Json(body) = body?;

    // Unknown providers are 404 even when nothing is configured for them.
    state.engine.registry().lookup(&provider)?;

    let (client_id, client_secret) = state
        .config
        .provider(&provider)
        .and_then(|credentials| credentials.client())
        .ok_or_else(|| {
            validation_error(
                &format!("Client credentials are not configured for provider '{}'", provider),
                json!({ "provider": provider }),
            )
        })?;

    let request = ExchangeRequest {
        grant_type: body.grant_type,
        client_id: client_id.to_string(),
        client_secret: client_secret.clone(),
        code: body.code,
        redirect_uri: body.redirect_uri,
        refresh_token: body.refresh_token,
        metadata: body.metadata,
    };

    let token = state.engine.exchange(&provider, request).await?;

    Ok(Json(TokenExchangeResponse { provider, token }))
}
