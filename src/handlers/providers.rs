//! # Providers API Handlers
//!
//! This module contains handlers for the providers endpoints.

use crate::models::GrantType;
use crate::providers::{AuthStrategy, ContentType, ProviderAdapter, RefreshTokenPolicy};
use crate::server::AppState;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Provider information for public listing
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ProviderInfo {
    /// Provider identifier (e.g., "teams", "quickbooks")
    pub id: String,
    /// Token endpoint the exchange is sent to
    pub token_url: String,
    /// Grant types this provider accepts
    pub grant_types: Vec<GrantType>,
    /// How client credentials are presented
    pub auth_strategy: AuthStrategy,
    /// Request body encoding
    pub content_type: ContentType,
    /// Whether responses must carry a new refresh token
    pub refresh_token_policy: RefreshTokenPolicy,
    /// Whether client credentials are configured for this provider
    pub configured: bool,
}

impl ProviderInfo {
    fn from_adapter(adapter: &ProviderAdapter, configured: bool) -> Self {
        Self {
            id: adapter.id.clone(),
            token_url: adapter.token_url.to_string(),
            grant_types: adapter.grant_types.clone(),
            auth_strategy: adapter.auth_strategy,
            content_type: adapter.content_type,
            refresh_token_policy: adapter.refresh_token_policy,
            configured,
        }
    }
}

/// Response containing the list of registered providers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvidersResponse {
    /// Registered providers, sorted by id
    pub providers: Vec<ProviderInfo>,
}

/// Public endpoint to list all registered providers
#[utoipa::path(
    get,
    path = "/providers",
    responses(
        (status = 200, description = "List of registered providers", body = ProvidersResponse, example = json!({
            "providers": [
                {
                    "id": "quickbooks",
                    "token_url": "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer",
                    "grant_types": ["authorization_code", "refresh_token"],
                    "auth_strategy": "basic_header",
                    "content_type": "form",
                    "refresh_token_policy": "rotating",
                    "configured": true
                }
            ]
        }))
    ),
    tag = "providers"
)]
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state
        .engine
        .registry()
        .list()
        .iter()
        .map(|adapter| {
            let configured = state
                .config
                .provider(&adapter.id)
                .and_then(|credentials| credentials.client())
                .is_some();
            ProviderInfo::from_adapter(adapter, configured)
        })
        .collect();

    Json(ProvidersResponse { providers })
}
