//! Exchange request model
//!
//! Input to a single token exchange. A request lives for one `exchange` call
//! and carries secrets, so the secret-bearing fields are [`SecretString`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::secret::SecretString;

/// Free-form provider metadata (e.g. Quickbooks `realmId`).
pub type Metadata = Map<String, Value>;

/// OAuth2 grant type used for the token endpoint call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Exchange an authorization code for tokens
    AuthorizationCode,
    /// Obtain a fresh access token from a refresh token
    RefreshToken,
}

impl GrantType {
    /// Wire value for the `grant_type` body parameter.
    pub const fn as_str(self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "authorization_code" => Some(GrantType::AuthorizationCode),
            "refresh_token" => Some(GrantType::RefreshToken),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single token exchange request.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub grant_type: GrantType,
    pub client_id: String,
    pub client_secret: SecretString,
    pub code: Option<SecretString>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<SecretString>,
    pub metadata: Metadata,
}

impl ExchangeRequest {
    /// Build an `authorization_code` request.
    pub fn authorization_code(
        client_id: impl Into<String>,
        client_secret: impl Into<SecretString>,
        code: impl Into<SecretString>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::AuthorizationCode,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            code: Some(code.into()),
            redirect_uri: Some(redirect_uri.into()),
            refresh_token: None,
            metadata: Metadata::new(),
        }
    }

    /// Build a `refresh_token` request.
    pub fn refresh(
        client_id: impl Into<String>,
        client_secret: impl Into<SecretString>,
        refresh_token: impl Into<SecretString>,
    ) -> Self {
        Self {
            grant_type: GrantType::RefreshToken,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            code: None,
            redirect_uri: None,
            refresh_token: Some(refresh_token.into()),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry, replacing any previous value for `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Non-secret view of this request handed to metadata extractors.
    pub fn context(&self, provider_id: &str) -> RequestContext {
        RequestContext {
            provider_id: provider_id.to_string(),
            grant_type: self.grant_type,
            redirect_uri: self.redirect_uri.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Every secret carried by this request, for scrubbing upstream bodies.
    pub(crate) fn secrets(&self) -> Vec<&str> {
        let mut secrets = vec![self.client_secret.expose()];
        if let Some(code) = &self.code {
            secrets.push(code.expose());
        }
        if let Some(refresh_token) = &self.refresh_token {
            secrets.push(refresh_token.expose());
        }
        secrets
    }
}

/// Request details that are safe to share with metadata extractors and logs.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub provider_id: String,
    pub grant_type: GrantType,
    pub redirect_uri: Option<String>,
    pub metadata: Metadata,
}
