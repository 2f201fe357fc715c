//! Provider adapter descriptors
//!
//! A [`ProviderAdapter`] declares everything the engine needs to talk to one
//! token endpoint: where it lives, how clients authenticate, which grants it
//! accepts, and how request and response fields are named on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use utoipa::ToSchema;

use crate::models::{ExchangeRequest, GrantType, Metadata, RequestContext};
use crate::providers::auth::AuthStrategy;

/// Body encoding expected by the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// `application/x-www-form-urlencoded`
    Form,
    /// `application/json`
    Json,
}

impl ContentType {
    pub const fn mime(self) -> &'static str {
        match self {
            ContentType::Form => "application/x-www-form-urlencoded",
            ContentType::Json => "application/json",
        }
    }
}

/// Whether the provider returns a refresh token on every exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTokenPolicy {
    /// Every response must carry a refresh token
    Rotating,
    /// Responses may omit the refresh token; the caller keeps the previous one
    NonRotating,
}

/// Source of a request body value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    AuthorizationCode,
    RedirectUri,
    RefreshToken,
    /// String value taken from the request metadata under the given key
    Metadata(&'static str),
    /// Fixed value baked into the adapter (e.g. a scope string)
    Constant(&'static str),
}

/// One body parameter: wire key, value source and the grants it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestField {
    pub key: &'static str,
    pub source: FieldSource,
    /// `None` applies the field to every grant
    pub grant: Option<GrantType>,
}

impl RequestField {
    pub const fn always(key: &'static str, source: FieldSource) -> Self {
        Self {
            key,
            source,
            grant: None,
        }
    }

    pub const fn for_grant(key: &'static str, source: FieldSource, grant: GrantType) -> Self {
        Self {
            key,
            source,
            grant: Some(grant),
        }
    }
}

/// Response keys holding the four normalized token fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFieldMapping {
    pub access_token: &'static str,
    pub refresh_token: &'static str,
    pub expires_in: &'static str,
    pub token_type: &'static str,
}

impl Default for ResponseFieldMapping {
    /// RFC 6749 section 5.1 field names.
    fn default() -> Self {
        Self {
            access_token: "access_token",
            refresh_token: "refresh_token",
            expires_in: "expires_in",
            token_type: "token_type",
        }
    }
}

/// Extracts provider-specific metadata from a token response.
pub type MetadataExtractor = fn(&Map<String, Value>, &RequestContext) -> Metadata;

/// Extractor for providers that keep no extra metadata.
pub fn no_metadata(_response: &Map<String, Value>, _context: &RequestContext) -> Metadata {
    Metadata::new()
}

/// Immutable description of one provider's token endpoint.
#[derive(Debug, Clone)]
pub struct ProviderAdapter {
    pub id: String,
    pub token_url: Url,
    pub grant_types: Vec<GrantType>,
    pub auth_strategy: AuthStrategy,
    pub content_type: ContentType,
    pub request_fields: Vec<RequestField>,
    pub response_fields: ResponseFieldMapping,
    pub refresh_token_policy: RefreshTokenPolicy,
    pub metadata_extractor: MetadataExtractor,
}

impl ProviderAdapter {
    pub fn supports(&self, grant: GrantType) -> bool {
        self.grant_types.contains(&grant)
    }

    /// Same adapter pointed at a different token endpoint.
    pub fn with_token_url(mut self, token_url: Url) -> Self {
        self.token_url = token_url;
        self
    }

    /// Apply the request-field mapping, producing body parameters in declaration order.
    ///
    /// `grant_type` is always first. Fields whose source is absent on the
    /// request are skipped; the engine validates required fields beforehand.
    pub fn build_body(&self, request: &ExchangeRequest) -> Vec<(String, String)> {
        let mut body = vec![(
            "grant_type".to_string(),
            request.grant_type.as_str().to_string(),
        )];

        for field in &self.request_fields {
            if field.grant.is_some_and(|grant| grant != request.grant_type) {
                continue;
            }

            let value = match field.source {
                FieldSource::AuthorizationCode => {
                    request.code.as_ref().map(|c| c.expose().to_string())
                }
                FieldSource::RedirectUri => request.redirect_uri.clone(),
                FieldSource::RefreshToken => request
                    .refresh_token
                    .as_ref()
                    .map(|t| t.expose().to_string()),
                FieldSource::Metadata(key) => request
                    .metadata
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                FieldSource::Constant(value) => Some(value.to_string()),
            };

            if let Some(value) = value {
                body.push((field.key.to_string(), value));
            }
        }

        body
    }

    /// Extract provider metadata from a response.
    pub fn extract_metadata(
        &self,
        response: &Map<String, Value>,
        context: &RequestContext,
    ) -> Metadata {
        (self.metadata_extractor)(response, context)
    }
}

/// Standard code/redirect/refresh mapping shared by most OAuth2 providers.
pub fn standard_request_fields() -> Vec<RequestField> {
    vec![
        RequestField::for_grant(
            "code",
            FieldSource::AuthorizationCode,
            GrantType::AuthorizationCode,
        ),
        RequestField::for_grant(
            "redirect_uri",
            FieldSource::RedirectUri,
            GrantType::AuthorizationCode,
        ),
        RequestField::for_grant(
            "refresh_token",
            FieldSource::RefreshToken,
            GrantType::RefreshToken,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ProviderAdapter {
        let mut request_fields = standard_request_fields();
        request_fields.push(RequestField::always("scope", FieldSource::Constant("a b")));
        request_fields.push(RequestField::always(
            "tenant",
            FieldSource::Metadata("tenant"),
        ));

        ProviderAdapter {
            id: "test".to_string(),
            token_url: Url::parse("https://example.com/token").unwrap(),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            auth_strategy: AuthStrategy::BodyCredentials,
            content_type: ContentType::Form,
            request_fields,
            response_fields: ResponseFieldMapping::default(),
            refresh_token_policy: RefreshTokenPolicy::Rotating,
            metadata_extractor: no_metadata,
        }
    }

    #[test]
    fn refresh_body_skips_code_fields() {
        let request = ExchangeRequest::refresh("id", "secret", "rt-1");
        let body = adapter().build_body(&request);

        assert_eq!(
            body,
            vec![
                ("grant_type".to_string(), "refresh_token".to_string()),
                ("refresh_token".to_string(), "rt-1".to_string()),
                ("scope".to_string(), "a b".to_string()),
            ]
        );
    }

    #[test]
    fn authorization_code_body_includes_redirect_and_metadata() {
        let request = ExchangeRequest::authorization_code("id", "secret", "code-1", "https://cb")
            .with_metadata("tenant", "acme");
        let body = adapter().build_body(&request);

        assert_eq!(body[0], ("grant_type".to_string(), "authorization_code".to_string()));
        assert!(body.contains(&("code".to_string(), "code-1".to_string())));
        assert!(body.contains(&("redirect_uri".to_string(), "https://cb".to_string())));
        assert!(body.contains(&("tenant".to_string(), "acme".to_string())));
        assert!(!body.iter().any(|(k, _)| k == "refresh_token"));
    }

    #[test]
    fn credentials_never_come_from_field_mapping() {
        let request = ExchangeRequest::refresh("id", "secret", "rt-1");
        let body = adapter().build_body(&request);
        assert!(!body.iter().any(|(k, _)| k == "client_id" || k == "client_secret"));
    }

    #[test]
    fn content_type_mime() {
        assert_eq!(ContentType::Form.mime(), "application/x-www-form-urlencoded");
        assert_eq!(ContentType::Json.mime(), "application/json");
    }

    #[test]
    fn token_url_override() {
        let url = Url::parse("http://127.0.0.1:9999/token").unwrap();
        let adapter = adapter().with_token_url(url.clone());
        assert_eq!(adapter.token_url, url);
        assert!(adapter.supports(GrantType::RefreshToken));
    }
}
