//! Apollo.io adapter
//!
//! Apollo does not always return a new refresh token on refresh, so its
//! adapter is configured as non-rotating.

use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::models::{GrantType, Metadata, RequestContext};
use crate::providers::adapter::{
    ContentType, ProviderAdapter, RefreshTokenPolicy, ResponseFieldMapping,
    standard_request_fields,
};
use crate::providers::auth::AuthStrategy;
use crate::providers::registry::ProviderRegistry;

/// Provider identifier for Apollo.
pub const APOLLO_PROVIDER_ID: &str = "apollo";

/// Apollo OAuth token endpoint.
pub const APOLLO_TOKEN_URL: &str = "https://app.apollo.io/api/v1/oauth/token";

/// Build the Apollo adapter against `token_url`.
pub fn apollo_adapter(token_url: Url) -> ProviderAdapter {
    ProviderAdapter {
        id: APOLLO_PROVIDER_ID.to_string(),
        token_url,
        grant_types: vec![GrantType::RefreshToken],
        auth_strategy: AuthStrategy::BodyCredentials,
        content_type: ContentType::Form,
        request_fields: standard_request_fields(),
        response_fields: ResponseFieldMapping::default(),
        refresh_token_policy: RefreshTokenPolicy::NonRotating,
        metadata_extractor: apollo_metadata,
    }
}

fn apollo_metadata(response: &Map<String, Value>, _context: &RequestContext) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(scope) = response.get("scope").filter(|v| v.is_string()) {
        metadata.insert("scope".to_string(), scope.clone());
    }
    // Unix seconds; Apollo reports it as a number.
    if let Some(created_at) = response.get("created_at").filter(|v| v.is_number()) {
        metadata.insert("created_at".to_string(), created_at.clone());
    }
    metadata
}

/// Register the apollo adapter at its production endpoint.
pub fn register_apollo_adapter(registry: &mut ProviderRegistry) {
    match Url::parse(APOLLO_TOKEN_URL) {
        Ok(token_url) => registry.register(apollo_adapter(token_url)),
        Err(err) => warn!(provider = APOLLO_PROVIDER_ID, error = %err, "adapter not registered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExchangeRequest;
    use serde_json::json;

    #[test]
    fn adapter_shape() {
        let adapter = apollo_adapter(Url::parse(APOLLO_TOKEN_URL).unwrap());
        assert_eq!(adapter.auth_strategy, AuthStrategy::BodyCredentials);
        assert_eq!(adapter.content_type, ContentType::Form);
        assert_eq!(adapter.refresh_token_policy, RefreshTokenPolicy::NonRotating);
        assert!(adapter.supports(GrantType::RefreshToken));
    }

    #[test]
    fn metadata_keeps_scope_and_created_at() {
        let response = json!({
            "access_token": "at",
            "scope": "read write",
            "created_at": 1_700_000_000,
            "unrelated": true
        });
        let context = ExchangeRequest::refresh("id", "secret", "rt").context(APOLLO_PROVIDER_ID);

        let metadata = apollo_metadata(response.as_object().unwrap(), &context);
        assert_eq!(metadata.get("scope"), Some(&json!("read write")));
        assert_eq!(metadata.get("created_at"), Some(&json!(1_700_000_000)));
        assert!(metadata.get("unrelated").is_none());
    }
}
