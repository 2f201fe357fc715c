//! Intuit Quickbooks Online adapter
//!
//! Uses HTTP Basic client authentication. The company identifier (`realmId`)
//! arrives on the authorization redirect, not in the token response, so it is
//! carried through from the request metadata.

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

/// Provider identifier for Quickbooks.
pub const QUICKBOOKS_PROVIDER_ID: &str = "quickbooks";

/// Intuit OAuth2 bearer token endpoint.
pub const QUICKBOOKS_TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";

/// Metadata key for the Quickbooks company id.
pub const REALM_ID_KEY: &str = "realmId";

/// Build the Quickbooks adapter against `token_url`.
pub fn quickbooks_adapter(token_url: Url) -> ProviderAdapter {
    ProviderAdapter {
        id: QUICKBOOKS_PROVIDER_ID.to_string(),
        token_url,
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        auth_strategy: AuthStrategy::BasicHeader,
        content_type: ContentType::Form,
        request_fields: standard_request_fields(),
        response_fields: ResponseFieldMapping::default(),
        refresh_token_policy: RefreshTokenPolicy::Rotating,
        metadata_extractor: quickbooks_metadata,
    }
}

/// `realmId` always comes from the request; the response never overrides it.
fn quickbooks_metadata(response: &Map<String, Value>, context: &RequestContext) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(realm_id) = context.metadata.get(REALM_ID_KEY) {
        metadata.insert(REALM_ID_KEY.to_string(), realm_id.clone());
    }
    if let Some(lifetime) = response
        .get("x_refresh_token_expires_in")
        .filter(|v| v.is_number())
    {
        metadata.insert("x_refresh_token_expires_in".to_string(), lifetime.clone());
    }
    metadata
}

/// Register the quickbooks adapter at its production endpoint.
pub fn register_quickbooks_adapter(registry: &mut ProviderRegistry) {
    match Url::parse(QUICKBOOKS_TOKEN_URL) {
        Ok(token_url) => registry.register(quickbooks_adapter(token_url)),
        Err(err) => warn!(provider = QUICKBOOKS_PROVIDER_ID, error = %err, "adapter not registered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExchangeRequest;
    use serde_json::json;

    #[test]
    fn realm_id_comes_from_request_metadata() {
        let response = json!({ "access_token": "at", "x_refresh_token_expires_in": 8_726_400 });
        let context = ExchangeRequest::authorization_code("id", "secret", "code", "https://cb")
            .with_metadata(REALM_ID_KEY, "123")
            .context(QUICKBOOKS_PROVIDER_ID);

        let metadata = quickbooks_metadata(response.as_object().unwrap(), &context);
        assert_eq!(metadata.get(REALM_ID_KEY), Some(&json!("123")));
        assert_eq!(
            metadata.get("x_refresh_token_expires_in"),
            Some(&json!(8_726_400))
        );
    }

    #[test]
    fn response_realm_id_is_ignored() {
        let response = json!({ "access_token": "at", "realmId": "999" });
        let context = ExchangeRequest::refresh("id", "secret", "rt")
            .with_metadata(REALM_ID_KEY, "123")
            .context(QUICKBOOKS_PROVIDER_ID);

        let metadata = quickbooks_metadata(response.as_object().unwrap(), &context);
        assert_eq!(metadata.get(REALM_ID_KEY), Some(&json!("123")));
    }

    #[test]
    fn no_realm_id_without_request_metadata() {
        let response = json!({ "access_token": "at", "realmId": "999" });
        let context = ExchangeRequest::refresh("id", "secret", "rt").context(QUICKBOOKS_PROVIDER_ID);

        let metadata = quickbooks_metadata(response.as_object().unwrap(), &context);
        assert!(metadata.get(REALM_ID_KEY).is_none());
    }

    #[test]
    fn adapter_uses_basic_auth() {
        let adapter = quickbooks_adapter(Url::parse(QUICKBOOKS_TOKEN_URL).unwrap());
        assert_eq!(adapter.auth_strategy, AuthStrategy::BasicHeader);
        assert!(adapter.supports(GrantType::AuthorizationCode));
        assert!(adapter.supports(GrantType::RefreshToken));
    }
}
