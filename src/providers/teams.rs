//! Microsoft Teams (Microsoft identity platform v2.0) adapter
//!
//! Refresh-only: the authorization code leg happens elsewhere. Every refresh
//! requests the same fixed scope set, and Microsoft rotates refresh tokens on
//! each call.

use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::models::{GrantType, Metadata, RequestContext};
use crate::providers::adapter::{
    ContentType, FieldSource, ProviderAdapter, RefreshTokenPolicy, RequestField,
    ResponseFieldMapping, standard_request_fields,
};
use crate::providers::auth::AuthStrategy;
use crate::providers::copy_string_fields;
use crate::providers::registry::ProviderRegistry;

/// Provider identifier for Microsoft Teams.
pub const TEAMS_PROVIDER_ID: &str = "teams";

/// Token endpoint for the common (multi-tenant) authority.
pub const TEAMS_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Scope string sent with every refresh.
pub const TEAMS_SCOPE: &str =
    "offline_access User.Read Calendars.ReadWrite OnlineMeetings.ReadWrite";

/// Build the Teams adapter against `token_url`.
pub fn teams_adapter(token_url: Url) -> ProviderAdapter {
    let mut request_fields = standard_request_fields();
    request_fields.push(RequestField::always(
        "scope",
        FieldSource::Constant(TEAMS_SCOPE),
    ));

    ProviderAdapter {
        id: TEAMS_PROVIDER_ID.to_string(),
        token_url,
        grant_types: vec![GrantType::RefreshToken],
        auth_strategy: AuthStrategy::BodyCredentials,
        content_type: ContentType::Form,
        request_fields,
        response_fields: ResponseFieldMapping::default(),
        refresh_token_policy: RefreshTokenPolicy::Rotating,
        metadata_extractor: teams_metadata,
    }
}

/// Teams keeps the granted `scope` string.
fn teams_metadata(response: &Map<String, Value>, _context: &RequestContext) -> Metadata {
    copy_string_fields(response, &["scope"])
}

/// Register the teams adapter at its production endpoint.
pub fn register_teams_adapter(registry: &mut ProviderRegistry) {
    match Url::parse(TEAMS_TOKEN_URL) {
        Ok(token_url) => registry.register(teams_adapter(token_url)),
        Err(err) => warn!(provider = TEAMS_PROVIDER_ID, error = %err, "adapter not registered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExchangeRequest;
    use serde_json::json;

    #[test]
    fn refresh_body_carries_fixed_scope() {
        let adapter = teams_adapter(Url::parse(TEAMS_TOKEN_URL).unwrap());
        let body = adapter.build_body(&ExchangeRequest::refresh("id", "secret", "rt"));

        assert!(body.contains(&("scope".to_string(), TEAMS_SCOPE.to_string())));
        assert!(body.contains(&("refresh_token".to_string(), "rt".to_string())));
        assert!(!adapter.supports(GrantType::AuthorizationCode));
    }

    #[test]
    fn metadata_keeps_scope() {
        let response = json!({
            "access_token": "at",
            "scope": "Calendars.ReadWrite",
            "ext_expires_in": 3599
        });
        let context = ExchangeRequest::refresh("id", "secret", "rt").context(TEAMS_PROVIDER_ID);

        let metadata = teams_metadata(response.as_object().unwrap(), &context);
        assert_eq!(metadata.get("scope"), Some(&json!("Calendars.ReadWrite")));
        assert_eq!(metadata.len(), 1);
    }
}
