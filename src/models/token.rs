//! Normalized token result

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::exchange::Metadata;
use crate::secret::REDACTED;

/// Provider-agnostic token set produced by a successful exchange.
#[derive(Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OAuthResult {
    /// Bearer credential for provider API calls
    pub access_token: String,
    /// Refresh token; absent when a non-rotating provider omits it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token type reported by the provider (usually "Bearer")
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Provider-specific fields (e.g. `scope`, `realmId`)
    #[schema(value_type = Object)]
    pub metadata: Metadata,
    /// When the engine received the token response
    pub issued_at: DateTime<Utc>,
}

impl OAuthResult {
    /// Absolute expiry of the access token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let seconds = i64::try_from(self.expires_in).unwrap_or(i64::MAX);
        Duration::try_seconds(seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Copy with both tokens replaced by a redaction marker.
    pub fn redacted(&self) -> Self {
        Self {
            access_token: REDACTED.to_string(),
            refresh_token: self.refresh_token.as_ref().map(|_| REDACTED.to_string()),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for OAuthResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthResult")
            .field("access_token", &REDACTED)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| REDACTED),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("metadata", &self.metadata)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OAuthResult {
        OAuthResult {
            access_token: "at-123".to_string(),
            refresh_token: Some("rt-456".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            metadata: Metadata::new(),
            issued_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn expires_at_adds_lifetime() {
        let result = sample();
        assert_eq!(
            result.expires_at(),
            DateTime::from_timestamp(1_700_003_600, 0).unwrap()
        );
    }

    #[test]
    fn expires_at_saturates() {
        let mut result = sample();
        result.expires_in = u64::MAX;
        assert_eq!(result.expires_at(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn debug_hides_tokens() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("at-123"));
        assert!(!debug.contains("rt-456"));
        assert!(debug.contains("Bearer"));
    }

    #[test]
    fn redacted_keeps_shape() {
        let redacted = sample().redacted();
        assert_eq!(redacted.access_token, REDACTED);
        assert_eq!(redacted.refresh_token.as_deref(), Some(REDACTED));
        assert_eq!(redacted.expires_in, 3600);
    }
}
