//! Provider registry
//!
//! Maps provider identifiers to immutable [`ProviderAdapter`] descriptors. The
//! registry is assembled once at startup and then shared behind an `Arc`;
//! lookups take no locks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::config::AppConfig;
use crate::error::ExchangeError;
use crate::providers::adapter::ProviderAdapter;
use crate::providers::{apollo, quickbooks, teams};

/// Error type for registry construction
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("provider '{provider}' token url '{value}' is invalid: {reason}")]
    InvalidTokenUrl {
        provider: String,
        value: String,
        reason: String,
    },
}

/// Read-only table of provider adapters keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in providers at their production endpoints.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        teams::register_teams_adapter(&mut registry);
        apollo::register_apollo_adapter(&mut registry);
        quickbooks::register_quickbooks_adapter(&mut registry);
        registry
    }

    /// Built-in providers with any `*_TOKEN_URL` overrides from configuration applied.
    ///
    /// Overrides for ids that are not built in are ignored.
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::builtin();

        for (provider, credentials) in &config.providers {
            let Some(raw_url) = credentials.token_url.as_deref() else {
                continue;
            };
            let Some(existing) = registry.adapters.get(provider) else {
                debug!(provider = %provider, "ignoring token url override for unknown provider");
                continue;
            };

            let token_url = Url::parse(raw_url).map_err(|err| RegistryError::InvalidTokenUrl {
                provider: provider.clone(),
                value: raw_url.to_string(),
                reason: err.to_string(),
            })?;

            info!(provider = %provider, token_url = %token_url, "token url overridden");
            let adapter = ProviderAdapter::clone(existing).with_token_url(token_url);
            registry.register(adapter);
        }

        Ok(registry)
    }

    /// Register an adapter, replacing any previous adapter with the same id.
    pub fn register(&mut self, adapter: ProviderAdapter) {
        self.adapters.insert(adapter.id.clone(), Arc::new(adapter));
    }

    /// Resolve `provider_id` to its adapter.
    pub fn lookup(&self, provider_id: &str) -> Result<Arc<ProviderAdapter>, ExchangeError> {
        self.adapters
            .get(provider_id)
            .cloned()
            .ok_or_else(|| ExchangeError::unknown_provider(provider_id))
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.adapters.contains_key(provider_id)
    }

    /// All adapters, sorted by id for stable ordering
    pub fn list(&self) -> Vec<Arc<ProviderAdapter>> {
        let mut adapters: Vec<_> = self.adapters.values().cloned().collect();
        adapters.sort_by(|a, b| a.id.cmp(&b.id));
        adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;
    use crate::error::ExchangeErrorKind;

    #[test]
    fn builtin_registry_lists_sorted() {
        let registry = ProviderRegistry::builtin();
        let ids: Vec<String> = registry.list().iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec!["apollo", "quickbooks", "teams"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("teams"));
    }

    #[test]
    fn lookup_unknown_provider_fails() {
        let registry = ProviderRegistry::builtin();
        let err = registry.lookup("unknown-provider").unwrap_err();
        assert_eq!(err.kind, ExchangeErrorKind::UnknownProvider);
        assert_eq!(err.provider, "unknown-provider");
    }

    #[test]
    fn from_config_applies_token_url_override() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "apollo".to_string(),
            ProviderCredentials {
                token_url: Some("http://127.0.0.1:9000/oauth/token".to_string()),
                ..Default::default()
            },
        );
        config.providers.insert(
            "not-built-in".to_string(),
            ProviderCredentials {
                token_url: Some("http://127.0.0.1:9000/other".to_string()),
                ..Default::default()
            },
        );

        let registry = ProviderRegistry::from_config(&config).unwrap();
        let apollo = registry.lookup("apollo").unwrap();
        assert_eq!(apollo.token_url.as_str(), "http://127.0.0.1:9000/oauth/token");
        assert_eq!(
            registry.lookup("teams").unwrap().token_url.as_str(),
            teams::TEAMS_TOKEN_URL
        );
        assert!(!registry.contains("not-built-in"));
    }

    #[test]
    fn from_config_rejects_unparseable_override() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "teams".to_string(),
            ProviderCredentials {
                token_url: Some("not a url".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(
            ProviderRegistry::from_config(&config),
            Err(RegistryError::InvalidTokenUrl { .. })
        ));
    }
}
