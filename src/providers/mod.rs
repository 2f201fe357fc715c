//! Providers module
//!
//! This module provides the provider table used by the exchange engine:
//! - [`ProviderAdapter`] descriptors and their declarative field mappings
//! - Client authentication strategies
//! - The [`ProviderRegistry`] and the built-in adapters

pub mod adapter;
pub mod apollo;
pub mod auth;
pub mod quickbooks;
pub mod registry;
pub mod teams;

use serde_json::{Map, Value};

use crate::models::Metadata;

pub use adapter::{
    ContentType, FieldSource, MetadataExtractor, ProviderAdapter, RefreshTokenPolicy,
    RequestField, ResponseFieldMapping,
};
pub use auth::{AuthFragment, AuthStrategy};
pub use registry::{ProviderRegistry, RegistryError};

pub use apollo::{APOLLO_PROVIDER_ID, apollo_adapter, register_apollo_adapter};
pub use quickbooks::{QUICKBOOKS_PROVIDER_ID, quickbooks_adapter, register_quickbooks_adapter};
pub use teams::{TEAMS_PROVIDER_ID, register_teams_adapter, teams_adapter};

/// Copy string-valued `keys` from a token response into metadata.
pub(crate) fn copy_string_fields(response: &Map<String, Value>, keys: &[&str]) -> Metadata {
    keys.iter()
        .filter_map(|key| {
            response
                .get(*key)
                .filter(|value| value.is_string())
                .map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}
