//! # Data Models
//!
//! Request and result types shared by the engine, the HTTP surface and the CLI.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod exchange;
pub mod token;

pub use exchange::{ExchangeRequest, GrantType, Metadata, RequestContext};
pub use token::OAuthResult;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "token-exchange".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
