//! # Token Exchange Library
//!
//! Provider-agnostic OAuth2 token exchange: a registry of provider adapters,
//! an engine that performs a single token endpoint call per exchange, and the
//! HTTP surface and configuration around it.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod normalization;
pub mod providers;
pub mod secret;
pub mod server;
pub mod telemetry;
pub mod transport;

pub use engine::TokenExchangeEngine;
pub use error::{ExchangeError, ExchangeErrorKind, RetryClassification};
pub use models::{ExchangeRequest, GrantType, OAuthResult};
pub use providers::{ProviderAdapter, ProviderRegistry};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};
