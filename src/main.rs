//! # Token Exchange Main Entry Point
//!
//! This is the main entry point for the token exchange service.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use token_exchange::{
    config::ConfigLoader,
    engine::TokenExchangeEngine,
    providers::ProviderRegistry,
    server::{cancel_on_ctrl_c, run_server},
    telemetry,
    transport::ReqwestTransport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;

    telemetry::init_tracing(&config).context("initializing telemetry")?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let registry = ProviderRegistry::from_config(&config).context("building provider registry")?;
    for adapter in registry.list() {
        let configured = config
            .provider(&adapter.id)
            .and_then(|credentials| credentials.client())
            .is_some();
        tracing::info!(provider = %adapter.id, token_url = %adapter.token_url, configured, "Registered provider");
    }

    let transport = ReqwestTransport::new().context("building http client")?;
    let engine = TokenExchangeEngine::new(Arc::new(registry), Arc::new(transport))
        .with_timeout(config.http_timeout());

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    run_server(config, engine, shutdown)
        .await
        .map_err(|err| anyhow::anyhow!("server error: {}", err))
}
