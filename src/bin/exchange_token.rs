//! One-shot token exchange from the command line.
//!
//! Client credentials come from the same `TOKEN_EXCHANGE_*` configuration the
//! service uses. Tokens in the printed result are redacted unless
//! `--show-tokens` is passed.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use serde_json::Value;
use token_exchange::{
    config::ConfigLoader,
    engine::TokenExchangeEngine,
    models::{ExchangeRequest, GrantType, Metadata},
    providers::ProviderRegistry,
    secret::SecretString,
    telemetry,
    transport::ReqwestTransport,
};

/// Exchange an authorization code or refresh token with an OAuth provider
#[derive(Parser, Debug)]
#[command(name = "exchange-token")]
#[command(version)]
struct Args {
    /// Provider identifier (teams, apollo, quickbooks)
    #[arg(short, long)]
    provider: String,

    /// Grant type: authorization_code or refresh_token
    #[arg(short, long, value_parser = parse_grant_type, default_value = "refresh_token")]
    grant_type: GrantType,

    /// Authorization code (authorization_code grant)
    #[arg(long)]
    code: Option<String>,

    /// Redirect URI registered with the provider (authorization_code grant)
    #[arg(long)]
    redirect_uri: Option<String>,

    /// Refresh token (refresh_token grant)
    #[arg(long)]
    refresh_token: Option<String>,

    /// Provider metadata as key=value, repeatable (e.g. --meta realmId=4620816365)
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    meta: Vec<(String, String)>,

    /// Print tokens instead of redacting them
    #[arg(long)]
    show_tokens: bool,

    /// Emit engine logs
    #[arg(short, long)]
    verbose: bool,
}

fn parse_grant_type(value: &str) -> Result<GrantType, String> {
    GrantType::parse(value)
        .ok_or_else(|| format!("unsupported grant type '{}'", value))
}

fn parse_meta(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    if args.verbose {
        telemetry::init_tracing(&config).context("initializing telemetry")?;
    }

    let registry = ProviderRegistry::from_config(&config).context("building provider registry")?;
    if !registry.contains(&args.provider) {
        let known: Vec<String> = registry.list().iter().map(|a| a.id.clone()).collect();
        bail!(
            "unknown provider '{}' (known: {})",
            args.provider,
            known.join(", ")
        );
    }

    let (client_id, client_secret) = config
        .provider(&args.provider)
        .and_then(|credentials| credentials.client())
        .ok_or_else(|| {
            anyhow!(
                "client credentials for '{}' are not configured; set TOKEN_EXCHANGE_{}_CLIENT_ID and TOKEN_EXCHANGE_{}_CLIENT_SECRET",
                args.provider,
                env_key(&args.provider),
                env_key(&args.provider)
            )
        })?;

    let metadata: Metadata = args
        .meta
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();

    let request = ExchangeRequest {
        grant_type: args.grant_type,
        client_id: client_id.to_string(),
        client_secret: client_secret.clone(),
        code: args.code.clone().map(SecretString::new),
        redirect_uri: args.redirect_uri.clone(),
        refresh_token: args.refresh_token.clone().map(SecretString::new),
        metadata,
    };

    let transport = ReqwestTransport::new().context("building http client")?;
    let engine = TokenExchangeEngine::new(Arc::new(registry), Arc::new(transport))
        .with_timeout(config.http_timeout());

    match engine.exchange(&args.provider, request).await {
        Ok(result) => {
            let printable = if args.show_tokens {
                result
            } else {
                result.redacted()
            };
            println!("{}", serde_json::to_string_pretty(&printable)?);
            Ok(())
        }
        Err(err) => {
            if let Some(snippet) = &err.body_snippet {
                eprintln!("provider response: {}", snippet);
            }
            eprintln!("retry classification: {:?}", err.retry_classification());
            Err(err.into())
        }
    }
}

fn env_key(provider: &str) -> String {
    provider.to_ascii_uppercase().replace('-', "_")
}
