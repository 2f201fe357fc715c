//! Configuration loading for the token exchange service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `TOKEN_EXCHANGE_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::secret::{REDACTED, SecretString};

/// Prefix shared by every environment variable the loader reads.
pub const ENV_PREFIX: &str = "TOKEN_EXCHANGE_";

const CLIENT_ID_SUFFIX: &str = "_CLIENT_ID";
const CLIENT_SECRET_SUFFIX: &str = "_CLIENT_SECRET";
const TOKEN_URL_SUFFIX: &str = "_TOKEN_URL";

/// Application configuration derived from `TOKEN_EXCHANGE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Per-request timeout applied to token endpoint calls
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_tokens: Vec<String>,
    /// Client credentials and endpoint overrides keyed by provider id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<String, ProviderCredentials>,
}

/// Client registration for one provider.
///
/// Environment variables: `TOKEN_EXCHANGE_{PROVIDER}_CLIENT_ID`,
/// `TOKEN_EXCHANGE_{PROVIDER}_CLIENT_SECRET` and the optional
/// `TOKEN_EXCHANGE_{PROVIDER}_TOKEN_URL` override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProviderCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

impl ProviderCredentials {
    /// Both halves of the client registration, when configured.
    pub fn client(&self) -> Option<(&str, &SecretString)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.trim().is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret))
            }
            _ => None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            http_timeout_ms: default_http_timeout_ms(),
            operator_tokens: Vec::new(),
            providers: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Timeout for a single token endpoint call.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Configured settings for `provider`, if any.
    pub fn provider(&self, provider: &str) -> Option<&ProviderCredentials> {
        self.providers.get(provider)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();

        if !config.operator_tokens.is_empty() {
            config.operator_tokens = vec![REDACTED.to_string()];
        }

        // Client secrets serialize as [REDACTED] already; client ids are masked too.
        for credentials in config.providers.values_mut() {
            if credentials.client_id.is_some() {
                credentials.client_id = Some(REDACTED.to_string());
            }
        }

        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.profile.as_str(), "local" | "test") && self.operator_tokens.is_empty() {
            return Err(ConfigError::MissingOperatorTokens);
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if !(100..=120_000).contains(&self.http_timeout_ms) {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_ms,
            });
        }

        for (provider, credentials) in &self.providers {
            if credentials.client_id.is_some() != credentials.client_secret.is_some() {
                return Err(ConfigError::IncompleteProviderCredentials {
                    provider: provider.clone(),
                });
            }

            if let Some(token_url) = &credentials.token_url {
                let parsed =
                    Url::parse(token_url).map_err(|source| ConfigError::InvalidTokenUrl {
                        provider: provider.clone(),
                        value: token_url.clone(),
                        reason: source.to_string(),
                    })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidTokenUrl {
                        provider: provider.clone(),
                        value: token_url.clone(),
                        reason: format!("unsupported scheme '{}'", parsed.scheme()),
                    });
                }
            }
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000 // 10 seconds
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error(
        "no operator tokens configured; set TOKEN_EXCHANGE_OPERATOR_TOKEN or TOKEN_EXCHANGE_OPERATOR_TOKENS"
    )]
    MissingOperatorTokens,
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("http timeout must be between 100 and 120000 milliseconds, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("provider {provider} must configure both client id and client secret")]
    IncompleteProviderCredentials { provider: String },
    #[error("provider {provider} token url '{value}' is invalid: {reason}")]
    InvalidTokenUrl {
        provider: String,
        value: String,
        reason: String,
    },
}

/// Loads configuration using layered `.env` files and `TOKEN_EXCHANGE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.{profile}`, `.env.{profile}.local`, then the process
    /// environment, later sources overriding earlier ones.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);

        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);

        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);

        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);

        let http_timeout_ms = layered
            .remove("HTTP_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_http_timeout_ms);

        // Support both a single token and a comma-separated list
        let operator_tokens = if let Some(tokens) = layered.remove("OPERATOR_TOKENS") {
            tokens
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Some(token) = layered.remove("OPERATOR_TOKEN") {
            vec![token]
        } else {
            Vec::new()
        };

        let providers = collect_provider_credentials(&mut layered);

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            http_timeout_ms,
            operator_tokens,
            providers,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{}PROFILE", ENV_PREFIX))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain `{PROVIDER}_CLIENT_ID` / `_CLIENT_SECRET` / `_TOKEN_URL` keys into per-provider entries.
///
/// `QUICKBOOKS_CLIENT_ID` configures provider `quickbooks`; underscores in the
/// provider part map to dashes (`ZOHO_MAIL_CLIENT_ID` → `zoho-mail`).
fn collect_provider_credentials(
    layered: &mut BTreeMap<String, String>,
) -> BTreeMap<String, ProviderCredentials> {
    let mut providers: BTreeMap<String, ProviderCredentials> = BTreeMap::new();

    let keys: Vec<String> = layered.keys().cloned().collect();
    for key in keys {
        let (provider_key, suffix) = if let Some(p) = key.strip_suffix(CLIENT_SECRET_SUFFIX) {
            (p, CLIENT_SECRET_SUFFIX)
        } else if let Some(p) = key.strip_suffix(CLIENT_ID_SUFFIX) {
            (p, CLIENT_ID_SUFFIX)
        } else if let Some(p) = key.strip_suffix(TOKEN_URL_SUFFIX) {
            (p, TOKEN_URL_SUFFIX)
        } else {
            continue;
        };

        if provider_key.is_empty() {
            continue;
        }

        let provider = provider_key.to_ascii_lowercase().replace('_', "-");
        let Some(value) = layered.remove(&key) else {
            continue;
        };
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }

        let entry = providers.entry(provider).or_default();
        match suffix {
            CLIENT_ID_SUFFIX => entry.client_id = Some(value),
            CLIENT_SECRET_SUFFIX => entry.client_secret = Some(SecretString::new(value)),
            _ => entry.token_url = Some(value),
        }
    }

    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_for_local_profile() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn production_profile_requires_operator_tokens() {
        let config = AppConfig {
            profile: "prod".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOperatorTokens)
        ));
    }

    #[test]
    fn http_timeout_bounds() {
        for value in [0, 99, 120_001] {
            let config = AppConfig {
                http_timeout_ms: value,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "timeout {} accepted", value);
        }
    }

    #[test]
    fn token_url_must_be_http() {
        let mut providers = BTreeMap::new();
        providers.insert(
            "teams".to_string(),
            ProviderCredentials {
                token_url: Some("ftp://example.com/token".to_string()),
                ..Default::default()
            },
        );
        let config = AppConfig {
            providers,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTokenUrl { .. })
        ));
    }

    #[test]
    fn half_configured_credentials_rejected() {
        let mut providers = BTreeMap::new();
        providers.insert(
            "apollo".to_string(),
            ProviderCredentials {
                client_id: Some("id".to_string()),
                ..Default::default()
            },
        );
        let config = AppConfig {
            providers,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompleteProviderCredentials { .. })
        ));
    }

    #[test]
    fn provider_keys_are_grouped() {
        let mut layered = BTreeMap::new();
        layered.insert("TEAMS_CLIENT_ID".to_string(), "teams-id".to_string());
        layered.insert("TEAMS_CLIENT_SECRET".to_string(), "teams-secret".to_string());
        layered.insert(
            "ZOHO_MAIL_TOKEN_URL".to_string(),
            "https://accounts.zoho.com/oauth/v2/token".to_string(),
        );
        layered.insert("LOG_LEVEL".to_string(), "debug".to_string());

        let providers = collect_provider_credentials(&mut layered);

        let teams = providers.get("teams").unwrap();
        let (id, secret) = teams.client().unwrap();
        assert_eq!(id, "teams-id");
        assert_eq!(secret.expose(), "teams-secret");
        assert!(providers.get("zoho-mail").unwrap().token_url.is_some());
        assert_eq!(layered.len(), 1);
    }

    #[test]
    fn redacted_json_hides_credentials() {
        let mut providers = BTreeMap::new();
        providers.insert(
            "quickbooks".to_string(),
            ProviderCredentials {
                client_id: Some("qb-client".to_string()),
                client_secret: Some(SecretString::new("qb-secret")),
                token_url: None,
            },
        );
        let config = AppConfig {
            operator_tokens: vec!["operator-secret".to_string()],
            providers,
            ..Default::default()
        };

        let json = config.redacted_json().unwrap();
        assert!(!json.contains("qb-client"));
        assert!(!json.contains("qb-secret"));
        assert!(!json.contains("operator-secret"));
        assert!(json.contains(REDACTED));
    }
}
