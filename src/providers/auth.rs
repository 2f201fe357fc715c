//! Client authentication strategies for token endpoint calls.

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::secret::{REDACTED, SecretString};

/// How client credentials reach the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthStrategy {
    /// `Authorization: Basic base64(client_id:client_secret)`; nothing in the body
    BasicHeader,
    /// `client_id` and `client_secret` as body parameters; no extra header
    BodyCredentials,
}

/// Headers and body parameters contributed by an [`AuthStrategy`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AuthFragment {
    pub headers: Vec<(String, String)>,
    pub body: Vec<(String, String)>,
}

impl std::fmt::Debug for AuthFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        let body_keys: Vec<&str> = self.body.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("AuthFragment")
            .field("headers", &header_names)
            .field("body", &body_keys)
            .field("values", &REDACTED)
            .finish()
    }
}

impl AuthStrategy {
    /// Produce the credential-bearing parts of a token request.
    pub fn build(self, client_id: &str, client_secret: &SecretString) -> AuthFragment {
        match self {
            AuthStrategy::BasicHeader => {
                let credentials = general_purpose::STANDARD
                    .encode(format!("{}:{}", client_id, client_secret.expose()));
                AuthFragment {
                    headers: vec![(
                        "Authorization".to_string(),
                        format!("Basic {}", credentials),
                    )],
                    body: Vec::new(),
                }
            }
            AuthStrategy::BodyCredentials => AuthFragment {
                headers: Vec::new(),
                body: vec![
                    ("client_id".to_string(), client_id.to_string()),
                    (
                        "client_secret".to_string(),
                        client_secret.expose().to_string(),
                    ),
                ],
            },
        }
    }
}
