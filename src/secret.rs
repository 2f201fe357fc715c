//! Secret string handling
//!
//! Client secrets, authorization codes and tokens travel through the engine
//! wrapped in [`SecretString`] so they are zeroized on drop and never appear in
//! `Debug` output or log lines.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder printed wherever a secret would otherwise appear.
pub const REDACTED: &str = "[REDACTED]";

/// String wrapper whose contents are wiped on drop and hidden from formatting.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret. Callers must not log the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretString)
    }
}

// Serializing always redacts; secrets leave the process only through the transport.
impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Replace every occurrence of the given secrets inside `text` with [`REDACTED`].
///
/// Both the raw value and its JSON string escaping are matched, since `text`
/// is often a serialized JSON body. Empty secrets are skipped so they cannot
/// blank out the whole string.
pub fn redact_secrets<'a, I>(text: &str, secrets: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut redacted = text.to_string();
    for secret in secrets {
        if secret.trim().is_empty() {
            continue;
        }
        if let Some(escaped) = json_escaped(secret) {
            redacted = redacted.replace(&escaped, REDACTED);
        }
        redacted = redacted.replace(secret, REDACTED);
    }
    redacted
}

/// `secret` as it appears inside a JSON string literal, when that differs from the raw value.
fn json_escaped(secret: &str) -> Option<String> {
    let quoted = serde_json::to_string(secret).ok()?;
    let escaped = quoted.strip_prefix('"')?.strip_suffix('"')?;
    (escaped != secret).then(|| escaped.to_string())
}

/// Truncate a body snippet to `max_chars` characters, appending `...` when cut.
pub fn truncate_snippet(body: &str, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        let truncated: String = body.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}
