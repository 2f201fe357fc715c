//! Result normalization
//!
//! Turns a provider's raw 2xx token response into an [`OAuthResult`], using the
//! adapter's response-field mapping, refresh-token policy and metadata
//! extractor. Anything that cannot be coerced is a `MalformedResponse`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::ExchangeError;
use crate::models::{OAuthResult, RequestContext};
use crate::providers::{ProviderAdapter, RefreshTokenPolicy};

/// Normalize a successful token endpoint body.
pub fn normalize(
    adapter: &ProviderAdapter,
    raw: &Value,
    context: &RequestContext,
    issued_at: DateTime<Utc>,
) -> Result<OAuthResult, ExchangeError> {
    let provider = adapter.id.as_str();
    let Some(body) = raw.as_object() else {
        return Err(ExchangeError::malformed(
            provider,
            format!("expected a JSON object, got {}", value_kind(raw)),
        ));
    };

    let fields = &adapter.response_fields;

    let access_token = required_string(body, fields.access_token)
        .ok_or_else(|| missing(provider, fields.access_token))?;
    let token_type = required_string(body, fields.token_type)
        .ok_or_else(|| missing(provider, fields.token_type))?;

    let expires_in = match body.get(fields.expires_in) {
        None | Some(Value::Null) => return Err(missing(provider, fields.expires_in)),
        Some(value) => coerce_expires_in(value).ok_or_else(|| {
            ExchangeError::malformed(
                provider,
                format!(
                    "field '{}' is not a non-negative integer (got {})",
                    fields.expires_in,
                    value_kind(value)
                ),
            )
        })?,
    };

    let refresh_token = required_string(body, fields.refresh_token);
    if refresh_token.is_none() && adapter.refresh_token_policy == RefreshTokenPolicy::Rotating {
        return Err(missing(provider, fields.refresh_token));
    }

    Ok(OAuthResult {
        access_token,
        refresh_token,
        token_type,
        expires_in,
        metadata: adapter.extract_metadata(body, context),
        issued_at,
    })
}

/// Accepts `3600`, `3600.0` and `"3600"`; rejects negatives, fractions and anything else.
pub fn coerce_expires_in(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                return Some(n);
            }
            let float = number.as_f64()?;
            // u64::MAX as f64 rounds up, so use a strict bound.
            if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float < u64::MAX as f64
            {
                Some(float as u64)
            } else {
                None
            }
        }
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn required_string(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn missing(provider: &str, field: &str) -> ExchangeError {
    ExchangeError::malformed(
        provider,
        format!("response is missing required field '{}'", field),
    )
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
