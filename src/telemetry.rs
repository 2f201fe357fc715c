//! Tracing setup and per-request trace ids.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing::Instrument;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Request header carrying the trace id; echoed on every response.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Trace id of the request being served.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

task_local! {
    static REQUEST_TRACE: TraceContext;
}

#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryInitError(#[from] TryInitError);

static SUBSCRIBER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Calls after the first successful one are no-ops.
///
/// `RUST_LOG` wins over `log_level` when set. reqwest and hyper emit through
/// `log`, so those records are bridged into tracing as well.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if SUBSCRIBER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let bridged = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let output = if config.log_format == "pretty" {
        fmt::layer().pretty().boxed()
    } else {
        fmt::layer().json().flatten_event(true).boxed()
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
    {
        SUBSCRIBER_INSTALLED.store(false, Ordering::SeqCst);
        return Err(err.into());
    }

    if let Err(err) = bridged {
        tracing::warn!(error = %err, "log records are not bridged into tracing");
    }

    Ok(())
}

/// Run `future` with `context` visible to [`current_trace_id`].
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    REQUEST_TRACE.scope(context, future).await
}

/// Trace id of the current request task, if any.
pub fn current_trace_id() -> Option<String> {
    REQUEST_TRACE.try_with(|ctx| ctx.trace_id.clone()).ok()
}

/// Middleware assigning every request a trace ID.
///
/// An incoming `X-Trace-Id` header is reused when present; otherwise a UUID is
/// generated. The ID is stored in request extensions, exposed through
/// [`current_trace_id`] and echoed on the response.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let context = TraceContext {
        trace_id: trace_id.clone(),
    };
    request.extensions_mut().insert(context.clone());

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = with_trace_context(context, next.run(request).instrument(span)).await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trace_id_visible_inside_scope_only() {
        assert_eq!(current_trace_id(), None);

        let observed = with_trace_context(
            TraceContext {
                trace_id: "trace-abc".to_string(),
            },
            async { current_trace_id() },
        )
        .await;

        assert_eq!(observed.as_deref(), Some("trace-abc"));
        assert_eq!(current_trace_id(), None);
    }

    #[test]
    fn init_tracing_installs_once() {
        let config = AppConfig {
            log_format: "pretty".to_string(),
            ..Default::default()
        };
        assert!(init_tracing(&config).is_ok());
        assert!(SUBSCRIBER_INSTALLED.load(Ordering::SeqCst));
        assert!(init_tracing(&config).is_ok());
    }
}
