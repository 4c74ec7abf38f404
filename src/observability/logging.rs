//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Emit the one structured line written per request
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and overridden by `RUST_LOG`

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::trace::{SpanId, TraceId};

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "item_service={level},span_export={level},tower_http={level}",
            level = config.log_level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
}

/// Fields of the per-request log line.
#[derive(Debug, Clone)]
pub struct RequestLog<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub status: u16,
    pub outcome: &'static str,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub request_id: Option<&'a str>,
    pub latency_ms: f64,
    /// Error detail; absent on success.
    pub fault: Option<&'a str>,
}

/// Emit the request line: `error` for 5xx, `info` otherwise.
pub fn log_request(entry: &RequestLog<'_>) {
    if entry.status >= 500 {
        tracing::error!(
            method = entry.method,
            path = entry.path,
            status = entry.status,
            outcome = entry.outcome,
            trace_id = %entry.trace_id,
            span_id = %entry.span_id,
            request_id = entry.request_id,
            latency_ms = entry.latency_ms,
            fault = entry.fault,
            "request failed"
        );
    } else {
        tracing::info!(
            method = entry.method,
            path = entry.path,
            status = entry.status,
            outcome = entry.outcome,
            trace_id = %entry.trace_id,
            span_id = %entry.span_id,
            request_id = entry.request_id,
            latency_ms = entry.latency_ms,
            fault = entry.fault,
            "request"
        );
    }
}
