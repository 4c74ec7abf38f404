//! Span annotation from request outcomes.
//!
//! Caller mistakes (4xx) become error events only. A span is marked failed
//! only when the service itself failed: an explicit server fault or a panic
//! that escaped the operation.

use crate::api::HttpStatus;
use crate::observability::trace::{KeyValue, SpanStatus, TraceContext};
use crate::pipeline::Outcome;

/// Record `outcome` on the span held by `ctx`. Inert on a no-op context.
pub fn record<T: HttpStatus>(ctx: &TraceContext, outcome: &Outcome<T>) {
    let span = ctx.span();
    if !span.is_recording() {
        return;
    }

    let status = outcome.http_status();
    span.set_attribute(KeyValue::new("http.status_code", status.as_u16()));

    let status_text = status.canonical_reason().unwrap_or("Unknown");
    match outcome {
        Outcome::Success(_) => {}
        Outcome::ClientFault(err) | Outcome::ServerFault(err) => {
            let message = err.to_string();
            span.record_error(
                &message,
                vec![
                    KeyValue::new("error.severity", err.severity().as_str()),
                    KeyValue::new("http.status_text", status_text),
                ],
            );
            if outcome.kind().marks_span_failed() {
                span.set_status(SpanStatus::error(message));
            }
        }
        Outcome::UnrecoveredFault(fault) => {
            span.record_error(
                &fault.message,
                vec![
                    KeyValue::new("error.severity", "server"),
                    KeyValue::new("http.status_text", status_text),
                    KeyValue::new("exception.escaped", true),
                    KeyValue::new("exception.type", fault.type_name.as_str()),
                    KeyValue::new("exception.stacktrace", fault.stacktrace.as_str()),
                ],
            );
            span.set_attribute(KeyValue::new("exception.escaped", true));
            span.set_status(SpanStatus::error(fault.to_string()));
        }
    }
}
