//! Response writing.
//!
//! # Responsibilities
//! - Serialize pipeline results as JSON (`{"error": ...}` on failure)
//! - Echo the request span as a `traceparent` response header
//!
//! # Design Decisions
//! - 204 responses carry no body
//! - No-op trace contexts produce no `traceparent` header

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::http::request::TRACEPARENT;
use crate::pipeline::PipelineResponse;

impl IntoResponse for PipelineResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        if self.trace.is_valid() {
            if let Ok(value) = HeaderValue::from_str(&self.trace.to_traceparent()) {
                response.headers_mut().insert(TRACEPARENT, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorBody;
    use crate::observability::trace::SpanContext;
    use crate::pipeline::{OutcomeKind, ResponseBody, Terminal};
    use axum::http::StatusCode;

    #[test]
    fn test_error_response_has_traceparent() {
        let trace = SpanContext::from_traceparent(
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
        )
        .unwrap();
        let response = PipelineResponse {
            status: StatusCode::NOT_FOUND,
            body: Some(ResponseBody::Error(ErrorBody::new("not found"))),
            outcome: OutcomeKind::ClientFault,
            terminal: Terminal::Completed,
            trace,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("traceparent").unwrap(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
        );
    }

    #[test]
    fn test_noop_trace_has_no_header() {
        let response = PipelineResponse {
            status: StatusCode::NO_CONTENT,
            body: None,
            outcome: OutcomeKind::Success,
            terminal: Terminal::Completed,
            trace: SpanContext::INVALID,
        }
        .into_response();
        assert!(response.headers().get("traceparent").is_none());
    }
}
