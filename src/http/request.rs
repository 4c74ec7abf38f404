//! Per-request trace scope extraction.
//!
//! # Responsibilities
//! - Join the caller's trace from a W3C `traceparent` header, or start one
//! - Capture method, route template and request id for the log line
//! - Hand the raw `{id}` segment to the pipeline, even when it is undecodable
//!
//! # Design Decisions
//! - A malformed `traceparent` starts a fresh trace instead of rejecting
//! - The route template (`/items/{id}`) is logged, not the raw path

use axum::extract::{FromRef, FromRequestParts, MatchedPath, Path};
use axum::http::request::Parts;
use axum::http::HeaderName;
use std::convert::Infallible;

use crate::observability::trace::{KeyValue, SpanContext, TraceContext, Tracer};
use crate::pipeline::RequestMeta;

pub const TRACEPARENT: HeaderName = HeaderName::from_static("traceparent");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Trace context and log metadata bound to one request.
#[derive(Debug)]
pub struct RequestScope {
    pub ctx: TraceContext,
    pub meta: RequestMeta,
}

impl<S> FromRequestParts<S> for RequestScope
where
    Tracer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tracer = Tracer::from_ref(state);

        let path = parts
            .extensions
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let method = parts.method.to_string();
        let request_id = header_str(parts, &X_REQUEST_ID).map(str::to_string);

        let parent = header_str(parts, &TRACEPARENT).and_then(SpanContext::from_traceparent);
        let ctx = tracer.start_span(&format!("{} {}", method, path), parent);
        let span = ctx.span();
        span.set_attribute(KeyValue::new("http.request.method", method.as_str()));
        span.set_attribute(KeyValue::new("http.route", path.as_str()));
        if let Some(id) = &request_id {
            span.set_attribute(KeyValue::new("http.request_id", id.as_str()));
        }

        Ok(Self {
            ctx,
            meta: RequestMeta {
                method,
                path,
                request_id,
            },
        })
    }
}

/// The `{id}` path segment, unvalidated.
///
/// A segment that does not percent-decode to UTF-8 is passed on in its
/// encoded form so the pipeline rejects it like any other bad id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemId(pub String);

impl<S> FromRequestParts<S> for ItemId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<String>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Self(id)),
            Err(rejection) => {
                let raw = parts.uri.path().rsplit('/').next().unwrap_or_default();
                tracing::debug!(error = %rejection, raw_id = raw, "undecodable id segment");
                Ok(Self(raw.to_string()))
            }
        }
    }
}

fn header_str<'a>(parts: &'a Parts, name: &HeaderName) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::export::{InMemoryExporter, SpanProcessor};
    use crate::observability::trace::AttributeValue;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> RequestScope {
        let tracer = Tracer::new("test", SpanProcessor::simple(InMemoryExporter::default()));
        let (mut parts, _) = request.into_parts();
        RequestScope::from_request_parts(&mut parts, &tracer).await.unwrap()
    }

    #[tokio::test]
    async fn test_joins_incoming_trace() {
        let scope = extract(
            Request::builder()
                .method("GET")
                .uri("/items/4")
                .header("traceparent", "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01")
                .header("x-request-id", "req-1")
                .body(())
                .unwrap(),
        )
        .await;

        assert_eq!(scope.ctx.trace_id().to_string(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(scope.meta.method, "GET");
        assert_eq!(scope.meta.path, "/items/4");
        assert_eq!(scope.meta.request_id.as_deref(), Some("req-1"));
        let data = scope.ctx.snapshot().unwrap();
        assert_eq!(
            data.attribute("http.request.method"),
            Some(&AttributeValue::String("GET".into()))
        );
    }

    #[tokio::test]
    async fn test_undecodable_id_kept_encoded() {
        let (mut parts, _) = Request::builder()
            .uri("/items/%FF")
            .body(())
            .unwrap()
            .into_parts();
        let id = ItemId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, ItemId("%FF".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_traceparent_starts_new_trace() {
        let scope = extract(
            Request::builder()
                .uri("/items")
                .header("traceparent", "not-a-trace")
                .body(())
                .unwrap(),
        )
        .await;
        assert!(scope.ctx.span_context().is_valid());
        assert!(scope.ctx.snapshot().unwrap().parent_span_id.is_none());
    }
}
