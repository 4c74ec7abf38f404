//! OTLP/HTTP span export.
//!
//! # Responsibilities
//! - Encode finished spans as an OTLP `ExportTraceServiceRequest` (JSON)
//! - POST each batch to a collector such as Tempo (`/v1/traces`)
//!
//! # Design Decisions
//! - Failed exports are logged and dropped, never retried
//! - A bare `host:port` endpoint gets `http://` and the default traces path

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::time::Duration;

use crate::observability::export::SpanExporter;
use crate::observability::trace::{AttributeValue, KeyValue, SpanData, SpanEvent, SpanStatus};

/// Environment variable that overrides `observability.otlp_endpoint`.
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const TRACES_PATH: &str = "/v1/traces";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);
const SPAN_KIND_SERVER: u8 = 2;

/// Sends spans to an OTLP/HTTP collector.
pub struct OtlpExporter {
    client: reqwest::Client,
    endpoint: String,
    service_name: String,
}

impl OtlpExporter {
    pub fn new(endpoint: &str, service_name: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(EXPORT_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: traces_url(endpoint),
            service_name: service_name.to_string(),
        })
    }

    /// Full URL batches are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SpanExporter for OtlpExporter {
    fn export(&self, batch: Vec<SpanData>) -> BoxFuture<'static, ()> {
        let count = batch.len();
        let request = self
            .client
            .post(&self.endpoint)
            .json(&encode(&self.service_name, &batch));

        async move {
            match request.send().await.and_then(reqwest::Response::error_for_status) {
                Ok(_) => tracing::debug!(target: "span_export", spans = count, "spans exported"),
                Err(e) => tracing::warn!(
                    target: "span_export",
                    error = %e,
                    spans = count,
                    "OTLP export failed, dropping spans"
                ),
            }
        }
        .boxed()
    }
}

/// Resolve a configured endpoint to the traces URL.
pub fn traces_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let url = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    let has_path = url
        .split_once("://")
        .map(|(_, rest)| rest.contains('/'))
        .unwrap_or(false);
    if has_path {
        url
    } else {
        format!("{}{}", url, TRACES_PATH)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportTraceRequest {
    resource_spans: Vec<ResourceSpans>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSpans {
    resource: Resource,
    scope_spans: Vec<ScopeSpans>,
}

#[derive(Serialize)]
struct Resource {
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Serialize)]
struct ScopeSpans {
    scope: Scope,
    spans: Vec<OtlpSpan>,
}

#[derive(Serialize)]
struct Scope {
    name: &'static str,
    version: &'static str,
}

// 64-bit integers travel as strings in OTLP JSON.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpSpan {
    trace_id: String,
    span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_span_id: Option<String>,
    name: String,
    kind: u8,
    start_time_unix_nano: String,
    end_time_unix_nano: String,
    attributes: Vec<OtlpKeyValue>,
    events: Vec<OtlpEvent>,
    status: OtlpStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtlpEvent {
    time_unix_nano: String,
    name: String,
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Serialize)]
struct OtlpStatus {
    code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Serialize)]
struct OtlpKeyValue {
    key: String,
    value: AnyValue,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum AnyValue {
    StringValue(String),
    BoolValue(bool),
    IntValue(String),
}

fn encode(service_name: &str, batch: &[SpanData]) -> ExportTraceRequest {
    ExportTraceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Resource {
                attributes: vec![OtlpKeyValue {
                    key: "service.name".to_string(),
                    value: AnyValue::StringValue(service_name.to_string()),
                }],
            },
            scope_spans: vec![ScopeSpans {
                scope: Scope {
                    name: env!("CARGO_PKG_NAME"),
                    version: env!("CARGO_PKG_VERSION"),
                },
                spans: batch.iter().map(encode_span).collect(),
            }],
        }],
    }
}

fn encode_span(span: &SpanData) -> OtlpSpan {
    OtlpSpan {
        trace_id: span.trace_id.to_string(),
        span_id: span.span_id.to_string(),
        parent_span_id: span.parent_span_id.map(|id| id.to_string()),
        name: span.name.clone(),
        kind: SPAN_KIND_SERVER,
        start_time_unix_nano: span.start_time_unix_nano.to_string(),
        end_time_unix_nano: span
            .end_time_unix_nano
            .unwrap_or(span.start_time_unix_nano)
            .to_string(),
        attributes: encode_attributes(&span.attributes),
        events: span.events.iter().map(encode_event).collect(),
        status: encode_status(&span.status),
    }
}

fn encode_event(event: &SpanEvent) -> OtlpEvent {
    OtlpEvent {
        time_unix_nano: event.time_unix_nano.to_string(),
        name: event.name.clone(),
        attributes: encode_attributes(&event.attributes),
    }
}

fn encode_status(status: &SpanStatus) -> OtlpStatus {
    match status {
        SpanStatus::Unset => OtlpStatus { code: 0, message: None },
        SpanStatus::Ok => OtlpStatus { code: 1, message: None },
        SpanStatus::Error { message } => OtlpStatus {
            code: 2,
            message: Some(message.clone()),
        },
    }
}

fn encode_attributes(attributes: &[KeyValue]) -> Vec<OtlpKeyValue> {
    attributes
        .iter()
        .map(|kv| OtlpKeyValue {
            key: kv.key.clone(),
            value: match &kv.value {
                AttributeValue::Bool(v) => AnyValue::BoolValue(*v),
                AttributeValue::Int(v) => AnyValue::IntValue(v.to_string()),
                AttributeValue::String(v) => AnyValue::StringValue(v.clone()),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::export::{InMemoryExporter, SpanProcessor};
    use crate::observability::trace::{SpanContext, Tracer};
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// A collector on an ephemeral port that forwards every request body.
    async fn collector() -> (String, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/v1/traces",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    StatusCode::OK
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr.to_string(), rx)
    }

    fn failed_span() -> SpanData {
        let recorded = InMemoryExporter::default();
        let tracer = Tracer::new("unused", SpanProcessor::simple(recorded.clone()));
        let parent = SpanContext::from_traceparent(
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
        );
        let ctx = tracer.start_span("POST /debug/fault", parent);
        ctx.span().set_attribute(KeyValue::new("http.status_code", 500u16));
        ctx.span().record_error("internal error", vec![KeyValue::new("error.severity", "server")]);
        ctx.span().set_status(SpanStatus::error("internal error"));
        ctx.span().end();
        recorded.finished_spans().remove(0)
    }

    #[test]
    fn test_traces_url() {
        assert_eq!(traces_url("tempo:4318"), "http://tempo:4318/v1/traces");
        assert_eq!(traces_url("http://tempo:4318/"), "http://tempo:4318/v1/traces");
        assert_eq!(
            traces_url("https://collector.local/custom/traces"),
            "https://collector.local/custom/traces"
        );
    }

    #[tokio::test]
    async fn test_posts_otlp_json_to_collector() {
        let (addr, mut rx) = collector().await;
        let exporter = OtlpExporter::new(&addr, "item-service").unwrap();

        exporter.export(vec![failed_span()]).await;

        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let resource_spans = &body["resourceSpans"][0];
        assert_eq!(
            resource_spans["resource"]["attributes"][0]["value"]["stringValue"],
            "item-service"
        );
        let span = &resource_spans["scopeSpans"][0]["spans"][0];
        assert_eq!(span["traceId"], "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(span["parentSpanId"], "b7ad6b7169203331");
        assert_eq!(span["name"], "POST /debug/fault");
        assert_eq!(span["kind"], 2);
        assert_eq!(span["status"]["code"], 2);
        assert_eq!(span["status"]["message"], "internal error");
        assert_eq!(span["events"][0]["name"], "exception");

        let status = span["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|kv| kv["key"] == "http.status_code")
            .unwrap();
        assert_eq!(status["value"]["intValue"], "500");
    }

    #[tokio::test]
    async fn test_unreachable_collector_drops_batch() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let exporter = OtlpExporter::new(&addr.to_string(), "item-service").unwrap();
        tokio::time::timeout(Duration::from_secs(15), exporter.export(vec![failed_span()]))
            .await
            .unwrap();
    }
}
