//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use tokio::net::TcpListener;

use item_service::config::ServiceConfig;
use item_service::http::HttpServer;
use item_service::lifecycle::Shutdown;
use item_service::observability::{InMemoryExporter, SpanData, SpanProcessor, Tracer};

pub fn test_config(fault_injection: bool) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.service.name = "item-service-test".to_string();
    config.service.fault_injection = fault_injection;
    config.observability.metrics_enabled = false;
    config
}

fn test_tracer() -> (Tracer, InMemoryExporter) {
    let exporter = InMemoryExporter::default();
    let tracer = Tracer::new("item-service-test", SpanProcessor::simple(exporter.clone()));
    (tracer, exporter)
}

/// Router for in-process requests, plus the spans it exports.
pub fn router(fault_injection: bool) -> (Router, InMemoryExporter) {
    let (tracer, exporter) = test_tracer();
    let server = HttpServer::new(test_config(fault_injection), tracer);
    (server.router(), exporter)
}

/// A service listening on an ephemeral port.
pub struct RunningService {
    pub base_url: String,
    pub exporter: InMemoryExporter,
    shutdown: Shutdown,
}

impl Drop for RunningService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_service(fault_injection: bool) -> RunningService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (tracer, exporter) = test_tracer();
    let server = HttpServer::new(test_config(fault_injection), tracer);
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    RunningService {
        base_url: format!("http://{}", addr),
        exporter,
        shutdown,
    }
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The single exported span with the given name.
pub fn span_named(exporter: &InMemoryExporter, name: &str) -> SpanData {
    let spans: Vec<_> = exporter
        .finished_spans()
        .into_iter()
        .filter(|s| s.name == name)
        .collect();
    assert_eq!(spans.len(), 1, "expected one span named {name:?}");
    spans.into_iter().next().unwrap()
}
