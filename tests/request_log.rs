//! The structured line written for every request.

use axum::http::StatusCode;
use serde_json::Value;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

mod common;
use common::{empty_request, json_request, span_named};

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Captured {
    /// Request lines, in order, as JSON objects.
    fn request_lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .filter(|line| {
                matches!(
                    line["fields"]["message"].as_str(),
                    Some("request") | Some("request failed")
                )
            })
            .collect()
    }
}

// Single-threaded runtime: the thread-local subscriber sees every event
// because the router is driven inline on the test thread.
#[tokio::test(flavor = "current_thread")]
async fn test_one_line_per_request_with_trace_correlation() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (app, exporter) = common::router(true);

    let res = app
        .clone()
        .oneshot(json_request("POST", "/items", r#"{"name":"logged"}"#))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app.clone().oneshot(empty_request("GET", "/items/abc")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.oneshot(empty_request("POST", "/debug/panic")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let lines = captured.request_lines();
    assert_eq!(lines.len(), 3, "{lines:#?}");

    let expected = [
        ("POST /items", "POST", "/items", 201, "INFO"),
        ("GET /items/{id}", "GET", "/items/{id}", 400, "INFO"),
        ("POST /debug/panic", "POST", "/debug/panic", 500, "ERROR"),
    ];
    for (line, (span_name, method, path, status, level)) in lines.iter().zip(expected) {
        let span = span_named(&exporter, span_name);
        let fields = &line["fields"];
        assert_eq!(line["level"], level);
        assert_eq!(fields["method"], method);
        assert_eq!(fields["path"], path);
        assert_eq!(fields["status"], status);
        assert_eq!(fields["trace_id"], span.trace_id.to_string());
        assert_eq!(fields["span_id"], span.span_id.to_string());
    }

    assert!(lines[0]["fields"].get("fault").is_none());
    assert_eq!(lines[1]["fields"]["fault"], "invalid id: abc");
    assert!(lines[2]["fields"]["fault"]
        .as_str()
        .unwrap()
        .contains("injected panic"));
}
