//! Distributed trace context and spans.
//!
//! # Responsibilities
//! - Mint trace/span identifiers, or join a trace from a W3C `traceparent`
//! - Hold request-scoped span state (attributes, events, status)
//! - Hand finished spans to the span processor for export
//!
//! # Design Decisions
//! - OTLP-shaped data model without the OpenTelemetry SDK
//! - A missing context is replaced by a no-op span; every call on it is inert
//! - A caller that did not sample its trace gets a non-recording span that
//!   still propagates the trace identity
//! - Span state sits behind a mutex that is never held across an await

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::observability::export::SpanProcessor;

/// 128-bit trace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    pub const INVALID: TraceId = TraceId(0);

    /// Generate a random, non-zero trace id.
    pub fn random() -> Self {
        // v4 UUIDs always carry version bits, so the value is never zero.
        Self(uuid::Uuid::new_v4().as_u128())
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u128::from_str_radix(hex, 16).ok().filter(|v| *v != 0).map(Self)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 64-bit span identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    pub const INVALID: SpanId = SpanId(0);

    /// Generate a random, non-zero span id.
    pub fn random() -> Self {
        loop {
            let v: u64 = rand::random();
            if v != 0 {
                return Self(v);
            }
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().filter(|v| *v != 0).map(Self)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identifiers that correlate a span with its trace, logs and peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampled: bool,
}

impl SpanContext {
    /// Context of a span that belongs to no trace.
    pub const INVALID: SpanContext = SpanContext {
        trace_id: TraceId::INVALID,
        span_id: SpanId::INVALID,
        sampled: false,
    };

    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }

    /// Parse a W3C `traceparent` header (`00-<trace>-<span>-<flags>`).
    pub fn from_traceparent(header: &str) -> Option<Self> {
        let mut parts = header.trim().split('-');
        let version = parts.next()?;
        let trace_id = TraceId::from_hex(parts.next()?)?;
        let span_id = SpanId::from_hex(parts.next()?)?;
        let flags = parts.next()?;
        if version != "00" || flags.len() != 2 || parts.next().is_some() {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;
        Some(Self {
            trace_id,
            span_id,
            sampled: flags & 0x01 == 0x01,
        })
    }

    /// Render as a W3C `traceparent` header value.
    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            self.trace_id,
            self.span_id,
            u8::from(self.sampled)
        )
    }
}

/// Attribute value attached to spans and events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<u16> for AttributeValue {
    fn from(v: u16) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AttributeValue,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error { message: String },
}

impl SpanStatus {
    pub fn error(message: impl Into<String>) -> Self {
        SpanStatus::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error { .. })
    }
}

/// A timestamped annotation on a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
}

impl SpanEvent {
    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
    }
}

/// Everything recorded on a span; exported once the span ends.
#[derive(Debug, Clone, Serialize)]
pub struct SpanData {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub start_time_unix_nano: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time_unix_nano: Option<u64>,
    pub attributes: Vec<KeyValue>,
    pub events: Vec<SpanEvent>,
    pub status: SpanStatus,
}

impl SpanData {
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
    }
}

fn now_unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Operations the request path performs on the active span.
pub trait Span: Send + Sync {
    fn span_context(&self) -> SpanContext;

    /// False for spans whose calls are discarded.
    fn is_recording(&self) -> bool;

    fn set_attribute(&self, attribute: KeyValue);

    fn add_event(&self, name: &str, attributes: Vec<KeyValue>);

    /// Attach an `exception` event carrying `detail`.
    fn record_error(&self, detail: &str, attributes: Vec<KeyValue>) {
        let mut attrs = Vec::with_capacity(attributes.len() + 1);
        attrs.push(KeyValue::new("exception.message", detail));
        attrs.extend(attributes);
        self.add_event("exception", attrs);
    }

    /// Set the span status. `Unset` is ignored; anything else replaces the
    /// current status.
    fn set_status(&self, status: SpanStatus);

    /// Finish the span. Calls after the first are ignored.
    fn end(&self);
}

/// Span that discards everything.
#[derive(Debug, Default)]
pub struct NoopSpan;

impl Span for NoopSpan {
    fn span_context(&self) -> SpanContext {
        SpanContext::INVALID
    }

    fn is_recording(&self) -> bool {
        false
    }

    fn set_attribute(&self, _attribute: KeyValue) {}

    fn add_event(&self, _name: &str, _attributes: Vec<KeyValue>) {}

    fn set_status(&self, _status: SpanStatus) {}

    fn end(&self) {}
}

/// Span that carries a trace identity but records and exports nothing.
#[derive(Debug)]
pub struct NonRecordingSpan {
    context: SpanContext,
}

impl NonRecordingSpan {
    pub fn new(context: SpanContext) -> Self {
        Self { context }
    }
}

impl Span for NonRecordingSpan {
    fn span_context(&self) -> SpanContext {
        self.context
    }

    fn is_recording(&self) -> bool {
        false
    }

    fn set_attribute(&self, _attribute: KeyValue) {}

    fn add_event(&self, _name: &str, _attributes: Vec<KeyValue>) {}

    fn set_status(&self, _status: SpanStatus) {}

    fn end(&self) {}
}

/// Span that records into [`SpanData`] and exports it on `end`.
pub struct RecordingSpan {
    context: SpanContext,
    data: Mutex<SpanData>,
    ended: AtomicBool,
    processor: SpanProcessor,
}

impl RecordingSpan {
    fn lock(&self) -> MutexGuard<'_, SpanData> {
        // A panic while holding the lock cannot leave SpanData half-written
        // in a way that matters for export.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> SpanData {
        self.lock().clone()
    }
}

impl Span for RecordingSpan {
    fn span_context(&self) -> SpanContext {
        self.context
    }

    fn is_recording(&self) -> bool {
        !self.ended.load(Ordering::Acquire)
    }

    fn set_attribute(&self, attribute: KeyValue) {
        if !self.is_recording() {
            return;
        }
        let mut data = self.lock();
        match data.attributes.iter_mut().find(|kv| kv.key == attribute.key) {
            Some(existing) => existing.value = attribute.value,
            None => data.attributes.push(attribute),
        }
    }

    fn add_event(&self, name: &str, attributes: Vec<KeyValue>) {
        if !self.is_recording() {
            return;
        }
        self.lock().events.push(SpanEvent {
            name: name.to_string(),
            time_unix_nano: now_unix_nanos(),
            attributes,
        });
    }

    fn set_status(&self, status: SpanStatus) {
        if !self.is_recording() || status == SpanStatus::Unset {
            return;
        }
        self.lock().status = status;
    }

    fn end(&self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let finished = {
            let mut data = self.lock();
            data.end_time_unix_nano = Some(now_unix_nanos());
            data.clone()
        };
        self.processor.on_end(finished);
    }
}

/// Request-scoped handle to the active span.
#[derive(Clone)]
pub struct TraceContext {
    span: Arc<dyn Span>,
    recording: Option<Arc<RecordingSpan>>,
}

impl TraceContext {
    /// Context whose span ignores every call.
    pub fn noop() -> Self {
        Self {
            span: Arc::new(NoopSpan),
            recording: None,
        }
    }

    /// Wrap an externally provided span.
    pub fn from_span(span: Arc<dyn Span>) -> Self {
        Self {
            span,
            recording: None,
        }
    }

    fn from_recording(span: Arc<RecordingSpan>) -> Self {
        Self {
            span: span.clone(),
            recording: Some(span),
        }
    }

    /// The active span.
    pub fn span(&self) -> &dyn Span {
        self.span.as_ref()
    }

    pub fn span_context(&self) -> SpanContext {
        self.span.span_context()
    }

    pub fn trace_id(&self) -> TraceId {
        self.span_context().trace_id
    }

    pub fn span_id(&self) -> SpanId {
        self.span_context().span_id
    }

    /// Recorded state, when the span was started by a [`Tracer`].
    pub fn snapshot(&self) -> Option<SpanData> {
        self.recording.as_ref().map(|s| s.snapshot())
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("trace_id", &self.trace_id())
            .field("span_id", &self.span_id())
            .field("recording", &self.span.is_recording())
            .finish()
    }
}

/// Starts spans for one service.
#[derive(Clone)]
pub struct Tracer {
    service_name: Arc<str>,
    processor: SpanProcessor,
}

impl Tracer {
    pub fn new(service_name: &str, processor: SpanProcessor) -> Self {
        Self {
            service_name: Arc::from(service_name),
            processor,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Start a span, joining `parent`'s trace when it is valid.
    ///
    /// An unsampled parent yields a non-recording span in the same trace.
    pub fn start_span(&self, name: &str, parent: Option<SpanContext>) -> TraceContext {
        let parent = parent.filter(SpanContext::is_valid);
        let context = SpanContext {
            trace_id: parent.map(|p| p.trace_id).unwrap_or_else(TraceId::random),
            span_id: SpanId::random(),
            sampled: parent.map(|p| p.sampled).unwrap_or(true),
        };
        if !context.sampled {
            return TraceContext::from_span(Arc::new(NonRecordingSpan::new(context)));
        }
        let data = SpanData {
            trace_id: context.trace_id,
            span_id: context.span_id,
            parent_span_id: parent.map(|p| p.span_id),
            name: name.to_string(),
            start_time_unix_nano: now_unix_nanos(),
            end_time_unix_nano: None,
            attributes: vec![KeyValue::new("service.name", self.service_name.as_ref())],
            events: Vec::new(),
            status: SpanStatus::Unset,
        };
        TraceContext::from_recording(Arc::new(RecordingSpan {
            context,
            data: Mutex::new(data),
            ended: AtomicBool::new(false),
            processor: self.processor.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::export::InMemoryExporter;

    fn tracer() -> (Tracer, InMemoryExporter) {
        let exporter = InMemoryExporter::default();
        let tracer = Tracer::new("test", SpanProcessor::simple(exporter.clone()));
        (tracer, exporter)
    }

    #[test]
    fn test_traceparent_round_trip() {
        let header = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        let ctx = SpanContext::from_traceparent(header).unwrap();
        assert!(ctx.sampled);
        assert_eq!(ctx.trace_id.to_string(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(ctx.span_id.to_string(), "b7ad6b7169203331");
        assert_eq!(ctx.to_traceparent(), header);
    }

    #[test]
    fn test_traceparent_rejects_malformed() {
        for bad in [
            "",
            "garbage",
            "01-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            "00-00000000000000000000000000000000-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-0000000000000000-01",
            "00-0af7651916cd43dd8448eb211c8031-b7ad6b7169203331-01",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01-extra",
        ] {
            assert!(SpanContext::from_traceparent(bad).is_none(), "{bad:?}");
        }
    }

    #[test]
    fn test_start_span_joins_parent_trace() {
        let (tracer, _) = tracer();
        let parent = SpanContext::from_traceparent(
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
        );
        let ctx = tracer.start_span("child", parent);
        let data = ctx.snapshot().unwrap();
        assert_eq!(ctx.trace_id(), parent.unwrap().trace_id);
        assert_ne!(ctx.span_id(), parent.unwrap().span_id);
        assert_eq!(data.parent_span_id, Some(parent.unwrap().span_id));
    }

    #[test]
    fn test_unsampled_parent_yields_non_recording_span() {
        let (tracer, exporter) = tracer();
        let parent = SpanContext::from_traceparent(
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-00",
        );
        let ctx = tracer.start_span("child", parent);
        ctx.span().record_error("ignored", vec![]);
        ctx.span().end();

        assert!(!ctx.span().is_recording());
        assert!(ctx.snapshot().is_none());
        assert!(ctx.span_context().is_valid());
        assert_eq!(ctx.trace_id(), parent.unwrap().trace_id);
        assert!(ctx.span_context().to_traceparent().ends_with("-00"));
        assert!(exporter.finished_spans().is_empty());
    }

    #[test]
    fn test_start_span_without_parent_mints_trace() {
        let (tracer, _) = tracer();
        let a = tracer.start_span("a", None);
        let b = tracer.start_span("b", None);
        assert!(a.span_context().is_valid());
        assert_ne!(a.trace_id(), b.trace_id());
        assert!(a.snapshot().unwrap().parent_span_id.is_none());
    }

    #[test]
    fn test_end_exports_once_and_freezes_span() {
        let (tracer, exporter) = tracer();
        let ctx = tracer.start_span("op", None);
        ctx.span().add_event("before", vec![]);
        ctx.span().end();
        ctx.span().end();
        ctx.span().add_event("after", vec![]);

        let spans = exporter.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].events.len(), 1);
        assert!(spans[0].end_time_unix_nano.is_some());
        assert!(!ctx.span().is_recording());
    }

    #[test]
    fn test_unset_status_is_ignored() {
        let (tracer, _) = tracer();
        let ctx = tracer.start_span("op", None);
        ctx.span().set_status(SpanStatus::error("boom"));
        ctx.span().set_status(SpanStatus::Unset);
        assert!(ctx.snapshot().unwrap().status.is_error());
    }

    #[test]
    fn test_noop_context_is_inert() {
        let ctx = TraceContext::noop();
        ctx.span().record_error("ignored", vec![]);
        ctx.span().set_status(SpanStatus::error("ignored"));
        ctx.span().end();
        assert!(!ctx.span_context().is_valid());
        assert!(ctx.snapshot().is_none());
        assert_eq!(ctx.trace_id().to_string(), "0".repeat(32));
    }
}
