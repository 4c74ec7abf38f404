//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request produces:
//!     → trace.rs (request span, joined from `traceparent` when present)
//!     → annotate.rs (outcome → error events, span status)
//!     → logging.rs (one structured line with trace correlation)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → export.rs (finished spans, batched off the request path)
//!     → otlp.rs (OTLP/HTTP collector such as Tempo)
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - 4xx outcomes never mark a span failed; 5xx always do
//! - Span export never blocks request completion
//! - Metrics are cheap (atomic increments)

pub mod annotate;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod otlp;
pub mod trace;

pub use export::{InMemoryExporter, LoggingExporter, SpanExporter, SpanProcessor};
pub use otlp::OtlpExporter;
pub use trace::{SpanContext, SpanData, SpanStatus, TraceContext, Tracer};
