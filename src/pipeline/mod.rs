//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Idle
//!   → Running     operation dispatched with the request's trace context
//!   → Completed   returned normally (success, client or server fault)
//!   → Recovering  panic unwound into fault::isolate
//!       → Failed  500 written, span marked failed with escape metadata
//!
//! Completed / Failed:
//!     → annotate::record (span events and status)
//!     → metrics, one structured log line
//!     → span ended, exactly one response returned
//! ```
//!
//! # Design Decisions
//! - Panics are caught at this one boundary, never inside business logic
//! - The store is injected; the pipeline holds no global state
//! - Callers never see panic messages or payload types, only the sinks do

pub mod fault;
pub mod outcome;

use axum::http::StatusCode;
use serde::Serialize;
use std::time::Instant;

use crate::api::{self, ApiRequest, ErrorBody, HttpStatus, Reply};
use crate::observability::logging::{self, RequestLog};
use crate::observability::trace::{SpanContext, TraceContext};
use crate::observability::{annotate, metrics};
use crate::store::{Resource, ResourceStore};

pub use fault::EscapedFault;
pub use outcome::{Outcome, OutcomeKind};

const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Terminal state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The operation returned, successfully or with a handled error.
    Completed,
    /// A panic was intercepted and turned into a 500.
    Failed,
}

/// Transport details carried into logs.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

/// JSON body of a response.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Resource(Resource),
    Resources(Vec<Resource>),
    Error(ErrorBody),
}

/// What the transport writes back.
#[derive(Debug)]
pub struct PipelineResponse {
    pub status: StatusCode,
    pub body: Option<ResponseBody>,
    pub outcome: OutcomeKind,
    pub terminal: Terminal,
    pub trace: SpanContext,
}

/// Runs operations against the store with tracing and fault isolation.
#[derive(Clone)]
pub struct RequestPipeline {
    store: ResourceStore,
}

impl RequestPipeline {
    pub fn new(store: ResourceStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Handle one request end to end. Never panics on operation failure.
    ///
    /// Ends the span held by `ctx`.
    pub async fn handle(
        &self,
        ctx: &TraceContext,
        meta: &RequestMeta,
        request: ApiRequest,
    ) -> PipelineResponse {
        let started = Instant::now();
        let operation = request.operation.name();

        let store = self.store.clone();
        let result = fault::isolate(async move { api::execute(&store, &request) }).await;
        let outcome = Outcome::classify(result);

        let status = outcome.http_status();
        let kind = outcome.kind();
        let terminal = match kind {
            OutcomeKind::UnrecoveredFault => Terminal::Failed,
            _ => Terminal::Completed,
        };

        annotate::record(ctx, &outcome);
        metrics::record_request(operation, status.as_u16(), kind.as_str(), started);
        metrics::record_store_size(self.store.len());
        if terminal == Terminal::Failed {
            metrics::record_unrecovered_fault(operation);
        }

        let detail = outcome.detail();
        logging::log_request(&RequestLog {
            method: &meta.method,
            path: &meta.path,
            status: status.as_u16(),
            outcome: kind.as_str(),
            trace_id: ctx.trace_id(),
            span_id: ctx.span_id(),
            request_id: meta.request_id.as_deref(),
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            fault: detail.as_deref(),
        });
        ctx.span().end();

        PipelineResponse {
            status,
            body: response_body(outcome),
            outcome: kind,
            terminal,
            trace: ctx.span_context(),
        }
    }
}

fn response_body(outcome: Outcome<Reply>) -> Option<ResponseBody> {
    match outcome {
        Outcome::Success(Reply::Created(r) | Reply::Found(r) | Reply::Updated(r)) => {
            Some(ResponseBody::Resource(r))
        }
        Outcome::Success(Reply::Listed(items)) => Some(ResponseBody::Resources(items)),
        Outcome::Success(Reply::Deleted) => None,
        Outcome::ClientFault(err) | Outcome::ServerFault(err) => {
            Some(ResponseBody::Error(ErrorBody::new(err.to_string())))
        }
        Outcome::UnrecoveredFault(_) => {
            Some(ResponseBody::Error(ErrorBody::new(INTERNAL_ERROR_MESSAGE)))
        }
    }
}
