//! Classified result of one pipeline invocation.

use axum::http::StatusCode;

use crate::api::{ApiError, HttpStatus, Severity};
use crate::pipeline::fault::EscapedFault;

/// Coarse outcome class used by logs, metrics and span annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    ClientFault,
    ServerFault,
    UnrecoveredFault,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::ClientFault => "client_fault",
            OutcomeKind::ServerFault => "server_fault",
            OutcomeKind::UnrecoveredFault => "unrecovered_fault",
        }
    }

    /// Whether the service itself is at fault.
    pub fn marks_span_failed(&self) -> bool {
        matches!(self, OutcomeKind::ServerFault | OutcomeKind::UnrecoveredFault)
    }
}

/// What an operation produced, tagged by severity.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    ClientFault(ApiError),
    ServerFault(ApiError),
    UnrecoveredFault(EscapedFault),
}

impl<T> Outcome<T> {
    /// Classify the result of an isolated operation.
    pub fn classify(result: Result<Result<T, ApiError>, EscapedFault>) -> Self {
        match result {
            Ok(Ok(value)) => Outcome::Success(value),
            Ok(Err(err)) => match err.severity() {
                Severity::Client => Outcome::ClientFault(err),
                Severity::Server => Outcome::ServerFault(err),
            },
            Err(fault) => Outcome::UnrecoveredFault(fault),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::ClientFault(_) => OutcomeKind::ClientFault,
            Outcome::ServerFault(_) => OutcomeKind::ServerFault,
            Outcome::UnrecoveredFault(_) => OutcomeKind::UnrecoveredFault,
        }
    }

    /// Human-readable error detail; `None` on success.
    pub fn detail(&self) -> Option<String> {
        match self {
            Outcome::Success(_) => None,
            Outcome::ClientFault(err) | Outcome::ServerFault(err) => Some(err.to_string()),
            Outcome::UnrecoveredFault(fault) => Some(fault.to_string()),
        }
    }
}

impl<T: HttpStatus> HttpStatus for Outcome<T> {
    fn http_status(&self) -> StatusCode {
        match self {
            Outcome::Success(value) => value.http_status(),
            Outcome::ClientFault(err) | Outcome::ServerFault(err) => err.status(),
            Outcome::UnrecoveredFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
