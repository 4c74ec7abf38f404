//! Error taxonomy and severity classification.

use axum::http::StatusCode;
use serde::Serialize;

use crate::store::StoreError;

/// Who caused a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Invalid caller input. Never marks the span failed.
    Client,
    /// The service failed to do its job.
    Server,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Client => "client",
            Severity::Server => "server",
        }
    }
}

/// Handled errors an operation can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("not found")]
    NotFound(u64),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn severity(&self) -> Severity {
        match self {
            ApiError::InvalidId(_) | ApiError::InvalidBody(_) | ApiError::NotFound(_) => {
                Severity::Client
            }
            ApiError::Internal(_) => Severity::Server,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidId(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(id),
        }
    }
}

/// Body written for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
