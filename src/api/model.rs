//! Transport-neutral request and reply shapes.

use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::api::error::ApiError;
use crate::store::Resource;

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    List,
    Get,
    Update,
    Delete,
    InjectFault(FaultKind),
}

impl Operation {
    /// Label used in span names, logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::InjectFault(FaultKind::Explicit) => "fault",
            Operation::InjectFault(FaultKind::Panic) => "panic",
        }
    }
}

/// Deliberately triggered failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Returned as a handled internal error.
    Explicit,
    /// Raised as a panic inside the operation.
    Panic,
}

/// A request as delivered by the transport: raw, unvalidated parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub operation: Operation,
    pub raw_id: Option<String>,
    pub raw_body: Option<String>,
}

impl ApiRequest {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            raw_id: None,
            raw_body: None,
        }
    }

    pub fn with_id(mut self, raw_id: impl Into<String>) -> Self {
        self.raw_id = Some(raw_id.into());
        self
    }

    pub fn with_body(mut self, raw_body: impl Into<String>) -> Self {
        self.raw_body = Some(raw_body.into());
        self
    }
}

/// Body accepted by create and update.
///
/// Decoding is lenient: the `name` key matches case-insensitively, other
/// keys are ignored, and a missing or `null` name reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPayload {
    pub name: String,
}

/// Successful results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Created(Resource),
    Found(Resource),
    Listed(Vec<Resource>),
    Updated(Resource),
    Deleted,
}

/// Anything that maps onto an HTTP status.
pub trait HttpStatus {
    fn http_status(&self) -> StatusCode;
}

impl HttpStatus for Reply {
    fn http_status(&self) -> StatusCode {
        match self {
            Reply::Created(_) => StatusCode::CREATED,
            Reply::Found(_) | Reply::Listed(_) | Reply::Updated(_) => StatusCode::OK,
            Reply::Deleted => StatusCode::NO_CONTENT,
        }
    }
}

/// Parse a path identifier. Ids are positive decimal integers.
pub fn parse_id(raw: Option<&str>) -> Result<u64, ApiError> {
    let raw = raw.unwrap_or_default();
    match raw.parse::<u64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::InvalidId(raw.to_string())),
    }
}

/// Decode a create/update body. The body must be a JSON object or `null`.
pub fn parse_payload(raw: Option<&str>) -> Result<ItemPayload, ApiError> {
    let raw = raw.unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(ApiError::InvalidBody("empty body".to_string()));
    }
    let fields: Option<Map<String, Value>> =
        serde_json::from_str(raw).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    // An exact key wins over a case-insensitive one.
    let name = fields.as_ref().and_then(|fields| {
        fields.get("name").or_else(|| {
            fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("name"))
                .map(|(_, value)| value)
        })
    });
    match name {
        None | Some(Value::Null) => Ok(ItemPayload::default()),
        Some(Value::String(name)) => Ok(ItemPayload { name: name.clone() }),
        Some(_) => Err(ApiError::InvalidBody("name must be a string".to_string())),
    }
}
