//! Item API: request shapes, error classification and dispatch.
//!
//! # Data Flow
//! ```text
//! ApiRequest (raw id, raw body)
//!     → model.rs (parse id / payload, ClientFault on bad input)
//!     → dispatch.rs (store operation)
//!     → Result<Reply, ApiError>
//! ```

pub mod dispatch;
pub mod error;
pub mod model;

pub use dispatch::execute;
pub use error::{ApiError, ErrorBody, Severity};
pub use model::{ApiRequest, FaultKind, HttpStatus, ItemPayload, Operation, Reply};
