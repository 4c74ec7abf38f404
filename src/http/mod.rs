//! HTTP transport.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, body limit)
//!     → request.rs (trace scope: join or start span, log metadata)
//!     → pipeline (operation, annotation, logging)
//!     → response.rs (JSON body, traceparent header)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ItemId, RequestScope, TRACEPARENT, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
