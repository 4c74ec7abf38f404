//! Item service library: an in-memory resource store served over HTTP with
//! per-request trace spans and panic isolation.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod store;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::RequestPipeline;
pub use store::ResourceStore;
