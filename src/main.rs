//! Item service.
//!
//! An in-memory CRUD service for `{id, name}` resources where every request
//! runs inside its own trace span.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::request ──▶ pipeline ──▶ store
//!                      (layers)        (trace scope)      │  (isolate panics)
//!                                                         │
//!                        ┌────────────────────────────────┤
//!                        ▼                ▼               ▼
//!                   annotate.rs      logging.rs       metrics.rs
//!                   (span status)    (one line)       (counters)
//!                        │
//!                        ▼
//!                   export.rs ──▶ batch task ──▶ log sink or OTLP/HTTP
//!     Client Response
//!     ◀────────────── http::response (JSON, traceparent)
//! ```

use clap::Parser;
use std::path::PathBuf;

use item_service::config::{apply_env_overrides, load_config, ServiceConfig};
use item_service::lifecycle::startup;
use item_service::observability::logging;
use item_service::pipeline::fault;

#[derive(Parser)]
#[command(name = "item-service")]
#[command(about = "In-memory item service with per-request tracing", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    apply_env_overrides(&mut config)?;

    logging::init(&config.observability)?;
    fault::install_panic_hook();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.service.name,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        fault_injection = config.service.fault_injection,
        otlp_endpoint = config.observability.otlp_endpoint.as_deref(),
        "item-service starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
