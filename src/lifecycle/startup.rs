//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics and the span export pipeline
//! - Bind the listener and serve until shutdown
//! - Flush pending spans on the way out
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::export::{spawn_batch_processor, LoggingExporter, SpanExporter};
use crate::observability::metrics;
use crate::observability::otlp::OtlpExporter;
use crate::observability::trace::Tracer;

/// Fatal startup or serving errors.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("failed to build span exporter: {0}")]
    SpanExporter(#[from] reqwest::Error),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the service until a termination signal arrives.
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let exporter: Arc<dyn SpanExporter> = match config.observability.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let otlp = OtlpExporter::new(endpoint, &config.service.name)?;
            tracing::info!(endpoint = otlp.endpoint(), "exporting spans over OTLP/HTTP");
            Arc::new(otlp)
        }
        None => Arc::new(LoggingExporter),
    };
    let (processor, export_handle) = spawn_batch_processor(exporter, &config.observability.batch);
    let tracer = Tracer::new(&config.service.name, processor);

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let signal_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { signals::trigger_on_signal(&shutdown).await })
    };

    let server = HttpServer::new(config, tracer);
    let served = server.run(listener, shutdown.subscribe()).await;

    signal_task.abort();
    export_handle.shutdown().await;
    served?;
    Ok(())
}
