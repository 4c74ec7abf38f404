//! Span export.
//!
//! # Data Flow
//! ```text
//! RecordingSpan::end()
//!     → SpanProcessor::Simple → exporter (inline, tests)
//!     → SpanProcessor::Batch  → bounded queue → background task
//!                                 → exporter every N spans or T ms
//!                                 → LoggingExporter | OtlpExporter
//! ```
//!
//! # Design Decisions
//! - The request path never waits on export: a full queue drops the span
//! - Export is asynchronous; only the batch task awaits a network exporter

use futures_util::future::{self, BoxFuture, FutureExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::BatchConfig;
use crate::observability::trace::SpanData;

/// Destination for finished spans.
///
/// Exporters that finish their work before returning hand back a ready
/// future; network exporters do their I/O when the future is polled.
pub trait SpanExporter: Send + Sync {
    fn export(&self, batch: Vec<SpanData>) -> BoxFuture<'static, ()>;
}

/// Writes each span as one JSON line on the `span_export` target.
#[derive(Debug, Default, Clone)]
pub struct LoggingExporter;

impl SpanExporter for LoggingExporter {
    fn export(&self, batch: Vec<SpanData>) -> BoxFuture<'static, ()> {
        for span in &batch {
            match serde_json::to_string(span) {
                Ok(json) => tracing::info!(target: "span_export", span = %json),
                Err(e) => tracing::warn!(error = %e, "failed to encode span"),
            }
        }
        future::ready(()).boxed()
    }
}

/// Keeps finished spans in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl InMemoryExporter {
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SpanExporter for InMemoryExporter {
    fn export(&self, batch: Vec<SpanData>) -> BoxFuture<'static, ()> {
        self.spans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(batch);
        future::ready(()).boxed()
    }
}

/// Receives spans as they end.
#[derive(Clone)]
pub enum SpanProcessor {
    /// Export on the ending thread. Work the exporter cannot finish
    /// inline is spawned onto the current runtime.
    Simple(Arc<dyn SpanExporter>),
    /// Queue for the background batch task.
    Batch(mpsc::Sender<SpanData>),
}

impl SpanProcessor {
    pub fn simple(exporter: impl SpanExporter + 'static) -> Self {
        SpanProcessor::Simple(Arc::new(exporter))
    }

    pub(crate) fn on_end(&self, span: SpanData) {
        match self {
            SpanProcessor::Simple(exporter) => {
                let mut pending = exporter.export(vec![span]);
                if (&mut pending).now_or_never().is_none() {
                    match tokio::runtime::Handle::try_current() {
                        Ok(runtime) => {
                            runtime.spawn(pending);
                        }
                        Err(_) => tracing::warn!("no runtime for span export, dropping span"),
                    }
                }
            }
            SpanProcessor::Batch(tx) => {
                if let Err(e) = tx.try_send(span) {
                    tracing::warn!(error = %e, "span export queue full, dropping span");
                }
            }
        }
    }
}

/// Handle to the background batch task.
pub struct BatchHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl BatchHandle {
    /// Flush queued spans and stop the task.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "span export task failed");
        }
    }
}

/// Spawn the batch export task. Must be called inside a Tokio runtime.
pub fn spawn_batch_processor(
    exporter: Arc<dyn SpanExporter>,
    config: &BatchConfig,
) -> (SpanProcessor, BatchHandle) {
    let (tx, rx) = mpsc::channel(config.max_queue_size);
    let (stop, stop_rx) = oneshot::channel();
    let task = tokio::spawn(run_batch_loop(
        exporter,
        rx,
        stop_rx,
        config.max_batch_size,
        Duration::from_millis(config.flush_interval_ms),
    ));
    (SpanProcessor::Batch(tx), BatchHandle { stop, task })
}

async fn run_batch_loop(
    exporter: Arc<dyn SpanExporter>,
    mut rx: mpsc::Receiver<SpanData>,
    mut stop: oneshot::Receiver<()>,
    max_batch_size: usize,
    flush_interval: Duration,
) {
    let mut buffer: Vec<SpanData> = Vec::with_capacity(max_batch_size);
    let mut detached = false;
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_span = rx.recv() => match maybe_span {
                Some(span) => {
                    buffer.push(span);
                    if buffer.len() >= max_batch_size {
                        flush(exporter.as_ref(), &mut buffer, max_batch_size).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush(exporter.as_ref(), &mut buffer, max_batch_size).await;
                }
            }
            signal = &mut stop, if !detached => {
                if signal.is_err() {
                    // Handle dropped without a shutdown request: keep
                    // exporting until every processor is gone.
                    detached = true;
                    continue;
                }
                rx.close();
                while let Some(span) = rx.recv().await {
                    buffer.push(span);
                }
                break;
            }
        }
    }

    while !buffer.is_empty() {
        let rest = buffer.split_off(buffer.len().min(max_batch_size));
        let batch = std::mem::replace(&mut buffer, rest);
        exporter.export(batch).await;
    }
    tracing::debug!("span export task stopped");
}

async fn flush(exporter: &dyn SpanExporter, buffer: &mut Vec<SpanData>, max_batch_size: usize) {
    let batch = std::mem::replace(buffer, Vec::with_capacity(max_batch_size));
    exporter.export(batch).await;
}
