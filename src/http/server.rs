//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the item routes
//! - Wire up middleware (request ID, timeout, body limit)
//! - Hand every item request to the request pipeline
//! - Bind server to listener and shut down gracefully

use axum::{
    body::Bytes,
    extract::{FromRef, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::api::{ApiRequest, FaultKind, Operation};
use crate::config::ServiceConfig;
use crate::http::request::{ItemId, RequestScope};
use crate::lifecycle::ShutdownSignal;
use crate::observability::trace::Tracer;
use crate::pipeline::{PipelineResponse, RequestPipeline};
use crate::store::ResourceStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: RequestPipeline,
    pub tracer: Tracer,
}

impl FromRef<AppState> for Tracer {
    fn from_ref(state: &AppState) -> Self {
        state.tracer.clone()
    }
}

impl AppState {
    async fn dispatch(&self, scope: RequestScope, request: ApiRequest) -> PipelineResponse {
        self.pipeline.handle(&scope.ctx, &scope.meta, request).await
    }
}

/// HTTP server for the item service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server over a fresh, empty store.
    pub fn new(config: ServiceConfig, tracer: Tracer) -> Self {
        Self::with_store(config, tracer, ResourceStore::new())
    }

    /// Create a server over an existing store.
    pub fn with_store(config: ServiceConfig, tracer: Tracer, store: ResourceStore) -> Self {
        let state = AppState {
            pipeline: RequestPipeline::new(store),
            tracer,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/items", post(create_item).get(list_items))
            .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
            .route("/health", get(health));

        if config.service.fault_injection {
            tracing::warn!("fault injection routes enabled");
            router = router
                .route("/debug/fault", post(inject_server_fault))
                .route("/debug/panic", post(inject_panic));
        }

        router
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.service.name,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn body_text(body: &Bytes) -> String {
    String::from_utf8_lossy(body).into_owned()
}

async fn create_item(State(state): State<AppState>, scope: RequestScope, body: Bytes) -> PipelineResponse {
    let request = ApiRequest::new(Operation::Create).with_body(body_text(&body));
    state.dispatch(scope, request).await
}

async fn list_items(State(state): State<AppState>, scope: RequestScope) -> PipelineResponse {
    state.dispatch(scope, ApiRequest::new(Operation::List)).await
}

async fn get_item(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    scope: RequestScope,
) -> PipelineResponse {
    state.dispatch(scope, ApiRequest::new(Operation::Get).with_id(id)).await
}

async fn update_item(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    scope: RequestScope,
    body: Bytes,
) -> PipelineResponse {
    let request = ApiRequest::new(Operation::Update)
        .with_id(id)
        .with_body(body_text(&body));
    state.dispatch(scope, request).await
}

async fn delete_item(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    scope: RequestScope,
) -> PipelineResponse {
    state.dispatch(scope, ApiRequest::new(Operation::Delete).with_id(id)).await
}

async fn inject_server_fault(State(state): State<AppState>, scope: RequestScope) -> PipelineResponse {
    let request = ApiRequest::new(Operation::InjectFault(FaultKind::Explicit));
    state.dispatch(scope, request).await
}

async fn inject_panic(State(state): State<AppState>, scope: RequestScope) -> PipelineResponse {
    let request = ApiRequest::new(Operation::InjectFault(FaultKind::Panic));
    state.dispatch(scope, request).await
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
