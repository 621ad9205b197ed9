mod routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{config::Config, ingest::Ingestor, metrics, workflow::WorkflowEngine, Error, Result};

pub use routes::{StatusResponse, UploadResponse};

pub struct AppState {
    pub config: Config,
    pub engine: Arc<WorkflowEngine>,
    pub ingestor: Arc<Ingestor>,
}

pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(config: &Config, engine: Arc<WorkflowEngine>, ingestor: Arc<Ingestor>) -> Self {
        Self {
            state: Arc::new(AppState {
                config: config.clone(),
                engine,
                ingestor,
            }),
        }
    }

    pub fn build_router(self) -> Router {
        if let Err(e) = metrics::register_metrics() {
            tracing::warn!(error = %e, "Metrics registration failed");
        }
        let body_limit = self.state.config.server.max_upload_bytes;

        Router::new()
            .route("/", get(routes::root))
            .route("/health", get(routes::health))
            .route("/api/upload", post(routes::upload))
            .route(
                "/api/workflow-status",
                get(routes::workflow_status).delete(routes::clear_workflow_status),
            )
            .route("/metrics", get(routes::metrics))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::max(body_limit)),
            )
            .with_state(self.state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Server running on http://{}", listener.local_addr()?);
        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::Internal(format!("server error: {}", e)))
    }
}
