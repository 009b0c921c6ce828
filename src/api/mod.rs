//! REST API server for the orchestrator.
//!
//! Provides HTTP endpoints for:
//! - Meeting lifecycle (start, media registration, end, inspection)
//! - Worker acknowledgments

pub mod error;
pub mod routes;

use crate::config::ApiConfig;
use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::ApiState;

pub struct ApiServer {
    host: String,
    port: u16,
    state: ApiState,
}

impl ApiServer {
    pub fn new(state: ApiState, config: &ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state,
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = router(self.state);
        let address = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind API server to {}", address))?;

        info!("API server listening on http://{}", address);
        info!("Endpoints:");
        info!("  GET  /                  - Service info");
        info!("  POST /meetings          - Start a meeting");
        info!("  GET  /meetings/:id      - Meeting status and tasks");
        info!("  POST /meetings/:id/media - Register stored media");
        info!("  POST /meetings/:id/end  - End a meeting");
        info!("  POST /acks              - Worker acknowledgment");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(status))
        .merge(routes::meetings::router(state.clone()))
        .merge(routes::acks::router(state))
        .layer(ServiceBuilder::new())
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meeting-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
