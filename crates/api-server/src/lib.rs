//! REST API server for the executive-presence analysis pipeline
//!
//! Exposes the observation surface of the pipeline: upload a video, start
//! processing, poll job status, and read completed reports. Processing
//! itself happens on background tasks owned by the scheduler; request
//! handlers never block on the pipeline.

mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use presence_orchestrator::PipelineScheduler;
use presence_storage::{MetadataStore, ObjectStore, MAX_UPLOAD_BYTES};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::*;
pub use types::*;

/// Slack on top of the upload ceiling for multipart framing overhead
const BODY_LIMIT_SLACK: u64 = 4 * 1024 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Document storage for assets, jobs, and reports
    pub store: Arc<dyn MetadataStore>,
    /// Object storage for raw video bytes
    pub blobs: Arc<dyn ObjectStore>,
    /// Handle for enqueueing jobs onto the pipeline
    pub scheduler: PipelineScheduler,
}

impl AppState {
    /// Create new API state from its collaborators
    #[must_use]
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn ObjectStore>,
        scheduler: PipelineScheduler,
    ) -> Self {
        Self {
            store,
            blobs,
            scheduler,
        }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Upload and processing
        .route("/api/videos/upload", post(upload_video))
        .route("/api/videos/{video_id}/process", post(process_video))
        // Status and report reads
        .route("/api/jobs/{job_id}/status", get(get_job_status))
        .route("/api/reports", get(list_reports))
        .route("/api/reports/{report_id}", get(get_report))
        // Middleware
        .layer(DefaultBodyLimit::max((MAX_UPLOAD_BYTES + BODY_LIMIT_SLACK) as usize))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
