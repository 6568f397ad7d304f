//! API server binary entry point

use presence_analysis::{AnalysisConfig, HttpAnalysisModel};
use presence_api_server::{start_server, AppState};
use presence_audio_extractor::{AudioConfig, FfmpegAudioExtractor};
use presence_orchestrator::{Orchestrator, PipelineScheduler, SchedulerConfig};
use presence_storage::{
    MemoryMetadataStore, MemoryObjectStore, MetadataStore, ObjectStore, PostgresMetadataStore,
    S3ObjectStore, StorageConfig,
};
use presence_transcription::{HttpTranscriptionClient, TranscriptionConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Storage backends: durable by default, in-memory for local development
    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string());
    let (store, blobs): (Arc<dyn MetadataStore>, Arc<dyn ObjectStore>) = match backend.as_str() {
        "postgres" => {
            let config = StorageConfig::default();
            let store = PostgresMetadataStore::new(config.postgres).await?;
            store.init_schema().await?;
            let blobs = S3ObjectStore::new(config.s3).await?;
            tracing::info!("Using PostgreSQL + S3 storage backends");
            (Arc::new(store), Arc::new(blobs))
        }
        "memory" => {
            tracing::warn!("Using in-memory storage backends (nothing is persisted)");
            (
                Arc::new(MemoryMetadataStore::new()),
                Arc::new(MemoryObjectStore::new()),
            )
        }
        other => anyhow::bail!("unknown STORAGE_BACKEND: {other}"),
    };

    // Pipeline collaborators
    let extractor = Arc::new(FfmpegAudioExtractor::new(AudioConfig::default()));
    let transcriber = Arc::new(HttpTranscriptionClient::new(TranscriptionConfig::default()));
    let model = Arc::new(HttpAnalysisModel::new(AnalysisConfig::default()));

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        blobs.clone(),
        extractor,
        transcriber,
        model,
    ));
    let scheduler = PipelineScheduler::start(orchestrator, SchedulerConfig::default());

    // Start server
    let addr = std::env::var("API_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let state = AppState::new(store, blobs, scheduler);

    tracing::info!("Starting Executive Presence Analysis API Server");
    start_server(&addr, state).await?;

    Ok(())
}
