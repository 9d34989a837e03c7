use std::sync::Arc;

use tracing::{error, info, warn};

use worker::{
    config::{OutputMode, WorkerMode},
    loader::{blob_store_for, loader_for},
    runtime, BackendLifecycle, JobHandler, WorkerConfig,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    if let Err(e) = async_main().await {
        error!("Worker failed: {e:#}");
        std::process::exit(1);
    }
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting TTS worker...");
    let config = WorkerConfig::from_env()?;

    let blob_store = blob_store_for(&config.blob)?;
    if config.output_mode == OutputMode::Blob && blob_store.is_none() {
        warn!("OUTPUT_MODE=blob without AZURE_STORAGE_CONNECTION_STRING, audio will be returned inline");
    }

    let loader = loader_for(&config.backend);
    info!("Backend: {}", loader.describe());
    let lifecycle = Arc::new(BackendLifecycle::new(loader));
    if config.warmup_on_start {
        lifecycle.warm_up().await;
    }

    let handler = Arc::new(JobHandler::new(lifecycle, blob_store, &config));

    let job_timeout = config.job_timeout();
    match (config.mode, config.queue) {
        (WorkerMode::Queue, Some(queue)) => runtime::queue::run(handler, queue).await,
        (WorkerMode::Queue, None) => anyhow::bail!("queue mode without a job queue configured"),
        (WorkerMode::Http, _) => runtime::http::serve(handler, config.port, job_timeout).await,
    }
}
