//! `vpost` command line: worker, submission, polling and diagnostics.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use vpost_media::{capability, FfmpegEngine, MediaEngine};
use vpost_models::JobId;
use vpost_queue::{JobQueue, JobStatusStore};
use vpost_worker::cli::{Cli, Commands};
use vpost_worker::{health, logging, metrics, workspace};
use vpost_worker::{Dispatcher, Orchestrator, PipelineConfig, QueueConsumer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let cli = Cli::parse();
    let config = Arc::new(PipelineConfig::from_env());

    match cli.command {
        Commands::Worker => run_worker(config).await,
        Commands::Submit { video, second } => {
            config.validate()?;
            let engine = engine(&config);
            let orchestrator = Orchestrator::new(Arc::clone(&config), engine);
            let queue = JobQueue::new(config.queue.clone())
                .map_err(|e| warn!(error = %e, "Invalid Redis configuration, processing inline"))
                .ok();
            let dispatcher = Dispatcher::new(queue, orchestrator);

            let job_id = JobId::new();
            let params = workspace::stage(&config, &job_id, &video, second.as_deref()).await?;
            let snapshot = dispatcher.submit(params).await?;

            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Status { job_id } => {
            let store = status_store(&config)?;
            let snapshot = store.poll(&JobId::from_string(job_id)).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Revoke { job_id } => {
            let store = status_store(&config)?;
            store.revoke(&JobId::from_string(job_id.as_str())).await?;
            println!("revoked {}", job_id);
            Ok(())
        }
        Commands::CheckGpu => {
            let engine = engine(&config);
            let capability = capability::probe(engine.as_ref()).await;
            println!(
                "encoder capability: {} (gpu {})",
                capability,
                if capability.has_gpu() { "supported" } else { "not supported" }
            );
            Ok(())
        }
        Commands::Health => {
            let queue = JobQueue::new(config.queue.clone()).ok();
            let report = health::collect(&config, queue.as_ref()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn run_worker(config: Arc<PipelineConfig>) -> anyhow::Result<()> {
    info!("Starting vpost worker");
    config.validate().context("invalid pipeline configuration")?;
    info!("Worker config: {:?}", config);

    if let Some(addr) = &config.metrics_addr {
        metrics::install_exporter(addr)?;
    }

    let queue = JobQueue::new(config.queue.clone()).context("failed to create job queue")?;
    queue
        .ping()
        .await
        .context("Redis is required to run a worker")?;

    let orchestrator = Orchestrator::new(Arc::clone(&config), engine(&config));
    let consumer = Arc::new(QueueConsumer::new(Arc::clone(&config), queue, orchestrator));

    let signal_consumer = Arc::clone(&consumer);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_consumer.shutdown();
    });

    consumer.run().await?;
    info!("Worker shutdown complete");
    Ok(())
}

fn engine(config: &PipelineConfig) -> Arc<dyn MediaEngine> {
    Arc::new(FfmpegEngine::new(config.ffmpeg_timeout))
}

fn status_store(config: &PipelineConfig) -> anyhow::Result<JobStatusStore> {
    let queue = JobQueue::new(config.queue.clone())?;
    Ok(JobStatusStore::for_queue(&queue))
}
