use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use flux_digest::api::{ApiServer, ApiServerConfig, AppState};
use flux_digest::clients::{MinifluxClient, OllamaClient, build_http_client};
use flux_digest::config::AppConfig;
use flux_digest::database::{self, repositories::JobRepository, repositories::SqlxJobRepository};
use flux_digest::logging;
use flux_digest::pipeline::SummaryPipeline;
use flux_digest::worker::{QueueWorker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("loading configuration")?;
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;

    let background = CancellationToken::new();
    if let Some(log_dir) = &config.log_dir {
        logging::start_retention_cleanup(log_dir.clone(), background.child_token());
    }

    if config.miniflux_api_key.is_empty() {
        warn!("MINIFLUX_API_KEY is empty; publishing to Miniflux will likely be rejected");
    }

    // Queue store
    database::ensure_database_dir(&config.database_url)?;
    let pool = database::init_pool(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    database::run_migrations(&pool).await?;

    let repo = Arc::new(SqlxJobRepository::new(pool.clone()));
    let recovered = repo.recover_processing_jobs().await?;
    if recovered > 0 {
        warn!(count = recovered, "Reset jobs interrupted by a previous shutdown");
    }

    // Collaborators
    let http_client = build_http_client(config.request_timeout())?;
    let summarizer = Arc::new(OllamaClient::new(
        http_client.clone(),
        &config.ollama_url,
        &config.ollama_model,
    ));
    let publisher = Arc::new(MinifluxClient::new(
        http_client,
        &config.miniflux_url,
        &config.miniflux_api_key,
    ));
    let pipeline = SummaryPipeline::new(summarizer, publisher);

    let worker = Arc::new(QueueWorker::new(
        repo.clone(),
        pipeline,
        WorkerConfig {
            interval: config.queue_interval(),
            max_retries: config.max_retries,
            job_timeout: config.job_timeout(),
        },
    ));
    let mut worker_handle = worker.start();

    let server = Arc::new(ApiServer::new(
        ApiServerConfig::from(&config),
        AppState::new(repo.clone()),
    ));
    let mut server_task = tokio::spawn({
        let server = server.clone();
        async move { server.run().await }
    });

    info!(
        port = config.port,
        model = %config.ollama_model,
        "flux-digest started"
    );

    let mut fatal: Option<anyhow::Error> = None;
    tokio::select! {
        result = shutdown_signal() => {
            if let Err(e) = result {
                fatal = Some(anyhow::Error::new(e).context("installing signal handlers"));
            }
        }
        result = worker_handle.join() => {
            if let Err(e) = result {
                error!(error = %e, "Queue worker failed");
                fatal = Some(e.into());
            }
        }
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => warn!("API server exited"),
                Ok(Err(e)) => fatal = Some(e.into()),
                Err(e) => fatal = Some(e.into()),
            }
        }
    }

    info!("Shutting down");

    server.shutdown();
    if !server_task.is_finished()
        && let Err(e) = (&mut server_task).await
    {
        warn!(error = %e, "API server task failed during shutdown");
    }

    // The worker must be stopped before the store goes away.
    if let Err(e) = worker_handle.stop().await {
        error!(error = %e, "Queue worker stopped with error");
    }
    background.cancel();
    database::close_pool(&pool).await;

    match fatal {
        Some(e) => Err(e),
        None => {
            info!("Shutdown complete");
            Ok(())
        }
    }
}

/// Completes when SIGINT or SIGTERM (Ctrl+C elsewhere) is received.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => info!(signal = "SIGINT", "shutdown signal"),
            _ = sigterm.recv() => info!(signal = "SIGTERM", "shutdown signal"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("shutdown signal");
    }

    Ok(())
}
