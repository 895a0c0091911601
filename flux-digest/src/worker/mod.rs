//! Queue worker.
//!
//! One task drains the queue one job per tick. A tick is awaited to
//! completion before the next one is polled, so at most one job is ever in
//! flight. Collaborator failures turn into retry-or-fail decisions; storage
//! errors stop the worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::database::repositories::JobRepository;
use crate::pipeline::SummaryPipeline;
use crate::{Error, Result};

/// Worker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Delay between ticks.
    pub interval: Duration,
    /// Failed attempts allowed before a job is marked failed.
    pub max_retries: u32,
    /// Upper bound for processing one job, both collaborator calls included.
    pub job_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_retries: 3,
            job_timeout: Duration::from_secs(300),
        }
    }
}

/// Whether a job that has already failed `retries` times gets another attempt
/// after failing once more.
pub fn should_retry(retries: i64, max_retries: u32) -> bool {
    retries.saturating_add(1) < i64::from(max_retries)
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was pending.
    Idle,
    /// The job was published and removed from the queue.
    Completed { job_id: i64, entry_id: String },
    /// The job failed and went back to pending.
    Retrying {
        job_id: i64,
        retries: i64,
        error: String,
    },
    /// The job failed and exhausted its retry budget.
    Failed {
        job_id: i64,
        retries: i64,
        error: String,
    },
}

/// Single-flight queue worker.
pub struct QueueWorker {
    repo: Arc<dyn JobRepository>,
    pipeline: SummaryPipeline,
    config: WorkerConfig,
}

impl QueueWorker {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        pipeline: SummaryPipeline,
        config: WorkerConfig,
    ) -> Self {
        Self {
            repo,
            pipeline,
            config,
        }
    }

    /// Claim and process at most one job.
    ///
    /// Returns an error only when the queue itself could not be read or updated.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let Some(job) = self.repo.claim_next_job().await? else {
            return Ok(TickOutcome::Idle);
        };

        info!(
            job_id = job.id,
            entry_id = %job.entry_id,
            retries = job.retries,
            "Processing job"
        );

        let started = Instant::now();
        let processing = self.pipeline.process(&job);
        let result = match tokio::time::timeout(self.config.job_timeout, processing).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "Job timed out after {:?}",
                self.config.job_timeout
            ))),
        };

        match result {
            Ok(_) => {
                if !self.repo.complete_job(job.id).await? {
                    warn!(job_id = job.id, "Completed job was already removed");
                }
                info!(
                    job_id = job.id,
                    entry_id = %job.entry_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job done"
                );
                Ok(TickOutcome::Completed {
                    job_id: job.id,
                    entry_id: job.entry_id,
                })
            }
            Err(e) => {
                let message = e.to_string();
                let will_retry = should_retry(job.retries, self.config.max_retries);
                self.repo.fail_job(job.id, &message, will_retry).await?;

                let retries = job.retries + 1;
                error!(
                    job_id = job.id,
                    entry_id = %job.entry_id,
                    retries,
                    will_retry,
                    error = %message,
                    "Job failed"
                );

                Ok(if will_retry {
                    TickOutcome::Retrying {
                        job_id: job.id,
                        retries,
                        error: message,
                    }
                } else {
                    TickOutcome::Failed {
                        job_id: job.id,
                        retries,
                        error: message,
                    }
                })
            }
        }
    }

    /// Start the periodic loop on the current runtime.
    pub fn start(self: Arc<Self>) -> WorkerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        WorkerHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let interval = self.config.interval;
        info!(interval_ms = interval.as_millis() as u64, "Queue worker started");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Queue worker cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "Queue worker stopped on storage error");
                return Err(e);
            }
        }

        info!("Queue worker stopped");
        Ok(())
    }
}

/// Owned handle to a running worker loop.
///
/// Dropping the handle cancels the loop; use [`WorkerHandle::stop`] to also
/// wait for an in-flight job to be resolved.
pub struct WorkerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
}

impl WorkerHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the loop to exit on its own, which only happens on a storage error.
    ///
    /// Cancel safe.
    pub async fn join(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        match result {
            Ok(result) => result,
            Err(e) => Err(Error::Other(format!("queue worker task failed: {}", e))),
        }
    }

    /// Stop ticking and wait for the current tick to finish.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel.cancel();
        self.join().await
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
