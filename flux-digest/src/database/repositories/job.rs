//! Job repository.
//!
//! This is the only code that mutates queue rows. Every mutation is a single
//! statement or a single `BEGIN IMMEDIATE` transaction, so each call is atomic
//! on its own.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::database::begin_immediate;
use crate::database::models::{JobCounts, JobDbModel, JobStatus};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::{Error, Result};

/// Job repository trait.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a new entry. Returns `false` if the entry id is already queued;
    /// the existing row is left untouched in that case.
    async fn insert_job(&self, entry_id: &str, title: &str, content: &str) -> Result<bool>;

    /// Atomically move the oldest pending job to `processing`.
    ///
    /// The returned row is the snapshot taken before the transition.
    async fn claim_next_job(&self) -> Result<Option<JobDbModel>>;

    /// Remove a finished job. Returns `false` if it was already gone.
    async fn complete_job(&self, id: i64) -> Result<bool>;

    /// Record a failed attempt on a `processing` job and either requeue it or
    /// mark it `failed`. Returns `false` if the job was not `processing`.
    async fn fail_job(&self, id: i64, error: &str, should_retry: bool) -> Result<bool>;

    /// Reset every `processing` job to `pending`. Returns the number of rows reset.
    async fn recover_processing_jobs(&self) -> Result<u64>;

    async fn get_job(&self, id: i64) -> Result<JobDbModel>;
    async fn get_job_by_entry_id(&self, entry_id: &str) -> Result<Option<JobDbModel>>;
    async fn list_jobs_by_status(
        &self,
        status: Option<JobStatus>,
        limit: i64,
    ) -> Result<Vec<JobDbModel>>;
    async fn count_jobs_by_status(&self) -> Result<JobCounts>;
}

/// SQLx implementation of JobRepository.
#[derive(Clone)]
pub struct SqlxJobRepository {
    pool: SqlitePool,
}

impl SqlxJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn claim_next_job_once(&self) -> Result<Option<JobDbModel>> {
        let mut tx = begin_immediate(&self.pool).await?;

        let candidate = sqlx::query_as::<_, JobDbModel>(
            r#"
            SELECT * FROM queue
            WHERE status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let claimed = sqlx::query(
            "UPDATE queue SET status = 'processing', updated_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(now_ms())
        .bind(job.id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() != 1 {
            // Unreachable while the write lock is held; never hand out an unclaimed row.
            tx.rollback().await?;
            return Err(Error::Database(format!(
                "claim of job {} affected {} rows",
                job.id,
                claimed.rows_affected()
            )));
        }

        tx.commit().await?;
        Ok(Some(job))
    }
}

#[async_trait]
impl JobRepository for SqlxJobRepository {
    async fn insert_job(&self, entry_id: &str, title: &str, content: &str) -> Result<bool> {
        let now = now_ms();
        let result = sqlx::query(
            r#"
            INSERT INTO queue (entry_id, title, content, status, retries, created_at, updated_at)
            VALUES (?, ?, ?, 'pending', 0, ?, ?)
            ON CONFLICT(entry_id) DO NOTHING
            "#,
        )
        .bind(entry_id)
        .bind(title)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!(entry_id = %entry_id, "Entry already queued; ignoring duplicate");
        }
        Ok(inserted)
    }

    async fn claim_next_job(&self) -> Result<Option<JobDbModel>> {
        retry_on_sqlite_busy("claim_next_job", || self.claim_next_job_once()).await
    }

    async fn complete_job(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fail_job(&self, id: i64, error: &str, should_retry: bool) -> Result<bool> {
        let next_status = if should_retry {
            JobStatus::Pending
        } else {
            JobStatus::Failed
        };

        let result = sqlx::query(
            r#"
            UPDATE queue SET
                status = ?,
                retries = retries + 1,
                last_error = ?,
                updated_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(next_status)
        .bind(error)
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() == 1;
        if !updated {
            warn!(job_id = id, "Job is not processing; failure was not recorded");
        }
        Ok(updated)
    }

    async fn recover_processing_jobs(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE queue SET status = 'pending', updated_at = ? WHERE status = 'processing'",
        )
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_job(&self, id: i64) -> Result<JobDbModel> {
        sqlx::query_as::<_, JobDbModel>("SELECT * FROM queue WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Job", id.to_string()))
    }

    async fn get_job_by_entry_id(&self, entry_id: &str) -> Result<Option<JobDbModel>> {
        let job = sqlx::query_as::<_, JobDbModel>("SELECT * FROM queue WHERE entry_id = ?")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn list_jobs_by_status(
        &self,
        status: Option<JobStatus>,
        limit: i64,
    ) -> Result<Vec<JobDbModel>> {
        let jobs = match status {
            Some(status) => {
                sqlx::query_as::<_, JobDbModel>(
                    "SELECT * FROM queue WHERE status = ? ORDER BY created_at ASC, id ASC LIMIT ?",
                )
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobDbModel>(
                    "SELECT * FROM queue ORDER BY created_at ASC, id ASC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(jobs)
    }

    async fn count_jobs_by_status(&self) -> Result<JobCounts> {
        let rows: Vec<(JobStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM queue GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = JobCounts::default();
        for (status, count) in rows {
            let count = count.max(0) as u64;
            match status {
                JobStatus::Pending => counts.pending = count,
                JobStatus::Processing => counts.processing = count,
                JobStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }
}
