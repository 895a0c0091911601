//! Queue job database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::ms_to_datetime;

/// One queued feed entry awaiting summarization and publish-back.
///
/// Rows only ever exist in `pending`, `processing` or `failed` state; a job
/// that completes successfully is deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct JobDbModel {
    pub id: i64,
    /// Miniflux entry id; unique across the table.
    pub entry_id: String,
    pub title: String,
    pub content: String,
    /// Never written by the worker, kept for schema compatibility.
    pub summary: Option<String>,
    pub status: JobStatus,
    /// Number of failed attempts so far.
    pub retries: i64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Unix epoch milliseconds; determines claim order.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl JobDbModel {
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        ms_to_datetime(self.created_at)
    }

    pub fn updated_at_datetime(&self) -> DateTime<Utc> {
        ms_to_datetime(self.updated_at)
    }
}

/// Job status values as stored in the `status` column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
)]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by the worker; reset to pending on restart.
    Processing,
    /// Retry budget exhausted; kept for manual inspection.
    Failed,
}

impl JobStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Number of rows per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: u64,
    pub processing: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.failed
    }
}
