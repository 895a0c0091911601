//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::{JobDbModel, JobStatus};

/// Miniflux webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub event_type: String,
    pub entries: Vec<WebhookEntry>,
}

/// One entry of a `new_entries` event. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    pub id: EntryId,
    pub title: String,
    pub content: String,
}

/// Entry ids arrive as numbers from Miniflux but strings are accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(serde_json::Number),
    Text(String),
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryId::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => write!(f, "{}", i),
                (_, Some(u), _) => write!(f, "{}", u),
                // `42.0` and `42` name the same entry.
                (_, _, Some(x)) => write!(f, "{}", x),
                _ => write!(f, "{}", n),
            },
            EntryId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub received: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<bool>,
}

/// Query parameters for listing jobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// Queue row as exposed over HTTP; the article body is omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: i64,
    pub entry_id: String,
    pub title: String,
    pub status: JobStatus,
    pub retries: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobDbModel> for JobResponse {
    fn from(job: JobDbModel) -> Self {
        Self {
            created_at: job.created_at_datetime(),
            updated_at: job.updated_at_datetime(),
            id: job.id,
            entry_id: job.entry_id,
            title: job.title,
            status: job.status,
            retries: job.retries,
            last_error: job.last_error,
        }
    }
}
