//! Read-only queue inspection.
//!
//! Failed jobs stay in the queue with their last error; these routes are how
//! an operator finds them.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{JobListQuery, JobResponse};
use crate::api::server::AppState;
use crate::database::models::{JobCounts, JobStatus};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs))
        .route("/stats", get(job_stats))
        .route("/{id}", get(get_job))
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<Vec<JobResponse>>> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            JobStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown status '{}'", raw)))?,
        ),
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let jobs = state
        .job_repository
        .list_jobs_by_status(status, limit)
        .await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

async fn job_stats(State(state): State<AppState>) -> ApiResult<Json<JobCounts>> {
    Ok(Json(state.job_repository.count_jobs_by_status().await?))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<JobResponse>> {
    let job = state.job_repository.get_job(id).await?;
    Ok(Json(job.into()))
}
