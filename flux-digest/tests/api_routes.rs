mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::temp_repo;
use flux_digest::api::{ApiServer, ApiServerConfig, AppState};
use flux_digest::database::models::JobStatus;
use flux_digest::database::repositories::{JobRepository, SqlxJobRepository};

async fn app() -> (tempfile::TempDir, std::sync::Arc<SqlxJobRepository>, Router) {
    let (dir, repo) = temp_repo().await;
    let server = ApiServer::new(ApiServerConfig::default(), AppState::new(repo.clone()));
    (dir, repo, server.router())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_webhook(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn new_entries_are_queued() {
    let (_dir, repo, router) = app().await;
    let payload = json!({
        "event_type": "new_entries",
        "feed": { "id": 3, "title": "Feed" },
        "entries": [
            { "id": 42, "title": "T", "content": "C", "url": "https://example.com/42" },
            { "id": 43, "title": "U", "content": "D" },
        ],
    });

    let (status, body) = send(&router, post_webhook(payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": 2 }));
    let job = repo.get_job_by_entry_id("42").await.unwrap().unwrap();
    assert_eq!(job.title, "T");
    assert_eq!(job.content, "C");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retries, 0);
    assert!(repo.get_job_by_entry_id("43").await.unwrap().is_some());
}

#[tokio::test]
async fn other_events_are_ignored() {
    let (_dir, repo, router) = app().await;
    let payload = json!({
        "event_type": "save_entry",
        "entries": [{ "id": 1, "title": "T", "content": "C" }],
    });

    let (status, body) = send(&router, post_webhook(payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": 0, "ignore": true }));
    assert_eq!(repo.count_jobs_by_status().await.unwrap().total(), 0);
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let (_dir, repo, router) = app().await;

    let (status, body) = send(&router, post_webhook("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid payload");

    let missing_entries = json!({ "event_type": "new_entries" });
    let (status, _) = send(&router, post_webhook(missing_entries.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let empty_id = json!({
        "event_type": "new_entries",
        "entries": [{ "id": "", "title": "T", "content": "C" }],
    });
    let (status, _) = send(&router, post_webhook(empty_id.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(repo.count_jobs_by_status().await.unwrap().total(), 0);
}

#[tokio::test]
async fn duplicate_delivery_keeps_one_row() {
    let (_dir, repo, router) = app().await;
    let first = json!({
        "event_type": "new_entries",
        "entries": [{ "id": 42, "title": "T", "content": "C" }],
    });
    let second = json!({
        "event_type": "new_entries",
        "entries": [{ "id": "42", "title": "T2", "content": "C2" }],
    });

    let (status, body) = send(&router, post_webhook(first.to_string())).await;
    assert_eq!((status, body), (StatusCode::OK, json!({ "received": 1 })));
    let (status, body) = send(&router, post_webhook(second.to_string())).await;
    assert_eq!((status, body), (StatusCode::OK, json!({ "received": 1 })));

    let jobs = repo.list_jobs_by_status(None, 10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].title, "T");
    assert_eq!(jobs[0].content, "C");
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, _repo, router) = app().await;

    let (status, body) = send(&router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn jobs_can_be_listed_and_counted() {
    let (_dir, repo, router) = app().await;
    repo.insert_job("1", "one", "a").await.unwrap();
    repo.insert_job("2", "two", "b").await.unwrap();
    let claimed = repo.claim_next_job().await.unwrap().unwrap();
    repo.fail_job(claimed.id, "ollama request failed: 500 boom", false)
        .await
        .unwrap();

    let (status, body) = send(&router, get("/api/jobs?status=failed")).await;
    assert_eq!(status, StatusCode::OK);
    let failed = body.as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["entry_id"], "1");
    assert_eq!(failed[0]["status"], "failed");
    assert_eq!(failed[0]["retries"], 1);
    assert_eq!(failed[0]["last_error"], "ollama request failed: 500 boom");
    assert!(failed[0].get("content").is_none());

    let (status, body) = send(&router, get("/api/jobs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&router, get("/api/jobs/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "pending": 1, "processing": 0, "failed": 1 }));

    let (status, body) = send(&router, get(&format!("/api/jobs/{}", claimed.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "one");
}

#[tokio::test]
async fn job_lookup_errors() {
    let (_dir, _repo, router) = app().await;

    let (status, body) = send(&router, get("/api/jobs/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&router, get("/api/jobs?status=done")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
