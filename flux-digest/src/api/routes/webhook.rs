//! Miniflux webhook ingestion.
//!
//! Only `new_entries` events are queued; any other event type is
//! acknowledged and ignored. Re-delivered entries are absorbed by the queue.

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use serde_json::json;
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{WebhookPayload, WebhookResponse};
use crate::api::server::AppState;

/// Event type carrying freshly fetched entries.
pub const NEW_ENTRIES_EVENT: &str = "new_entries";

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(receive_webhook))
}

fn parse_payload(body: &[u8]) -> ApiResult<WebhookPayload> {
    let payload: WebhookPayload = serde_json::from_slice(body).map_err(|e| {
        ApiError::bad_request("invalid payload").with_details(json!({ "error": e.to_string() }))
    })?;

    if let Some(index) = payload
        .entries
        .iter()
        .position(|entry| entry.id.to_string().trim().is_empty())
    {
        return Err(ApiError::bad_request("invalid payload")
            .with_details(json!({ "error": format!("entries[{}].id must not be empty", index) })));
    }

    Ok(payload)
}

async fn receive_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let payload = parse_payload(&body)?;

    if payload.event_type != NEW_ENTRIES_EVENT {
        debug!(event_type = %payload.event_type, "Ignoring webhook event");
        return Ok(Json(WebhookResponse {
            received: 0,
            ignore: Some(true),
        }));
    }

    let mut queued = 0usize;
    for entry in &payload.entries {
        let entry_id = entry.id.to_string();
        if state
            .job_repository
            .insert_job(&entry_id, &entry.title, &entry.content)
            .await?
        {
            queued += 1;
        }
    }

    info!(
        received = payload.entries.len(),
        queued, "Webhook entries accepted"
    );

    Ok(Json(WebhookResponse {
        received: payload.entries.len(),
        ignore: None,
    }))
}
