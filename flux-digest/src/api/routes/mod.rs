//! API route modules.

pub mod health;
pub mod jobs;
pub mod webhook;

use axum::Router;

use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/webhook", webhook::router())
        .nest("/health", health::router())
        .nest("/api/jobs", jobs::router())
        .with_state(state)
}
