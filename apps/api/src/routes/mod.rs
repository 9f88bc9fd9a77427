pub mod handlers;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::state::AppState;

async fn not_implemented() -> Result<(), AppError> {
    Err(AppError::NotImplemented)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::handle_index))
        .route("/app.js", get(handlers::handle_app_js))
        .route("/health", get(health::health_handler))
        .route("/logs", get(handlers::handle_logs))
        .route("/run", post(handlers::handle_trigger_run))
        .route("/api/personas", get(handlers::handle_personas))
        .route("/api/runs", get(handlers::handle_list_runs))
        .route("/api/runs/:id", get(handlers::handle_get_run))
        // Declared for the UI; no server-side behaviour yet
        .route("/api/contacts", get(not_implemented))
        .route("/api/retry/:id", post(not_implemented))
        .route("/api/training", post(not_implemented))
        .with_state(state)
}
