pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use rest::*;
use state::AppState;
use std::sync::Arc;

/// All API routes, without CORS or documentation layers.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/subjects", get(list_subjects_handler))
        .route("/sessions", get(list_sessions_handler).post(create_session_handler))
        .route("/sessions/{id}", axum::routing::delete(delete_session_handler))
        .route("/sessions/{id}/revisions", post(complete_revision_handler))
        .route("/revisions/due", get(due_revisions_handler))
        .route("/schedule", get(schedule_handler))
        .route("/time-logs", get(list_time_logs_handler).post(create_time_log_handler))
        .route("/time-logs/period", get(period_time_logs_handler))
        .route("/time-logs/{id}", axum::routing::delete(delete_time_log_handler))
        .route("/time-logs/{id}/edit", post(begin_time_log_edit_handler))
        .route("/backup/export", get(export_backup_handler))
        .route("/backup/import", post(import_backup_handler))
        .route("/backup/link", post(link_backup_handler).delete(unlink_backup_handler))
        .route("/backup/reconnect", post(reconnect_backup_handler))
        .route("/backup/status", get(backup_status_handler))
        .with_state(app_state)
}
