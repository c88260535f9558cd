//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Handlers are thin: they lock the tracker, run one command or query, and map
//! core errors through `port_error_response`.

use crate::adapters::FsSnapshotDirectory;
use crate::error::port_error_response;
use crate::web::protocol::{
    BackupStatusResponse, CompleteRevisionRequest, CompleteRevisionResponse, CreateSessionRequest,
    CreateTimeLogRequest, DateQuery, ExportResponse, LinkBackupRequest, PeriodParam, PeriodQuery,
    StatusResponse, SubjectQuery, SubjectResponse, TimeLogsResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use study_tracker_core::domain::{RecordId, SUBJECT_PALETTE};
use study_tracker_core::sessions::SubjectFilter;
use study_tracker_core::time_logs::{Period, TimeLogDraft};
use tracing::info;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        status_handler,
        list_subjects_handler,
        list_sessions_handler,
        create_session_handler,
        delete_session_handler,
        complete_revision_handler,
        due_revisions_handler,
        schedule_handler,
        list_time_logs_handler,
        period_time_logs_handler,
        create_time_log_handler,
        delete_time_log_handler,
        begin_time_log_edit_handler,
        export_backup_handler,
        import_backup_handler,
        link_backup_handler,
        reconnect_backup_handler,
        unlink_backup_handler,
        backup_status_handler,
    ),
    components(
        schemas(
            CreateSessionRequest,
            CompleteRevisionRequest,
            CompleteRevisionResponse,
            CreateTimeLogRequest,
            LinkBackupRequest,
            PeriodParam,
            TimeLogsResponse,
            ExportResponse,
            BackupStatusResponse,
            StatusResponse,
            SubjectResponse,
        )
    ),
    tags(
        (name = "Study Tracker API", description = "Spaced-repetition sessions, time logs and backups.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

//=========================================================================================
// Overview
//=========================================================================================

/// Boot-time recovery result and current counts.
#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Tracker status", body = StatusResponse))
)]
pub async fn status_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracker = app_state.tracker.lock().await;
    Json(StatusResponse {
        today: tracker.today(),
        recovery: tracker.recovery_outcome(),
        backup: tracker.backup_status().await,
        sessions: tracker.sessions().len(),
        time_logs: tracker.time_logs().len(),
        unreadable_collections: tracker
            .unreadable_collections()
            .into_iter()
            .map(String::from)
            .collect(),
        edit_window_minutes: app_state.config.edit_window_minutes,
    })
}

/// The fixed subject palette.
#[utoipa::path(
    get,
    path = "/subjects",
    responses((status = 200, description = "Known subjects", body = [SubjectResponse]))
)]
pub async fn list_subjects_handler() -> impl IntoResponse {
    let subjects: Vec<SubjectResponse> = SUBJECT_PALETTE.iter().copied().map(SubjectResponse::from).collect();
    Json(subjects)
}

//=========================================================================================
// Sessions
//=========================================================================================

/// List study sessions, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    params(SubjectQuery),
    responses((status = 200, description = "Sessions matching the filter"))
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SubjectQuery>,
) -> impl IntoResponse {
    let tracker = app_state.tracker.lock().await;
    Json(tracker.topics(&SubjectFilter::from(query.subject)))
}

/// Record a newly studied topic.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created"),
        (status = 400, description = "Empty topic")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let session = tracker
        .add_session(&request.subject, &request.topic, request.date_read)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Delete a session while it is inside the edit window.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "The removed session"),
        (status = 403, description = "Edit window has expired"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let removed = tracker
        .delete_session(&RecordId::from(id))
        .await
        .map_err(port_error_response)?;
    Ok(Json(removed))
}

/// Mark a revision milestone done.
#[utoipa::path(
    post,
    path = "/sessions/{id}/revisions",
    params(("id" = String, Path, description = "Session id")),
    request_body = CompleteRevisionRequest,
    responses((status = 200, description = "Whether anything changed", body = CompleteRevisionResponse))
)]
pub async fn complete_revision_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CompleteRevisionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let changed = tracker
        .complete_revision(&RecordId::from(id), &request.revision_type)
        .await
        .map_err(port_error_response)?;
    Ok(Json(CompleteRevisionResponse { changed }))
}

/// Revisions due today, in session order.
#[utoipa::path(
    get,
    path = "/revisions/due",
    responses((status = 200, description = "Due revisions"))
)]
pub async fn due_revisions_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracker = app_state.tracker.lock().await;
    Json(tracker.due_today())
}

/// Milestone status and predicted due dates per session.
#[utoipa::path(
    get,
    path = "/schedule",
    params(SubjectQuery),
    responses((status = 200, description = "Schedule rows"))
)]
pub async fn schedule_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SubjectQuery>,
) -> impl IntoResponse {
    let tracker = app_state.tracker.lock().await;
    Json(tracker.schedule(&SubjectFilter::from(query.subject)))
}

//=========================================================================================
// Time Logs
//=========================================================================================

/// Entries attributed to one day, with the day's total.
#[utoipa::path(
    get,
    path = "/time-logs",
    params(DateQuery),
    responses((status = 200, description = "Entries for the day", body = TimeLogsResponse))
)]
pub async fn list_time_logs_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    let tracker = app_state.tracker.lock().await;
    let date = query.date.unwrap_or_else(|| tracker.today());
    Json(TimeLogsResponse {
        from: date,
        to: date,
        entries: tracker.logs_for_date(date),
        total_hours: tracker.daily_total(date),
    })
}

/// Entries in a window of 1, 7 or 30 days ending at `reference`.
#[utoipa::path(
    get,
    path = "/time-logs/period",
    params(PeriodQuery),
    responses((status = 200, description = "Entries in the period", body = TimeLogsResponse))
)]
pub async fn period_time_logs_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> impl IntoResponse {
    let tracker = app_state.tracker.lock().await;
    let reference = query.reference.unwrap_or_else(|| tracker.today());
    let period = Period::from(query.period);
    let (from, to) = period.range(reference);
    let entries = tracker.logs_in_period(reference, period);
    let total_hours = entries.iter().map(|e| e.duration).sum();
    Json(TimeLogsResponse {
        from,
        to,
        entries,
        total_hours,
    })
}

/// Log an activity. Windows past midnight come back as two entries.
#[utoipa::path(
    post,
    path = "/time-logs",
    request_body = CreateTimeLogRequest,
    responses(
        (status = 201, description = "The created entries, newest first"),
        (status = 400, description = "Missing task or malformed time")
    )
)]
pub async fn create_time_log_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateTimeLogRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let created = tracker
        .add_time_log(&TimeLogDraft::from(request))
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Delete an entry while it is inside the edit window.
#[utoipa::path(
    delete,
    path = "/time-logs/{id}",
    params(("id" = String, Path, description = "Time log id")),
    responses(
        (status = 200, description = "The removed entry"),
        (status = 403, description = "Edit window has expired"),
        (status = 404, description = "Unknown entry")
    )
)]
pub async fn delete_time_log_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let removed = tracker
        .delete_time_log(&RecordId::from(id))
        .await
        .map_err(port_error_response)?;
    Ok(Json(removed))
}

/// Start editing an entry: it is removed and its fields returned for resubmission.
#[utoipa::path(
    post,
    path = "/time-logs/{id}/edit",
    params(("id" = String, Path, description = "Time log id")),
    responses(
        (status = 200, description = "The entry's fields as a draft"),
        (status = 403, description = "Edit window has expired"),
        (status = 404, description = "Unknown entry")
    )
)]
pub async fn begin_time_log_edit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let draft = tracker
        .begin_time_log_edit(&RecordId::from(id))
        .await
        .map_err(port_error_response)?;
    Ok(Json(draft))
}

//=========================================================================================
// Backup
//=========================================================================================

/// Export the full state as a base64 snapshot.
#[utoipa::path(
    get,
    path = "/backup/export",
    responses((status = 200, description = "Encoded snapshot", body = ExportResponse))
)]
pub async fn export_backup_handler(State(app_state): State<Arc<AppState>>) -> Result<impl IntoResponse, HandlerError> {
    let tracker = app_state.tracker.lock().await;
    let contents = tracker.export_snapshot().map_err(port_error_response)?;
    Ok(Json(ExportResponse {
        file_name: format!("StudyTracker_Backup_{}.json", tracker.today()),
        contents,
    }))
}

/// Restore from an exported or auto-backup file, sent as the raw request body.
#[utoipa::path(
    post,
    path = "/backup/import",
    request_body(content = String, content_type = "text/plain", description = "File contents"),
    responses(
        (status = 200, description = "Which collections were replaced"),
        (status = 422, description = "Not a recognizable backup; nothing changed")
    )
)]
pub async fn import_backup_handler(
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let summary = tracker.import_snapshot(&body).await.map_err(port_error_response)?;
    Ok(Json(summary))
}

/// Link a directory for automatic backups.
#[utoipa::path(
    post,
    path = "/backup/link",
    request_body = LinkBackupRequest,
    responses(
        (status = 200, description = "Auto-backup is active", body = BackupStatusResponse),
        (status = 403, description = "The directory is not writable")
    )
)]
pub async fn link_backup_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<LinkBackupRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    let directory = Arc::new(FsSnapshotDirectory::new(request.path));
    let status = tracker
        .link_backup_directory(directory)
        .await
        .map_err(port_error_response)?;
    Ok(Json(BackupStatusResponse { status }))
}

/// Ask again for permission on the linked directory.
#[utoipa::path(
    post,
    path = "/backup/reconnect",
    responses((status = 200, description = "Resulting status", body = BackupStatusResponse))
)]
pub async fn reconnect_backup_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut tracker = app_state.tracker.lock().await;
    Json(BackupStatusResponse {
        status: tracker.reconnect_backup().await,
    })
}

/// Disconnect the backup directory.
#[utoipa::path(
    delete,
    path = "/backup/link",
    responses((status = 204, description = "Unlinked"))
)]
pub async fn unlink_backup_handler(State(app_state): State<Arc<AppState>>) -> Result<impl IntoResponse, HandlerError> {
    let mut tracker = app_state.tracker.lock().await;
    tracker.unlink_backup_directory().await.map_err(port_error_response)?;
    info!("Backup directory unlinked by request.");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/backup/status",
    responses((status = 200, description = "Current backup status", body = BackupStatusResponse))
)]
pub async fn backup_status_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracker = app_state.tracker.lock().await;
    Json(BackupStatusResponse {
        status: tracker.backup_status().await,
    })
}
