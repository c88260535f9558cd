//! services/api/src/web/protocol.rs
//!
//! Request and response payloads of the REST API. Core types are embedded as
//! opaque JSON objects in the OpenAPI document.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use study_tracker_core::domain::{SubjectStyle, TimeLogEntry};
use study_tracker_core::{BackupStatus, RecoveryOutcome};
use study_tracker_core::time_logs::{Period, TimeLogDraft};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub subject: String,
    pub topic: String,
    pub date_read: NaiveDate,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRevisionRequest {
    /// One of `rev2`, `rev4`, `rev7`. Anything else is ignored.
    pub revision_type: String,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimeLogRequest {
    pub task: String,
    #[serde(default)]
    pub subject: String,
    /// `HH:MM`. An end at or before the start means the activity ran past midnight.
    pub start_time: String,
    pub end_time: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

impl From<CreateTimeLogRequest> for TimeLogDraft {
    fn from(request: CreateTimeLogRequest) -> Self {
        TimeLogDraft {
            task: request.task,
            subject: request.subject,
            start_time: request.start_time,
            end_time: request.end_time,
            date: request.date,
            notes: request.notes,
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LinkBackupRequest {
    /// Filesystem path of the directory the backup file is kept in.
    pub path: String,
}

//=========================================================================================
// Query Parameters
//=========================================================================================

#[derive(Deserialize, Debug, IntoParams)]
pub struct SubjectQuery {
    /// A subject name, or `all`.
    pub subject: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
pub struct DateQuery {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodParam {
    #[default]
    Today,
    Week,
    Month,
}

impl From<PeriodParam> for Period {
    fn from(param: PeriodParam) -> Self {
        match param {
            PeriodParam::Today => Period::Today,
            PeriodParam::Week => Period::Week,
            PeriodParam::Month => Period::Month,
        }
    }
}

#[derive(Deserialize, Debug, IntoParams)]
pub struct PeriodQuery {
    #[serde(default)]
    pub period: PeriodParam,
    /// Last day of the window. Defaults to today.
    pub reference: Option<NaiveDate>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeLogsResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<TimeLogEntry>,
    pub total_hours: f64,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRevisionResponse {
    /// False when nothing changed (already done, unknown session or type).
    pub changed: bool,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub file_name: String,
    /// Base64 of the snapshot JSON.
    pub contents: String,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatusResponse {
    #[schema(value_type = String, example = "active")]
    pub status: BackupStatus,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub today: NaiveDate,
    #[schema(value_type = Object)]
    pub recovery: RecoveryOutcome,
    #[schema(value_type = String)]
    pub backup: BackupStatus,
    pub sessions: usize,
    pub time_logs: usize,
    /// Collections that could not be read at startup and are read-only.
    pub unreadable_collections: Vec<String>,
    pub edit_window_minutes: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SubjectResponse {
    pub name: String,
    pub color: String,
}

impl From<SubjectStyle> for SubjectResponse {
    fn from(style: SubjectStyle) -> Self {
        Self {
            name: style.name.to_string(),
            color: style.color.to_string(),
        }
    }
}
