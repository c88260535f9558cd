//! crates/study_tracker_core/src/codec.rs
//!
//! Snapshot encoding and the import/backup decoder.
//!
//! Snapshots are written as base64 of their JSON. Reading accepts either that or
//! plain JSON, decided by sniffing the first non-blank character. The decoded
//! JSON is then classified once into an `ImportPayload`, so nothing downstream
//! deals with encodings or legacy shapes.

use crate::domain::{Snapshot, StudySession, TimeLogEntry};
use crate::ports::{PortError, PortResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

/// Serializes the snapshot to JSON and wraps it in base64.
pub fn encode_snapshot(snapshot: &Snapshot) -> PortResult<String> {
    let json = serde_json::to_vec(snapshot).map_err(|e| PortError::Unexpected(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Turns file contents into JSON, whichever of the two encodings they use.
pub fn decode_document(contents: &str) -> PortResult<Value> {
    let trimmed = contents.trim();
    let json = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed.to_string()
    } else {
        let compact: String = trimmed.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| PortError::MalformedImport(format!("not JSON and not base64: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| PortError::MalformedImport(format!("decoded payload is not UTF-8: {}", e)))?
    };

    serde_json::from_str(&json).map_err(|e| PortError::MalformedImport(e.to_string()))
}

//=========================================================================================
// Import Payloads
//=========================================================================================

/// A classified import document.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportPayload {
    /// A bare array: the oldest backup format, sessions only.
    LegacySessions(Vec<StudySession>),
    /// An object carrying any subset of the collections. Absent keys stay untouched.
    Partial {
        study_sessions: Option<Vec<StudySession>>,
        time_logs: Option<Vec<TimeLogEntry>>,
        ai_ratings_history: Option<Vec<Value>>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialDocument {
    #[serde(default)]
    study_sessions: Option<Vec<StudySession>>,
    #[serde(default)]
    time_logs: Option<Vec<TimeLogEntry>>,
    #[serde(default)]
    ai_ratings_history: Option<Vec<Value>>,
}

impl ImportPayload {
    /// Decodes and classifies raw file contents.
    pub fn parse(contents: &str) -> PortResult<Self> {
        Self::from_document(decode_document(contents)?)
    }

    pub fn from_document(document: Value) -> PortResult<Self> {
        let carries_collections = document.as_object().is_some_and(|map| {
            map.contains_key("studySessions") || map.contains_key("timeLogs")
        });

        match document {
            Value::Array(_) => serde_json::from_value(document)
                .map(ImportPayload::LegacySessions)
                .map_err(|e| PortError::MalformedImport(e.to_string())),
            Value::Object(_) if carries_collections => {
                let partial: PartialDocument = serde_json::from_value(document)
                    .map_err(|e| PortError::MalformedImport(e.to_string()))?;
                Ok(ImportPayload::Partial {
                    study_sessions: partial.study_sessions,
                    time_logs: partial.time_logs,
                    ai_ratings_history: partial.ai_ratings_history,
                })
            }
            _ => Err(PortError::MalformedImport("Invalid backup format.".to_string())),
        }
    }

    /// Collapses the payload into a full snapshot, treating absent collections as empty.
    pub fn into_snapshot(self) -> Snapshot {
        match self {
            ImportPayload::LegacySessions(study_sessions) => Snapshot {
                study_sessions,
                ..Snapshot::default()
            },
            ImportPayload::Partial {
                study_sessions,
                time_logs,
                ai_ratings_history,
            } => Snapshot {
                study_sessions: study_sessions.unwrap_or_default(),
                time_logs: time_logs.unwrap_or_default(),
                ai_ratings_history: ai_ratings_history.unwrap_or_default(),
            },
        }
    }
}
