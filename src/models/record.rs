//! Roster record model and its remote document encoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document field holding the record label.
pub const FIELD_LABEL: &str = "classroomNumber";
/// Document field holding the supplementary note.
pub const FIELD_NOTE: &str = "information";
/// Document field holding the status string.
pub const FIELD_STATUS: &str = "status";

/// Opaque record identifier, doubling as the remote document key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh identifier for a new record.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check-in status of a roster record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    CheckedIn,
    CheckedOut,
    OnBreak,
}

impl Status {
    /// Wire string written to the remote document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::CheckedIn => "CheckedIn",
            Status::CheckedOut => "CheckedOut",
            Status::OnBreak => "On Break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CheckedIn" => Some(Status::CheckedIn),
            "CheckedOut" => Some(Status::CheckedOut),
            "On Break" | "OnBreak" => Some(Status::OnBreak),
            _ => None,
        }
    }

    /// Next status in the check-in cycle.
    pub fn next(self) -> Self {
        match self {
            Status::CheckedIn => Status::CheckedOut,
            Status::CheckedOut => Status::OnBreak,
            Status::OnBreak => Status::CheckedIn,
        }
    }

    /// Next status for a record whose stored value may be unrecognized.
    /// Anything outside the cycle recovers to `CheckedIn`.
    pub fn next_from(current: Option<Status>) -> Self {
        current.map_or(Status::CheckedIn, Status::next)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One checked-in member or classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRecord {
    pub id: RecordId,
    pub label: String,
    pub note: String,
    /// `None` when the document holds a status string outside the cycle.
    pub status: Option<Status>,
}

impl RosterRecord {
    /// Parse a remote document, returning `None` when a required field is
    /// missing or not a string. Unrecognized status strings are kept as `None`.
    pub fn from_document(id: &str, fields: &Map<String, Value>) -> Option<Self> {
        let label = fields.get(FIELD_LABEL)?.as_str()?;
        let note = fields.get(FIELD_NOTE)?.as_str()?;
        let status = Status::parse(fields.get(FIELD_STATUS)?.as_str()?);

        Some(Self {
            id: RecordId::from(id),
            label: label.to_string(),
            note: note.to_string(),
            status,
        })
    }

    /// Full document body for a new record.
    pub fn new_document(label: &str, note: &str, status: Status) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(FIELD_LABEL.to_string(), Value::from(label));
        fields.insert(FIELD_NOTE.to_string(), Value::from(note));
        fields.insert(FIELD_STATUS.to_string(), Value::from(status.as_str()));
        fields
    }

    /// Partial document carrying only a status change.
    pub fn status_patch(status: Status) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(FIELD_STATUS.to_string(), Value::from(status.as_str()));
        fields
    }
}

/// Request body for adding a record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRecordRequest {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub note: String,
}

/// Response body for a freshly added record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRecordResponse {
    pub id: RecordId,
}

/// Response body for a status cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStatusResponse {
    pub id: RecordId,
    pub status: Status,
}
