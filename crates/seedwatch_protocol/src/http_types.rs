//! HTTP API types for the analysis and progress endpoints.
//!
//! These mirror the JSON payloads of the server's v3 API. Unknown fields on
//! analysis records are retained so a refreshed record can be handed back to
//! callers without losing data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use thiserror::Error;

use crate::defaults::PROGRESS_COMPLETE;

// ============================================================================
// Identifiers
// ============================================================================

/// Server-side primary key of an analysis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct AnalysisId(u64);

impl AnalysisId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AnalysisId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<AnalysisId> for u64 {
    fn from(value: AnalysisId) -> Self {
        value.0
    }
}

impl std::str::FromStr for AnalysisId {
    type Err = AnalysisIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u64>()
            .map_err(|_| AnalysisIdError::Parse(s.to_string()))?;
        Ok(AnalysisId::new(value))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisIdError {
    #[error("invalid analysis id: {0}")]
    Parse(String),
}

/// Opaque key identifying one in-flight server task's progress record.
///
/// A new key is issued for every task; a key stops resolving once its task
/// has finished.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressKey(String);

impl ProgressKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgressKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProgressKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Outcome classification of a progress record.
///
/// The server writes many intermediate states ("processing", "parsing",
/// "success", ...). Only `"error"` is meaningful to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProgressStatus {
    #[default]
    Ok,
    Error,
}

impl From<String> for ProgressStatus {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("error") {
            ProgressStatus::Error
        } else {
            ProgressStatus::Ok
        }
    }
}

impl From<ProgressStatus> for String {
    fn from(value: ProgressStatus) -> Self {
        match value {
            ProgressStatus::Ok => "ok".to_string(),
            ProgressStatus::Error => "error".to_string(),
        }
    }
}

/// One poll result for a progress key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_records: Option<u64>,
    #[serde(default)]
    pub status: ProgressStatus,
    /// Free-form detail, usually only present on errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_key: Option<ProgressKey>,
}

impl ProgressSnapshot {
    pub fn is_error(&self) -> bool {
        self.status == ProgressStatus::Error
    }

    /// Whether the task behind this snapshot has finished.
    pub fn is_complete(&self) -> bool {
        self.progress >= PROGRESS_COMPLETE
    }
}

/// Response of `GET analyses/{id}/progress_key/`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressKeyResponse {
    #[serde(default)]
    pub progress_key: Option<ProgressKey>,
}

// ============================================================================
// Analyses
// ============================================================================

/// Lifecycle status of an analysis as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnalysisStatus {
    PendingCreation,
    Creating,
    Ready,
    Queued,
    Starting,
    Running,
    QueuedForStop,
    Stopping,
    Completed,
    Stopped,
    Failed,
    Deleting,
    /// A status this client does not know about yet
    Unknown(String),
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AnalysisStatus::PendingCreation => "Pending Creation",
            AnalysisStatus::Creating => "Creating",
            AnalysisStatus::Ready => "Ready",
            AnalysisStatus::Queued => "Queued",
            AnalysisStatus::Starting => "Starting...",
            AnalysisStatus::Running => "Running",
            AnalysisStatus::QueuedForStop => "Queued for stop",
            AnalysisStatus::Stopping => "Stopping...",
            AnalysisStatus::Completed => "Completed",
            AnalysisStatus::Stopped => "Stopped",
            AnalysisStatus::Failed => "Failed",
            AnalysisStatus::Deleting => "Deleting...",
            AnalysisStatus::Unknown(raw) => raw,
        }
    }

    /// Statuses for which the server never has task progress to report.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::PendingCreation
                | AnalysisStatus::Ready
                | AnalysisStatus::Completed
                | AnalysisStatus::Stopped
                | AnalysisStatus::Failed
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AnalysisStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending Creation" => AnalysisStatus::PendingCreation,
            "Creating" => AnalysisStatus::Creating,
            "Ready" => AnalysisStatus::Ready,
            "Queued" => AnalysisStatus::Queued,
            "Starting..." => AnalysisStatus::Starting,
            "Running" => AnalysisStatus::Running,
            "Queued for stop" => AnalysisStatus::QueuedForStop,
            "Stopping..." => AnalysisStatus::Stopping,
            "Completed" => AnalysisStatus::Completed,
            "Stopped" => AnalysisStatus::Stopped,
            "Failed" => AnalysisStatus::Failed,
            "Deleting..." => AnalysisStatus::Deleting,
            _ => AnalysisStatus::Unknown(value),
        }
    }
}

impl From<AnalysisStatus> for String {
    fn from(value: AnalysisStatus) -> Self {
        match value {
            AnalysisStatus::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

/// An analysis as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Client-only: no background task is currently being followed.
    #[serde(skip)]
    pub finished_with_tasks: bool,
    /// Remaining server fields, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisRecord {
    pub fn new(id: impl Into<AnalysisId>, status: AnalysisStatus) -> Self {
        Self {
            id: id.into(),
            name: None,
            service: None,
            status,
            start_time: None,
            end_time: None,
            finished_with_tasks: false,
            extra: serde_json::Map::new(),
        }
    }
}

/// Response of `GET analyses/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    pub analysis: AnalysisRecord,
}

/// Response of `GET analyses/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysesEnvelope {
    #[serde(default)]
    pub analyses: Vec<AnalysisRecord>,
}

/// Outcome flag of a state-changing analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    #[serde(other)]
    Error,
}

/// Response of `POST analyses/{id}/start|stop/` and `DELETE analyses/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResponse {
    pub fn success() -> Self {
        Self {
            status: ActionStatus::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}
