//! Error taxonomy for the polling core.
//!
//! Transport failures and task-reported failures are distinct types so the
//! caller can tell them apart, but the tracker treats both as a failed
//! session. Only board actions surface errors to the user.

use seedwatch_protocol::{AnalysisId, ProgressSnapshot};
use std::fmt;
use thiserror::Error;

/// Failure talking to the server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("base URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),
}

/// Failure of a single progress poll.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The request itself failed
    #[error("progress request failed: {0}")]
    Transport(#[from] ApiError),

    /// The server answered, but the task reports `status: error`
    #[error("task reported an error: {}", remote_message(.0))]
    RemoteTask(Box<ProgressSnapshot>),
}

fn remote_message(snapshot: &ProgressSnapshot) -> &str {
    snapshot
        .message
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or(&snapshot.status_message)
}

/// State-changing action on an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Stop,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Delete => "delete",
        }
    }

    /// Text shown once the server confirms the action.
    pub fn success_message(&self) -> &'static str {
        match self {
            Action::Start => "Analysis started",
            Action::Stop => "Analysis stopped",
            Action::Delete => "Analysis deleted",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a board action (start/stop/delete).
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("unknown analysis {0}")]
    UnknownAnalysis(AnalysisId),

    #[error("Failed to {action} analysis: {message}")]
    ActionRejected { action: Action, message: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}
