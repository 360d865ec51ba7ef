//! Canonical default values shared by the client, tracker, and CLI.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v3/";
pub const DEFAULT_ORGANIZATION_ID: u64 = 1;

/// Delay between progress polls while following an analysis task.
pub const ANALYSIS_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Delay between progress polls for import/export style tasks.
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(750);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Progress value at which a task is considered finished.
pub const PROGRESS_COMPLETE: f64 = 100.0;
