//! Client-side tracking of long-running server jobs.
//!
//! - **client**: the `SeedApi` contract, its reqwest implementation, and
//!   the progress classifier
//! - **progress**: polling one progress key to completion
//! - **lifecycle**: chaining the successive tasks of an analysis
//! - **registry**: at most one live session per analysis
//! - **board**: the analyses collection and its start/stop/delete actions

pub mod board;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod progress;
pub mod registry;

pub use board::{
    AnalysisBoard, AnalysisStore, Notification, NotificationLevel, Notifier, TracingNotifier,
};
pub use cancel::PollingHandle;
pub use client::{HttpSeedClient, ProgressClient, SeedApi};
pub use config::{ConfigError, WatchConfig};
pub use error::{Action, ApiError, BoardError, ProgressError};
pub use lifecycle::{AnalysisLifecycle, LifecycleObserver};
pub use progress::{ProgressScale, ProgressState, ProgressTracker, SubTrack, TrackOutcome};
pub use registry::PollingRegistry;
