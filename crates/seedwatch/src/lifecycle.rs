//! Follows one analysis through its sequence of background tasks.
//!
//! An analysis run may consist of several server tasks executed one after
//! another, each with its own progress key. A lifecycle session asks for the
//! current key, tracks it to completion, refreshes the analysis, and asks
//! again, until the server reports that no task is running.

use async_trait::async_trait;
use seedwatch_protocol::defaults::ANALYSIS_POLL_INTERVAL;
use seedwatch_protocol::{AnalysisId, AnalysisRecord, ProgressKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::PollingHandle;
use crate::client::{ProgressClient, SeedApi};
use crate::error::ApiError;
use crate::progress::{ProgressState, ProgressTracker, TrackOutcome};

/// Caller-side hooks invoked by a lifecycle session.
///
/// None of these fire after the session has been cancelled.
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Re-fetch the analysis and replace the caller's copy.
    /// Called after every task that completes or fails.
    async fn refresh(&self, id: AnalysisId) -> Result<AnalysisRecord, ApiError>;

    /// A task was found and is about to be polled.
    fn on_task_started(&self, _id: AnalysisId, _key: &ProgressKey) {}

    /// The analysis has no task to follow (idle, finished, or failed).
    fn on_no_current_task(&self, id: AnalysisId);
}

/// Spawns lifecycle sessions for analyses.
#[derive(Clone)]
pub struct AnalysisLifecycle {
    api: Arc<dyn SeedApi>,
    observer: Arc<dyn LifecycleObserver>,
    interval: Duration,
}

impl AnalysisLifecycle {
    pub fn new(api: Arc<dyn SeedApi>, observer: Arc<dyn LifecycleObserver>) -> Self {
        Self {
            api,
            observer,
            interval: ANALYSIS_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start following `analysis`. Must be called inside a tokio runtime.
    ///
    /// Idle analyses are reported through `on_no_current_task` right away
    /// and get an already-finished handle; no request is made.
    pub fn spawn(&self, analysis: &AnalysisRecord) -> PollingHandle {
        let id = analysis.id;
        if analysis.status.is_idle() {
            debug!(analysis = %id, status = %analysis.status, "Analysis idle, not polling");
            self.observer.on_no_current_task(id);
            return PollingHandle::finished(id);
        }

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let (progress_tx, progress_rx) = watch::channel(ProgressState::default());

        let session = self.clone();
        let session_cancel = cancel.clone();
        let done_guard = done.clone().drop_guard();
        tokio::spawn(async move {
            let _done = done_guard;
            session.run(id, session_cancel, progress_tx).await;
        });

        info!(analysis = %id, status = %analysis.status, "Started tracking analysis");
        PollingHandle::new(id, cancel, done, progress_rx)
    }

    async fn run(
        &self,
        id: AnalysisId,
        cancel: CancellationToken,
        progress: watch::Sender<ProgressState>,
    ) {
        let tracker = ProgressTracker::new(ProgressClient::new(self.api.clone()), self.interval)
            .with_cancellation(cancel.clone());

        loop {
            if cancel.is_cancelled() {
                return;
            }

            // A failed key request reads the same as "no task": the analysis
            // most likely went idle between the status check and this call.
            let key = match self.api.get_progress_key(id).await {
                Ok(key) => key,
                Err(err) => {
                    warn!(analysis = %id, error = %err, "Failed to fetch progress key");
                    None
                }
            };
            if cancel.is_cancelled() {
                return;
            }

            let Some(key) = key else {
                debug!(analysis = %id, "No current task");
                self.observer.on_no_current_task(id);
                return;
            };

            debug!(analysis = %id, key = %key, "Following task");
            self.observer.on_task_started(id, &key);
            progress.send_replace(ProgressState::default());

            match tracker.track(&key, &progress).await {
                TrackOutcome::Done(_) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    self.refresh(id).await;
                }
                TrackOutcome::Failed(err) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    warn!(analysis = %id, key = %key, error = %err, "Task tracking failed");
                    self.refresh(id).await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    self.observer.on_no_current_task(id);
                    return;
                }
                TrackOutcome::Cancelled => return,
            }
        }
    }

    async fn refresh(&self, id: AnalysisId) {
        match self.observer.refresh(id).await {
            Ok(record) => debug!(analysis = %id, status = %record.status, "Analysis refreshed"),
            Err(err) => warn!(analysis = %id, error = %err, "Failed to refresh analysis"),
        }
    }
}
