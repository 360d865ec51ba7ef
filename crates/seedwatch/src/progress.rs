//! Progress tracking for a single server task.
//!
//! A tracking session polls one [`ProgressKey`] until the task reports
//! completion, fails, or the session is cancelled:
//!
//! ```text
//! Polling --(progress >= 100)--> Done(snapshot)
//!    |  \--(fetch error)-------> Failed(error)
//!    \-----(token cancelled)---> Cancelled
//! ```
//!
//! The delay before each poll starts only after the previous request has
//! finished, so there is never more than one request in flight per key.
//! Every successful poll publishes a fresh [`ProgressState`] on a
//! `tokio::sync::watch` channel.

use chrono::{DateTime, Utc};
use seedwatch_protocol::{ProgressKey, ProgressSnapshot};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::ProgressClient;
use crate::error::ProgressError;

/// Linear mapping of a task's 0..100 progress onto a display bar.
///
/// Used when one bar spans several server tasks, e.g. offset 50 and
/// multiplier 0.5 places a task in the second half of the bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressScale {
    pub offset: f64,
    pub multiplier: f64,
}

impl ProgressScale {
    pub const IDENTITY: ProgressScale = ProgressScale {
        offset: 0.0,
        multiplier: 1.0,
    };

    pub fn new(offset: f64, multiplier: f64) -> Self {
        Self { offset, multiplier }
    }

    /// Scaled value clamped to [0, 100]. NaN maps to 0.
    pub fn apply(&self, progress: f64) -> f64 {
        let scaled = progress * self.multiplier + self.offset;
        if scaled.is_nan() {
            return 0.0;
        }
        scaled.clamp(0.0, 100.0)
    }
}

impl Default for ProgressScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Display state of one progress bar.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProgressState {
    pub progress: f64,
    pub status_message: String,
    pub total_records: Option<u64>,
    pub completed_records: Option<u64>,
    /// Time of the most recent successful poll
    pub progress_last_checked: Option<DateTime<Utc>>,
    /// Time the progress value or message last changed
    pub progress_last_updated: Option<DateTime<Utc>>,
}

impl ProgressState {
    /// State after observing `snapshot` at `now`.
    ///
    /// Record counts are only overwritten when the snapshot carries them.
    pub fn apply(
        &self,
        snapshot: &ProgressSnapshot,
        scale: ProgressScale,
        now: DateTime<Utc>,
    ) -> Self {
        let progress = scale.apply(snapshot.progress);
        let changed = progress != self.progress || snapshot.status_message != self.status_message;

        Self {
            progress,
            status_message: snapshot.status_message.clone(),
            total_records: snapshot.total_records.or(self.total_records),
            completed_records: snapshot.completed_records.or(self.completed_records),
            progress_last_checked: Some(now),
            progress_last_updated: if changed {
                Some(now)
            } else {
                self.progress_last_updated
            },
        }
    }
}

/// Terminal state of a tracking session.
#[derive(Debug)]
pub enum TrackOutcome {
    /// The main task reached 100; carries its final snapshot
    Done(ProgressSnapshot),
    /// A poll failed (transport or task error); polling stopped
    Failed(ProgressError),
    /// The session's token was cancelled
    Cancelled,
}

impl TrackOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TrackOutcome::Done(_))
    }
}

/// Secondary bar followed alongside a main task.
pub struct SubTrack<'a> {
    pub key: &'a ProgressKey,
    pub scale: ProgressScale,
    pub state: &'a watch::Sender<ProgressState>,
}

/// Drives tracking sessions against a [`ProgressClient`].
#[derive(Clone)]
pub struct ProgressTracker {
    client: ProgressClient,
    interval: Duration,
    scale: ProgressScale,
    cancel: CancellationToken,
}

impl ProgressTracker {
    pub fn new(client: ProgressClient, interval: Duration) -> Self {
        Self {
            client,
            interval,
            scale: ProgressScale::IDENTITY,
            cancel: CancellationToken::new(),
        }
    }

    /// Scale applied to the main task's progress.
    pub fn with_scale(mut self, scale: ProgressScale) -> Self {
        self.scale = scale;
        self
    }

    /// Stop polling when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Poll `key` until it completes, fails, or is cancelled.
    pub async fn track(
        &self,
        key: &ProgressKey,
        state: &watch::Sender<ProgressState>,
    ) -> TrackOutcome {
        self.track_main_sub(key, state, None).await
    }

    /// Poll a main task and, optionally, a sub task in lockstep.
    ///
    /// Both keys are fetched together every round until the main task
    /// reaches 100. The sub task's own completion ends nothing: it keeps
    /// being polled, and a sub task still below 100 when the main one
    /// finishes is simply left where it is.
    pub async fn track_main_sub(
        &self,
        main: &ProgressKey,
        main_state: &watch::Sender<ProgressState>,
        sub: Option<SubTrack<'_>>,
    ) -> TrackOutcome {
        debug!(key = %main, sub = ?sub.as_ref().map(|s| s.key), "Tracking progress");

        loop {
            if !self.wait_for_next_poll().await {
                debug!(key = %main, "Progress tracking cancelled");
                return TrackOutcome::Cancelled;
            }

            let (main_result, sub_result) = match &sub {
                Some(track) => {
                    let (main_result, sub_result) =
                        tokio::join!(self.client.fetch(main), self.client.fetch(track.key));
                    (main_result, Some(sub_result))
                }
                None => (self.client.fetch(main).await, None),
            };

            let main_snapshot = match main_result {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    debug!(key = %main, error = %err, "Progress poll failed");
                    return TrackOutcome::Failed(err);
                }
            };
            let sub_snapshot = match sub_result.transpose() {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    debug!(key = %main, error = %err, "Sub progress poll failed");
                    return TrackOutcome::Failed(err);
                }
            };

            publish(main_state, &main_snapshot, self.scale);
            debug!(
                key = %main,
                progress = main_snapshot.progress,
                message = %main_snapshot.status_message,
                "Progress polled"
            );

            // A request already in flight when the token fired still lands
            // above; nothing after it runs.
            if self.cancel.is_cancelled() {
                return TrackOutcome::Cancelled;
            }

            if main_snapshot.is_complete() {
                return TrackOutcome::Done(main_snapshot);
            }

            if let (Some(track), Some(snapshot)) = (&sub, &sub_snapshot) {
                publish(track.state, snapshot, track.scale);
            }
        }
    }

    /// Sleep one interval. Returns false if cancelled before or during it.
    async fn wait_for_next_poll(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.interval) => !self.cancel.is_cancelled(),
        }
    }
}

fn publish(
    state: &watch::Sender<ProgressState>,
    snapshot: &ProgressSnapshot,
    scale: ProgressScale,
) {
    let next = state.borrow().apply(snapshot, scale, Utc::now());
    state.send_replace(next);
}
