//! One polling session per analysis id.

use seedwatch_protocol::{AnalysisId, AnalysisRecord};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::cancel::PollingHandle;
use crate::lifecycle::AnalysisLifecycle;
use crate::progress::ProgressState;

/// Owns the live [`PollingHandle`] of every tracked analysis.
///
/// Starting a session for an id that already has one cancels the old one
/// first, so two sessions never write to the same analysis. Dropping the
/// registry cancels everything it holds.
pub struct PollingRegistry {
    lifecycle: AnalysisLifecycle,
    handles: Mutex<HashMap<AnalysisId, PollingHandle>>,
}

impl PollingRegistry {
    pub fn new(lifecycle: AnalysisLifecycle) -> Self {
        Self {
            lifecycle,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<AnalysisId, PollingHandle>> {
        // A panic elsewhere cannot leave the map half-updated
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// (Re)start following `analysis`.
    ///
    /// The lock is not held while spawning: an idle analysis runs its
    /// observer callback synchronously, and that callback may call back
    /// into the registry.
    pub fn start_tracking(&self, analysis: &AnalysisRecord) {
        let previous = self.handles().remove(&analysis.id);
        if let Some(previous) = previous {
            debug!(analysis = %analysis.id, "Replacing existing polling session");
            previous.cancel();
        }

        let handle = self.lifecycle.spawn(analysis);

        let displaced = self.handles().insert(analysis.id, handle);
        if let Some(displaced) = displaced {
            // Another start for the same id won the race; keep the newest
            displaced.cancel();
        }
    }

    /// Cancel and forget the session for `id`. Returns false if there was none.
    pub fn stop_tracking(&self, id: AnalysisId) -> bool {
        let removed = self.handles().remove(&id);
        match removed {
            Some(handle) => {
                handle.cancel();
                debug!(analysis = %id, "Stopped tracking analysis");
                true
            }
            None => false,
        }
    }

    /// Cancel every session and empty the registry.
    pub fn stop_all(&self) {
        let drained: Vec<PollingHandle> = self.handles().drain().map(|(_, h)| h).collect();
        if drained.is_empty() {
            return;
        }
        for handle in &drained {
            handle.cancel();
        }
        info!("Stopped tracking {} analyses", drained.len());
    }

    /// Whether `id` has a session that is still running.
    pub fn is_tracking(&self, id: AnalysisId) -> bool {
        self.handles()
            .get(&id)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of registered sessions, finished or not.
    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }

    pub fn tracked_ids(&self) -> Vec<AnalysisId> {
        let mut ids: Vec<AnalysisId> = self.handles().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Progress of the task currently followed for `id`.
    pub fn progress(&self, id: AnalysisId) -> Option<watch::Receiver<ProgressState>> {
        self.handles().get(&id).map(PollingHandle::progress)
    }

    /// Wait until every registered session has exited, including ones
    /// started while waiting.
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<_> = self
                .handles()
                .values()
                .filter(|handle| !handle.is_finished())
                .map(PollingHandle::finished_signal)
                .collect();
            if pending.is_empty() {
                return;
            }
            for signal in pending {
                signal.cancelled().await;
            }
        }
    }
}

impl Drop for PollingRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
