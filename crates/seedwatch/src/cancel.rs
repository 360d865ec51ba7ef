use seedwatch_protocol::AnalysisId;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressState;

/// Owned handle to one analysis's polling session.
///
/// Cancellation is cooperative: the session stops at its next checkpoint,
/// it is never aborted mid-request. Dropping the handle cancels the session.
#[derive(Debug)]
pub struct PollingHandle {
    id: AnalysisId,
    cancel: CancellationToken,
    /// Cancelled by the session itself when it exits, for any reason
    done: CancellationToken,
    progress: watch::Receiver<ProgressState>,
}

impl PollingHandle {
    pub(crate) fn new(
        id: AnalysisId,
        cancel: CancellationToken,
        done: CancellationToken,
        progress: watch::Receiver<ProgressState>,
    ) -> Self {
        Self {
            id,
            cancel,
            done,
            progress,
        }
    }

    /// Handle for a session that never started (idle analysis).
    pub(crate) fn finished(id: AnalysisId) -> Self {
        let done = CancellationToken::new();
        done.cancel();
        let (_, progress) = watch::channel(ProgressState::default());
        Self::new(id, CancellationToken::new(), done, progress)
    }

    pub fn id(&self) -> AnalysisId {
        self.id
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the session has exited.
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Live view of the current task's progress.
    pub fn progress(&self) -> watch::Receiver<ProgressState> {
        self.progress.clone()
    }

    /// Resolves once the session has exited.
    pub fn finished_signal(&self) -> CancellationToken {
        self.done.clone()
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
