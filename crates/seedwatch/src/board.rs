//! The caller's view of an organization's analyses.
//!
//! [`AnalysisStore`] holds the records and is what lifecycle sessions report
//! back into. [`AnalysisBoard`] adds the user actions (start, stop, delete)
//! and keeps tracking in step with them.

use async_trait::async_trait;
use seedwatch_protocol::{AnalysisId, AnalysisRecord, AnalysisStatus, ProgressKey};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::client::SeedApi;
use crate::error::{Action, ApiError, BoardError};
use crate::lifecycle::{AnalysisLifecycle, LifecycleObserver};
use crate::registry::PollingRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Primary,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn primary(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Primary,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Receives user-facing action notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Primary => info!("{}", notification.message),
            NotificationLevel::Error => error!("{}", notification.message),
        }
    }
}

/// Ordered collection of analysis records shared with lifecycle sessions.
#[derive(Clone)]
pub struct AnalysisStore {
    api: Arc<dyn SeedApi>,
    records: Arc<Mutex<Vec<AnalysisRecord>>>,
}

impl AnalysisStore {
    pub fn new(api: Arc<dyn SeedApi>) -> Self {
        Self {
            api,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn records(&self) -> MutexGuard<'_, Vec<AnalysisRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Vec<AnalysisRecord> {
        self.records().clone()
    }

    pub fn get(&self, id: AnalysisId) -> Option<AnalysisRecord> {
        self.records().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Replace all records, e.g. after listing the organization.
    pub fn set_all(&self, records: Vec<AnalysisRecord>) {
        *self.records() = records;
    }

    /// Insert or replace by id. Returns false if the record was new.
    pub fn upsert(&self, record: AnalysisRecord) -> bool {
        let mut records = self.records();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                records.push(record);
                false
            }
        }
    }

    /// Replace an existing record in place. Records no longer present
    /// (deleted meanwhile) are not re-added.
    pub fn replace(&self, record: AnalysisRecord) -> bool {
        let mut records = self.records();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                // Client-only flag survives a server refresh
                let finished = existing.finished_with_tasks;
                *existing = AnalysisRecord {
                    finished_with_tasks: finished,
                    ..record
                };
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: AnalysisId) -> Option<AnalysisRecord> {
        let mut records = self.records();
        let index = records.iter().position(|r| r.id == id)?;
        Some(records.remove(index))
    }

    /// Set the status, returning the previous one.
    pub fn set_status(&self, id: AnalysisId, status: AnalysisStatus) -> Option<AnalysisStatus> {
        let mut records = self.records();
        let record = records.iter_mut().find(|r| r.id == id)?;
        Some(std::mem::replace(&mut record.status, status))
    }

    pub fn set_finished_with_tasks(&self, id: AnalysisId, finished: bool) {
        if let Some(record) = self.records().iter_mut().find(|r| r.id == id) {
            record.finished_with_tasks = finished;
        }
    }
}

#[async_trait]
impl LifecycleObserver for AnalysisStore {
    async fn refresh(&self, id: AnalysisId) -> Result<AnalysisRecord, ApiError> {
        let record = self.api.get_analysis(id).await?;
        self.replace(record.clone());
        Ok(record)
    }

    fn on_task_started(&self, id: AnalysisId, _key: &ProgressKey) {
        self.set_finished_with_tasks(id, false);
    }

    fn on_no_current_task(&self, id: AnalysisId) {
        self.set_finished_with_tasks(id, true);
    }
}

/// Analyses of one organization, kept in sync with their server tasks.
pub struct AnalysisBoard {
    api: Arc<dyn SeedApi>,
    store: AnalysisStore,
    registry: PollingRegistry,
    notifier: Arc<dyn Notifier>,
}

impl AnalysisBoard {
    pub fn new(
        api: Arc<dyn SeedApi>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        let store = AnalysisStore::new(api.clone());
        let lifecycle = AnalysisLifecycle::new(api.clone(), Arc::new(store.clone()))
            .with_interval(poll_interval);
        Self {
            api,
            store,
            registry: PollingRegistry::new(lifecycle),
            notifier,
        }
    }

    pub fn store(&self) -> &AnalysisStore {
        &self.store
    }

    pub fn registry(&self) -> &PollingRegistry {
        &self.registry
    }

    pub fn records(&self) -> Vec<AnalysisRecord> {
        self.store.snapshot()
    }

    /// Fetch every analysis of the organization and follow each of them.
    pub async fn load(&self) -> Result<usize, BoardError> {
        let records = self.api.list_analyses().await?;
        let count = records.len();
        self.store.set_all(records);
        self.track_all();
        info!("Loaded {} analyses", count);
        Ok(count)
    }

    /// Fetch the given analyses and follow them.
    pub async fn load_ids(&self, ids: &[AnalysisId]) -> Result<usize, BoardError> {
        for &id in ids {
            let record = self.api.get_analysis(id).await?;
            self.store.upsert(record.clone());
            self.registry.start_tracking(&record);
        }
        Ok(ids.len())
    }

    /// Add (or replace) a record and start following it.
    pub fn insert(&self, record: AnalysisRecord) {
        self.store.upsert(record.clone());
        self.registry.start_tracking(&record);
    }

    pub fn track_all(&self) {
        for record in self.store.snapshot() {
            self.registry.start_tracking(&record);
        }
    }

    pub async fn start(&self, id: AnalysisId) -> Result<AnalysisRecord, BoardError> {
        self.run_action(Action::Start, id).await?;
        self.refresh_and_track(id).await
    }

    pub async fn stop(&self, id: AnalysisId) -> Result<AnalysisRecord, BoardError> {
        self.run_action(Action::Stop, id).await?;
        self.refresh_and_track(id).await
    }

    /// Delete on the server; the record leaves the board only once confirmed.
    pub async fn delete(&self, id: AnalysisId) -> Result<(), BoardError> {
        self.run_action(Action::Delete, id).await?;
        self.registry.stop_tracking(id);
        self.store.remove(id);
        Ok(())
    }

    /// Cancel all polling. Call once when the board's owner goes away.
    pub fn shutdown(&self) {
        self.registry.stop_all();
    }

    /// Show the in-progress status, send the request, then confirm or roll
    /// the status back and report the server's message.
    async fn run_action(&self, action: Action, id: AnalysisId) -> Result<(), BoardError> {
        let pending = match action {
            Action::Start => AnalysisStatus::Starting,
            Action::Stop => AnalysisStatus::Stopping,
            Action::Delete => AnalysisStatus::Deleting,
        };
        let previous = self
            .store
            .set_status(id, pending)
            .ok_or(BoardError::UnknownAnalysis(id))?;

        let result = match action {
            Action::Start => self.api.start_analysis(id).await,
            Action::Stop => self.api.stop_analysis(id).await,
            Action::Delete => self.api.delete_analysis(id).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(analysis = %id, error = %err, "{} request failed", action);
                self.store.set_status(id, previous);
                self.notifier.notify(Notification::error(format!(
                    "Failed to {} analysis: {}",
                    action, err
                )));
                return Err(err.into());
            }
        };

        if response.is_success() {
            info!(analysis = %id, "{} confirmed", action);
            self.notifier
                .notify(Notification::primary(action.success_message()));
            return Ok(());
        }

        let message = response
            .message
            .unwrap_or_else(|| "unknown error".to_string());
        warn!(analysis = %id, "{} rejected: {}", action, message);
        self.store.set_status(id, previous);
        let err = BoardError::ActionRejected { action, message };
        self.notifier.notify(Notification::error(err.to_string()));
        Err(err)
    }

    async fn refresh_and_track(&self, id: AnalysisId) -> Result<AnalysisRecord, BoardError> {
        let record = self.api.get_analysis(id).await?;
        self.store.replace(record.clone());
        self.registry.start_tracking(&record);
        Ok(record)
    }
}
