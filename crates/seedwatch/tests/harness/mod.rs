//! Shared fixtures for the seedwatch integration tests.
//!
//! `FakeSeedApi` answers from scripted queues and records every call, so
//! tests can assert on exactly which requests were (or were not) made.

#![allow(dead_code)]

use async_trait::async_trait;
use seedwatch::{Action, ApiError, LifecycleObserver, Notification, Notifier, SeedApi};
use seedwatch_protocol::{
    ActionResponse, AnalysisId, AnalysisRecord, AnalysisStatus, ProgressKey, ProgressSnapshot,
    ProgressStatus,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// A request seen by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Progress(String),
    ProgressKey(AnalysisId),
    Analysis(AnalysisId),
    List,
    Action(AnalysisId, Action),
}

type Scripted<T> = VecDeque<Result<T, u16>>;

#[derive(Default)]
struct FakeState {
    progress: HashMap<String, Scripted<ProgressSnapshot>>,
    keys: HashMap<AnalysisId, Scripted<Option<ProgressKey>>>,
    analyses: Vec<AnalysisRecord>,
    actions: HashMap<(AnalysisId, Action), Scripted<ActionResponse>>,
    calls: Vec<Call>,
}

/// In-memory server.
///
/// - progress: one queue per key; the last entry repeats forever
/// - progress keys: one queue per analysis; `None` once exhausted
/// - actions: one queue per (analysis, action); success once exhausted
///
/// A scripted `Err(status)` becomes `ApiError::Status`. Unknown progress
/// keys and analyses answer 404.
#[derive(Default)]
pub struct FakeSeedApi {
    state: Mutex<FakeState>,
    progress_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeSeedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn script_progress(&self, key: &str, responses: Vec<Result<ProgressSnapshot, u16>>) {
        self.state()
            .progress
            .insert(key.to_string(), responses.into_iter().collect());
    }

    /// Shorthand for a key whose task advances through `values`.
    pub fn script_values(&self, key: &str, values: &[f64]) {
        self.script_progress(key, values.iter().map(|&p| Ok(snapshot(p))).collect());
    }

    pub fn script_keys(&self, id: AnalysisId, keys: Vec<Result<Option<&str>, u16>>) {
        let queue = keys
            .into_iter()
            .map(|k| k.map(|k| k.map(ProgressKey::from)))
            .collect();
        self.state().keys.insert(id, queue);
    }

    pub fn script_action(
        &self,
        id: AnalysisId,
        action: Action,
        response: Result<ActionResponse, u16>,
    ) {
        self.state()
            .actions
            .entry((id, action))
            .or_default()
            .push_back(response);
    }

    pub fn put_analysis(&self, record: AnalysisRecord) {
        let mut state = self.state();
        match state.analyses.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => state.analyses.push(record),
        }
    }

    pub fn set_status(&self, id: AnalysisId, status: AnalysisStatus) {
        if let Some(record) = self.state().analyses.iter_mut().find(|r| r.id == id) {
            record.status = status;
        }
    }

    /// Make progress requests wait for a permit on the returned semaphore.
    /// The call is logged before waiting.
    pub fn hold_progress(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.progress_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn progress_calls(&self, key: &str) -> usize {
        self.count(|c| matches!(c, Call::Progress(k) if k == key))
    }

    pub fn total_progress_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Progress(_)))
    }

    pub fn key_calls(&self, id: AnalysisId) -> usize {
        self.count(|c| *c == Call::ProgressKey(id))
    }

    pub fn analysis_calls(&self, id: AnalysisId) -> usize {
        self.count(|c| *c == Call::Analysis(id))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    fn act(&self, id: AnalysisId, action: Action) -> Result<ActionResponse, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::Action(id, action));
        let scripted = state
            .actions
            .get_mut(&(id, action))
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(ActionResponse::success()));
        scripted.map_err(status_error)
    }
}

fn status_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        body: String::new(),
    }
}

#[async_trait]
impl SeedApi for FakeSeedApi {
    async fn get_progress(&self, key: &ProgressKey) -> Result<ProgressSnapshot, ApiError> {
        self.record(Call::Progress(key.as_str().to_string()));

        let gate = self.progress_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let mut state = self.state();
        let Some(queue) = state.progress.get_mut(key.as_str()) else {
            return Err(status_error(404));
        };
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.unwrap_or(Err(404)).map_err(status_error)
    }

    async fn get_progress_key(&self, id: AnalysisId) -> Result<Option<ProgressKey>, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::ProgressKey(id));
        state
            .keys
            .get_mut(&id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(None))
            .map_err(status_error)
    }

    async fn get_analysis(&self, id: AnalysisId) -> Result<AnalysisRecord, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::Analysis(id));
        state
            .analyses
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisRecord>, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::List);
        Ok(state.analyses.clone())
    }

    async fn start_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError> {
        self.act(id, Action::Start)
    }

    async fn stop_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError> {
        self.act(id, Action::Stop)
    }

    async fn delete_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError> {
        self.act(id, Action::Delete)
    }
}

/// Lifecycle callback as seen by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    TaskStarted(AnalysisId, String),
    Refresh(AnalysisId),
    NoTask(AnalysisId),
}

/// Logs lifecycle callbacks in order. Refresh answers with a record in
/// `refresh_status`, or fails with 500 if `fail_refresh` is set.
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
    pub refresh_status: AnalysisStatus,
    pub fail_refresh: bool,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            refresh_status: AnalysisStatus::Running,
            fail_refresh: false,
        })
    }

    pub fn failing_refresh() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            refresh_status: AnalysisStatus::Running,
            fail_refresh: true,
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl LifecycleObserver for RecordingObserver {
    async fn refresh(&self, id: AnalysisId) -> Result<AnalysisRecord, ApiError> {
        self.push(Event::Refresh(id));
        if self.fail_refresh {
            return Err(status_error(500));
        }
        Ok(AnalysisRecord::new(id, self.refresh_status.clone()))
    }

    fn on_task_started(&self, id: AnalysisId, key: &ProgressKey) {
        self.push(Event::TaskStarted(id, key.as_str().to_string()));
    }

    fn on_no_current_task(&self, id: AnalysisId) {
        self.push(Event::NoTask(id));
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

pub fn snapshot(progress: f64) -> ProgressSnapshot {
    ProgressSnapshot {
        progress,
        status_message: format!("at {progress}"),
        ..Default::default()
    }
}

pub fn failed_snapshot(message: &str) -> ProgressSnapshot {
    ProgressSnapshot {
        status: ProgressStatus::Error,
        message: Some(message.to_string()),
        ..Default::default()
    }
}

pub fn id(value: u64) -> AnalysisId {
    AnalysisId::new(value)
}

/// Poll `condition` every 10ms of (possibly paused) time, up to a minute.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Await `future` with a generous timeout.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(300), future)
        .await
        .expect("future did not complete in time")
}
