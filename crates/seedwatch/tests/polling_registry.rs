//! Registry bookkeeping: one live session per analysis, and full teardown.

mod harness;

use harness::{id, within, wait_until, FakeSeedApi, RecordingObserver};
use seedwatch::{AnalysisLifecycle, PollingRegistry};
use seedwatch_protocol::{AnalysisRecord, AnalysisStatus};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(1500);

fn registry(api: &Arc<FakeSeedApi>) -> PollingRegistry {
    let observer = RecordingObserver::new();
    PollingRegistry::new(AnalysisLifecycle::new(api.clone(), observer).with_interval(INTERVAL))
}

fn running(value: u64) -> AnalysisRecord {
    AnalysisRecord::new(id(value), AnalysisStatus::Running)
}

#[tokio::test(start_paused = true)]
async fn test_restarting_keeps_a_single_live_session() {
    let api = FakeSeedApi::new();
    api.script_keys(id(1), vec![Ok(Some("first")), Ok(Some("second"))]);
    api.script_values("first", &[10.0]);
    api.script_values("second", &[10.0]);
    let registry = registry(&api);

    registry.start_tracking(&running(1));
    wait_until(|| api.progress_calls("first") >= 1).await;

    registry.start_tracking(&running(1));
    wait_until(|| api.progress_calls("second") >= 1).await;

    assert_eq!(registry.len(), 1);
    assert!(registry.is_tracking(id(1)));

    // Only the replacement keeps polling
    let first_polls = api.progress_calls("first");
    let second_polls = api.progress_calls("second");
    tokio::time::sleep(INTERVAL * 4).await;
    assert_eq!(api.progress_calls("first"), first_polls);
    assert!(api.progress_calls("second") >= second_polls + 3);

    registry.stop_all();
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_clears_registry_and_silences_polling() {
    let api = FakeSeedApi::new();
    for value in 1..=3 {
        let key = format!("task-{value}");
        api.script_keys(id(value), vec![Ok(Some(key.as_str()))]);
        api.script_values(&key, &[25.0]);
    }
    let registry = registry(&api);
    for value in 1..=3 {
        registry.start_tracking(&running(value));
    }
    wait_until(|| api.total_progress_calls() >= 6).await;

    registry.stop_all();
    assert!(registry.is_empty());
    assert!(registry.tracked_ids().is_empty());

    let calls = api.call_count();
    tokio::time::sleep(INTERVAL * 20).await;
    assert_eq!(api.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_stop_tracking_single_analysis() {
    let api = FakeSeedApi::new();
    api.script_keys(id(1), vec![Ok(Some("a"))]);
    api.script_keys(id(2), vec![Ok(Some("b"))]);
    api.script_values("a", &[5.0]);
    api.script_values("b", &[5.0]);
    let registry = registry(&api);
    registry.start_tracking(&running(1));
    registry.start_tracking(&running(2));
    wait_until(|| api.progress_calls("a") >= 1 && api.progress_calls("b") >= 1).await;

    assert!(registry.stop_tracking(id(1)));
    assert!(!registry.stop_tracking(id(1)));
    assert_eq!(registry.tracked_ids(), vec![id(2)]);

    let a_polls = api.progress_calls("a");
    let b_polls = api.progress_calls("b");
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(api.progress_calls("a"), a_polls);
    assert!(api.progress_calls("b") > b_polls);

    registry.stop_all();
}

#[tokio::test(start_paused = true)]
async fn test_wait_idle_returns_when_sessions_finish() {
    let api = FakeSeedApi::new();
    api.script_keys(id(1), vec![Ok(Some("a"))]);
    api.script_values("a", &[50.0, 100.0]);
    let registry = registry(&api);

    registry.start_tracking(&running(1));
    registry.start_tracking(&AnalysisRecord::new(id(2), AnalysisStatus::Completed));
    assert!(!registry.is_tracking(id(2)));

    within(registry.wait_idle()).await;

    assert!(!registry.is_tracking(id(1)));
    // Finished sessions stay registered until stopped
    assert_eq!(registry.len(), 2);
    assert_eq!(api.progress_calls("a"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_progress_receiver_tracks_live_session() {
    let api = FakeSeedApi::new();
    api.script_keys(id(4), vec![Ok(Some("a"))]);
    api.script_values("a", &[42.0]);
    let registry = registry(&api);
    registry.start_tracking(&running(4));

    let progress = registry.progress(id(4)).expect("registered");
    wait_until(|| progress.borrow().progress == 42.0).await;
    assert!(registry.progress(id(5)).is_none());

    registry.stop_all();
}

#[tokio::test(start_paused = true)]
async fn test_dropping_registry_cancels_sessions() {
    let api = FakeSeedApi::new();
    api.script_keys(id(1), vec![Ok(Some("a"))]);
    api.script_values("a", &[5.0]);
    let registry = registry(&api);
    registry.start_tracking(&running(1));
    wait_until(|| api.progress_calls("a") >= 1).await;

    drop(registry);

    let polls = api.progress_calls("a");
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(api.progress_calls("a"), polls);
}
