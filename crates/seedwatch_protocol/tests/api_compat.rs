//! API Compatibility Tests
//!
//! These tests pin the JSON shapes the server actually emits so that a
//! change to the wire types is caught before it reaches the tracker.

use seedwatch_protocol::*;

/// A progress record as written by the server's import pipeline.
#[test]
fn test_import_progress_payload() {
    let json = r#"{
        "status": "parsing",
        "status_message": "Saving data",
        "progress": 37.5,
        "progress_key": ":1:SEED:save_raw_data:PROG:12",
        "total": 200,
        "total_records": 200,
        "completed_records": 75,
        "unique_id": 12
    }"#;

    let snapshot: ProgressSnapshot = serde_json::from_str(json).unwrap();
    assert_eq!(snapshot.status, ProgressStatus::Ok);
    assert_eq!(snapshot.status_message, "Saving data");
    assert_eq!(snapshot.total_records, Some(200));
    assert_eq!(snapshot.completed_records, Some(75));
    assert_eq!(
        snapshot.progress_key,
        Some(ProgressKey::new(":1:SEED:save_raw_data:PROG:12"))
    );
}

/// A failed task reports `status: error` with a message.
#[test]
fn test_error_progress_payload() {
    let json = r#"{"status": "error", "message": "Invalid file", "progress": 100}"#;
    let snapshot: ProgressSnapshot = serde_json::from_str(json).unwrap();
    assert!(snapshot.is_error());
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.message.as_deref(), Some("Invalid file"));
}

#[test]
fn test_progress_key_response_null() {
    let resp: ProgressKeyResponse =
        serde_json::from_str(r#"{"status": "success", "progress_key": null}"#).unwrap();
    assert!(resp.progress_key.is_none());

    let resp: ProgressKeyResponse =
        serde_json::from_str(r#"{"status": "success", "progress_key": "abc"}"#).unwrap();
    assert_eq!(resp.progress_key, Some(ProgressKey::from("abc")));
}

#[test]
fn test_analysis_envelopes() {
    let single = r#"{"status": "success", "analysis": {"id": 3, "status": "Queued"}}"#;
    let envelope: AnalysisEnvelope = serde_json::from_str(single).unwrap();
    assert_eq!(envelope.analysis.id, AnalysisId::new(3));
    assert_eq!(envelope.analysis.status, AnalysisStatus::Queued);

    let list = r#"{
        "status": "success",
        "analyses": [
            {"id": 1, "status": "Completed"},
            {"id": 2, "status": "Queued for stop"}
        ]
    }"#;
    let envelope: AnalysesEnvelope = serde_json::from_str(list).unwrap();
    assert_eq!(envelope.analyses.len(), 2);
    assert!(envelope.analyses[0].status.is_idle());
    assert_eq!(envelope.analyses[1].status, AnalysisStatus::QueuedForStop);
}

#[test]
fn test_action_responses() {
    let ok: ActionResponse = serde_json::from_str(r#"{"status": "success"}"#).unwrap();
    assert!(ok.is_success());

    let err: ActionResponse =
        serde_json::from_str(r#"{"status": "error", "message": "Analysis is not ready"}"#)
            .unwrap();
    assert_eq!(err, ActionResponse::error("Analysis is not ready"));
}

/// Status strings must survive a serialize/deserialize cycle unchanged,
/// including ones this client does not recognise.
#[test]
fn test_unknown_status_is_preserved() {
    let record: AnalysisRecord =
        serde_json::from_str(r#"{"id": 9, "status": "Paused"}"#).unwrap();
    assert_eq!(record.status, AnalysisStatus::Unknown("Paused".to_string()));

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["status"], "Paused");
}
