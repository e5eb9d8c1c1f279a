//! Operation Log Integration Tests
//!
//! Tests for schema setup, append, per-user ordering and payload decoding.

use serde_json::json;
use spcf::core::OperationLog;
use spcf::domain::{NewOperation, OperationStatus, OperationType};
use tempfile::TempDir;

#[test]
fn test_query_unknown_user_is_empty() {
    let log = OperationLog::in_memory().unwrap();

    let records = log.query_by_user("nobody").unwrap();
    assert!(records.is_empty());
    assert_eq!(log.count_by_user("nobody").unwrap(), 0);
}

#[test]
fn test_query_newest_first() {
    let log = OperationLog::in_memory().unwrap();

    // Append 5 records for one user, interleaved with another user
    for i in 0..5 {
        log.append(
            &NewOperation::new("user_a", OperationType::Custom(format!("STEP_{}", i)))
                .with_output(json!({ "index": i })),
        )
        .unwrap();
        log.append(&NewOperation::new("user_b", OperationType::UserCreated))
            .unwrap();
    }

    let records = log.query_by_user("user_a").unwrap();
    assert_eq!(records.len(), 5);

    let labels: Vec<&str> = records.iter().map(|r| r.operation_type.as_str()).collect();
    assert_eq!(labels, vec!["STEP_4", "STEP_3", "STEP_2", "STEP_1", "STEP_0"]);

    for pair in records.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
        assert!(pair[0].id > pair[1].id);
    }

    assert!(records.iter().all(|r| r.user_id == "user_a"));
}

#[test]
fn test_payload_round_trip() {
    let log = OperationLog::in_memory().unwrap();

    let input = json!({
        "user_identifier": "jane@example.com",
        "nested": { "list": [1, 2, 3], "flag": true },
    });
    let output = json!({ "seed_path": "/data/users/abc/seeds/seed.xml", "length": 42 });

    let appended = log
        .append(
            &NewOperation::new("abc", OperationType::SeedGenerated)
                .in_pipeline("process_seed_from_designer_output")
                .with_input(input.clone())
                .with_output(output.clone())
                .with_notes("ok"),
        )
        .unwrap();

    let records = log.query_by_user("abc").unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record, &appended);
    assert_eq!(
        serde_json::Value::Object(record.input_params.clone().unwrap()),
        input
    );
    assert_eq!(
        serde_json::Value::Object(record.output_ref.clone().unwrap()),
        output
    );
    assert_eq!(
        record.pipeline_name.as_deref(),
        Some("process_seed_from_designer_output")
    );
    assert_eq!(record.notes.as_deref(), Some("ok"));
    assert_eq!(record.status, OperationStatus::Success);
}

#[test]
fn test_status_and_type_stored_as_text() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("spcf.db");
    let log = OperationLog::initialize(&db_path).unwrap();

    log.append(
        &NewOperation::new("u", OperationType::DesignerPrepared)
            .with_status(OperationStatus::PendingLlm),
    )
    .unwrap();
    log.append(
        &NewOperation::new("u", OperationType::ContextFailed)
            .with_status(OperationStatus::Failed)
            .with_notes("Context directory not found"),
    )
    .unwrap();
    drop(log);

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let mut stmt = conn
        .prepare("SELECT operation_type, status FROM operations_log ORDER BY id")
        .unwrap();
    let rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();

    assert_eq!(
        rows,
        vec![
            (
                "DESIGNER_INPUT_PREPARED".to_string(),
                "PENDING_LLM".to_string()
            ),
            (
                "CONTEXT_AGGREGATION_FAILED".to_string(),
                "FAILED".to_string()
            ),
        ]
    );
}

#[test]
fn test_reopen_preserves_records() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("data").join("spcf.db");

    {
        let log = OperationLog::initialize(&db_path).unwrap();
        log.append(&NewOperation::new("u", OperationType::UserCreated))
            .unwrap();
    }

    let log = OperationLog::initialize(&db_path).unwrap();
    log.append(&NewOperation::new("u", OperationType::AssessmentGenerated))
        .unwrap();

    let records = log.query_by_user("u").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].operation_type, OperationType::AssessmentGenerated);
    assert_eq!(records[1].operation_type, OperationType::UserCreated);
}
