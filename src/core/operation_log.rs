//! Append-only operation log backed by SQLite.
//!
//! A single flat table with indexes on `user_id` and `timestamp`. Each
//! append is an independent insert; there is no update or delete path.

use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::{params, Connection, Row};
use tracing::debug;

use crate::domain::{NewOperation, OperationRecord, OperationStatus, OperationType, Payload};
use crate::error::{Result, ResultExt};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS operations_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    user_id TEXT NOT NULL,
    pipeline_name TEXT,
    operation_type TEXT NOT NULL,
    input_params_json TEXT,
    output_ref_json TEXT,
    status TEXT NOT NULL,
    notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_user_id ON operations_log(user_id);
CREATE INDEX IF NOT EXISTS idx_timestamp ON operations_log(timestamp);
";

/// Timestamp layout; lexical order equals chronological order
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Raw column values of one row, before payload decoding
struct RawRow {
    id: i64,
    timestamp: String,
    user_id: String,
    pipeline_name: Option<String>,
    operation_type: String,
    input_params_json: Option<String>,
    output_ref_json: Option<String>,
    status: String,
    notes: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            user_id: row.get(2)?,
            pipeline_name: row.get(3)?,
            operation_type: row.get(4)?,
            input_params_json: row.get(5)?,
            output_ref_json: row.get(6)?,
            status: row.get(7)?,
            notes: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<OperationRecord> {
        Ok(OperationRecord {
            id: self.id,
            timestamp: self.timestamp,
            user_id: self.user_id,
            pipeline_name: self.pipeline_name,
            operation_type: OperationType::from(self.operation_type),
            input_params: decode_payload(self.input_params_json)?,
            output_ref: decode_payload(self.output_ref_json)?,
            status: self.status.parse::<OperationStatus>()?,
            notes: self.notes,
        })
    }
}

/// SQLite-backed operation log
pub struct OperationLog {
    conn: Connection,

    /// Database file, `None` for in-memory stores
    path: Option<PathBuf>,
}

impl OperationLog {
    /// Open the log at `path`, creating the file and schema if needed.
    ///
    /// Safe to call repeatedly on the same file.
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let log = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        log.ensure_schema()?;

        debug!(path = %path.display(), "Operation log ready");
        Ok(log)
    }

    /// In-memory log, discarded on drop
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .with_context(|| "Failed to open in-memory database")?;

        let log = Self { conn, path: None };
        log.ensure_schema()?;
        Ok(log)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .with_context(|| "Failed to create operations_log schema")
    }

    /// Database file backing this log
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Append a record, returning it with its assigned id and timestamp
    pub fn append(&self, op: &NewOperation) -> Result<OperationRecord> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let input_params_json = encode_payload(op.input_params.as_ref())?;
        let output_ref_json = encode_payload(op.output_ref.as_ref())?;

        self.conn
            .execute(
                "INSERT INTO operations_log
                 (timestamp, user_id, pipeline_name, operation_type, input_params_json,
                  output_ref_json, status, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    timestamp,
                    op.user_id,
                    op.pipeline_name,
                    op.operation_type.as_str(),
                    input_params_json,
                    output_ref_json,
                    op.status.as_str(),
                    op.notes,
                ],
            )
            .with_context(|| format!("Failed to log {} for {}", op.operation_type, op.user_id))?;

        let id = self.conn.last_insert_rowid();
        debug!(
            id,
            user_id = %op.user_id,
            operation_type = %op.operation_type,
            status = %op.status,
            "Operation logged"
        );

        Ok(OperationRecord {
            id,
            timestamp,
            user_id: op.user_id.clone(),
            pipeline_name: op.pipeline_name.clone(),
            operation_type: op.operation_type.clone(),
            input_params: op.input_params.clone().filter(|m| !m.is_empty()),
            output_ref: op.output_ref.clone().filter(|m| !m.is_empty()),
            status: op.status,
            notes: op.notes.clone(),
        })
    }

    /// All records for `user_id`, newest first. Empty when there are none.
    pub fn query_by_user(&self, user_id: &str) -> Result<Vec<OperationRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, user_id, pipeline_name, operation_type,
                        input_params_json, output_ref_json, status, notes
                 FROM operations_log
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC",
            )
            .with_context(|| "Failed to prepare user query")?;

        let rows = stmt
            .query_map(params![user_id], RawRow::from_row)
            .with_context(|| format!("Failed to query operations for {}", user_id))?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.with_context(|| format!("Failed to read operation row for {}", user_id))?;
            records.push(raw.into_record()?);
        }

        Ok(records)
    }

    /// Number of records for `user_id`
    pub fn count_by_user(&self, user_id: &str) -> Result<usize> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM operations_log WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, usize>(0),
            )
            .with_context(|| format!("Failed to count operations for {}", user_id))
    }
}

/// Empty or missing payloads are stored as NULL
fn encode_payload(payload: Option<&Payload>) -> Result<Option<String>> {
    match payload {
        Some(map) if !map.is_empty() => Ok(Some(serde_json::to_string(map)?)),
        _ => Ok(None),
    }
}

fn decode_payload(json: Option<String>) -> Result<Option<Payload>> {
    match json {
        Some(text) if !text.is_empty() => Ok(Some(serde_json::from_str(&text)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactoryError;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_initialize_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("nested").join("spcf.db");

        let first = OperationLog::initialize(&db_path).unwrap();
        first
            .append(&NewOperation::new("user1", OperationType::UserCreated))
            .unwrap();
        drop(first);

        let second = OperationLog::initialize(&db_path).unwrap();
        assert_eq!(second.count_by_user("user1").unwrap(), 1);
        assert_eq!(second.path(), Some(db_path.as_path()));
    }

    #[test]
    fn test_schema_has_indexes() {
        let log = OperationLog::in_memory().unwrap();

        let mut stmt = log
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' ORDER BY name")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        assert!(names.contains(&"idx_user_id".to_string()));
        assert!(names.contains(&"idx_timestamp".to_string()));
    }

    #[test]
    fn test_append_assigns_identity() {
        let log = OperationLog::in_memory().unwrap();

        let first = log
            .append(&NewOperation::new("u", OperationType::UserCreated))
            .unwrap();
        let second = log
            .append(&NewOperation::new("u", OperationType::AssessmentGenerated))
            .unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.timestamp.len(), "2024-01-01 00:00:00.000000".len());
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_empty_payload_stored_as_null() {
        let log = OperationLog::in_memory().unwrap();

        log.append(&NewOperation::new("u", OperationType::UserCreated).with_input(json!({})))
            .unwrap();

        let records = log.query_by_user("u").unwrap();
        assert!(records[0].input_params.is_none());
    }

    #[test]
    fn test_count_by_user() {
        let log = OperationLog::in_memory().unwrap();
        for user in ["a", "b", "a"] {
            log.append(&NewOperation::new(user, OperationType::UserCreated))
                .unwrap();
        }

        assert_eq!(log.count_by_user("a").unwrap(), 2);
        assert_eq!(log.count_by_user("b").unwrap(), 1);
        assert_eq!(log.count_by_user("c").unwrap(), 0);
    }

    #[test]
    fn test_out_of_range_count_is_storage_fault() {
        let log = OperationLog::in_memory().unwrap();

        let err = log
            .conn
            .query_row("SELECT -1", [], |row| row.get::<_, usize>(0))
            .with_context(|| "count")
            .unwrap_err();
        assert!(matches!(err, FactoryError::Storage { .. }));
        assert!(err.is_storage_fault());
    }

    #[test]
    fn test_unknown_status_is_reported() {
        let log = OperationLog::in_memory().unwrap();
        log.conn
            .execute(
                "INSERT INTO operations_log (timestamp, user_id, operation_type, status)
                 VALUES ('2024-01-01 00:00:00.000000', 'u', 'X', 'BOGUS')",
                [],
            )
            .unwrap();

        let result = log.query_by_user("u");
        assert!(matches!(result, Err(FactoryError::InvalidArgument(_))));
    }
}
