//! Backup metadata records and the serialized payload document

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Payload document format version
pub const DOCUMENT_VERSION: u32 = 1;

/// Kind of snapshot held by a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental,
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupKind::Full => write!(f, "full"),
            BackupKind::Incremental => write!(f, "incremental"),
        }
    }
}

/// Lifecycle state of a backup operation. `Running` is never persisted;
/// metadata is written exactly once, at the terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupStatus::Running => write!(f, "running"),
            BackupStatus::Completed => write!(f, "completed"),
            BackupStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted metadata describing one backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Unique identifier, assigned at operation start
    pub id: String,
    pub kind: BackupKind,
    pub status: BackupStatus,
    /// Operation start timestamp
    pub started_at: DateTime<Utc>,
    /// Set at the terminal transition
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    /// Ordered list of tables included in the snapshot
    pub tables: Vec<String>,
    /// Table name to exported row count; keys are a subset of `tables`
    pub record_counts: BTreeMap<String, u64>,
    /// Storage location of the payload
    pub location: String,
    /// Hex SHA-256 digest of the stored payload bytes, computed after
    /// compression and encryption
    pub checksum: String,
    pub size_bytes: u64,
    pub compressed: bool,
    pub encrypted: bool,
    /// Set only when `status` is failed
    pub error: Option<String>,
    /// Extra attempts spent on payload/metadata writes
    pub retry_count: u32,
    pub created_by: String,
    /// Incremental only: lower bound used to filter exported rows
    pub based_on: Option<DateTime<Utc>>,
}

impl BackupRecord {
    /// Create a new record in the `Running` state
    pub fn new(kind: BackupKind, created_by: &str) -> Self {
        let started_at = Utc::now();
        Self {
            id: generate_backup_id(started_at),
            kind,
            status: BackupStatus::Running,
            started_at,
            finished_at: None,
            duration_ms: None,
            tables: Vec::new(),
            record_counts: BTreeMap::new(),
            location: String::new(),
            checksum: String::new(),
            size_bytes: 0,
            compressed: false,
            encrypted: false,
            error: None,
            retry_count: 0,
            created_by: created_by.to_string(),
            based_on: None,
        }
    }

    /// Transition to `Completed`, stamping end time and duration
    pub fn mark_completed(&mut self) {
        let finished_at = Utc::now();
        self.status = BackupStatus::Completed;
        self.duration_ms = Some(duration_ms_between(self.started_at, finished_at));
        self.finished_at = Some(finished_at);
    }

    /// Transition to `Failed`, stamping end time and the failure message
    pub fn mark_failed(&mut self, error: String) {
        let finished_at = Utc::now();
        self.status = BackupStatus::Failed;
        self.error = Some(error);
        self.duration_ms = Some(duration_ms_between(self.started_at, finished_at));
        self.finished_at = Some(finished_at);
    }

    /// Whole days elapsed since the backup started
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_days()
    }

    /// Total rows recorded across all counted tables
    pub fn total_records(&self) -> u64 {
        self.record_counts.values().sum()
    }
}

/// Generate a backup identifier: `backup-<RFC3339 millis>-<8 hex>`
pub fn generate_backup_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "backup-{}-{}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        &suffix[..8]
    )
}

fn duration_ms_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

/// The self-describing document serialized into the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub metadata: DocumentMetadata,
    /// Table name to exported rows
    pub data: BTreeMap<String, Vec<serde_json::Value>>,
    /// Placeholder descriptors kept for forward compatibility; never
    /// populated by real introspection
    pub schema: BTreeMap<String, TableSchema>,
}

/// Header block embedded in the payload document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub version: u32,
    pub backup_id: String,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    pub tables: Vec<String>,
    pub based_on: Option<DateTime<Utc>>,
}

/// Empty column/index/constraint descriptors for one table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<String>,
    pub indexes: Vec<String>,
    pub constraints: Vec<String>,
}

impl BackupDocument {
    /// Create an empty document for the given record
    pub fn new(record: &BackupRecord) -> Self {
        Self {
            metadata: DocumentMetadata {
                version: DOCUMENT_VERSION,
                backup_id: record.id.clone(),
                kind: record.kind,
                created_at: record.started_at,
                tables: record.tables.clone(),
                based_on: record.based_on,
            },
            data: BTreeMap::new(),
            schema: BTreeMap::new(),
        }
    }

    /// Record a table's exported rows along with its schema placeholder
    pub fn insert_table(&mut self, table: &str, rows: Vec<serde_json::Value>) {
        self.data.insert(table.to_string(), rows);
        self.schema.insert(table.to_string(), TableSchema::default());
    }

    /// Total rows across all tables in the document
    pub fn total_rows(&self) -> u64 {
        self.data.values().map(|rows| rows.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backup_id_format() {
        let at = Utc::now();
        let id = generate_backup_id(at);

        assert!(id.starts_with("backup-"));
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.contains(&at.to_rfc3339_opts(SecondsFormat::Millis, true)));
    }

    #[test]
    fn test_backup_ids_are_unique() {
        let at = Utc::now();
        assert_ne!(generate_backup_id(at), generate_backup_id(at));
    }

    #[test]
    fn test_new_record_is_running() {
        let record = BackupRecord::new(BackupKind::Full, "tester");
        assert_eq!(record.status, BackupStatus::Running);
        assert!(record.finished_at.is_none());
        assert!(record.error.is_none());
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn test_terminal_transitions() {
        let mut record = BackupRecord::new(BackupKind::Full, "tester");
        record.mark_completed();
        assert_eq!(record.status, BackupStatus::Completed);
        assert!(record.finished_at.is_some());
        assert!(record.duration_ms.is_some());

        let mut record = BackupRecord::new(BackupKind::Incremental, "tester");
        record.mark_failed("boom".to_string());
        assert_eq!(record.status, BackupStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let mut record = BackupRecord::new(BackupKind::Incremental, "tester");
        record.mark_completed();

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"completed\""));
        assert!(json.contains("\"kind\":\"incremental\""));
    }

    #[test]
    fn test_document_row_accounting() {
        let mut record = BackupRecord::new(BackupKind::Full, "tester");
        record.tables = vec!["clients".to_string(), "deals".to_string()];

        let mut doc = BackupDocument::new(&record);
        doc.insert_table("clients", vec![serde_json::json!({"id": 1})]);
        doc.insert_table("deals", Vec::new());

        assert_eq!(doc.total_rows(), 1);
        assert!(doc.schema.contains_key("clients"));
        assert!(doc.schema["deals"].columns.is_empty());
    }
}
