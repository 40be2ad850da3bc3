//! Table store access trait and the in-memory implementation
//!
//! The engine never talks to a database directly; it goes through the
//! [`TableStore`] trait so the relational backend stays swappable. The
//! in-memory store backs tests and the CLI demo mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Modification timestamp column used to filter incremental exports
pub const MODIFIED_COLUMN: &str = "updated_at";

/// Errors reported by a table store. `MissingColumn` is carried as its own
/// variant so callers can tolerate it without inspecting message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableStoreError {
    #[error("column {column} does not exist on table {table}")]
    MissingColumn { table: String, column: String },

    #[error("query failed on table {table}: {reason}")]
    Query { table: String, reason: String },
}

/// One table's exported rows plus the store-reported exact count
#[derive(Debug, Clone)]
pub struct TableFetch {
    pub rows: Vec<Value>,
    pub count: u64,
}

/// Async access to the relational store, scoped per table
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fetch all rows of a table, optionally restricted to rows whose
    /// modification timestamp is at or after `modified_since`.
    async fn fetch_rows(
        &self,
        table: &str,
        modified_since: Option<DateTime<Utc>>,
    ) -> Result<TableFetch, TableStoreError>;

    /// Delete every row of a table, returning how many were removed.
    async fn delete_all(&self, table: &str) -> Result<u64, TableStoreError>;

    /// Insert a batch of rows into a table.
    async fn insert_rows(&self, table: &str, rows: &[Value]) -> Result<(), TableStoreError>;
}

/// In-memory table store for tests and the CLI demo mode.
///
/// Call counters and per-table failure switches let tests assert that an
/// operation touched (or did not touch) the store.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: RwLock<BTreeMap<String, Vec<Value>>>,
    tables_without_modified_column: RwLock<HashSet<String>>,
    failing_fetches: RwLock<HashSet<String>>,
    failing_inserts: RwLock<HashSet<String>>,
    failing_deletes: RwLock<HashSet<String>>,
    fetch_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with rows, creating it if absent
    pub async fn seed_table(&self, table: &str, rows: Vec<Value>) {
        self.tables.write().await.insert(table.to_string(), rows);
    }

    /// Current rows of a table (empty if the table is unknown)
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Mark a table as lacking the modification timestamp column
    pub async fn drop_modified_column(&self, table: &str) {
        self.tables_without_modified_column
            .write()
            .await
            .insert(table.to_string());
    }

    /// Make every fetch against a table fail
    pub async fn fail_fetches(&self, table: &str) {
        self.failing_fetches.write().await.insert(table.to_string());
    }

    /// Make every insert against a table fail
    pub async fn fail_inserts(&self, table: &str) {
        self.failing_inserts.write().await.insert(table.to_string());
    }

    /// Make every delete against a table fail
    pub async fn fail_deletes(&self, table: &str) {
        self.failing_deletes.write().await.insert(table.to_string());
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

fn row_modified_at(row: &Value) -> Option<DateTime<Utc>> {
    row.get(MODIFIED_COLUMN)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn fetch_rows(
        &self,
        table: &str,
        modified_since: Option<DateTime<Utc>>,
    ) -> Result<TableFetch, TableStoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_fetches.read().await.contains(table) {
            return Err(TableStoreError::Query {
                table: table.to_string(),
                reason: "injected fetch failure".to_string(),
            });
        }

        let rows = self.rows(table).await;
        let rows = match modified_since {
            Some(since) => {
                // Filtering needs the column; a full fetch does not.
                if self
                    .tables_without_modified_column
                    .read()
                    .await
                    .contains(table)
                {
                    return Err(TableStoreError::MissingColumn {
                        table: table.to_string(),
                        column: MODIFIED_COLUMN.to_string(),
                    });
                }
                rows.into_iter()
                    .filter(|row| row_modified_at(row).is_some_and(|at| at >= since))
                    .collect()
            }
            None => rows,
        };

        let count = rows.len() as u64;
        Ok(TableFetch { rows, count })
    }

    async fn delete_all(&self, table: &str) -> Result<u64, TableStoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_deletes.read().await.contains(table) {
            return Err(TableStoreError::Query {
                table: table.to_string(),
                reason: "injected delete failure".to_string(),
            });
        }

        let removed = self
            .tables
            .write()
            .await
            .get_mut(table)
            .map(|rows| {
                let n = rows.len() as u64;
                rows.clear();
                n
            })
            .unwrap_or(0);
        Ok(removed)
    }

    async fn insert_rows(&self, table: &str, rows: &[Value]) -> Result<(), TableStoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_inserts.read().await.contains(table) {
            return Err(TableStoreError::Query {
                table: table.to_string(),
                reason: "injected insert failure".to_string(),
            });
        }

        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(id: u64, modified: DateTime<Utc>) -> Value {
        json!({ "id": id, MODIFIED_COLUMN: modified.to_rfc3339() })
    }

    #[tokio::test]
    async fn test_fetch_all_rows() {
        let store = MemoryTableStore::new();
        let now = Utc::now();
        store
            .seed_table("clients", vec![row(1, now), row(2, now)])
            .await;

        let fetch = store.fetch_rows("clients", None).await.unwrap();
        assert_eq!(fetch.count, 2);
        assert_eq!(fetch.rows.len(), 2);
        assert_eq!(store.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_filters_on_modified_since() {
        let store = MemoryTableStore::new();
        let now = Utc::now();
        let old = now - Duration::days(10);
        store
            .seed_table("deals", vec![row(1, old), row(2, now)])
            .await;

        let fetch = store
            .fetch_rows("deals", Some(now - Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(fetch.count, 1);
        assert_eq!(fetch.rows[0]["id"], 2);
    }

    #[tokio::test]
    async fn test_missing_column_only_raised_when_filtering() {
        let store = MemoryTableStore::new();
        store.seed_table("audit_logs", vec![json!({"id": 1})]).await;
        store.drop_modified_column("audit_logs").await;

        let full = store.fetch_rows("audit_logs", None).await.unwrap();
        assert_eq!(full.count, 1);

        let err = store
            .fetch_rows("audit_logs", Some(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, TableStoreError::MissingColumn { .. }));
    }

    #[tokio::test]
    async fn test_insert_appends_and_delete_clears() {
        let store = MemoryTableStore::new();
        let now = Utc::now();
        store.seed_table("tasks", vec![row(1, now)]).await;

        store.insert_rows("tasks", &[row(2, now)]).await.unwrap();
        assert_eq!(store.rows("tasks").await.len(), 2);

        let removed = store.delete_all("tasks").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.rows("tasks").await.is_empty());
        assert_eq!(store.delete_calls(), 1);
        assert_eq!(store.insert_calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryTableStore::new();
        store.seed_table("notes", vec![json!({"id": 1})]).await;
        store.fail_fetches("notes").await;
        store.fail_inserts("notes").await;

        assert!(matches!(
            store.fetch_rows("notes", None).await.unwrap_err(),
            TableStoreError::Query { .. }
        ));
        assert!(store
            .insert_rows("notes", &[json!({"id": 2})])
            .await
            .is_err());
    }
}
