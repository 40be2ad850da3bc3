//! Restore functionality for applying backup snapshots to the table store

use crate::codec;
use crate::engine::BackupEngine;
use crate::record::{BackupDocument, BackupRecord};
use crate::table_store::TableStoreError;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Environment designation that blocks non-dry-run restores
const PRODUCTION_ENV: &str = "production";

/// Options for a restore operation
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Backup to restore from
    pub backup_id: String,
    /// Environment designation of the target store
    pub target_environment: String,
    /// Report what would be restored without touching the store
    pub dry_run: bool,
    /// Restrict the restore to these tables; all backed-up tables if `None`
    pub tables: Option<Vec<String>>,
    /// Delete existing rows from each table before inserting
    pub overwrite: bool,
}

impl RestoreOptions {
    pub fn new(backup_id: impl Into<String>) -> Self {
        Self {
            backup_id: backup_id.into(),
            target_environment: "development".to_string(),
            dry_run: false,
            tables: None,
            overwrite: false,
        }
    }
}

/// How one table fared during a restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRestoreStatus {
    Restored,
    /// Dry run only: the table would have been restored
    Planned,
    /// Insert failed on a non-critical table; the restore went on
    Failed,
    /// Requested but not present in the backup
    NotInBackup,
}

/// Per-table outcome of a restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,
    pub rows: u64,
    pub status: TableRestoreStatus,
    pub error: Option<String>,
}

/// Report of one restore invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    pub backup_id: String,
    pub dry_run: bool,
    pub tables: Vec<TableOutcome>,
    /// Rows actually written; always zero on a dry run
    pub rows_restored: u64,
}

impl RestoreReport {
    pub fn table_outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|o| o.table == table)
    }
}

impl BackupEngine {
    /// Restore tables from a stored backup.
    ///
    /// The production guard runs before anything else: a restore whose
    /// target is designated `production` is rejected unless it is a dry
    /// run. The payload checksum is verified before any parse or mutation.
    /// An insert failure on a critical table aborts the whole restore; on
    /// any other table it is recorded and the restore continues.
    #[instrument(skip(self, options), fields(backup_id = %options.backup_id))]
    pub async fn restore_from_backup(&self, options: &RestoreOptions) -> Result<RestoreReport> {
        if options.target_environment == PRODUCTION_ENV && !options.dry_run {
            return Err(Error::ProductionGuard);
        }

        let record = self.storage().load_record(&options.backup_id).await?;
        let document = self.load_document(&record).await?;

        let table_set: Vec<String> = match &options.tables {
            Some(requested) => requested.clone(),
            None => document.data.keys().cloned().collect(),
        };

        info!(
            backup_id = %record.id,
            tables = table_set.len(),
            dry_run = options.dry_run,
            "Restoring from {} backup taken {}",
            record.kind,
            record.started_at
        );

        if options.dry_run {
            let tables: Vec<TableOutcome> = table_set
                .iter()
                .map(|table| match document.data.get(table) {
                    Some(rows) => TableOutcome {
                        table: table.clone(),
                        rows: rows.len() as u64,
                        status: TableRestoreStatus::Planned,
                        error: None,
                    },
                    None => TableOutcome {
                        table: table.clone(),
                        rows: 0,
                        status: TableRestoreStatus::NotInBackup,
                        error: None,
                    },
                })
                .collect();
            let planned: u64 = tables.iter().map(|o| o.rows).sum();
            info!(
                backup_id = %record.id,
                rows = planned,
                "Dry run: no rows were written"
            );
            return Ok(RestoreReport {
                backup_id: record.id,
                dry_run: true,
                tables,
                rows_restored: 0,
            });
        }

        let mut outcomes = Vec::new();
        let mut rows_restored = 0u64;

        for table in &table_set {
            let rows = match document.data.get(table) {
                Some(rows) => rows,
                None => {
                    warn!(table = %table, "Requested table is not in the backup");
                    outcomes.push(TableOutcome {
                        table: table.clone(),
                        rows: 0,
                        status: TableRestoreStatus::NotInBackup,
                        error: None,
                    });
                    continue;
                }
            };

            if options.overwrite {
                // Clearing is best-effort; a failed delete leaves the old
                // rows in place and the inserts still run.
                if let Err(e) = self.table_store().delete_all(table).await {
                    warn!(table = %table, "Could not clear table before restore: {}", e);
                }
            }

            match self.insert_in_batches(table, rows).await {
                Ok(()) => {
                    debug!(table = %table, rows = rows.len(), "Restored table");
                    rows_restored += rows.len() as u64;
                    outcomes.push(TableOutcome {
                        table: table.clone(),
                        rows: rows.len() as u64,
                        status: TableRestoreStatus::Restored,
                        error: None,
                    });
                }
                Err(e) if self.config().critical_tables.contains(table) => {
                    return Err(Error::CriticalTableFailed {
                        table: table.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(table = %table, "Restore failed for non-critical table: {}", e);
                    outcomes.push(TableOutcome {
                        table: table.clone(),
                        rows: 0,
                        status: TableRestoreStatus::Failed,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            backup_id = %record.id,
            rows = rows_restored,
            tables = outcomes.len(),
            "Restore completed"
        );

        Ok(RestoreReport {
            backup_id: record.id,
            dry_run: false,
            tables: outcomes,
            rows_restored,
        })
    }

    /// Load, verify, and decode a backup payload into its document.
    /// The checksum is compared on the loaded, still-transformed bytes.
    async fn load_document(&self, record: &BackupRecord) -> Result<BackupDocument> {
        let payload = self.storage().load_payload(&record.location).await?;

        let computed = codec::checksum(&payload);
        if computed != record.checksum {
            return Err(Error::Integrity {
                reason: format!(
                    "checksum mismatch for {}: recorded {}, computed {}",
                    record.id, record.checksum, computed
                ),
            });
        }

        let mut bytes = payload;
        if record.encrypted {
            let secret = self.config().require_encryption_secret()?;
            bytes = codec::decrypt(&bytes, secret)?;
        }
        if record.compressed {
            bytes = codec::decompress(&bytes)?;
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn insert_in_batches(
        &self,
        table: &str,
        rows: &[Value],
    ) -> std::result::Result<(), TableStoreError> {
        for batch in rows.chunks(self.config().batch_size) {
            self.table_store().insert_rows(table, batch).await?;
        }
        Ok(())
    }
}
