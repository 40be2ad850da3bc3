//! Backup engine: full and incremental snapshots, listing, cleanup

use crate::codec;
use crate::config::VaultConfig;
use crate::notify::{NotificationMessage, Notifier};
use crate::record::{BackupDocument, BackupKind, BackupRecord};
use crate::storage::BackupStorage;
use crate::table_store::{TableStore, TableStoreError};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Incremental backups expire after this many whole days regardless of the
/// configured full-backup retention; they are only useful until the next
/// full backup.
const INCREMENTAL_RETENTION_DAYS: i64 = 1;

/// Base delay for the exponential backoff between storage write attempts
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Outcome of a cleanup pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Ids of backups whose files were removed
    pub removed: Vec<String>,
    /// Backups still within retention
    pub retained: usize,
}

/// Orchestrates table export, payload transforms, persistence, and
/// notification for one backup at a time.
///
/// The engine itself holds no lock; overlapping invocations are rejected by
/// the [`BackupService`](crate::service::BackupService) facade.
pub struct BackupEngine {
    config: VaultConfig,
    table_store: Arc<dyn TableStore>,
    storage: Arc<dyn BackupStorage>,
    notifier: Notifier,
    operator: String,
}

impl BackupEngine {
    /// Create a new engine. `operator` is recorded as `created_by` on every
    /// backup this engine produces.
    pub fn new(
        config: VaultConfig,
        table_store: Arc<dyn TableStore>,
        storage: Arc<dyn BackupStorage>,
        operator: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        let notifier = Notifier::new(config.notifications.clone());

        Ok(Self {
            config,
            table_store,
            storage,
            notifier,
            operator: operator.into(),
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub(crate) fn storage(&self) -> &Arc<dyn BackupStorage> {
        &self.storage
    }

    pub(crate) fn table_store(&self) -> &Arc<dyn TableStore> {
        &self.table_store
    }

    /// Snapshot all rows of the given tables (or the configured list).
    /// Any per-table failure aborts the whole backup.
    #[instrument(skip(self, tables))]
    pub async fn create_full_backup(&self, tables: Option<&[String]>) -> Result<BackupRecord> {
        let tables = match tables {
            Some(t) => t.to_vec(),
            None => self.config.tables.clone(),
        };
        self.run_backup(BackupKind::Full, tables, None).await
    }

    /// Snapshot rows modified at or after `since` across the configured
    /// tables. Per-table failures are tolerated: a table without the
    /// modification column is recorded as empty, any other table failure is
    /// logged and the table is skipped.
    #[instrument(skip(self))]
    pub async fn create_incremental_backup(&self, since: DateTime<Utc>) -> Result<BackupRecord> {
        self.run_backup(BackupKind::Incremental, self.config.tables.clone(), Some(since))
            .await
    }

    /// All backup records, newest start time first.
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        self.storage.list_records().await
    }

    /// Recompute the payload checksum of a stored backup and compare it to
    /// the recorded one, without restoring anything.
    #[instrument(skip(self))]
    pub async fn verify_backup(&self, backup_id: &str) -> Result<bool> {
        let record = self.storage.load_record(backup_id).await?;
        let payload = self.storage.load_payload(&record.location).await?;

        let matches = codec::checksum(&payload) == record.checksum;
        if matches {
            debug!(backup_id = %record.id, "Checksum verified");
        } else {
            warn!(backup_id = %record.id, "Checksum mismatch on stored payload");
        }
        Ok(matches)
    }

    /// Delete backups past retention: full backups older than the configured
    /// day threshold, incrementals older than one day. Payload and metadata
    /// removal are independent and best-effort, so a half-deleted backup is
    /// finished off by the next pass.
    #[instrument(skip(self))]
    pub async fn cleanup_old_backups(&self) -> Result<CleanupReport> {
        let now = Utc::now();
        let records = self.storage.list_records().await?;
        let mut report = CleanupReport::default();

        for record in records {
            let age_days = record.age_days(now);
            let expired = match record.kind {
                BackupKind::Full => age_days > self.config.retention_days,
                BackupKind::Incremental => age_days > INCREMENTAL_RETENTION_DAYS,
            };

            if !expired {
                report.retained += 1;
                continue;
            }

            info!(
                backup_id = %record.id,
                age_days,
                "Removing expired {} backup",
                record.kind
            );

            if let Err(e) = self.storage.delete_payload(&record.location).await {
                warn!(backup_id = %record.id, "Failed to delete payload: {}", e);
            }
            if let Err(e) = self.storage.delete_record(&record.id).await {
                warn!(backup_id = %record.id, "Failed to delete metadata: {}", e);
            }
            report.removed.push(record.id);
        }

        Ok(report)
    }

    async fn run_backup(
        &self,
        kind: BackupKind,
        tables: Vec<String>,
        since: Option<DateTime<Utc>>,
    ) -> Result<BackupRecord> {
        // A missing secret must surface before any row is read; silently
        // writing plaintext when encryption was requested is not an option.
        if self.config.encryption {
            self.config.require_encryption_secret()?;
        }

        let mut record = BackupRecord::new(kind, &self.operator);
        record.tables = tables.clone();
        record.compressed = self.config.compression;
        record.encrypted = self.config.encryption;
        record.based_on = since;

        info!(
            backup_id = %record.id,
            "Starting {} backup of {} tables",
            kind,
            tables.len()
        );

        match self.execute_pipeline(&mut record, &tables, since).await {
            Ok(()) => {
                record.mark_completed();
                if let Err(e) = self.persist_record(&mut record).await {
                    return self.fail_backup(record, e).await;
                }

                info!(
                    backup_id = %record.id,
                    records = record.total_records(),
                    size_bytes = record.size_bytes,
                    "Backup completed"
                );
                self.notifier
                    .notify(&NotificationMessage::success(&record))
                    .await;
                Ok(record)
            }
            Err(e) => self.fail_backup(record, e).await,
        }
    }

    /// Failure path: stamp the terminal state, persist it best-effort so the
    /// audit trail survives, notify, then re-raise.
    async fn fail_backup(&self, mut record: BackupRecord, error: Error) -> Result<BackupRecord> {
        warn!(backup_id = %record.id, "Backup failed: {}", error);
        record.mark_failed(error.to_string());

        if let Err(persist_err) = self.persist_record(&mut record).await {
            warn!(
                backup_id = %record.id,
                "Could not persist failure record: {}", persist_err
            );
        }
        self.notifier
            .notify(&NotificationMessage::failure(&record))
            .await;
        Err(error)
    }

    async fn execute_pipeline(
        &self,
        record: &mut BackupRecord,
        tables: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut document = BackupDocument::new(record);

        for table in tables {
            match self.table_store.fetch_rows(table, since).await {
                Ok(fetch) => {
                    debug!(table = %table, rows = fetch.count, "Exported table");
                    record.record_counts.insert(table.clone(), fetch.count);
                    document.insert_table(table, fetch.rows);
                }
                Err(e) if record.kind == BackupKind::Full => {
                    return Err(e.into());
                }
                Err(TableStoreError::MissingColumn { column, .. }) => {
                    debug!(
                        table = %table,
                        "Table lacks the {} column, recorded as empty", column
                    );
                    record.record_counts.insert(table.clone(), 0);
                    document.insert_table(table, Vec::new());
                }
                Err(e) => {
                    warn!(table = %table, "Skipping table in incremental backup: {}", e);
                }
            }
        }

        let serialized = serde_json::to_string_pretty(&document)?;
        let mut payload = serialized.into_bytes();

        if self.config.compression {
            payload = codec::compress(&payload)?;
        }
        if self.config.encryption {
            let secret = self.config.require_encryption_secret()?;
            payload = codec::encrypt(&payload, secret)?;
        }

        record.checksum = codec::checksum(&payload);
        record.size_bytes = payload.len() as u64;
        record.location = self.store_payload_with_retry(record, &payload).await?;

        Ok(())
    }

    async fn store_payload_with_retry(
        &self,
        record: &mut BackupRecord,
        payload: &[u8],
    ) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.storage.store_payload(&record.id, payload).await {
                Ok(location) => return Ok(location),
                Err(e) if attempt < self.config.retry_attempts => {
                    record.retry_count += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(
                        backup_id = %record.id,
                        attempt,
                        "Payload write failed, retrying in {:?}: {}", delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn persist_record(&self, record: &mut BackupRecord) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.storage.store_record(record).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.retry_attempts => {
                    record.retry_count += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(
                        backup_id = %record.id,
                        attempt,
                        "Metadata write failed, retrying in {:?}: {}", delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
