//! Single-operation facade over the backup engine
//!
//! Backups and restores move a lot of rows and must never interleave, so
//! the service serializes them behind one lock. A second caller is rejected
//! immediately instead of queueing, so the conflict is visible right away.

use crate::engine::{BackupEngine, CleanupReport};
use crate::record::BackupRecord;
use crate::restore::{RestoreOptions, RestoreReport};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

pub struct BackupService {
    engine: BackupEngine,
    running: Mutex<()>,
}

impl BackupService {
    pub fn new(engine: BackupEngine) -> Self {
        Self {
            engine,
            running: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &BackupEngine {
        &self.engine
    }

    /// Claim the operation slot or fail fast.
    fn exclusive(&self) -> Result<MutexGuard<'_, ()>> {
        self.running
            .try_lock()
            .map_err(|_| Error::OperationInProgress)
    }

    pub async fn create_full_backup(&self, tables: Option<&[String]>) -> Result<BackupRecord> {
        let _slot = self.exclusive()?;
        self.engine.create_full_backup(tables).await
    }

    pub async fn create_incremental_backup(&self, since: DateTime<Utc>) -> Result<BackupRecord> {
        let _slot = self.exclusive()?;
        self.engine.create_incremental_backup(since).await
    }

    pub async fn restore_from_backup(&self, options: &RestoreOptions) -> Result<RestoreReport> {
        let _slot = self.exclusive()?;
        self.engine.restore_from_backup(options).await
    }

    pub async fn cleanup_old_backups(&self) -> Result<CleanupReport> {
        let _slot = self.exclusive()?;
        self.engine.cleanup_old_backups().await
    }

    /// Listing is read-only and never blocked by a running operation.
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        self.engine.list_backups().await
    }

    /// Verification is read-only and never blocked by a running operation.
    pub async fn verify_backup(&self, backup_id: &str) -> Result<bool> {
        self.engine.verify_backup(backup_id).await
    }
}
