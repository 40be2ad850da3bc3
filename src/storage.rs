//! Backup payload and metadata persistence

use crate::record::BackupRecord;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Suffix of payload files
const PAYLOAD_EXT: &str = ".backup";
/// Suffix of metadata files
const RECORD_EXT: &str = ".meta.json";

/// Storage backend for payloads and their metadata records.
///
/// Payload and record live side by side but are deleted independently;
/// a missing payload never blocks removing its record and vice versa.
#[async_trait]
pub trait BackupStorage: Send + Sync {
    /// Write payload bytes, returning the opaque location to record in
    /// the backup's metadata. The same location string resolves the
    /// payload later via [`load_payload`](Self::load_payload).
    async fn store_payload(&self, backup_id: &str, data: &[u8]) -> Result<String>;

    /// Read payload bytes back from a previously returned location.
    async fn load_payload(&self, location: &str) -> Result<Vec<u8>>;

    /// Remove a payload. Removing an absent payload is not an error.
    async fn delete_payload(&self, location: &str) -> Result<()>;

    /// Persist a metadata record.
    async fn store_record(&self, record: &BackupRecord) -> Result<()>;

    /// Load a metadata record by backup id.
    async fn load_record(&self, backup_id: &str) -> Result<BackupRecord>;

    /// All metadata records, newest start time first.
    async fn list_records(&self) -> Result<Vec<BackupRecord>>;

    /// Remove a metadata record. Removing an absent record is not an error.
    async fn delete_record(&self, backup_id: &str) -> Result<()>;
}

/// Local-directory storage: `<id>.backup` + `<id>.meta.json` per backup.
///
/// Backup ids embed RFC3339 timestamps; colons are replaced with dashes
/// when deriving filenames.
#[derive(Debug)]
pub struct LocalBackupStorage {
    base_path: PathBuf,
}

impl LocalBackupStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn file_stem(backup_id: &str) -> String {
        backup_id.replace(':', "-")
    }

    fn payload_path(&self, backup_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}{}", Self::file_stem(backup_id), PAYLOAD_EXT))
    }

    fn record_path(&self, backup_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}{}", Self::file_stem(backup_id), RECORD_EXT))
    }
}

#[async_trait]
impl BackupStorage for LocalBackupStorage {
    async fn store_payload(&self, backup_id: &str, data: &[u8]) -> Result<String> {
        let path = self.payload_path(backup_id);
        tokio::fs::write(&path, data).await?;
        Ok(path.display().to_string())
    }

    async fn load_payload(&self, location: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(location).await?)
    }

    async fn delete_payload(&self, location: &str) -> Result<()> {
        let path = Path::new(location);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn store_record(&self, record: &BackupRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.record_path(&record.id), json).await?;
        Ok(())
    }

    async fn load_record(&self, backup_id: &str) -> Result<BackupRecord> {
        let path = self.record_path(backup_id);
        let json = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::BackupNotFound {
                    backup_id: backup_id.to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&json)?)
    }

    async fn list_records(&self) -> Result<Vec<BackupRecord>> {
        let mut records = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(RECORD_EXT));
            if !is_record {
                continue;
            }

            let json = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<BackupRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable metadata file {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }

    async fn delete_record(&self, backup_id: &str) -> Result<()> {
        let path = self.record_path(backup_id);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BackupKind, BackupRecord};
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record_with_id(id: &str) -> BackupRecord {
        let mut record = BackupRecord::new(BackupKind::Full, "tester");
        record.id = id.to_string();
        record
    }

    #[tokio::test]
    async fn test_payload_roundtrip() {
        let temp = TempDir::new().unwrap();
        let storage = LocalBackupStorage::new(temp.path()).unwrap();

        let location = storage
            .store_payload("backup-2024-01-01T00:00:00.000Z-abcd1234", b"payload bytes")
            .await
            .unwrap();

        let loaded = storage.load_payload(&location).await.unwrap();
        assert_eq!(loaded, b"payload bytes");
    }

    #[tokio::test]
    async fn test_filenames_are_colon_free() {
        let temp = TempDir::new().unwrap();
        let storage = LocalBackupStorage::new(temp.path()).unwrap();

        let id = "backup-2024-01-01T12:30:45.123Z-abcd1234";
        storage.store_payload(id, b"x").await.unwrap();
        storage.store_record(&record_with_id(id)).await.unwrap();

        let mut names = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        names.sort();

        assert_eq!(names.len(), 2);
        for name in names {
            assert!(!name.contains(':'), "filename still has a colon: {name}");
        }
    }

    #[tokio::test]
    async fn test_record_roundtrip_and_not_found() {
        let temp = TempDir::new().unwrap();
        let storage = LocalBackupStorage::new(temp.path()).unwrap();

        let record = record_with_id("backup-2024-01-01T00:00:00.000Z-aaaa0000");
        storage.store_record(&record).await.unwrap();

        let loaded = storage.load_record(&record.id).await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.created_by, "tester");

        let err = storage.load_record("backup-missing").await.unwrap_err();
        assert!(matches!(err, Error::BackupNotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_is_sorted_newest_first() {
        let temp = TempDir::new().unwrap();
        let storage = LocalBackupStorage::new(temp.path()).unwrap();

        let mut older = record_with_id("backup-older");
        older.started_at = older.started_at - Duration::hours(5);
        let newer = record_with_id("backup-newer");

        storage.store_record(&older).await.unwrap();
        storage.store_record(&newer).await.unwrap();

        let records = storage.list_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "backup-newer");
        assert_eq!(records[1].id, "backup-older");
    }

    #[tokio::test]
    async fn test_list_skips_unreadable_metadata() {
        let temp = TempDir::new().unwrap();
        let storage = LocalBackupStorage::new(temp.path()).unwrap();

        storage
            .store_record(&record_with_id("backup-good"))
            .await
            .unwrap();
        std::fs::write(temp.path().join("broken.meta.json"), b"not json").unwrap();

        let records = storage.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "backup-good");
    }

    #[tokio::test]
    async fn test_deletes_are_independent_and_idempotent() {
        let temp = TempDir::new().unwrap();
        let storage = LocalBackupStorage::new(temp.path()).unwrap();

        let id = "backup-2024-01-01T00:00:00.000Z-bbbb1111";
        let location = storage.store_payload(id, b"data").await.unwrap();
        storage.store_record(&record_with_id(id)).await.unwrap();

        storage.delete_payload(&location).await.unwrap();
        // Payload is gone, record still loads.
        assert!(storage.load_record(id).await.is_ok());

        storage.delete_payload(&location).await.unwrap();
        storage.delete_record(id).await.unwrap();
        storage.delete_record(id).await.unwrap();

        assert!(storage.load_record(id).await.is_err());
    }
}
