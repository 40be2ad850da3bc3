//! Error types for crmvault

use crate::table_store::TableStoreError;
use thiserror::Error;

/// Main error type for crmvault operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Table store error: {0}")]
    Table(#[from] TableStoreError),

    #[error("Backup not found: {backup_id}")]
    BackupNotFound { backup_id: String },

    #[error("Integrity verification failed: {reason}")]
    Integrity { reason: String },

    #[error("Encryption error: {reason}")]
    Encryption { reason: String },

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Refusing to restore into production without dry-run")]
    ProductionGuard,

    #[error("Another backup or restore operation is already in progress")]
    OperationInProgress,

    #[error("Notification delivery failed: {reason}")]
    Notification { reason: String },

    #[error("Restore aborted: critical table {table} failed: {reason}")]
    CriticalTableFailed { table: String, reason: String },
}

/// Result type alias for crmvault operations
pub type Result<T> = std::result::Result<T, Error>;
