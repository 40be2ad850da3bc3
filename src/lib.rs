//! # crmvault
//!
//! Snapshot backup and restore engine for multi-tenant CRM databases.
//!
//! ## Features
//!
//! - **Full & incremental backups**: whole-table snapshots or rows modified
//!   since a timestamp, exported through a pluggable [`TableStore`] trait
//! - **Payload pipeline**: pretty JSON document, gzip compression,
//!   ChaCha20-Poly1305 encryption, SHA-256 integrity checksum
//! - **Safe restores**: checksum verification up front, dry-run planning,
//!   production guard, batched inserts with critical-table fail-fast
//! - **Retention cleanup**: age-based removal of expired full and
//!   incremental backups
//! - **Notifications**: best-effort SMTP and webhook delivery of backup
//!   outcomes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crmvault::{BackupEngine, LocalBackupStorage, MemoryTableStore, VaultConfig};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> crmvault::Result<()> {
//! let config = VaultConfig::default();
//! let storage = Arc::new(LocalBackupStorage::new(&config.backup_dir)?);
//! let store = Arc::new(MemoryTableStore::new());
//!
//! let engine = BackupEngine::new(config, store, storage, "ops")?;
//! let record = engine.create_full_backup(None).await?;
//! println!("Backup completed: {}", record.id);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod record;
pub mod restore;
pub mod service;
pub mod storage;
pub mod table_store;

// Re-export commonly used types
pub use config::VaultConfig;
pub use engine::{BackupEngine, CleanupReport};
pub use error::{Error, Result};
pub use record::{BackupDocument, BackupKind, BackupRecord, BackupStatus};
pub use restore::{RestoreOptions, RestoreReport, TableOutcome, TableRestoreStatus};
pub use service::BackupService;
pub use storage::{BackupStorage, LocalBackupStorage};
pub use table_store::{MemoryTableStore, TableStore, TableStoreError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
