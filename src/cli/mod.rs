//! Command-line interface for crmvault.
//!
//! One file per subcommand. Every command runs against a [`BackupService`]
//! built from the TOML config. The table store behind it is the in-memory
//! demo store, seeded with a couple of rows per configured table, so the
//! binary is exercisable end to end without a live CRM database.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::VaultConfig;
use crate::engine::BackupEngine;
use crate::service::BackupService;
use crate::storage::LocalBackupStorage;
use crate::table_store::{MemoryTableStore, MODIFIED_COLUMN};
use crate::Result;

pub mod backup;
pub mod cleanup;
pub mod list;
pub mod restore;
pub mod verify;

/// crmvault - snapshot backup and restore for CRM table data
#[derive(Parser)]
#[command(name = "crmvault")]
#[command(about = "Snapshot backup and restore engine for multi-tenant CRM databases")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "crmvault.toml", global = true)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a full or incremental backup
    Backup(backup::BackupArgs),
    /// Restore tables from a stored backup
    Restore(restore::RestoreArgs),
    /// List stored backups
    List(list::ListArgs),
    /// Remove backups past their retention window
    Cleanup,
    /// Check a stored backup against its recorded checksum
    Verify(verify::VerifyArgs),
}

/// Build the service every subcommand runs against.
pub async fn build_service(config_path: &Path) -> Result<BackupService> {
    let config = VaultConfig::load(config_path)?;
    let storage = Arc::new(LocalBackupStorage::new(&config.backup_dir)?);
    let store = Arc::new(demo_store(&config.tables).await);
    let operator = std::env::var("USER").unwrap_or_else(|_| "operator".to_string());

    let engine = BackupEngine::new(config, store, storage, operator)?;
    Ok(BackupService::new(engine))
}

/// Seed the demo store so backups have rows to export and restores have a
/// live target.
async fn demo_store(tables: &[String]) -> MemoryTableStore {
    let store = MemoryTableStore::new();
    let now = chrono::Utc::now().to_rfc3339();
    for table in tables {
        let rows = (1..=2)
            .map(|i| {
                serde_json::json!({
                    "id": i,
                    "label": format!("{} sample {}", table, i),
                    MODIFIED_COLUMN: now,
                })
            })
            .collect();
        store.seed_table(table, rows).await;
    }
    store
}
