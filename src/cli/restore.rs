//! Restore command implementation.

use clap::Args;

use crate::restore::{RestoreOptions, TableRestoreStatus};
use crate::service::BackupService;
use crate::Result;

/// Arguments for the restore command
#[derive(Args)]
pub struct RestoreArgs {
    /// Id of the backup to restore from
    pub backup_id: String,

    /// Environment designation of the target store. Restoring into
    /// "production" is refused unless --dry-run is set.
    #[arg(long, default_value = "development")]
    pub target: String,

    /// Show what would be restored without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Restore only these tables (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub tables: Option<Vec<String>>,

    /// Delete existing rows from each table before inserting
    #[arg(long)]
    pub overwrite: bool,
}

/// Run the restore command
pub async fn run(service: &BackupService, args: RestoreArgs) -> Result<()> {
    let options = RestoreOptions {
        backup_id: args.backup_id,
        target_environment: args.target,
        dry_run: args.dry_run,
        tables: args.tables,
        overwrite: args.overwrite,
    };

    let report = service.restore_from_backup(&options).await?;

    if report.dry_run {
        println!("Dry run of {} (no rows written):", report.backup_id);
    } else {
        println!(
            "Restored {} rows from {}:",
            report.rows_restored, report.backup_id
        );
    }

    for outcome in &report.tables {
        match outcome.status {
            TableRestoreStatus::Restored => {
                println!("  {:<20} {} rows", outcome.table, outcome.rows);
            }
            TableRestoreStatus::Planned => {
                println!("  {:<20} {} rows (planned)", outcome.table, outcome.rows);
            }
            TableRestoreStatus::Failed => {
                println!(
                    "  {:<20} FAILED: {}",
                    outcome.table,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            TableRestoreStatus::NotInBackup => {
                println!("  {:<20} not in backup", outcome.table);
            }
        }
    }

    Ok(())
}
