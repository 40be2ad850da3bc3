//! Backup command implementation.

use chrono::{DateTime, Utc};
use clap::Args;

use crate::service::BackupService;
use crate::Result;

/// Arguments for the backup command
#[derive(Args)]
pub struct BackupArgs {
    /// Only include rows modified at or after this RFC3339 timestamp,
    /// producing an incremental backup
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Back up only these tables (comma separated, full backups only)
    #[arg(long, value_delimiter = ',')]
    pub tables: Option<Vec<String>>,
}

/// Run the backup command
pub async fn run(service: &BackupService, args: BackupArgs) -> Result<()> {
    let record = match args.since {
        Some(since) => service.create_incremental_backup(since).await?,
        None => service.create_full_backup(args.tables.as_deref()).await?,
    };

    println!("Backup completed: {}", record.id);
    println!("  Kind:     {}", record.kind);
    println!("  Tables:   {}", record.tables.len());
    println!("  Records:  {}", record.total_records());
    println!("  Size:     {} bytes", record.size_bytes);
    println!("  Checksum: {}", record.checksum);
    println!("  Location: {}", record.location);

    Ok(())
}
