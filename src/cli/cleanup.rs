//! Cleanup command implementation.

use crate::service::BackupService;
use crate::Result;

/// Run the cleanup command
pub async fn run(service: &BackupService) -> Result<()> {
    let report = service.cleanup_old_backups().await?;

    if report.removed.is_empty() {
        println!("Nothing to clean up ({} backups retained).", report.retained);
        return Ok(());
    }

    println!("Removed {} expired backups:", report.removed.len());
    for id in &report.removed {
        println!("  {}", id);
    }
    println!("{} backups retained.", report.retained);

    Ok(())
}
