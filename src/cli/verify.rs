//! Verify command implementation.

use clap::Args;

use crate::service::BackupService;
use crate::{Error, Result};

/// Arguments for the verify command
#[derive(Args)]
pub struct VerifyArgs {
    /// Id of the backup to verify
    pub backup_id: String,
}

/// Run the verify command
pub async fn run(service: &BackupService, args: VerifyArgs) -> Result<()> {
    if service.verify_backup(&args.backup_id).await? {
        println!("✓ {} matches its recorded checksum", args.backup_id);
        Ok(())
    } else {
        println!("✗ {} does NOT match its recorded checksum", args.backup_id);
        Err(Error::Integrity {
            reason: format!("stored payload of {} fails verification", args.backup_id),
        })
    }
}
