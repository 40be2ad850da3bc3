//! List command implementation.

use clap::Args;

use crate::service::BackupService;
use crate::Result;

/// Arguments for the list command
#[derive(Args)]
pub struct ListArgs {
    /// Show at most this many backups (newest first)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Run the list command
pub async fn run(service: &BackupService, args: ListArgs) -> Result<()> {
    let records = service.list_backups().await?;

    if records.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    let limit = args.limit.unwrap_or(records.len());

    println!(
        "{:<42} {:<12} {:<10} {:>8} {:>10}",
        "Backup ID", "Kind", "Status", "Records", "Size"
    );
    println!("{}", "-".repeat(88));

    for record in records.iter().take(limit) {
        println!(
            "{:<42} {:<12} {:<10} {:>8} {:>10}",
            record.id,
            record.kind.to_string(),
            record.status.to_string(),
            record.total_records(),
            format_bytes(record.size_bytes)
        );
    }

    if records.len() > limit {
        println!("... and {} more", records.len() - limit);
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
