//! Engine configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable holding the encryption secret. The secret is never
/// read from or written to the config file.
pub const ENCRYPTION_KEY_ENV: &str = "CRMVAULT_ENCRYPTION_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Directory receiving payload and metadata files.
    pub backup_dir: PathBuf,
    /// Tables exported by default when no subset is requested.
    pub tables: Vec<String>,
    /// Tables whose restore failure aborts the whole restore.
    pub critical_tables: Vec<String>,
    pub compression: bool,
    pub encryption: bool,
    /// Full backups older than this many whole days are cleaned up.
    /// Incremental backups are always cleaned up after one day.
    pub retention_days: i64,
    /// Rows per insert batch during restore.
    pub batch_size: usize,
    /// Attempts for payload/metadata writes before giving up.
    pub retry_attempts: u32,
    pub notifications: NotificationConfig,
    #[serde(skip)]
    pub encryption_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub email: Option<EmailConfig>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("./backups"),
            tables: vec![
                "users".to_string(),
                "clients".to_string(),
                "deals".to_string(),
                "tasks".to_string(),
                "notes".to_string(),
                "affiliates".to_string(),
                "blog_posts".to_string(),
                "audit_logs".to_string(),
            ],
            critical_tables: vec!["users".to_string(), "clients".to_string()],
            compression: true,
            encryption: false,
            retention_days: 30,
            batch_size: 1000,
            retry_attempts: 3,
            notifications: NotificationConfig::default(),
            encryption_secret: None,
        }
    }
}

impl VaultConfig {
    /// Load config from a TOML file, or fall back to defaults if the file
    /// does not exist. The encryption secret is taken from the environment
    /// in both cases.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            debug!("Config file not found, using defaults");
            Self::default()
        };

        config.encryption_secret = std::env::var(ENCRYPTION_KEY_ENV).ok();
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file. The encryption secret is skipped.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Validate config settings
    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(Error::Configuration {
                reason: "table list must not be empty".to_string(),
            });
        }

        if self.batch_size == 0 {
            return Err(Error::Configuration {
                reason: "batch_size must be greater than 0".to_string(),
            });
        }

        if self.retention_days < 1 {
            return Err(Error::Configuration {
                reason: "retention_days must be at least 1".to_string(),
            });
        }

        for table in &self.critical_tables {
            if !self.tables.contains(table) {
                warn!("Critical table not in table list: {}", table);
            }
        }

        if self.retry_attempts > 10 {
            warn!("High retry attempts configured: {}", self.retry_attempts);
        }

        Ok(())
    }

    /// The configured encryption secret, required whenever encryption is
    /// enabled. Checked before any table is read so a missing secret can
    /// never downgrade a backup to plaintext.
    pub fn require_encryption_secret(&self) -> Result<&str> {
        self.encryption_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Configuration {
                reason: format!(
                    "encryption is enabled but {} is not set",
                    ENCRYPTION_KEY_ENV
                ),
            })
    }
}
