//! Configuration management
//!
//! Values come from a `.env` file (if present) and the process environment,
//! falling back to the `DEFAULT_*` constants below.

use crate::extract::Backend;
use salesflow_common::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default root of the staging/processed/output/archive/report directories.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default location of the online (JSON) sales feed.
pub const DEFAULT_ONLINE_SOURCE: &str = "./input/online_sales.json";

/// Default location of the in-store (CSV) sales feed.
pub const DEFAULT_INSTORE_SOURCE: &str = "./input/instore_sales.csv";

/// Default inventory database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./input/inventory.db";

/// Default inventory table, exported in full on every run.
pub const DEFAULT_INVENTORY_TABLE: &str = "store_inventory";

/// Default time the binary waits for a pending alert before exiting.
pub const DEFAULT_ALERT_GRACE_SECS: u64 = 10;

/// Which normalized artifacts the merger reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeScope {
    /// Only the artifacts written by the current run
    #[default]
    Run,
    /// Every CSV in the processed directory, including leftovers
    Directory,
}

impl std::str::FromStr for MergeScope {
    type Err = EtlError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run" => Ok(MergeScope::Run),
            "directory" | "dir" => Ok(MergeScope::Directory),
            other => Err(EtlError::Config(format!(
                "ETL_MERGE_SCOPE must be 'run' or 'directory', got '{}'",
                other
            ))),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub data_dir: PathBuf,
    pub sources: SourceConfig,
    pub database: DatabaseConfig,
    pub merge_scope: MergeScope,
    pub alert: AlertConfig,
}

/// File-based sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub online: PathBuf,
    pub instore: PathBuf,
}

/// Inventory database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub inventory_table: String,
}

/// Alert delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Mail gateway webhook; alerts are only logged when unset
    pub webhook_url: Option<String>,
    pub recipient: Option<String>,
    pub grace_secs: u64,
}

impl EtlConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = EtlConfig {
            data_dir: non_empty("ETL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            sources: SourceConfig {
                online: non_empty("ETL_ONLINE_SOURCE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ONLINE_SOURCE)),
                instore: non_empty("ETL_INSTORE_SOURCE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_INSTORE_SOURCE)),
            },
            database: DatabaseConfig {
                url: non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
                inventory_table: non_empty("ETL_INVENTORY_TABLE")
                    .unwrap_or_else(|| DEFAULT_INVENTORY_TABLE.to_string()),
            },
            merge_scope: match non_empty("ETL_MERGE_SCOPE") {
                Some(scope) => scope.parse()?,
                None => MergeScope::default(),
            },
            alert: AlertConfig {
                webhook_url: non_empty("ALERT_WEBHOOK_URL"),
                recipient: non_empty("ALERT_RECIPIENT"),
                grace_secs: match non_empty("ALERT_GRACE_SECS") {
                    Some(secs) => secs.trim().parse().map_err(|_| {
                        EtlError::Config(format!(
                            "ALERT_GRACE_SECS must be an integer, got '{}'",
                            secs
                        ))
                    })?,
                    None => DEFAULT_ALERT_GRACE_SECS,
                },
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(EtlError::Config("Database URL cannot be empty".to_string()));
        }

        Backend::from_url(&self.database.url)
            .map_err(|e| EtlError::Config(format!("DATABASE_URL: {}", e)))?;

        // The table name is interpolated into the export query
        if !is_sql_identifier(&self.database.inventory_table) {
            return Err(EtlError::Config(format!(
                "Inventory table '{}' is not a plain SQL identifier",
                self.database.inventory_table
            )));
        }

        if let Some(ref url) = self.alert.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(EtlError::Config(format!(
                    "ALERT_WEBHOOK_URL must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }

        Ok(())
    }
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            sources: SourceConfig {
                online: PathBuf::from(DEFAULT_ONLINE_SOURCE),
                instore: PathBuf::from(DEFAULT_INSTORE_SOURCE),
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                inventory_table: DEFAULT_INVENTORY_TABLE.to_string(),
            },
            merge_scope: MergeScope::default(),
            alert: AlertConfig {
                webhook_url: None,
                recipient: None,
                grace_secs: DEFAULT_ALERT_GRACE_SECS,
            },
        }
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
