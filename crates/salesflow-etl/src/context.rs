//! Per-run context passed to every pipeline component
//!
//! All paths are derived from the configured data directory and the run
//! date, so two contexts with different data directories never share files.
//! Two runs against the same data directory at the same time are not
//! supported; nothing here takes a lock.

use crate::config::EtlConfig;
use chrono::NaiveDate;
use salesflow_common::logging::LogConfig;
use salesflow_common::types::SourceKind;
use salesflow_common::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory layout below the data directory
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Raw artifacts written by the source adapters
    pub staging: PathBuf,
    /// Normalized per-source artifacts
    pub processed: PathBuf,
    /// Merged dataset
    pub output: PathBuf,
    pub archive: PathBuf,
    pub reports: PathBuf,
}

impl RunPaths {
    pub fn under(data_dir: &Path) -> Self {
        Self {
            staging: data_dir.join("staging"),
            processed: data_dir.join("processed"),
            output: data_dir.join("output"),
            archive: data_dir.join("archive"),
            reports: data_dir.join("reports"),
        }
    }

    fn all(&self) -> [&PathBuf; 5] {
        [
            &self.staging,
            &self.processed,
            &self.output,
            &self.archive,
            &self.reports,
        ]
    }
}

/// Everything a component needs to know about the current run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub config: EtlConfig,
    pub paths: RunPaths,
    /// Log location and retention, used by the cleanup step
    pub logging: LogConfig,
}

impl RunContext {
    pub fn new(config: EtlConfig, run_date: NaiveDate) -> Self {
        let paths = RunPaths::under(&config.data_dir);
        Self {
            run_id: Uuid::new_v4(),
            run_date,
            config,
            paths,
            logging: LogConfig::default(),
        }
    }

    /// Context for a run dated today (local time)
    pub fn today(config: EtlConfig) -> Self {
        Self::new(config, chrono::Local::now().date_naive())
    }

    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Create every directory the run writes to
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in self.paths.all() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn date_stamp(&self) -> String {
        self.run_date.format("%Y-%m-%d").to_string()
    }

    pub fn raw_path(&self, kind: SourceKind) -> PathBuf {
        self.paths.staging.join(kind.raw_file_name())
    }

    pub fn normalized_path(&self, kind: SourceKind) -> PathBuf {
        self.paths.processed.join(kind.normalized_file_name())
    }

    pub fn merged_path(&self) -> PathBuf {
        self.paths
            .output
            .join(format!("merged_sales_{}.csv", self.date_stamp()))
    }

    pub fn report_path(&self) -> PathBuf {
        self.paths
            .reports
            .join(format!("sales_report_{}.txt", self.date_stamp()))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.paths
            .archive
            .join(format!("processed_{}.tar.gz", self.date_stamp()))
    }
}
