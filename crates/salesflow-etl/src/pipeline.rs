//! Run orchestrator
//!
//! Drives one run through its steps in a fixed order:
//!
//! ```text
//! Preflight -> Extracting -> Transforming -> Loading -> Archiving -> Reporting -> Cleanup -> Done
//! ```
//!
//! Any fatal step error moves the run to `Failed`, which is absorbing. The
//! archiving and cleanup steps only ever produce warnings.

use crate::archive::{archive_artifacts, ArchiveSummary};
use crate::config::MergeScope;
use crate::context::RunContext;
use crate::extract::{default_adapters, extract_all, RawArtifact, SourceAdapter};
use crate::load::{discover_artifacts, merge, MergeStats};
use crate::report::{generate_report, SalesReport};
use crate::transform::{normalize_file, NormalizeStats};
use salesflow_common::logging::sweep_old_logs;
use salesflow_common::types::SourceKind;
use salesflow_common::{EtlError, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Preflight,
    Extracting,
    Transforming,
    Loading,
    Archiving,
    Reporting,
    Cleanup,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Preflight => "preflight",
            PipelineState::Extracting => "extracting",
            PipelineState::Transforming => "transforming",
            PipelineState::Loading => "loading",
            PipelineState::Archiving => "archiving",
            PipelineState::Reporting => "reporting",
            PipelineState::Cleanup => "cleanup",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub normalized: Vec<(SourceKind, NormalizeStats)>,
    pub merge: MergeStats,
    /// `None` when archiving was skipped or failed
    pub archive: Option<ArchiveSummary>,
    pub report: SalesReport,
    pub report_path: PathBuf,
    /// Non-fatal problems from archiving and cleanup
    pub warnings: Vec<String>,
}

impl RunSummary {
    /// Short human-readable description, used as the alert body
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        for (kind, stats) in &self.normalized {
            lines.push(format!(
                "{}: {} row(s) kept, {} dropped",
                kind,
                stats.rows_kept,
                stats.rows_dropped()
            ));
        }
        lines.push(format!(
            "Merged {} row(s) into {}",
            self.merge.rows,
            self.merge.output.display()
        ));
        lines.push(format!("Report: {}", self.report_path.display()));
        match self.archive {
            Some(ref archive) => lines.push(format!("Archive: {}", archive.path.display())),
            None => lines.push("Archive: not written".to_string()),
        }
        for warning in &self.warnings {
            lines.push(format!("Warning: {}", warning));
        }
        lines.join("\n")
    }
}

/// A run that ended in `Failed`
#[derive(Debug, thiserror::Error)]
#[error("run failed while {state}: {error}")]
pub struct RunFailure {
    /// The step that was running when the error occurred
    pub state: PipelineState,
    #[source]
    pub error: EtlError,
}

/// One pipeline run
pub struct Pipeline {
    ctx: RunContext,
    adapters: Vec<Box<dyn SourceAdapter>>,
    state: PipelineState,
}

impl Pipeline {
    /// Pipeline with the configured online, in-store and inventory sources
    pub fn new(ctx: RunContext) -> Self {
        let adapters = default_adapters(&ctx);
        Self::with_adapters(ctx, adapters)
    }

    pub fn with_adapters(ctx: RunContext, adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self {
            ctx,
            adapters,
            state: PipelineState::Preflight,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn transition(&mut self, next: PipelineState) {
        info!(
            run_id = %self.ctx.run_id,
            from = %self.state,
            to = %next,
            "Pipeline state transition"
        );
        self.state = next;
    }

    /// Execute the run. Terminal pipelines cannot be run again.
    pub async fn run(&mut self) -> std::result::Result<RunSummary, RunFailure> {
        if self.state.is_terminal() {
            return Err(RunFailure {
                state: self.state,
                error: EtlError::Unexpected(format!("pipeline already finished ({})", self.state)),
            });
        }

        info!(
            run_id = %self.ctx.run_id,
            run_date = %self.ctx.date_stamp(),
            data_dir = %self.ctx.config.data_dir.display(),
            "Starting sales ETL run"
        );

        match self.run_steps().await {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                info!(
                    run_id = %self.ctx.run_id,
                    rows = summary.merge.rows,
                    warnings = summary.warnings.len(),
                    "Sales ETL run completed"
                );
                Ok(summary)
            },
            Err(error) => {
                let state = self.state;
                error!(
                    run_id = %self.ctx.run_id,
                    state = %state,
                    kind = error.kind(),
                    error = %error,
                    "Sales ETL run failed"
                );
                self.transition(PipelineState::Failed);
                Err(RunFailure { state, error })
            },
        }
    }

    async fn run_steps(&mut self) -> Result<RunSummary> {
        self.ctx.config.validate()?;
        self.ctx.ensure_dirs()?;

        self.transition(PipelineState::Extracting);
        let raw = extract_all(&self.adapters, &self.ctx).await?;

        self.transition(PipelineState::Transforming);
        let mut normalized = Vec::with_capacity(raw.len());
        let mut produced = Vec::with_capacity(raw.len());
        for artifact in &raw {
            let out = self.ctx.normalized_path(artifact.kind);
            let stats = normalize_file(&artifact.path, artifact.kind, &out)?;
            normalized.push((artifact.kind, stats));
            produced.push(out);
        }

        self.transition(PipelineState::Loading);
        let inputs = match self.ctx.config.merge_scope {
            MergeScope::Run => produced,
            MergeScope::Directory => discover_artifacts(&self.ctx.paths.processed)?,
        };
        let merge = merge(&inputs, &self.ctx.merged_path())?;

        let mut warnings = Vec::new();

        self.transition(PipelineState::Archiving);
        let archive = match archive_artifacts(&inputs, &self.ctx.archive_path()) {
            Ok(archive) => archive,
            Err(e) => {
                warn!(error = %e, "Archiving failed, continuing without archive");
                warnings.push(e.to_string());
                None
            },
        };

        self.transition(PipelineState::Reporting);
        let report_path = self.ctx.report_path();
        let report = generate_report(&merge.output, &report_path, self.ctx.run_date)?;

        self.transition(PipelineState::Cleanup);
        warnings.extend(self.cleanup(&raw));

        Ok(RunSummary {
            normalized,
            merge,
            archive,
            report,
            report_path,
            warnings,
        })
    }

    /// Remove this run's raw artifacts and expired log files
    fn cleanup(&self, raw: &[RawArtifact]) -> Vec<String> {
        let mut warnings = Vec::new();

        for artifact in raw {
            if let Err(e) = std::fs::remove_file(&artifact.path) {
                warn!(path = %artifact.path.display(), error = %e, "Failed to remove raw artifact");
                warnings.push(format!("cannot remove {}: {}", artifact.path.display(), e));
            }
        }

        let logging = &self.ctx.logging;
        match sweep_old_logs(
            &logging.log_dir,
            &logging.log_file_prefix,
            logging.retention_days,
            SystemTime::now(),
        ) {
            Ok(0) => {},
            Ok(removed) => info!(removed, "Removed expired log files"),
            Err(e) => {
                warn!(error = %e, "Log retention sweep failed");
                warnings.push(format!("log retention sweep failed: {}", e));
            },
        }

        warnings
    }
}
