//! Source adapters
//!
//! One adapter per source kind. Each writes exactly one raw artifact into the
//! staging directory and shares no state with the others, so all of them run
//! concurrently during the extraction step.
//!
//! Fan-in policy: every adapter is allowed to finish, then the first failure
//! in adapter order is returned. No adapter is cancelled half-way through
//! writing its artifact.

mod database;
mod file;

pub use database::{Backend, DatabaseDumpAdapter};
pub use file::FileCopyAdapter;

use crate::context::RunContext;
use async_trait::async_trait;
use futures::future::join_all;
use salesflow_common::types::SourceKind;
use salesflow_common::Result;
use std::path::PathBuf;
use tracing::{error, info};

/// Produces the raw artifact for one source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source kind of the artifact this adapter writes
    fn kind(&self) -> SourceKind;

    /// Human-readable source name used in errors and logs
    fn name(&self) -> String {
        self.kind().as_str().to_string()
    }

    /// Write the raw artifact and return its path.
    ///
    /// Failures are reported as `EtlError::Extraction` carrying the source
    /// name and the underlying cause.
    async fn extract(&self, ctx: &RunContext) -> Result<PathBuf>;
}

/// A raw artifact written during extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    pub kind: SourceKind,
    pub path: PathBuf,
}

/// The three adapters configured for a normal run
pub fn default_adapters(ctx: &RunContext) -> Vec<Box<dyn SourceAdapter>> {
    let config = &ctx.config;
    vec![
        Box::new(FileCopyAdapter::new(
            SourceKind::Online,
            config.sources.online.clone(),
        )),
        Box::new(FileCopyAdapter::new(
            SourceKind::Instore,
            config.sources.instore.clone(),
        )),
        Box::new(DatabaseDumpAdapter::new(
            config.database.url.clone(),
            config.database.inventory_table.clone(),
        )),
    ]
}

/// Run every adapter concurrently and wait for all of them.
pub async fn extract_all(
    adapters: &[Box<dyn SourceAdapter>],
    ctx: &RunContext,
) -> Result<Vec<RawArtifact>> {
    info!(adapters = adapters.len(), "Starting extraction");

    let results = join_all(adapters.iter().map(|adapter| async move {
        let outcome = adapter.extract(ctx).await;
        (adapter.kind(), adapter.name(), outcome)
    }))
    .await;

    let mut artifacts = Vec::with_capacity(results.len());
    let mut first_error = None;

    for (kind, name, outcome) in results {
        match outcome {
            Ok(path) => {
                info!(source = %name, path = %path.display(), "Extracted source");
                artifacts.push(RawArtifact { kind, path });
            },
            Err(e) => {
                error!(source = %name, error = %e, "Extraction failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            },
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(artifacts),
    }
}
