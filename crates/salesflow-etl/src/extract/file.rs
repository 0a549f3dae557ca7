//! File-copy adapter for the JSON and CSV feeds

use super::SourceAdapter;
use crate::context::RunContext;
use async_trait::async_trait;
use salesflow_common::types::SourceKind;
use salesflow_common::{EtlError, Result};
use std::path::PathBuf;
use tracing::debug;

/// Copies a feed file into the staging area unchanged
#[derive(Debug, Clone)]
pub struct FileCopyAdapter {
    kind: SourceKind,
    source: PathBuf,
}

impl FileCopyAdapter {
    pub fn new(kind: SourceKind, source: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for FileCopyAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn extract(&self, ctx: &RunContext) -> Result<PathBuf> {
        let metadata = tokio::fs::metadata(&self.source).await.map_err(|e| {
            EtlError::extraction(
                self.name(),
                std::io::Error::new(
                    e.kind(),
                    format!("source file {}: {}", self.source.display(), e),
                ),
            )
        })?;

        if !metadata.is_file() {
            return Err(EtlError::extraction(
                self.name(),
                std::io::Error::other(format!("{} is not a file", self.source.display())),
            ));
        }

        let dest = ctx.raw_path(self.kind);
        let bytes = tokio::fs::copy(&self.source, &dest)
            .await
            .map_err(|e| EtlError::extraction(self.name(), e))?;

        debug!(
            source = %self.source.display(),
            dest = %dest.display(),
            bytes,
            "Copied source file"
        );

        Ok(dest)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::EtlConfig;
    use chrono::NaiveDate;

    fn context(dir: &std::path::Path) -> RunContext {
        let config = EtlConfig {
            data_dir: dir.join("data"),
            ..EtlConfig::default()
        };
        let ctx = RunContext::new(config, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        ctx.ensure_dirs().unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_copies_feed_into_staging() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let feed = dir.path().join("feed.csv");
        std::fs::write(&feed, "id,product,category,price,quantity\n1,Tea,Drinks,2,3\n").unwrap();

        let adapter = FileCopyAdapter::new(SourceKind::Instore, &feed);
        let path = adapter.extract(&ctx).await.unwrap();

        assert_eq!(path, ctx.raw_path(SourceKind::Instore));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            std::fs::read_to_string(feed).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_feed_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let adapter = FileCopyAdapter::new(SourceKind::Online, dir.path().join("absent.json"));
        let err = adapter.extract(&ctx).await.unwrap_err();

        match err {
            EtlError::Extraction { source_name, cause } => {
                assert_eq!(source_name, "online");
                assert!(cause.to_string().contains("absent.json"));
            },
            other => panic!("unexpected error: {other}"),
        }
        assert!(!ctx.raw_path(SourceKind::Online).exists());
    }

    #[tokio::test]
    async fn test_directory_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let adapter = FileCopyAdapter::new(SourceKind::Online, dir.path());
        assert!(matches!(
            adapter.extract(&ctx).await,
            Err(EtlError::Extraction { .. })
        ));
    }
}
