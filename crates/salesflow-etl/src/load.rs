//! Merger
//!
//! Concatenates normalized artifacts into the merged dataset. Inputs are
//! read in file-name order and every row gets a `record_id`, starting at 1
//! and increasing by one per row across all inputs. The id only encodes
//! position; it carries no meaning beyond ordering.
//!
//! Nothing is written when there is nothing to merge.

use crate::transform::csv_error;
use salesflow_common::types::{CANONICAL_HEADER, MERGED_HEADER};
use salesflow_common::{EtlError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First `record_id` of every merged dataset
pub const FIRST_RECORD_ID: u64 = 1;

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStats {
    /// Inputs in concatenation order with their row counts
    pub inputs: Vec<(PathBuf, usize)>,
    pub rows: usize,
    pub output: PathBuf,
}

/// Every `*.csv` file in `dir`, in file-name order
pub fn discover_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            artifacts.push(path);
        }
    }
    sort_by_file_name(&mut artifacts);
    Ok(artifacts)
}

fn sort_by_file_name(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
}

/// Read one normalized artifact, checking its header
fn read_artifact(path: &Path) -> Result<Vec<csv::StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| EtlError::Merge(format!("cannot read {}: {}", path.display(), e)))?;

    let header = reader
        .headers()
        .map_err(|e| EtlError::Merge(format!("cannot read header of {}: {}", path.display(), e)))?;
    if header.iter().ne(CANONICAL_HEADER.iter().copied()) {
        return Err(EtlError::Merge(format!(
            "{} is not a normalized artifact (header: {:?})",
            path.display(),
            header
        )));
    }

    reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| EtlError::Merge(format!("malformed row in {}: {}", path.display(), e)))
}

/// Merge `inputs` into `out`.
///
/// Fails with "no data to merge" (and writes nothing) when there are no
/// inputs or none of them holds a row.
pub fn merge(inputs: &[PathBuf], out: &Path) -> Result<MergeStats> {
    let mut ordered = inputs.to_vec();
    sort_by_file_name(&mut ordered);

    let mut stats = MergeStats {
        inputs: Vec::with_capacity(ordered.len()),
        rows: 0,
        output: out.to_path_buf(),
    };
    let mut records = Vec::new();

    for path in ordered {
        let rows = read_artifact(&path)?;
        debug!(input = %path.display(), rows = rows.len(), "Read normalized artifact");
        stats.rows += rows.len();
        stats.inputs.push((path, rows.len()));
        records.extend(rows);
    }

    if records.is_empty() {
        return Err(EtlError::no_data_to_merge());
    }

    let mut writer = csv::Writer::from_path(out).map_err(csv_error)?;
    writer.write_record(MERGED_HEADER).map_err(csv_error)?;
    for (record_id, record) in (FIRST_RECORD_ID..).zip(&records) {
        let id = record_id.to_string();
        writer
            .write_record(std::iter::once(id.as_str()).chain(record.iter()))
            .map_err(csv_error)?;
    }
    writer.flush()?;

    info!(
        inputs = stats.inputs.len(),
        rows = stats.rows,
        output = %out.display(),
        "Merged normalized artifacts"
    );

    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::write_rows;
    use proptest::prelude::*;
    use salesflow_common::types::{CanonicalRow, SourceKind};

    fn write_artifact(dir: &Path, name: &str, kind: SourceKind, count: usize) -> PathBuf {
        let rows: Vec<CanonicalRow> = (0..count)
            .map(|i| CanonicalRow::new((i + 1).to_string(), format!("P{}", i), "Cat", 2.0, 1, kind))
            .collect();
        let path = dir.join(name);
        write_rows(&rows, std::fs::File::create(&path).unwrap()).unwrap();
        path
    }

    fn record_ids(path: &Path) -> Vec<u64> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap()[0].parse().unwrap())
            .collect()
    }

    #[test]
    fn test_two_three_one_rows_give_ids_one_to_six() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            write_artifact(dir.path(), "instore_sales.csv", SourceKind::Instore, 2),
            write_artifact(dir.path(), "inventory_sales.csv", SourceKind::Inventory, 3),
            write_artifact(dir.path(), "online_sales.csv", SourceKind::Online, 1),
        ];
        let out = dir.path().join("merged.csv");

        let stats = merge(&inputs, &out).unwrap();

        assert_eq!(stats.rows, 6);
        assert_eq!(record_ids(&out), vec![1, 2, 3, 4, 5, 6]);

        let mut reader = csv::Reader::from_path(&out).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            MERGED_HEADER.to_vec()
        );
        let sources: Vec<String> = reader.records().map(|r| r.unwrap()[6].to_string()).collect();
        assert_eq!(
            sources,
            vec!["instore", "instore", "inventory", "inventory", "inventory", "online"]
        );
    }

    #[test]
    fn test_concatenation_follows_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let online = write_artifact(dir.path(), "online_sales.csv", SourceKind::Online, 1);
        let instore = write_artifact(dir.path(), "instore_sales.csv", SourceKind::Instore, 1);
        let out = dir.path().join("merged.csv");

        let stats = merge(&[online, instore.clone()], &out).unwrap();
        assert_eq!(stats.inputs[0].0, instore);
    }

    #[test]
    fn test_no_inputs_is_merge_error_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("merged.csv");

        let err = merge(&[], &out).unwrap_err();

        assert_eq!(err.to_string(), "Merge error: no data to merge");
        assert!(!out.exists());
    }

    #[test]
    fn test_only_empty_artifacts_is_merge_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_artifact(dir.path(), "online_sales.csv", SourceKind::Online, 0);
        let out = dir.path().join("merged.csv");

        assert!(matches!(merge(&[input], &out), Err(EtlError::Merge(_))));
        assert!(!out.exists());
    }

    #[test]
    fn test_foreign_csv_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.csv");
        std::fs::write(&input, "a,b\n1,2\n").unwrap();

        let err = merge(&[input], &dir.path().join("merged.csv")).unwrap_err();
        assert!(matches!(err, EtlError::Merge(_)));
    }

    #[test]
    fn test_discover_artifacts_lists_csv_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "online_sales.csv", SourceKind::Online, 1);
        write_artifact(dir.path(), "instore_sales.csv", SourceKind::Instore, 1);
        std::fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let found = discover_artifacts(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["instore_sales.csv", "online_sales.csv"]);

        assert!(discover_artifacts(&dir.path().join("missing")).unwrap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_record_ids_are_dense(counts in prop::collection::vec(0usize..6, 1..5)) {
            let dir = tempfile::tempdir().unwrap();
            let inputs: Vec<PathBuf> = counts
                .iter()
                .enumerate()
                .map(|(i, &n)| {
                    let name = format!("part_{}.csv", i);
                    write_artifact(dir.path(), &name, SourceKind::Online, n)
                })
                .collect();
            let out = dir.path().join("merged.csv");
            let total: usize = counts.iter().sum();

            match merge(&inputs, &out) {
                Ok(stats) => {
                    prop_assert_eq!(stats.rows, total);
                    let expected: Vec<u64> = (1..=total as u64).collect();
                    prop_assert_eq!(record_ids(&out), expected);
                },
                Err(e) => {
                    prop_assert_eq!(total, 0);
                    prop_assert!(matches!(e, EtlError::Merge(_)));
                },
            }
        }
    }
}
