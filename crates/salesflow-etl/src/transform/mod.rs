//! Normalizer
//!
//! Converts one raw artifact into the canonical row schema. The parse
//! strategy is chosen by the source kind (JSON array, comma-delimited or
//! tab-delimited), never guessed from the content.
//!
//! Rows that fail the validity predicate are dropped and counted as
//! [`TransformWarning`]s; they never fail the step. Only a document that
//! cannot be read as a whole (invalid JSON, missing header columns) is an
//! error.

mod delimited;
mod json;

use salesflow_common::types::{CanonicalRow, RawFormat, SourceKind, CANONICAL_HEADER};
use salesflow_common::{EtlError, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Number of leading fields every source must provide:
/// `id, product, category, price, quantity`
pub const SOURCE_FIELDS: usize = 5;

/// Why a row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransformWarning {
    NonPositivePrice,
    NonPositiveQuantity,
    InvalidPrice,
    InvalidQuantity,
    MissingField(&'static str),
    EmptyField(&'static str),
    /// Delimited row whose width differs from the header
    FieldCount { expected: usize, found: usize },
    /// JSON array element that is not an object
    NotAnObject,
    /// Delimited record the CSV reader could not decode
    Unreadable,
}

impl std::fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformWarning::NonPositivePrice => write!(f, "price <= 0"),
            TransformWarning::NonPositiveQuantity => write!(f, "quantity <= 0"),
            TransformWarning::InvalidPrice => write!(f, "non-numeric price"),
            TransformWarning::InvalidQuantity => write!(f, "non-integer quantity"),
            TransformWarning::MissingField(name) => write!(f, "missing field '{}'", name),
            TransformWarning::EmptyField(name) => write!(f, "empty field '{}'", name),
            TransformWarning::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            },
            TransformWarning::NotAnObject => write!(f, "element is not an object"),
            TransformWarning::Unreadable => write!(f, "unreadable record"),
        }
    }
}

/// Row counts for one normalized source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dropped: BTreeMap<TransformWarning, usize>,
}

impl NormalizeStats {
    pub fn rows_dropped(&self) -> usize {
        self.dropped.values().sum()
    }

    fn record(&mut self, outcome: std::result::Result<(), TransformWarning>) {
        self.rows_read += 1;
        match outcome {
            Ok(()) => self.rows_kept += 1,
            Err(warning) => *self.dropped.entry(warning).or_default() += 1,
        }
    }
}

/// Rows that survived normalization
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub rows: Vec<CanonicalRow>,
    pub stats: NormalizeStats,
}

impl Normalized {
    fn push(&mut self, kind: SourceKind, row: std::result::Result<CanonicalRow, TransformWarning>) {
        match row {
            Ok(row) => {
                self.rows.push(row);
                self.stats.record(Ok(()));
            },
            Err(warning) => {
                debug!(source = %kind, reason = %warning, "Dropped row");
                self.stats.record(Err(warning));
            },
        }
    }
}

/// The five source fields before validation
#[derive(Debug, Default)]
struct SourceFields {
    id: Option<String>,
    product: Option<String>,
    category: Option<String>,
    price: Option<std::result::Result<f64, TransformWarning>>,
    quantity: Option<std::result::Result<i64, TransformWarning>>,
}

impl SourceFields {
    /// Apply the validity predicate and build the canonical row.
    fn into_row(self, kind: SourceKind) -> std::result::Result<CanonicalRow, TransformWarning> {
        let id = required_text(self.id, "id")?;
        let product = required_text(self.product, "product")?;
        let category = required_text(self.category, "category")?;

        let price = self.price.ok_or(TransformWarning::MissingField("price"))??;
        if !price.is_finite() {
            return Err(TransformWarning::InvalidPrice);
        }
        if price <= 0.0 {
            return Err(TransformWarning::NonPositivePrice);
        }

        let quantity = self
            .quantity
            .ok_or(TransformWarning::MissingField("quantity"))??;
        if quantity <= 0 {
            return Err(TransformWarning::NonPositiveQuantity);
        }

        Ok(CanonicalRow::new(id, product, category, price, quantity, kind))
    }
}

fn required_text(
    value: Option<String>,
    name: &'static str,
) -> std::result::Result<String, TransformWarning> {
    let value = value.ok_or(TransformWarning::MissingField(name))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransformWarning::EmptyField(name));
    }
    Ok(trimmed.to_string())
}

fn parse_price(raw: &str) -> std::result::Result<f64, TransformWarning> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| TransformWarning::InvalidPrice)
}

fn parse_quantity(raw: &str) -> std::result::Result<i64, TransformWarning> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| TransformWarning::InvalidQuantity)
}

/// Normalize raw artifact bytes according to the source kind's format
pub fn normalize_bytes(data: &[u8], kind: SourceKind) -> Result<Normalized> {
    match kind.format() {
        RawFormat::Json => json::normalize(data, kind),
        RawFormat::Csv | RawFormat::Tsv => delimited::normalize(data, kind),
    }
}

/// Write rows as a normalized artifact: header first, then one line per row
pub fn write_rows<W: Write>(rows: &[CanonicalRow], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(CANONICAL_HEADER).map_err(csv_error)?;
    for row in rows {
        writer.write_record(row.to_record()).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

/// Normalize a raw artifact on disk into `out`
pub fn normalize_file(raw: &Path, kind: SourceKind, out: &Path) -> Result<NormalizeStats> {
    let data = std::fs::read(raw).map_err(|e| {
        EtlError::transform(
            kind.as_str(),
            format!("cannot read raw artifact {}: {}", raw.display(), e),
        )
    })?;

    let normalized = normalize_bytes(&data, kind)?;

    let file = std::fs::File::create(out)?;
    write_rows(&normalized.rows, std::io::BufWriter::new(file))?;

    let stats = normalized.stats;
    info!(
        source = %kind,
        read = stats.rows_read,
        kept = stats.rows_kept,
        dropped = stats.rows_dropped(),
        output = %out.display(),
        "Normalized source"
    );

    Ok(stats)
}

pub(crate) fn csv_error(err: csv::Error) -> EtlError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => EtlError::Io(e),
        other => EtlError::Unexpected(format!("CSV error: {:?}", other)),
    }
}
