//! Common types used across the pipeline
//!
//! The canonical row schema is the contract between the normalizer, the
//! merger and the reporter. Column order is fixed and written as a header
//! row at the top of every normalized artifact and of the merged dataset.

use serde::{Deserialize, Serialize};

/// Header of every normalized artifact
pub const CANONICAL_HEADER: [&str; 7] = [
    "id",
    "product",
    "category",
    "price",
    "quantity",
    "source",
    "total_sales",
];

/// Header of the merged dataset
pub const MERGED_HEADER: [&str; 8] = [
    "record_id",
    "id",
    "product",
    "category",
    "price",
    "quantity",
    "source",
    "total_sales",
];

/// On-disk shape of a raw artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawFormat {
    /// Array of objects
    Json,
    /// Comma-delimited with a header row
    Csv,
    /// Tab-delimited with a header row (database export)
    Tsv,
}

impl RawFormat {
    /// Field delimiter for the tabular formats
    pub fn delimiter(self) -> Option<u8> {
        match self {
            RawFormat::Json => None,
            RawFormat::Csv => Some(b','),
            RawFormat::Tsv => Some(b'\t'),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RawFormat::Json => "json",
            RawFormat::Csv => "csv",
            RawFormat::Tsv => "tsv",
        }
    }
}

/// Which source a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Online,
    Instore,
    Inventory,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] =
        [SourceKind::Online, SourceKind::Instore, SourceKind::Inventory];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Online => "online",
            SourceKind::Instore => "instore",
            SourceKind::Inventory => "inventory",
        }
    }

    /// Raw format produced by this source's adapter
    pub fn format(self) -> RawFormat {
        match self {
            SourceKind::Online => RawFormat::Json,
            SourceKind::Instore => RawFormat::Csv,
            SourceKind::Inventory => RawFormat::Tsv,
        }
    }

    /// File name of the raw artifact in the staging area
    pub fn raw_file_name(self) -> String {
        format!("{}_raw.{}", self.as_str(), self.format().extension())
    }

    /// File name of the normalized artifact in the processed area
    pub fn normalized_file_name(self) -> String {
        format!("{}_sales.csv", self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(SourceKind::Online),
            "instore" => Ok(SourceKind::Instore),
            "inventory" => Ok(SourceKind::Inventory),
            other => Err(format!("Invalid source kind: {}", other)),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a decimal value the way every artifact stores it.
///
/// Uses the shortest representation that parses back to the same `f64`,
/// so `8.0` is written as `8` and `7.5` as `7.5`.
pub fn format_decimal(value: f64) -> String {
    format!("{}", value)
}

/// A row after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    /// Source-local identifier, not unique across sources
    pub id: String,
    pub product: String,
    pub category: String,
    pub price: f64,
    pub quantity: i64,
    pub source: SourceKind,
    /// Always `price * quantity`
    pub total_sales: f64,
}

impl CanonicalRow {
    /// Build a row, computing `total_sales` from price and quantity
    pub fn new(
        id: impl Into<String>,
        product: impl Into<String>,
        category: impl Into<String>,
        price: f64,
        quantity: i64,
        source: SourceKind,
    ) -> Self {
        Self {
            id: id.into(),
            product: product.into(),
            category: category.into(),
            price,
            quantity,
            source,
            total_sales: price * quantity as f64,
        }
    }

    /// Fields in `CANONICAL_HEADER` order
    pub fn to_record(&self) -> [String; 7] {
        [
            self.id.clone(),
            self.product.clone(),
            self.category.clone(),
            format_decimal(self.price),
            self.quantity.to_string(),
            self.source.as_str().to_string(),
            format_decimal(self.total_sales),
        ]
    }
}

/// A row of the merged dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    /// Dense position in the merged dataset, starting at 1
    pub record_id: u64,
    pub row: CanonicalRow,
}

impl MergedRow {
    /// Parse a merged-dataset record laid out as `MERGED_HEADER`
    pub fn from_record(record: &csv::StringRecord) -> std::result::Result<Self, String> {
        if record.len() != MERGED_HEADER.len() {
            return Err(format!(
                "expected {} fields, found {}",
                MERGED_HEADER.len(),
                record.len()
            ));
        }

        let field = |i: usize| record.get(i).unwrap_or_default();

        let record_id = field(0)
            .parse::<u64>()
            .map_err(|e| format!("invalid record_id '{}': {}", field(0), e))?;
        let price = field(4)
            .parse::<f64>()
            .map_err(|e| format!("invalid price '{}': {}", field(4), e))?;
        let quantity = field(5)
            .parse::<i64>()
            .map_err(|e| format!("invalid quantity '{}': {}", field(5), e))?;
        let source = field(6).parse::<SourceKind>()?;
        let total_sales = field(7)
            .parse::<f64>()
            .map_err(|e| format!("invalid total_sales '{}': {}", field(7), e))?;

        Ok(Self {
            record_id,
            row: CanonicalRow {
                id: field(1).to_string(),
                product: field(2).to_string(),
                category: field(3).to_string(),
                price,
                quantity,
                source,
                total_sales,
            },
        })
    }
}
