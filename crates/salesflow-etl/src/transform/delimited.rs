//! Comma- and tab-delimited sources
//!
//! The first line is a header. Fields are taken by position: the first five
//! columns are `id, product, category, price, quantity`, any further columns
//! are ignored. A row whose width differs from the header is dropped.

use super::{parse_price, parse_quantity, Normalized, SourceFields, TransformWarning, SOURCE_FIELDS};
use salesflow_common::types::SourceKind;
use salesflow_common::{EtlError, Result};

pub(super) fn normalize(data: &[u8], kind: SourceKind) -> Result<Normalized> {
    let mut normalized = Normalized::default();

    // An empty export (e.g. an empty table) has no header and no rows
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(normalized);
    }

    let delimiter = kind.format().delimiter().ok_or_else(|| {
        EtlError::Unexpected(format!("source '{}' is not a delimited format", kind))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let width = reader
        .headers()
        .map_err(|e| EtlError::transform(kind.as_str(), format!("unreadable header: {}", e)))?
        .len();

    if width < SOURCE_FIELDS {
        return Err(EtlError::transform(
            kind.as_str(),
            format!(
                "header has {} column(s), expected at least {}",
                width, SOURCE_FIELDS
            ),
        ));
    }

    for record in reader.records() {
        let row = match record {
            Ok(record) if record.len() != width => Err(TransformWarning::FieldCount {
                expected: width,
                found: record.len(),
            }),
            Ok(record) => {
                let text = |i: usize| record.get(i).map(str::to_string);
                SourceFields {
                    id: text(0),
                    product: text(1),
                    category: text(2),
                    price: record.get(3).map(parse_price),
                    quantity: record.get(4).map(parse_quantity),
                }
                .into_row(kind)
            },
            Err(_) => Err(TransformWarning::Unreadable),
        };
        normalized.push(kind, row);
    }

    Ok(normalized)
}
