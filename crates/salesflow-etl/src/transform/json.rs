//! JSON array-of-objects source

use super::{parse_price, parse_quantity, Normalized, SourceFields, TransformWarning};
use salesflow_common::types::SourceKind;
use salesflow_common::{EtlError, Result};
use serde_json::{Map, Value};

pub(super) fn normalize(data: &[u8], kind: SourceKind) -> Result<Normalized> {
    let document: Value = serde_json::from_slice(data)
        .map_err(|e| EtlError::transform(kind.as_str(), format!("invalid JSON: {}", e)))?;

    let Value::Array(items) = document else {
        return Err(EtlError::transform(
            kind.as_str(),
            "expected a JSON array of objects",
        ));
    };

    let mut normalized = Normalized::default();
    for item in items {
        let row = match item {
            Value::Object(object) => fields(&object).into_row(kind),
            _ => Err(TransformWarning::NotAnObject),
        };
        normalized.push(kind, row);
    }

    Ok(normalized)
}

fn fields(object: &Map<String, Value>) -> SourceFields {
    SourceFields {
        id: object.get("id").and_then(text),
        product: object.get("product").and_then(text),
        category: object.get("category").and_then(text),
        price: object.get("price").map(price),
        quantity: object.get("quantity").map(quantity),
    }
}

/// Strings as-is, numbers in their JSON spelling
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn price(value: &Value) -> std::result::Result<f64, TransformWarning> {
    match value {
        Value::Number(n) => n.as_f64().ok_or(TransformWarning::InvalidPrice),
        Value::String(s) => parse_price(s),
        _ => Err(TransformWarning::InvalidPrice),
    }
}

fn quantity(value: &Value) -> std::result::Result<i64, TransformWarning> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .ok_or(TransformWarning::InvalidQuantity),
        Value::String(s) => parse_quantity(s),
        _ => Err(TransformWarning::InvalidQuantity),
    }
}
