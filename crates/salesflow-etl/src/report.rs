//! Reporter
//!
//! Three independent aggregations over the merged dataset, written in fixed
//! order to one plain-text summary:
//!
//! 1. revenue by category, in ascending category order
//! 2. top products by revenue, descending, at most [`TOP_PRODUCTS_LIMIT`];
//!    equal totals keep the order in which the products first appear
//! 3. low inventory: inventory rows below [`LOW_INVENTORY_THRESHOLD`], in
//!    dataset order

use chrono::NaiveDate;
use salesflow_common::types::{MergedRow, SourceKind, MERGED_HEADER};
use salesflow_common::{EtlError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

pub const TOP_PRODUCTS_LIMIT: usize = 10;

/// Inventory rows with a quantity strictly below this are reported
pub const LOW_INVENTORY_THRESHOLD: i64 = 5;

/// Aggregated view of one merged dataset
#[derive(Debug, Clone, PartialEq)]
pub struct SalesReport {
    pub run_date: NaiveDate,
    pub records: usize,
    pub revenue_by_category: Vec<(String, f64)>,
    pub top_products: Vec<(String, f64)>,
    pub low_inventory: Vec<(String, i64)>,
}

/// Read the merged dataset written by the merger
pub fn load_merged(path: &Path) -> Result<Vec<MergedRow>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        EtlError::Report(format!("cannot read merged dataset {}: {}", path.display(), e))
    })?;

    let header = reader
        .headers()
        .map_err(|e| EtlError::Report(format!("cannot read header of {}: {}", path.display(), e)))?;
    if header.iter().ne(MERGED_HEADER.iter().copied()) {
        return Err(EtlError::Report(format!(
            "{} is not a merged dataset (header: {:?})",
            path.display(),
            header
        )));
    }

    reader
        .records()
        .enumerate()
        .map(|(line, record)| {
            let record = record.map_err(|e| EtlError::Report(e.to_string()))?;
            MergedRow::from_record(&record).map_err(|e| {
                EtlError::Report(format!("{} row {}: {}", path.display(), line + 1, e))
            })
        })
        .collect()
}

/// Sum of `total_sales` per category
pub fn revenue_by_category(rows: &[MergedRow]) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for merged in rows {
        *totals.entry(merged.row.category.as_str()).or_default() += merged.row.total_sales;
    }
    totals
        .into_iter()
        .map(|(category, total)| (category.to_string(), total))
        .collect()
}

/// Products with the highest summed `total_sales`
pub fn top_products(rows: &[MergedRow], limit: usize) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for merged in rows {
        let product = merged.row.product.as_str();
        match index.get(product) {
            Some(&i) => totals[i].1 += merged.row.total_sales,
            None => {
                index.insert(product, totals.len());
                totals.push((product.to_string(), merged.row.total_sales));
            },
        }
    }

    // sort_by is stable: ties stay in first-seen order
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    totals.truncate(limit);
    totals
}

/// Inventory rows whose quantity is below `threshold`
pub fn low_inventory(rows: &[MergedRow], threshold: i64) -> Vec<(String, i64)> {
    rows.iter()
        .filter(|m| m.row.source == SourceKind::Inventory && m.row.quantity < threshold)
        .map(|m| (m.row.product.clone(), m.row.quantity))
        .collect()
}

pub fn summarize(rows: &[MergedRow], run_date: NaiveDate) -> SalesReport {
    SalesReport {
        run_date,
        records: rows.len(),
        revenue_by_category: revenue_by_category(rows),
        top_products: top_products(rows, TOP_PRODUCTS_LIMIT),
        low_inventory: low_inventory(rows, LOW_INVENTORY_THRESHOLD),
    }
}

impl SalesReport {
    pub fn render(&self) -> String {
        let mut out = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(out, "Daily Sales Report: {}", self.run_date.format("%Y-%m-%d"));
        let _ = writeln!(out, "Records: {}", self.records);

        let _ = writeln!(out, "\n== Revenue by Category ==");
        if self.revenue_by_category.is_empty() {
            let _ = writeln!(out, "(none)");
        }
        for (category, total) in &self.revenue_by_category {
            let _ = writeln!(out, "{}: {:.2}", category, total);
        }

        let _ = writeln!(out, "\n== Top {} Products ==", TOP_PRODUCTS_LIMIT);
        if self.top_products.is_empty() {
            let _ = writeln!(out, "(none)");
        }
        for (rank, (product, total)) in self.top_products.iter().enumerate() {
            let _ = writeln!(out, "{}. {}: {:.2}", rank + 1, product, total);
        }

        let _ = writeln!(
            out,
            "\n== Low Inventory (quantity < {}) ==",
            LOW_INVENTORY_THRESHOLD
        );
        if self.low_inventory.is_empty() {
            let _ = writeln!(out, "(none)");
        }
        for (product, quantity) in &self.low_inventory {
            let _ = writeln!(out, "{}: {}", product, quantity);
        }

        out
    }
}

pub fn write_report(report: &SalesReport, path: &Path) -> Result<()> {
    std::fs::write(path, report.render())
        .map_err(|e| EtlError::Report(format!("cannot write {}: {}", path.display(), e)))
}

/// Build the report for the merged dataset at `merged` and write it to `out`
pub fn generate_report(merged: &Path, out: &Path, run_date: NaiveDate) -> Result<SalesReport> {
    let rows = load_merged(merged)?;
    let report = summarize(&rows, run_date);
    write_report(&report, out)?;

    info!(
        report = %out.display(),
        records = report.records,
        categories = report.revenue_by_category.len(),
        low_inventory = report.low_inventory.len(),
        "Wrote sales report"
    );

    Ok(report)
}
