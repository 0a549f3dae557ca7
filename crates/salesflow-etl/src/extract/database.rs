//! Query-dump adapter for the inventory database
//!
//! Runs `SELECT * FROM <table>` once and writes the whole result set as a
//! tab-delimited file with a header row of column names. NULL cells are
//! written as empty fields. Any failure (connect, auth, missing table,
//! undecodable column) fails the whole extraction; there is no partial dump.
//!
//! The driver is chosen from the URL scheme. SQLite cells are read as text,
//! which SQLite produces for every storage class. Postgres cells are decoded
//! by column type, with a text fallback for types not listed here.

use super::SourceAdapter;
use crate::context::RunContext;
use async_trait::async_trait;
use salesflow_common::error::BoxError;
use salesflow_common::types::SourceKind;
use salesflow_common::{EtlError, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, JsonValue, Uuid};
use sqlx::{Column, Decode, Postgres, Row, TypeInfo};
use std::path::PathBuf;
use tracing::{debug, info};

/// Database flavour behind a connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> std::result::Result<Self, BoxError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(format!("unsupported database URL scheme '{}'", scheme).into()),
        }
    }
}

/// Dumps the inventory table through the native sqlx driver for its URL
#[derive(Debug, Clone)]
pub struct DatabaseDumpAdapter {
    url: String,
    table: String,
}

impl DatabaseDumpAdapter {
    /// `table` must already be validated as a plain identifier
    pub fn new(url: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            table: table.into(),
        }
    }

    pub fn query(&self) -> String {
        format!("SELECT * FROM {}", self.table)
    }

    async fn dump(&self) -> std::result::Result<Vec<u8>, BoxError> {
        let query = self.query();
        debug!(query = %query, "Running inventory export");

        match Backend::from_url(&self.url)? {
            Backend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect(&self.url)
                    .await?;
                let rows = sqlx::query(&query).fetch_all(&pool).await;
                pool.close().await;
                self.render(&rows?, pg_cell_text)
            },
            Backend::Sqlite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(&self.url)
                    .await?;
                let rows = sqlx::query(&query).fetch_all(&pool).await;
                pool.close().await;
                self.render(&rows?, sqlite_cell_text)
            },
        }
    }

    /// Tab-delimited export: column names, then one line per row
    fn render<R: Row>(
        &self,
        rows: &[R],
        cell: fn(&R, usize) -> std::result::Result<String, sqlx::Error>,
    ) -> std::result::Result<Vec<u8>, BoxError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());

        if let Some(first) = rows.first() {
            writer.write_record(first.columns().iter().map(|c| c.name()))?;
        }

        for row in rows {
            let mut record = Vec::with_capacity(row.len());
            for index in 0..row.len() {
                record.push(cell(row, index)?);
            }
            writer.write_record(&record)?;
        }

        info!(table = %self.table, rows = rows.len(), "Exported inventory table");

        Ok(writer.into_inner().map_err(|e| e.into_error())?)
    }
}

#[async_trait]
impl SourceAdapter for DatabaseDumpAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Inventory
    }

    fn name(&self) -> String {
        format!("inventory ({})", self.table)
    }

    async fn extract(&self, ctx: &RunContext) -> Result<PathBuf> {
        let bytes = self
            .dump()
            .await
            .map_err(|cause| EtlError::extraction(self.name(), cause))?;

        let dest = ctx.raw_path(SourceKind::Inventory);
        tokio::fs::write(&dest, bytes)
            .await
            .map_err(|e| EtlError::extraction(self.name(), e))?;

        Ok(dest)
    }
}

/// SQLite converts any stored value to text on request, so no type dispatch
/// is needed. The declared column type (DATETIME, DECIMAL, ...) is ignored.
fn sqlite_cell_text(row: &SqliteRow, index: usize) -> std::result::Result<String, sqlx::Error> {
    row.try_get_unchecked::<Option<String>, _>(index)
        .map(Option::unwrap_or_default)
}

fn pg_cell_text(row: &PgRow, index: usize) -> std::result::Result<String, sqlx::Error> {
    fn text<T>(row: &PgRow, index: usize) -> std::result::Result<String, sqlx::Error>
    where
        T: ToString + for<'r> Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(index)
            .map(|value| value.map(|v| v.to_string()).unwrap_or_default())
    }

    let type_name = row.column(index).type_info().name().to_ascii_uppercase();
    match type_name.as_str() {
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => text::<String>(row, index),
        "INT2" => text::<i16>(row, index),
        "INT4" => text::<i32>(row, index),
        "INT8" => text::<i64>(row, index),
        "FLOAT4" => text::<f32>(row, index),
        "FLOAT8" => text::<f64>(row, index),
        "NUMERIC" => text::<BigDecimal>(row, index),
        "BOOL" => text::<bool>(row, index),
        "DATE" => text::<NaiveDate>(row, index),
        "TIME" => text::<NaiveTime>(row, index),
        "TIMESTAMP" => text::<NaiveDateTime>(row, index),
        "TIMESTAMPTZ" => text::<DateTime<Utc>>(row, index),
        "UUID" => text::<Uuid>(row, index),
        "JSON" | "JSONB" => text::<JsonValue>(row, index),
        // Enums, domains and other text-like types arrive as UTF-8
        _ => row
            .try_get_unchecked::<Option<String>, _>(index)
            .map(Option::unwrap_or_default),
    }
}
