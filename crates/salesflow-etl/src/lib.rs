//! Salesflow ETL
//!
//! Daily batch pipeline that consolidates sales data from three sources into
//! one merged dataset and a plain-text summary report.
//!
//! # Sources
//!
//! - **Online**: JSON array of sale objects
//! - **In-store**: comma-delimited export with a header row
//! - **Inventory**: a database table, dumped to a tab-delimited export
//!
//! # Example
//!
//! ```no_run
//! use salesflow_etl::config::EtlConfig;
//! use salesflow_etl::context::RunContext;
//! use salesflow_etl::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = RunContext::today(EtlConfig::load()?);
//!     let summary = Pipeline::new(ctx).run().await?;
//!     println!("{}", summary.describe());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod archive;
pub mod config;
pub mod context;
pub mod extract;
pub mod load;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod transform;

pub use pipeline::{Pipeline, PipelineState, RunFailure, RunSummary};
