//! # Spreadsheet Structure Analysis
//!
//! Finds out what a spreadsheet sheet actually contains and turns it into
//! clean, typed output.
//!
//! ## Features
//!
//! - **Structure detection**: connected regions of non-empty cells are
//!   classified as tables, key/value blocks or unknown, and each sheet gets
//!   one of `structured`, `unstructured`, `semi_structured`, `unknown` or
//!   `empty` with a confidence
//! - **Table cleaning**: unique column names, missing-value sentinels, seeded
//!   type inference (boolean, date, integer, float, categorical, text),
//!   conversion and descriptive statistics
//! - **Unstructured parsing**: section headers, subsections, `key: value`
//!   cells and free prose become a nested, order-preserving document
//! - **Date and entity hints**: date columns get canonical `YYYY-MM-DD`
//!   values and period information, organisation names are counted by type
//! - **Privacy-safe metadata**: summaries that never carry raw cell values
//! - **Batch processing**: CSV, TSV, JSON and `.xlsx` files processed on a
//!   bounded worker pool with a timeout per file
//!
//! ## Example
//!
//! ```no_run
//! use sheet_structure::config::Config;
//! use sheet_structure::pipeline::Pipeline;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), sheet_structure::error::SheetError> {
//! sheet_structure::logging::init(sheet_structure::logging::DEFAULT_FILTER)?;
//! let pipeline = Pipeline::new(Config::default().validate()?);
//! let report = pipeline.process_directory(Path::new("inbox"), &["*.csv", "*.xlsx"])?;
//! for file in &report.results {
//!     let summary = sheet_structure::metadata::summarize_file(file);
//!     println!("{}", serde_json::to_string(&summary).map_err(anyhow::Error::from)?);
//! }
//! # Ok(())
//! # }
//! ```
pub mod cleaner;
pub mod config;
pub mod detectors;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod spreadsheet;
pub mod structure;
