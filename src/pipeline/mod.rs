//! # Processing Pipeline
//!
//! Connects the pieces: a [`SheetSource`] loads a file into grids, every grid
//! goes through structure detection, then tables are extracted and cleaned
//! while key/value regions are parsed into documents. Failures are caught at
//! the sheet and file boundaries and turned into result objects tagged
//! `success`, `error` or `empty`; a batch never aborts because of one file.
pub mod pool;

use crate::cleaner::{CleanedTable, DataCleaner};
use crate::config::{Execution, Settings};
use crate::error::{ResultMessage, SheetError};
use crate::parser::{parse_grid, parse_region, KeyValueDocument};
use crate::pipeline::pool::{run_sequential, Completed, WorkerPool};
use crate::source::{discover_files, FileSource, SheetSource};
use crate::spreadsheet::{Bounds, Grid};
use crate::structure::extract::extract_region;
use crate::structure::{StructureDecision, StructureDetector, StructureType};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome tag of a sheet or file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Empty,
}

impl Status {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Empty => "empty",
        }
    }
}

/// Human readable failure with a machine readable kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub kind: &'static str,
    pub message: String,
}

impl From<&SheetError> for ErrorInfo {
    fn from(error: &SheetError) -> Self {
        ErrorInfo {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// A cleaned table and where it came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableResult {
    pub bounds: Option<Bounds>,
    pub table: CleanedTable,
}

/// A parsed key/value document; `bounds` is `None` when the whole sheet was parsed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentResult {
    pub bounds: Option<Bounds>,
    pub content: KeyValueDocument,
    pub total_keys: usize,
    pub max_depth: usize,
}

impl DocumentResult {
    fn new(bounds: Option<Bounds>, content: KeyValueDocument) -> Self {
        DocumentResult {
            bounds,
            total_keys: content.total_keys(),
            max_depth: content.max_depth(),
            content,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetResult {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureDecision>,
    pub tables: Vec<TableResult>,
    pub documents: Vec<DocumentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileResult {
    pub path: String,
    pub file_name: String,
    pub status: Status,
    pub sheets: Vec<SheetResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Wall-clock processing time; absent when the task never reported back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl FileResult {
    fn failed(path: &Path, error: ErrorInfo, elapsed_ms: Option<u64>) -> Self {
        FileResult {
            path: path.display().to_string(),
            file_name: file_name(path),
            status: Status::Error,
            sheets: vec![],
            error: Some(error),
            elapsed_ms,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub total_sheets: usize,
    pub elapsed_ms: u64,
}

/// Results of a batch, in completion order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<FileResult>,
    pub summary: BatchSummary,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Tables and documents found on one sheet.
struct SheetContent {
    structure: StructureDecision,
    tables: Vec<TableResult>,
    documents: Vec<DocumentResult>,
}

/// Shareable processing front end; cloning is cheap.
#[derive(Clone)]
pub struct Pipeline {
    settings: Arc<Settings>,
    source: Arc<dyn SheetSource>,
}

impl Pipeline {
    /// Pipeline reading files from disk with [`FileSource`].
    pub fn new(settings: Settings) -> Self {
        let source = FileSource::new(settings.max_file_size);
        Pipeline {
            settings: Arc::new(settings),
            source: Arc::new(source),
        }
    }

    /// Replaces the collaborator that turns paths into workbooks.
    pub fn with_source<S: SheetSource + 'static>(mut self, source: S) -> Self {
        self.source = Arc::new(source);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn analyze_grid(&self, grid: &Grid) -> Result<SheetContent, SheetError> {
        let structure = StructureDetector::new(&self.settings).detect(grid)?;
        let cleaner = DataCleaner::new(&self.settings);

        let mut tables = vec![];
        for region in structure.table_regions() {
            let table = extract_region(grid, region)?;
            tables.push(TableResult {
                bounds: table.bounds,
                table: cleaner.clean(&table),
            });
        }

        let mut documents = vec![];
        for bounds in &structure.key_value_regions {
            documents.push(DocumentResult::new(Some(*bounds), parse_region(grid, bounds)?));
        }
        if structure.kind == StructureType::Unknown {
            debug!("No table or key/value region recognized, parsing the whole sheet");
            documents.push(DocumentResult::new(None, parse_grid(grid)));
        }

        Ok(SheetContent {
            structure,
            tables,
            documents,
        })
    }

    /// Processes one sheet; never fails, errors end up in the result.
    pub fn process_grid(&self, name: &str, grid: &Grid) -> SheetResult {
        match self.analyze_grid(grid) {
            Ok(content) => {
                let status = match content.structure.kind {
                    StructureType::Empty => Status::Empty,
                    _ => Status::Success,
                };
                info!(
                    "Sheet '{name}' is {} (confidence {:.2}): {} tables, {} documents",
                    content.structure.kind.as_str(),
                    content.structure.confidence,
                    content.tables.len(),
                    content.documents.len()
                );
                SheetResult {
                    name: name.to_owned(),
                    status,
                    structure: Some(content.structure),
                    tables: content.tables,
                    documents: content.documents,
                    error: None,
                }
            }
            Err(error) => {
                warn!("Sheet '{name}' failed: {error}");
                SheetResult {
                    name: name.to_owned(),
                    status: Status::Error,
                    structure: None,
                    tables: vec![],
                    documents: vec![],
                    error: Some(ErrorInfo::from(&error)),
                }
            }
        }
    }

    /// Loads a file through the source and processes each of its sheets.
    pub fn process_file(&self, path: &Path) -> FileResult {
        let started = Instant::now();
        let name = file_name(path);
        info!("Processing {}", path.display());
        let loaded = self.source.load(path).map_err(SheetError::from).with_prefix(&name);
        let elapsed_ms = || Some(started.elapsed().as_millis() as u64);
        match loaded {
            Ok(workbook) => {
                let sheets = workbook
                    .sheets
                    .iter()
                    .map(|(sheet_name, grid)| self.process_grid(sheet_name, grid))
                    .collect();
                FileResult {
                    path: path.display().to_string(),
                    file_name: name,
                    status: Status::Success,
                    sheets,
                    error: None,
                    elapsed_ms: elapsed_ms(),
                }
            }
            Err(error) => {
                error!("{error}");
                FileResult::failed(path, ErrorInfo::from(&error), elapsed_ms())
            }
        }
    }

    /// Processes independent files, sequentially or on the worker pool.
    ///
    /// Every path yields exactly one [`FileResult`]; timeouts and panics are
    /// reported as failed results with kind `timeout` and `panic`.
    pub fn process_files(&self, paths: &[PathBuf]) -> BatchReport {
        let started = Instant::now();
        let pipeline = self.clone();
        let task = move |path: PathBuf| pipeline.process_file(&path);
        let completed = match self.settings.execution {
            Execution::Sequential => run_sequential(paths.to_vec(), task),
            Execution::Threaded => {
                WorkerPool::new(self.settings.max_workers, self.settings.file_timeout()).run(paths.to_vec(), task)
            }
        };

        let mut summary = BatchSummary {
            total_files: paths.len(),
            ..BatchSummary::default()
        };
        let results: Vec<FileResult> = completed
            .into_iter()
            .map(|Completed { index, outcome }| match outcome {
                Ok(result) => result,
                Err(failure) => {
                    error!("{}: {failure}", paths[index].display());
                    if failure.kind() == "timeout" {
                        summary.timed_out += 1;
                    }
                    let error = ErrorInfo {
                        kind: failure.kind(),
                        message: format!("{}: {failure}", file_name(&paths[index])),
                    };
                    FileResult::failed(&paths[index], error, None)
                }
            })
            .collect();

        for result in &results {
            match result.status {
                Status::Error => summary.failed += 1,
                _ => summary.succeeded += 1,
            }
            summary.total_sheets += result.sheets.len();
        }
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Processed {} files: {} succeeded, {} failed ({} timed out)",
            summary.total_files, summary.succeeded, summary.failed, summary.timed_out
        );
        BatchReport { results, summary }
    }

    /// Discovers files matching `patterns` under `directory` and processes them.
    pub fn process_directory<S: AsRef<str>>(&self, directory: &Path, patterns: &[S]) -> Result<BatchReport, SheetError> {
        let paths = discover_files(directory, patterns)
            .map_err(SheetError::from)
            .with_prefix(&directory.display().to_string())?;
        info!("Found {} files in {}", paths.len(), directory.display());
        Ok(self.process_files(&paths))
    }
}
