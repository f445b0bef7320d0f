//! # Sheet Sources
//!
//! Turns files into [`Workbook`]s for the pipeline. [`FileSource`] picks a
//! reader by file extension: delimited text (`.csv`, `.tsv`), JSON workbook
//! dumps (`.json`) and Office Open XML workbooks (`.xlsx`, `.xlsm`).
pub mod delimited;
pub mod json;
pub mod xlsx;
mod xml;

use crate::spreadsheet::Workbook;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("Cannot read '{path}': unsupported file format")]
    UnsupportedFormat { path: String },

    #[error("File '{path}' is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid workbook dump: {0}")]
    InvalidJsonLayout(String),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("Unknown XML entity '{0}'")]
    XmlEntityError(String),

    #[error("Workbook part '{0}' is missing")]
    MissingPart(String),

    #[error("Invalid value '{value}' at {position}")]
    InvalidCellValue { position: String, value: String },

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    GlobError(#[from] glob::GlobError),
}

impl SourceError {
    /// Short tag for result objects.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::IoError(_) | SourceError::GlobError(_) => "io",
            SourceError::UnsupportedFormat { .. } => "unsupported_format",
            SourceError::FileTooLarge { .. } => "file_too_large",
            SourceError::PatternError(_) => "pattern",
            _ => "invalid_file",
        }
    }
}

/// Loads the sheets of one file.
///
/// Implementations must be shareable across worker threads.
pub trait SheetSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Workbook, SourceError>;
}

/// Reads workbooks from the local file system.
#[derive(Copy, Clone, Debug)]
pub struct FileSource {
    max_file_size: u64,
}

impl FileSource {
    pub fn new(max_file_size: u64) -> Self {
        FileSource { max_file_size }
    }
}

/// File name without directories, used as the sheet name of single-sheet formats.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Sheet1".to_owned())
}

impl SheetSource for FileSource {
    fn load(&self, path: &Path) -> Result<Workbook, SourceError> {
        let size = std::fs::metadata(path)?.len();
        if size > self.max_file_size {
            return Err(SourceError::FileTooLarge {
                path: path.display().to_string(),
                size,
                limit: self.max_file_size,
            });
        }

        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        debug!("Loading {} as '{extension}'", path.display());
        match extension.as_str() {
            "csv" => delimited::read_delimited(&std::fs::read(path)?, b',', &file_stem(path)),
            "tsv" | "tab" => delimited::read_delimited(&std::fs::read(path)?, b'\t', &file_stem(path)),
            "json" => json::read_json(&std::fs::read(path)?, &file_stem(path)),
            "xlsx" | "xlsm" => xlsx::read_xlsx(BufReader::new(File::open(path)?)),
            _ => Err(SourceError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

/// Expands glob patterns relative to `directory` into a sorted list of files.
///
/// # Arguments
///
/// * `directory` - Base directory the patterns are joined to
/// * `patterns` - Glob patterns such as `*.csv` or `**/*.xlsx`
///
/// # Returns
///
/// * `Result<Vec<PathBuf>, SourceError>` - Matching regular files without duplicates
pub fn discover_files<S: AsRef<str>>(directory: &Path, patterns: &[S]) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = vec![];
    for pattern in patterns {
        let pattern = directory.join(pattern.as_ref());
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let path = entry?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
