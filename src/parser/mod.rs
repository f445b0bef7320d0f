//! # Unstructured Parsing
//!
//! Walks the cells of a key/value region row by row and builds a nested
//! [`KeyValueDocument`]: section headers open top-level entries, subsection
//! headers open nested ones, `key: value` cells and standalone keys are stored
//! at the deepest open level, and leftover prose is collected under `_content`.
pub mod document;

pub use document::{KeyValueDocument, Node, CONTENT_KEY};

use crate::spreadsheet::{Bounds, CellValue, Grid};
use crate::structure::StructureDecision;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// Section headers only appear in the first columns of a region.
const MAX_SECTION_COLUMN: usize = 2;

/// Keys are shorter than this many characters.
const MAX_KEY_LENGTH: usize = 50;

static SECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^[A-Z][A-Z\s]+$", r"^\d+\.\s+[A-Z]", r"^Section\s+\d+"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Hardcode regex pattern"))
        .collect()
});

static SUBSECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^\d+\.\d+\s+", r"^[a-z]\)", r"^\s{2,}[A-Z]"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Hardcode regex pattern"))
        .collect()
});

static KEY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+\.\s+[A-Za-z]|[•·▪▫◦‣⁃]\s+|\([a-z]\)|\d+\))").expect("Hardcode regex pattern")
});

static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)+\s+|\d+(?:\.\d+)*\.\s*|\d+\)\s*|\(?[a-z]\)\s*|[•·▪▫◦‣⁃\-]\s*)")
        .expect("Hardcode regex pattern")
});

#[derive(Error, Debug, PartialEq)]
pub enum ParsingError {
    #[error("Region {reference} lies outside the {rows}x{cols} grid")]
    RegionOutOfGrid { reference: String, rows: usize, cols: usize },
}

/// Strips numbering, lettered markers, bullets and a trailing colon; collapses whitespace.
fn clean_label(text: &str) -> String {
    let text = text.trim();
    let stripped = LABEL_PREFIX.replace(text, "");
    let stripped = stripped.trim().trim_end_matches(':');
    let label = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if label.is_empty() {
        text.trim_end_matches(':').trim().to_owned()
    } else {
        label
    }
}

/// True for text with at least one uppercase letter and no lowercase ones.
fn is_all_caps(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

fn is_section_header(text: &str, column: usize, leads_row: bool) -> bool {
    if !leads_row || column > MAX_SECTION_COLUMN {
        return false;
    }
    let text = text.trim();
    SECTION_PATTERNS.iter().any(|pattern| pattern.is_match(text))
        || (is_all_caps(text)
            && text.split_whitespace().count() > 1
            && !text.ends_with(':')
            && split_key_value(text).is_none())
}

/// `raw` keeps its leading whitespace for the indentation pattern.
fn is_subsection_header(raw: &str, leads_row: bool) -> bool {
    if !leads_row {
        return false;
    }
    let raw = raw.trim_end();
    if SUBSECTION_PATTERNS.iter().any(|pattern| pattern.is_match(raw)) {
        return true;
    }
    let text = raw.trim_start();
    let words: Vec<&str> = text.split_whitespace().collect();
    let capitalized = words
        .iter()
        .filter(|word| word.starts_with(|c: char| c.is_uppercase()))
        .count();
    words.len() > 1 && capitalized * 2 > words.len() && !text.ends_with(':') && split_key_value(text).is_none()
}

fn is_header(raw: &str, column: usize, leads_row: bool) -> bool {
    is_section_header(raw, column, leads_row) || is_subsection_header(raw, leads_row)
}

/// Splits `key: value` or `key = value`; the key must be non-empty and short.
fn split_key_value(text: &str) -> Option<(String, Option<String>)> {
    [':', '='].iter().find_map(|separator| {
        let (key, value) = text.split_once(*separator)?;
        if key.trim().is_empty() || key.chars().count() >= MAX_KEY_LENGTH {
            return None;
        }
        let value = value.trim();
        Some((clean_label(key), (!value.is_empty()).then(|| value.to_owned())))
    })
}

fn is_standalone_key(text: &str) -> bool {
    text.ends_with(':') || KEY_MARKER.is_match(text)
}

/// Parser state: the open section path and prose waiting for a home.
#[derive(Default)]
struct DocumentBuilder {
    document: KeyValueDocument,
    section: Option<String>,
    subsection: Option<String>,
    pending: Vec<String>,
}

impl DocumentBuilder {
    fn path(&self) -> Vec<String> {
        self.section.iter().chain(self.subsection.iter()).cloned().collect()
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let paragraph = self.pending.join(" ");
        self.pending.clear();
        let path = self.path();
        self.document.level_mut(&path).push_content(paragraph);
    }

    fn open_section(&mut self, name: String) {
        self.flush();
        self.document.section_mut(&name);
        self.section = Some(name);
        self.subsection = None;
    }

    fn open_subsection(&mut self, name: String) {
        self.flush();
        self.subsection = Some(name);
        let path = self.path();
        self.document.level_mut(&path);
    }

    fn store(&mut self, key: &str, value: Option<String>) {
        let path = self.path();
        self.document.level_mut(&path).insert(key, Node::Value(value));
    }

    fn finish(mut self) -> KeyValueDocument {
        self.flush();
        self.document
    }
}

/// The cell right of `column` when it can serve as a value: not a key and not a header.
fn follower(texts: &[Option<String>], column: usize) -> Option<&str> {
    let raw = texts.get(column + 1)?.as_deref()?;
    let usable = split_key_value(raw.trim()).is_none() && !is_header(raw, column + 1, false);
    usable.then(|| raw.trim())
}

/// Parses rows of cells in row-major order.
pub fn parse_rows(rows: &[Vec<CellValue>]) -> KeyValueDocument {
    let mut builder = DocumentBuilder::default();
    for row in rows {
        let texts: Vec<Option<String>> = row
            .iter()
            .map(|cell| (!cell.is_blank()).then(|| cell.to_text()))
            .collect();
        let mut leads_row = true;
        let mut column = 0;
        while column < texts.len() {
            let Some(raw) = texts[column].as_deref() else {
                column += 1;
                continue;
            };
            let text = raw.trim();
            let mut consumed = false;

            if is_section_header(raw, column, leads_row) {
                builder.open_section(clean_label(text));
            } else if is_subsection_header(raw, leads_row) {
                builder.open_subsection(clean_label(text));
            } else if let Some((key, value)) = split_key_value(text) {
                let next = follower(&texts, column);
                consumed = next.is_some();
                let value = match (value, next) {
                    (Some(value), Some(next)) => Some(format!("{value} {next}")),
                    (None, Some(next)) => Some(next.to_owned()),
                    (value, None) => value,
                };
                builder.store(&key, value);
            } else if is_standalone_key(text) {
                let value = follower(&texts, column).map(str::to_owned);
                consumed = value.is_some();
                builder.store(&clean_label(text), value);
            } else {
                builder.pending.push(text.to_owned());
            }

            leads_row = false;
            column += if consumed { 2 } else { 1 };
        }
    }
    builder.finish()
}

/// Parses a whole grid as one document.
pub fn parse_grid(grid: &Grid) -> KeyValueDocument {
    parse_rows(grid.rows())
}

/// Parses the cells inside one region's bounding box.
pub fn parse_region(grid: &Grid, bounds: &Bounds) -> Result<KeyValueDocument, ParsingError> {
    if bounds.max_row >= grid.height() || bounds.max_col >= grid.width() {
        return Err(ParsingError::RegionOutOfGrid {
            reference: bounds.reference(),
            rows: grid.height(),
            cols: grid.width(),
        });
    }
    let document = parse_rows(&grid.sub_grid(bounds));
    debug!(
        "Parsed region {} into {} keys, depth {}",
        bounds.reference(),
        document.total_keys(),
        document.max_depth()
    );
    Ok(document)
}

/// Parses every key/value region of a decision, one document per region.
pub fn parse_regions(grid: &Grid, decision: &StructureDecision) -> Result<Vec<KeyValueDocument>, ParsingError> {
    decision
        .key_value_regions
        .iter()
        .map(|bounds| parse_region(grid, bounds))
        .collect()
}
