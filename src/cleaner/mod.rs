//! # Data Cleaning
//!
//! Turns an extracted [`TableData`] into a [`CleanedTable`]: unique column
//! names, missing-value sentinels, a seeded type-inference sample per column,
//! type conversion and descriptive statistics.
//!
//! A column whose conversion fails is kept as cleaned text and reported in
//! [`CleanedTable::unconverted_columns`]; it never aborts the table.
pub mod column;
pub mod names;
pub mod stats;

use crate::cleaner::column::{
    convert_column, infer_column_type, unconverted, ColumnSample, ColumnType, ConversionOptions, Value,
};
use crate::cleaner::names::clean_column_names;
use crate::cleaner::stats::{ColumnDescription, MissingStats};
use crate::config::Settings;
use crate::detectors::date::{analyze_date_column, DateColumnAnalysis};
use crate::detectors::entity::{analyze_entity_column, is_entity_column, EntityColumnAnalysis};
use crate::spreadsheet::CellValue;
use crate::structure::extract::TableData;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Tokens treated as missing, matched case-sensitively.
const MISSING_TOKENS: [&str; 10] = ["N/A", "n/a", "NA", "null", "NULL", "None", "NONE", "-", "--", "---"];

#[derive(Error, Debug, PartialEq)]
pub enum CleaningError {
    #[error("Value '{value}' in column '{column}' does not fit a 64-bit integer")]
    IntegerOutOfRange { column: String, value: String },
}

/// Serializes ordered `(name, value)` pairs as a map, keeping their order.
pub(crate) fn serialize_pairs<S, V>(pairs: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (key, value) in pairs {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

/// A cleaned, typed table with per-column statistics.
///
/// Column-keyed fields keep column order and serialize as JSON objects.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CleanedTable {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Value>>,
    #[serde(serialize_with = "serialize_pairs")]
    pub data_types: Vec<(String, ColumnType)>,
    pub row_count: usize,
    #[serde(serialize_with = "serialize_pairs")]
    pub missing_values: Vec<(String, MissingStats)>,
    #[serde(serialize_with = "serialize_pairs")]
    pub descriptions: Vec<(String, ColumnDescription)>,
    /// Columns kept as text because conversion failed
    pub unconverted_columns: Vec<String>,
    pub removed_duplicates: usize,
    #[serde(serialize_with = "serialize_pairs")]
    pub entity_columns: Vec<(String, EntityColumnAnalysis)>,
    #[serde(serialize_with = "serialize_pairs")]
    pub date_columns: Vec<(String, DateColumnAnalysis)>,
}

fn lookup<'t, V>(pairs: &'t [(String, V)], column: &str) -> Option<&'t V> {
    pairs.iter().find(|(name, _)| name == column).map(|(_, value)| value)
}

impl CleanedTable {
    /// Returns true for the empty-result shape.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn data_type(&self, column: &str) -> Option<ColumnType> {
        lookup(&self.data_types, column).copied()
    }

    pub fn missing(&self, column: &str) -> Option<&MissingStats> {
        lookup(&self.missing_values, column)
    }

    pub fn description(&self, column: &str) -> Option<&ColumnDescription> {
        lookup(&self.descriptions, column)
    }

    /// Values of one column in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|name| name == column)?;
        Some(self.data.iter().map(|row| &row[index]).collect())
    }
}

/// Cleans extracted tables according to the cleaning settings.
#[derive(Clone, Debug)]
pub struct DataCleaner<'a> {
    settings: &'a Settings,
}

impl<'a> DataCleaner<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        DataCleaner { settings }
    }

    /// Cleans one table.
    ///
    /// # Arguments
    ///
    /// * `table` - Header names and raw rows from the table extractor
    ///
    /// # Returns
    ///
    /// * `CleanedTable` - The cleaned table; the empty shape if there are no columns or no rows
    pub fn clean(&self, table: &TableData) -> CleanedTable {
        if table.columns.is_empty() || table.data.is_empty() {
            return CleanedTable::default();
        }

        let columns = clean_column_names(&table.columns);
        let mut rows: Vec<Vec<Option<String>>> = table
            .data
            .iter()
            .map(|row| (0..columns.len()).map(|index| self.clean_value(row.get(index))).collect())
            .collect();

        let mut removed_duplicates = 0;
        if self.settings.remove_duplicates {
            let before = rows.len();
            let mut seen = HashSet::new();
            rows.retain(|row| seen.insert(row.clone()));
            removed_duplicates = before - rows.len();
            if removed_duplicates > 0 {
                info!("Removed {removed_duplicates} duplicate rows");
            }
        }

        let options = ConversionOptions {
            standardize_dates: self.settings.standardize_dates,
            integer_missing_as_zero: self.settings.integer_missing_as_zero,
        };
        let mut cleaned = CleanedTable {
            row_count: rows.len(),
            removed_duplicates,
            ..CleanedTable::default()
        };
        let mut converted_columns: Vec<Vec<Value>> = Vec::with_capacity(columns.len());

        for (index, name) in columns.iter().enumerate() {
            let values: Vec<Option<String>> = rows.iter().map(|row| row[index].clone()).collect();
            let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
            let sample = self.sample(&present, index);
            let kind = if self.settings.infer_data_types {
                infer_column_type(&ColumnSample {
                    name,
                    sample: &sample,
                    values: &present,
                })
            } else {
                ColumnType::Unknown
            };
            debug!("Column '{name}' inferred as {}", kind.as_str());

            cleaned.missing_values.push((name.clone(), MissingStats::of(&values)));
            let converted = match convert_column(name, kind, &values, options) {
                Ok((converted, filled)) => {
                    if filled > 0 {
                        warn!("Filled {filled} missing or unparsable cells with 0 in integer column '{name}'");
                    }
                    converted
                }
                Err(e) => {
                    warn!("{e}, keeping column '{name}' unconverted");
                    cleaned.unconverted_columns.push(name.clone());
                    unconverted(&values)
                }
            };
            cleaned.descriptions.push((name.clone(), ColumnDescription::of(kind, &converted)));

            if matches!(kind, ColumnType::Text | ColumnType::Categorical) && is_entity_column(name, &sample) {
                if let Some(analysis) = analyze_entity_column(&present) {
                    cleaned.entity_columns.push((name.clone(), analysis));
                }
            }
            if kind == ColumnType::Date {
                if let Some(analysis) = analyze_date_column(&present) {
                    cleaned.date_columns.push((name.clone(), analysis));
                }
            }
            cleaned.data_types.push((name.clone(), kind));
            converted_columns.push(converted);
        }

        cleaned.data = (0..cleaned.row_count)
            .map(|row| converted_columns.iter().map(|column| column[row].clone()).collect())
            .collect();
        cleaned.columns = columns;
        cleaned
    }

    /// Cleans one raw cell; `None` marks a missing value unless a replacement is configured.
    fn clean_value(&self, cell: Option<&CellValue>) -> Option<String> {
        let replacement = || self.settings.replace_missing_with.clone();
        let Some(cell) = cell.filter(|cell| !cell.is_blank()) else {
            return replacement();
        };
        let text = cell.to_text();
        let text = if self.settings.trim_whitespace {
            text.trim().to_owned()
        } else {
            text
        };
        if text.trim().is_empty() || MISSING_TOKENS.contains(&text.as_str()) {
            return replacement();
        }
        Some(text)
    }

    /// Draws up to `sample_size` values, seeded per column, in original order.
    fn sample<'v>(&self, values: &[&'v str], column_index: usize) -> Vec<&'v str> {
        let size = self.settings.sample_size;
        if values.len() <= size {
            return values.to_vec();
        }
        let mut rng = StdRng::seed_from_u64(self.settings.sample_seed.wrapping_add(column_index as u64));
        let mut indices = index::sample(&mut rng, values.len(), size).into_vec();
        indices.sort_unstable();
        indices.into_iter().map(|index| values[index]).collect()
    }
}
