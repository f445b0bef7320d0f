//! # Privacy-Safe Metadata
//!
//! Summaries of processing results that carry shapes, counts, type tags and
//! aggregate statistics but never a raw cell value: no category values, no
//! entity names and no document values, only document key names.
use crate::cleaner::column::ColumnType;
use crate::cleaner::serialize_pairs;
use crate::cleaner::stats::{round2, TypeDetails};
use crate::cleaner::CleanedTable;
use crate::detectors::date::{DateColumnAnalysis, Granularity, PeriodInfo};
use crate::detectors::entity::{extract_entities, EntityColumnAnalysis, EntityType};
use crate::parser::{KeyValueDocument, Node};
use crate::pipeline::{BatchReport, DocumentResult, FileResult, SheetResult, Status, TableResult};
use crate::spreadsheet::Bounds;
use crate::structure::StructureType;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Aggregate statistics that are safe to share.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnDetails {
    Numeric { min: f64, max: f64, mean: f64, std: f64 },
    Text { min_length: usize, max_length: usize, avg_length: f64 },
    Date { min_date: NaiveDate, max_date: NaiveDate },
    Categorical { category_count: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: ColumnType,
    pub non_null_count: usize,
    pub unique_count: usize,
    pub missing_percentage: f64,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub details: Option<ColumnDetails>,
}

/// Entity counts of one column, without the names.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntitySummary {
    pub entity_count: usize,
    pub unique_entities: usize,
    pub entity_types: BTreeMap<EntityType, usize>,
}

impl From<&EntityColumnAnalysis> for EntitySummary {
    fn from(analysis: &EntityColumnAnalysis) -> Self {
        EntitySummary {
            entity_count: analysis.entity_count,
            unique_entities: analysis.unique_entities,
            entity_types: analysis.entity_types.clone(),
        }
    }
}

/// Calendar coverage of one date column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatePeriod {
    pub granularity: Granularity,
    pub parse_rate: f64,
    #[serde(flatten)]
    pub period: PeriodInfo,
}

impl From<&DateColumnAnalysis> for DatePeriod {
    fn from(analysis: &DateColumnAnalysis) -> Self {
        DatePeriod {
            granularity: analysis.granularity,
            parse_rate: analysis.parse_rate,
            period: analysis.period.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_rows: usize,
    pub total_columns: usize,
    /// `100 - mean missing percentage`, two decimals; 100 for tables without columns
    pub completeness: f64,
    pub removed_duplicates: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    pub columns: Vec<ColumnSummary>,
    #[serde(serialize_with = "serialize_pairs")]
    pub entities: Vec<(String, EntitySummary)>,
    #[serde(serialize_with = "serialize_pairs")]
    pub date_periods: Vec<(String, DatePeriod)>,
    pub data_quality: DataQuality,
}

/// Shape of a document entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyShape {
    Nested {
        keys: Vec<String>,
        #[serde(skip_serializing_if = "KeyHierarchy::is_empty")]
        nested: KeyHierarchy,
    },
    List {
        count: usize,
    },
    Value,
}

/// Key names of a document and the shape of their entries, in document order.
///
/// Reserved keys starting with `_` are left out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyHierarchy(pub Vec<(String, KeyShape)>);

impl KeyHierarchy {
    pub fn of(document: &KeyValueDocument) -> Self {
        let entries = document
            .entries()
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, node)| {
                let shape = match node {
                    Node::Section(section) => KeyShape::Nested {
                        keys: section.keys().map(str::to_owned).collect(),
                        nested: KeyHierarchy::of(section),
                    },
                    Node::Content(paragraphs) => KeyShape::List {
                        count: paragraphs.len(),
                    },
                    Node::Value(_) => KeyShape::Value,
                };
                (key.clone(), shape)
            })
            .collect();
        KeyHierarchy(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for KeyHierarchy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_pairs(&self.0, serializer)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    pub key_hierarchy: KeyHierarchy,
    pub total_keys: usize,
    pub max_depth: usize,
    pub has_nested_structure: bool,
    /// Entity categories found in key names
    pub key_entity_types: BTreeMap<EntityType, usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_type: Option<StructureType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub tables: Vec<TableSummary>,
    pub documents: Vec<DocumentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileSummary {
    pub file_name: String,
    pub status: Status,
    pub sheet_count: usize,
    pub sheets: Vec<SheetSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

/// Overview of a whole batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchOverview {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_sheets: usize,
    pub structure_types: BTreeMap<&'static str, usize>,
    pub has_entities: bool,
    pub has_dates: bool,
}

fn column_details(kind: ColumnType, details: Option<&TypeDetails>) -> Option<ColumnDetails> {
    match (kind, details?) {
        (ColumnType::Integer | ColumnType::Float, TypeDetails::Numeric { min, max, mean, std, .. }) => {
            Some(ColumnDetails::Numeric {
                min: *min,
                max: *max,
                mean: *mean,
                std: *std,
            })
        }
        (ColumnType::Text, TypeDetails::Text { min_length, max_length, avg_length }) => Some(ColumnDetails::Text {
            min_length: *min_length,
            max_length: *max_length,
            avg_length: *avg_length,
        }),
        (ColumnType::Date, TypeDetails::Date { min_date, max_date }) => Some(ColumnDetails::Date {
            min_date: *min_date,
            max_date: *max_date,
        }),
        (ColumnType::Categorical, TypeDetails::Categorical { category_count, .. }) => {
            Some(ColumnDetails::Categorical {
                category_count: *category_count,
            })
        }
        _ => None,
    }
}

/// Mean completeness over the columns' missing percentages.
pub fn completeness(table: &CleanedTable) -> f64 {
    if table.missing_values.is_empty() {
        return 100.0;
    }
    let missing: f64 = table.missing_values.iter().map(|(_, stats)| stats.percentage).sum();
    round2(100.0 - missing / table.missing_values.len() as f64)
}

pub fn summarize_table(result: &TableResult) -> TableSummary {
    let table = &result.table;
    let columns = table
        .columns
        .iter()
        .map(|name| {
            let data_type = table.data_type(name).unwrap_or(ColumnType::Unknown);
            let description = table.description(name);
            ColumnSummary {
                name: name.clone(),
                data_type,
                non_null_count: description.map_or(0, |d| d.non_null_count),
                unique_count: description.map_or(0, |d| d.unique_count),
                missing_percentage: table.missing(name).map_or(0.0, |m| m.percentage),
                details: column_details(data_type, description.and_then(|d| d.details.as_ref())),
            }
        })
        .collect();

    TableSummary {
        bounds: result.bounds,
        columns,
        entities: table
            .entity_columns
            .iter()
            .map(|(name, analysis)| (name.clone(), EntitySummary::from(analysis)))
            .collect(),
        date_periods: table
            .date_columns
            .iter()
            .map(|(name, analysis)| (name.clone(), DatePeriod::from(analysis)))
            .collect(),
        data_quality: DataQuality {
            total_rows: table.row_count,
            total_columns: table.columns.len(),
            completeness: completeness(table),
            removed_duplicates: table.removed_duplicates,
        },
    }
}

fn key_names(document: &KeyValueDocument, names: &mut Vec<String>) {
    for (key, node) in document.entries() {
        if key.starts_with('_') {
            continue;
        }
        names.push(key.clone());
        if let Some(section) = node.as_section() {
            key_names(section, names);
        }
    }
}

pub fn summarize_document(result: &DocumentResult) -> DocumentSummary {
    let mut names = vec![];
    key_names(&result.content, &mut names);
    let mut key_entity_types = BTreeMap::new();
    for entity in names.iter().flat_map(|name| extract_entities(name)) {
        *key_entity_types.entry(EntityType::classify(&entity)).or_insert(0) += 1;
    }

    DocumentSummary {
        bounds: result.bounds,
        key_hierarchy: KeyHierarchy::of(&result.content),
        total_keys: result.total_keys,
        max_depth: result.max_depth,
        has_nested_structure: result.max_depth > 1,
        key_entity_types,
    }
}

pub fn summarize_sheet(result: &SheetResult) -> SheetSummary {
    SheetSummary {
        name: result.name.clone(),
        status: result.status,
        structure_type: result.structure.as_ref().map(|structure| structure.kind),
        confidence: result.structure.as_ref().map(|structure| structure.confidence),
        tables: result.tables.iter().map(summarize_table).collect(),
        documents: result.documents.iter().map(summarize_document).collect(),
        error_kind: result.error.as_ref().map(|error| error.kind),
    }
}

pub fn summarize_file(result: &FileResult) -> FileSummary {
    FileSummary {
        file_name: result.file_name.clone(),
        status: result.status,
        sheet_count: result.sheets.len(),
        sheets: result.sheets.iter().map(summarize_sheet).collect(),
        error_kind: result.error.as_ref().map(|error| error.kind),
    }
}

pub fn summarize_batch(report: &BatchReport) -> BatchOverview {
    let mut overview = BatchOverview {
        total_files: report.summary.total_files,
        succeeded: report.summary.succeeded,
        failed: report.summary.failed,
        total_sheets: report.summary.total_sheets,
        ..BatchOverview::default()
    };
    for sheet in report.results.iter().flat_map(|file| &file.sheets) {
        if let Some(structure) = &sheet.structure {
            *overview.structure_types.entry(structure.kind.as_str()).or_insert(0) += 1;
        }
        overview.has_entities |= sheet.tables.iter().any(|table| !table.table.entity_columns.is_empty());
        overview.has_dates |= sheet.tables.iter().any(|table| !table.table.date_columns.is_empty());
    }
    overview
}
