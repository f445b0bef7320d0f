//! # Structure Detection
//!
//! Splits a sheet into connected regions of non-empty cells, classifies each
//! region as a table, a key/value block or unknown, and aggregates the region
//! decisions into one [`StructureDecision`] per sheet.
//!
//! Detection is a pure function of the grid and the settings: the same input
//! always yields the same decision. Ambiguous input yields `unknown` or a low
//! confidence, never an error.
pub mod extract;
pub mod header;
pub mod key_value;
pub mod region;

use crate::config::Settings;
use crate::spreadsheet::{Bounds, Grid};
use crate::structure::header::check_table;
use crate::structure::key_value::check_key_value;
use crate::structure::region::{find_regions, Region};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Internal inconsistencies found while classifying a sheet.
#[derive(Error, Debug, PartialEq)]
pub enum StructureDetectionError {
    #[error("Decision '{kind}' is missing its table bounds, header row or data start row")]
    MissingTableBounds { kind: &'static str },

    #[error("Header row {header_row} must precede data start row {data_start_row} within {reference}")]
    InvalidHeaderRows {
        header_row: usize,
        data_start_row: usize,
        reference: String,
    },

    #[error("Region {reference} lies outside the {rows}x{cols} grid")]
    RegionOutOfGrid { reference: String, rows: usize, cols: usize },
}

/// Overall layout of a sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    Structured,
    Unstructured,
    SemiStructured,
    Unknown,
    Empty,
}

impl StructureType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StructureType::Structured => "structured",
            StructureType::Unstructured => "unstructured",
            StructureType::SemiStructured => "semi_structured",
            StructureType::Unknown => "unknown",
            StructureType::Empty => "empty",
        }
    }

    /// Returns true if the sheet holds at least one table region.
    pub fn has_table(&self) -> bool {
        matches!(self, StructureType::Structured | StructureType::SemiStructured)
    }
}

/// Classification of a single region.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Table,
    KeyValue,
    Unknown,
}

/// A region together with its classification.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionAnalysis {
    pub bounds: Bounds,
    pub area: usize,
    pub density: f64,
    pub kind: RegionKind,
    pub confidence: f64,
    /// Absolute header row of a table region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_row: Option<usize>,
    /// Absolute first data row of a table region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_start_row: Option<usize>,
}

/// Sheet-level classification.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StructureDecision {
    #[serde(rename = "type")]
    pub kind: StructureType,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_start_row: Option<usize>,
    pub key_value_regions: Vec<Bounds>,
    pub regions: Vec<RegionAnalysis>,
}

impl StructureDecision {
    fn empty() -> Self {
        StructureDecision {
            kind: StructureType::Empty,
            confidence: 1.0,
            table_bounds: None,
            header_row: None,
            data_start_row: None,
            key_value_regions: vec![],
            regions: vec![],
        }
    }

    /// Table regions in scan order.
    pub fn table_regions(&self) -> impl Iterator<Item = &RegionAnalysis> {
        self.regions.iter().filter(|region| region.kind == RegionKind::Table)
    }

    /// Checks that a table-bearing decision carries consistent header rows.
    pub fn validate(&self, grid: &Grid) -> Result<(), StructureDetectionError> {
        for region in &self.regions {
            if region.bounds.max_row >= grid.height() || region.bounds.max_col >= grid.width() {
                return Err(StructureDetectionError::RegionOutOfGrid {
                    reference: region.bounds.reference(),
                    rows: grid.height(),
                    cols: grid.width(),
                });
            }
        }
        if !self.kind.has_table() {
            return Ok(());
        }
        match (self.table_bounds, self.header_row, self.data_start_row) {
            (Some(bounds), Some(header_row), Some(data_start_row)) => {
                if header_row < data_start_row && data_start_row <= bounds.max_row {
                    Ok(())
                } else {
                    Err(StructureDetectionError::InvalidHeaderRows {
                        header_row,
                        data_start_row,
                        reference: bounds.reference(),
                    })
                }
            }
            _ => Err(StructureDetectionError::MissingTableBounds {
                kind: self.kind.as_str(),
            }),
        }
    }
}

/// Classifies sheets according to the detection settings.
#[derive(Clone, Debug)]
pub struct StructureDetector<'a> {
    settings: &'a Settings,
}

impl<'a> StructureDetector<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        StructureDetector { settings }
    }

    /// Detects the structure of a whole sheet.
    ///
    /// # Returns
    ///
    /// * `Result<StructureDecision, StructureDetectionError>` - The decision; errors only on internal inconsistency
    pub fn detect(&self, grid: &Grid) -> Result<StructureDecision, StructureDetectionError> {
        if grid.is_blank() {
            return Ok(StructureDecision::empty());
        }

        let regions: Vec<RegionAnalysis> = find_regions(grid)
            .iter()
            .map(|region| self.analyze_region(grid, region))
            .collect();
        let decision = aggregate(regions);
        decision.validate(grid)?;
        Ok(decision)
    }

    /// Classifies one region as table, key/value or unknown.
    pub fn analyze_region(&self, grid: &Grid, region: &Region) -> RegionAnalysis {
        let settings = self.settings;
        let rows = grid.sub_grid(&region.bounds);
        let density = region.density();
        let mut analysis = RegionAnalysis {
            bounds: region.bounds,
            area: region.area,
            density,
            kind: RegionKind::Unknown,
            confidence: 0.0,
            header_row: None,
            data_start_row: None,
        };

        let table = if density >= settings.min_data_density {
            check_table(
                &rows,
                settings.max_scan_rows,
                settings.header_confidence_threshold,
                &settings.header_signal_weights,
            )
        } else {
            None
        };

        if let Some(table) = table {
            analysis.kind = RegionKind::Table;
            analysis.confidence = table.confidence;
            analysis.header_row = Some(region.bounds.min_row + table.header_index);
            analysis.data_start_row = Some(region.bounds.min_row + table.data_start_index);
        } else if let Some(evidence) = check_key_value(&rows, settings.max_scan_rows, settings.max_scan_cols) {
            analysis.kind = RegionKind::KeyValue;
            analysis.confidence = evidence.confidence;
        }

        debug!(
            "Region {} (area {}, density {:.2}) classified as {:?} with confidence {:.3}",
            region.bounds.reference(),
            region.area,
            density,
            analysis.kind,
            analysis.confidence
        );
        analysis
    }
}

fn max_confidence<'a>(regions: impl Iterator<Item = &'a RegionAnalysis>) -> Option<f64> {
    regions.map(|region| region.confidence).reduce(f64::max)
}

/// Combines region decisions into the sheet decision.
fn aggregate(regions: Vec<RegionAnalysis>) -> StructureDecision {
    let table_confidence = max_confidence(regions.iter().filter(|r| r.kind == RegionKind::Table));
    let key_value_confidence = max_confidence(regions.iter().filter(|r| r.kind == RegionKind::KeyValue));
    let first_table = regions.iter().find(|r| r.kind == RegionKind::Table);

    let (kind, confidence) = match (table_confidence, key_value_confidence) {
        (Some(table), Some(key_value)) => (StructureType::SemiStructured, (table + key_value) / 2.0),
        (Some(table), None) => (StructureType::Structured, table),
        (None, Some(key_value)) => (StructureType::Unstructured, key_value),
        (None, None) => (StructureType::Unknown, 0.0),
    };

    StructureDecision {
        kind,
        confidence,
        table_bounds: first_table.map(|r| r.bounds),
        header_row: first_table.and_then(|r| r.header_row),
        data_start_row: first_table.and_then(|r| r.data_start_row),
        key_value_regions: regions
            .iter()
            .filter(|r| r.kind == RegionKind::KeyValue)
            .map(|r| r.bounds)
            .collect(),
        regions,
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, Settings};
    use crate::spreadsheet::{Bounds, Grid};
    use crate::structure::*;

    #[test]
    fn table_sheet() {
        let settings = Settings::default();
        let grid = Grid::from_text(vec![
            vec![Some("Name"), Some("Revenue")],
            vec![Some("Acme"), Some("100")],
            vec![Some("Beta"), Some("200")],
        ]);
        let decision = StructureDetector::new(&settings).detect(&grid).expect("detection should succeed");

        assert_eq!(decision.kind, StructureType::Structured);
        assert_eq!(decision.confidence, 1.0);
        assert_eq!(decision.table_bounds, Some(Bounds::new(0, 2, 0, 1)));
        assert_eq!(decision.header_row, Some(0));
        assert_eq!(decision.data_start_row, Some(1));
        assert!(decision.key_value_regions.is_empty());
    }

    #[test]
    fn key_value_sheet() {
        let settings = Settings::default();
        let grid = Grid::from_text(vec![
            vec![Some("COMPANY OVERVIEW")],
            vec![Some("Name:"), Some("Acme Corp")],
            vec![Some("Founded:"), Some("1999")],
        ]);
        let decision = StructureDetector::new(&settings).detect(&grid).expect("detection should succeed");

        assert_eq!(decision.kind, StructureType::Unstructured);
        assert_eq!(decision.confidence, 0.4);
        assert_eq!(decision.key_value_regions, vec![Bounds::new(0, 2, 0, 1)]);
        assert_eq!(decision.table_bounds, None);
    }

    #[test]
    fn semi_structured_sheet() {
        let settings = Settings::default();
        let grid = Grid::from_text(vec![
            vec![Some("Name"), Some("Revenue")],
            vec![Some("Acme"), Some("100")],
            vec![Some("Beta"), Some("200")],
            vec![],
            vec![Some("Prepared By:"), Some("Jane")],
            vec![Some("Reviewed:"), Some("Bob")],
        ]);
        let decision = StructureDetector::new(&settings).detect(&grid).expect("detection should succeed");

        assert_eq!(decision.kind, StructureType::SemiStructured);
        assert_eq!(decision.confidence, 0.75);
        assert_eq!(decision.regions.len(), 2);
        assert_eq!(decision.table_bounds, Some(Bounds::new(0, 2, 0, 1)));
        assert_eq!(decision.key_value_regions, vec![Bounds::new(4, 5, 0, 1)]);
        decision.validate(&grid).expect("decision should be consistent");
    }

    #[test]
    fn empty_sheet() {
        let settings = Settings::default();
        let grid = Grid::from_text(vec![vec![None, None], vec![None, Some("  ")]]);
        let decision = StructureDetector::new(&settings).detect(&grid).expect("detection should succeed");

        assert_eq!(decision.kind, StructureType::Empty);
        assert_eq!(decision.confidence, 1.0);
        assert!(decision.regions.is_empty());
    }

    #[test]
    fn isolated_cells_are_unknown() {
        let settings = Settings::default();
        let grid = Grid::from_text(vec![vec![Some("a"), None, Some("b")]]);
        let decision = StructureDetector::new(&settings).detect(&grid).expect("detection should succeed");

        assert_eq!(decision.kind, StructureType::Unknown);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.regions.is_empty());
    }

    #[test]
    fn sparse_region_skips_table_test() {
        let settings = Config { min_data_density: 0.9, ..Config::default() }
            .validate()
            .expect("config should validate");
        let grid = Grid::from_text(vec![
            vec![Some("Name"), Some("Revenue"), Some("Region")],
            vec![Some("Acme"), None, None],
            vec![Some("Beta"), Some("200"), Some("North")],
        ]);
        let decision = StructureDetector::new(&settings).detect(&grid).expect("detection should succeed");
        assert_ne!(decision.kind, StructureType::Structured);
    }

    #[test]
    fn detection_is_deterministic() {
        let settings = Settings::default();
        let grid = Grid::from_text(vec![
            vec![Some("Name"), Some("Revenue"), None, Some("Owner:"), Some("Jane")],
            vec![Some("Acme"), Some("100"), None, Some("Status:"), Some("Open")],
        ]);
        let detector = StructureDetector::new(&settings);
        let first = detector.detect(&grid).expect("detection should succeed");
        let second = detector.detect(&grid).expect("detection should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn validation_catches_missing_bounds() {
        let grid = Grid::from_text(vec![vec![Some("a")]]);
        let decision = StructureDecision {
            kind: StructureType::Structured,
            confidence: 1.0,
            table_bounds: None,
            header_row: Some(0),
            data_start_row: Some(1),
            key_value_regions: vec![],
            regions: vec![],
        };
        assert_eq!(
            decision.validate(&grid),
            Err(StructureDetectionError::MissingTableBounds { kind: "structured" })
        );
    }
}
