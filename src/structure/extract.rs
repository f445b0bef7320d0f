use crate::spreadsheet::{Bounds, CellValue, Grid};
use crate::structure::{RegionAnalysis, StructureDecision, StructureDetectionError};
use serde::Serialize;

/// Raw table sliced out of a grid: header names and equally wide rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub data: Vec<Vec<CellValue>>,
    pub bounds: Option<Bounds>,
}

/// Row and column counts of an extracted table.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct TableShape {
    pub rows: usize,
    pub columns: usize,
}

impl TableData {
    pub fn shape(&self) -> TableShape {
        TableShape {
            rows: self.data.len(),
            columns: self.columns.len(),
        }
    }
}

/// Slices the header row and the data rows inside `bounds`.
///
/// Header cells past the end of the header row become `Column_<col>` with
/// the absolute column index. Blank cells inside the row are kept as empty
/// names for the cleaner to fill in. Data cells beyond a row's end are empty.
pub fn extract_table(grid: &Grid, bounds: &Bounds, header_row: usize, data_start_row: usize) -> TableData {
    let header_len = grid.rows().get(header_row).map_or(0, Vec::len);
    let columns = (bounds.min_col..=bounds.max_col)
        .map(|col| {
            if col < header_len {
                grid.get(header_row, col).to_text()
            } else {
                format!("Column_{col}")
            }
        })
        .collect();
    let data = (data_start_row..=bounds.max_row)
        .map(|row| {
            (bounds.min_col..=bounds.max_col)
                .map(|col| grid.get(row, col).clone())
                .collect()
        })
        .collect();
    TableData {
        columns,
        data,
        bounds: Some(*bounds),
    }
}

/// Extracts the primary table of a structured or semi-structured decision.
pub fn extract_from_decision(grid: &Grid, decision: &StructureDecision) -> Result<TableData, StructureDetectionError> {
    match (decision.table_bounds, decision.header_row, decision.data_start_row) {
        (Some(bounds), Some(header_row), Some(data_start_row)) => {
            Ok(extract_table(grid, &bounds, header_row, data_start_row))
        }
        _ => Err(StructureDetectionError::MissingTableBounds {
            kind: decision.kind.as_str(),
        }),
    }
}

/// Extracts one table region using the header rows found for it.
pub fn extract_region(grid: &Grid, region: &RegionAnalysis) -> Result<TableData, StructureDetectionError> {
    match (region.header_row, region.data_start_row) {
        (Some(header_row), Some(data_start_row)) => Ok(extract_table(grid, &region.bounds, header_row, data_start_row)),
        _ => Err(StructureDetectionError::MissingTableBounds { kind: "table" }),
    }
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::{Bounds, CellValue, Grid};
    use crate::structure::extract::*;

    #[test]
    fn geometric_slice() {
        let grid = Grid::from_text(vec![
            vec![None, None, None],
            vec![None, Some("Name"), None],
            vec![None, Some("Acme"), Some("100")],
            vec![None, Some("Beta")],
        ]);
        let table = extract_table(&grid, &Bounds::new(1, 3, 1, 2), 1, 2);

        assert_eq!(table.columns, vec!["Name", ""]);
        assert_eq!(
            table.data,
            vec![
                vec![CellValue::from("Acme"), CellValue::from("100")],
                vec![CellValue::from("Beta"), CellValue::Empty],
            ]
        );
        assert_eq!(table.shape(), TableShape { rows: 2, columns: 2 });
    }

    #[test]
    fn header_cells_past_row_end() {
        let grid = Grid::from_text(vec![
            vec![Some("Name"), None, Some("Revenue")],
            vec![Some("Acme"), Some("x"), Some("1"), Some("2")],
        ]);
        let table = extract_table(&grid, &Bounds::new(0, 1, 0, 3), 0, 1);
        assert_eq!(table.columns, vec!["Name", "", "Revenue", "Column_3"]);
    }

    #[test]
    fn region_needs_header_rows() {
        let grid = Grid::from_text(vec![vec![Some("Name")], vec![Some("Acme")]]);
        let mut region = RegionAnalysis {
            bounds: Bounds::new(0, 1, 0, 0),
            area: 2,
            density: 1.0,
            kind: crate::structure::RegionKind::Table,
            confidence: 0.9,
            header_row: Some(0),
            data_start_row: Some(1),
        };
        let table = extract_region(&grid, &region).expect("header rows known");
        assert_eq!(table.columns, vec!["Name"]);
        assert_eq!(table.data, vec![vec![CellValue::from("Acme")]]);

        region.header_row = None;
        assert_eq!(
            extract_region(&grid, &region),
            Err(StructureDetectionError::MissingTableBounds { kind: "table" })
        );
    }
}
