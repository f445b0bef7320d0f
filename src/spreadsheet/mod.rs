//! # Spreadsheet Grid Model
//!
//! In-memory representation of one sheet as handed over by a reading
//! collaborator: ragged rows of [`CellValue`]s, plus the bounding box type
//! used by every analysis and the Excel-style position helpers used in logs.
pub mod cell;

pub use cell::{CellKind, CellValue};
use serde::Serialize;

static EMPTY: CellValue = CellValue::Empty;

/// Converts 0-based row and column indices to an Excel-style position (e.g. `A1`).
///
/// # Arguments
///
/// * `row` - The 0-based row index
/// * `column` - The 0-based column index
///
/// # Returns
///
/// * `String` - Excel-style cell position in upper case
pub fn cell_position(row: usize, column: usize) -> String {
    let row = (row + 1).to_string();
    let mut column = column + 1;
    let mut position = String::new();
    while column > 0 {
        column -= 1;
        let digit = char::from_u32(65 + (column % 26) as u32).expect("Hardcode letters");
        column /= 26;
        position.insert(0, digit)
    }
    position.push_str(row.as_str());
    position
}

/// Parses an Excel-style position such as `B3` into 0-based `(row, column)`.
///
/// Absolute markers (`$B$3`) are accepted; anything else that is not
/// letters followed by a positive row number yields `None`.
pub fn parse_cell_position(position: &str) -> Option<(usize, usize)> {
    let position = position.replace('$', "");
    let split = position.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = position.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let column = letters
        .chars()
        .try_fold(0usize, |column, c| {
            column.checked_mul(26)?.checked_add((c.to_ascii_uppercase() as u8 - b'A') as usize + 1)
        })?;
    let row = digits.parse::<usize>().ok()?.checked_sub(1)?;
    Some((row, column - 1))
}

/// Inclusive rectangular area of a grid, 0-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Bounds {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl Bounds {
    pub fn new(min_row: usize, max_row: usize, min_col: usize, max_col: usize) -> Self {
        Bounds { min_row, max_row, min_col, max_col }
    }

    /// Number of rows covered.
    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.min_row..=self.max_row).contains(&row) && (self.min_col..=self.max_col).contains(&col)
    }

    /// Excel-style range reference such as `A1:C10`.
    pub fn reference(&self) -> String {
        format!(
            "{}:{}",
            cell_position(self.min_row, self.min_col),
            cell_position(self.max_row, self.max_col)
        )
    }
}

/// A sheet's cells. Rows may have different lengths; missing cells read as empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Grid { rows }
    }

    /// Builds a grid of text cells; `None` entries become empty cells.
    pub fn from_text<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = Option<&'static str>>,
    {
        Grid {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(CellValue::from).collect())
                .collect(),
        }
    }

    /// Returns the cell at the position, or an empty cell when out of range.
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows.get(row).and_then(|cells| cells.get(col)).unwrap_or(&EMPTY)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Returns true when no cell holds a non-blank value.
    pub fn is_blank(&self) -> bool {
        self.rows.iter().flatten().all(CellValue::is_blank)
    }

    /// Copies the bounded area into a rectangular sub-grid, padding with empty cells.
    pub fn sub_grid(&self, bounds: &Bounds) -> Vec<Vec<CellValue>> {
        (bounds.min_row..=bounds.max_row)
            .map(|row| {
                (bounds.min_col..=bounds.max_col)
                    .map(|col| self.get(row, col).clone())
                    .collect()
            })
            .collect()
    }
}

/// Ordered collection of named sheets read from one file.
#[derive(Clone, Debug, Default)]
pub struct Workbook {
    pub sheets: Vec<(String, Grid)>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::*;

    #[test]
    fn positions() {
        assert_eq!(cell_position(0, 0), "A1");
        assert_eq!(cell_position(9, 25), "Z10");
        assert_eq!(cell_position(0, 26), "AA1");
        assert_eq!(cell_position(4, 702), "AAA5");
        assert_eq!(Bounds::new(0, 2, 1, 3).reference(), "B1:D3");
    }

    #[test]
    fn parse_positions() {
        assert_eq!(parse_cell_position("A1"), Some((0, 0)));
        assert_eq!(parse_cell_position("$AA$5"), Some((4, 26)));
        assert_eq!(parse_cell_position("aaa5"), Some((4, 702)));
        assert_eq!(parse_cell_position("A0"), None);
        assert_eq!(parse_cell_position("12"), None);
        assert_eq!(parse_cell_position("B2C"), None);
    }

    #[test]
    fn ragged_rows_read_as_empty() {
        let grid = Grid::from_text(vec![vec![Some("a"), Some("b"), Some("c")], vec![Some("d")]]);

        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(1, 2), &CellValue::Empty);
        assert_eq!(grid.get(7, 7), &CellValue::Empty);

        let sub = grid.sub_grid(&Bounds::new(0, 1, 1, 2));
        assert_eq!(sub[1], vec![CellValue::Empty, CellValue::Empty]);
        assert_eq!(sub[0][0], CellValue::from("b"));
    }

    #[test]
    fn blank_grid() {
        assert!(Grid::default().is_blank());
        assert!(Grid::from_text(vec![vec![None, Some(" ")], vec![None]]).is_blank());
        assert!(!Grid::from_text(vec![vec![None, Some("x")]]).is_blank());
    }
}
