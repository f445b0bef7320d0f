//! Key/value evidence over a region's rectangular sub-grid.
use crate::spreadsheet::CellValue;
use regex::Regex;
use std::sync::LazyLock;

static LABEL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(name|id|date|value|type)").expect("Hardcode regex pattern"));

/// A column needs this many key-like cells to count as a vertical pattern.
const MIN_VERTICAL_KEYS: usize = 2;

/// Patterns found by the key/value test.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct KeyValueEvidence {
    /// Rows with a label followed by a value
    pub horizontal: usize,
    /// Columns alternating keys and values
    pub vertical: usize,
    /// `min(1, patterns / (rows + columns))`
    pub confidence: f64,
}

impl KeyValueEvidence {
    pub fn patterns(&self) -> usize {
        self.horizontal + self.vertical
    }
}

fn label_text(cell: &CellValue) -> Option<&str> {
    cell.as_text().map(str::trim).filter(|text| !text.is_empty())
}

/// The first non-empty cell of the row looks like a label for its right neighbour.
fn is_horizontal_pair(row: &[CellValue]) -> bool {
    let Some(index) = row.iter().position(|cell| !cell.is_blank()) else {
        return false;
    };
    let Some(label) = label_text(&row[index]) else {
        return false;
    };
    if label.contains(':') {
        return true;
    }
    match row.get(index + 1) {
        Some(value) if !value.is_blank() => label != value.to_text().trim(),
        _ => false,
    }
}

/// Key-like cells at positions 0, 2, 4, … each followed by a value slot.
fn is_vertical_pattern(column: &[&CellValue]) -> bool {
    if column.len() < 2 {
        return false;
    }
    let keys = (0..column.len() - 1)
        .step_by(2)
        .filter_map(|index| label_text(column[index]))
        .filter(|label| label.ends_with(':') || LABEL_WORD.is_match(label))
        .count();
    keys >= MIN_VERTICAL_KEYS
}

/// Scans a sub-grid for horizontal and vertical key/value patterns.
///
/// # Returns
///
/// * `Option<KeyValueEvidence>` - The evidence, or `None` if no pattern was found
pub fn check_key_value(rows: &[Vec<CellValue>], max_scan_rows: usize, max_scan_cols: usize) -> Option<KeyValueEvidence> {
    if rows.is_empty() {
        return None;
    }
    let horizontal = rows
        .iter()
        .take(max_scan_rows)
        .filter(|row| is_horizontal_pair(row))
        .count();

    let width = rows.iter().map(Vec::len).min().unwrap_or(0);
    let vertical = if rows.len() >= 2 {
        (0..width.min(max_scan_cols))
            .filter(|&col| {
                let column: Vec<&CellValue> = rows.iter().map(|row| &row[col]).collect();
                is_vertical_pattern(&column)
            })
            .count()
    } else {
        0
    };

    let patterns = horizontal + vertical;
    if patterns == 0 {
        return None;
    }
    let span = rows.len() + rows[0].len();
    Some(KeyValueEvidence {
        horizontal,
        vertical,
        confidence: (patterns as f64 / span as f64).min(1.0),
    })
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::{Bounds, Grid};
    use crate::structure::key_value::*;

    fn sub_grid(rows: Vec<Vec<Option<&'static str>>>) -> Vec<Vec<CellValue>> {
        let grid = Grid::from_text(rows);
        grid.sub_grid(&Bounds::new(0, grid.height() - 1, 0, grid.width() - 1))
    }

    #[test]
    fn horizontal_labels() {
        let rows = sub_grid(vec![
            vec![Some("COMPANY OVERVIEW"), None],
            vec![Some("Name:"), Some("Acme Corp")],
            vec![Some("Founded:"), Some("1999")],
        ]);
        let evidence = check_key_value(&rows, 20, 20).expect("labels should be found");

        assert_eq!(evidence.horizontal, 2);
        assert_eq!(evidence.vertical, 0);
        assert_eq!(evidence.confidence, 0.4);
    }

    #[test]
    fn vertical_alternation() {
        let rows = sub_grid(vec![
            vec![Some("Client Name")],
            vec![Some("Acme")],
            vec![Some("Deal Type")],
            vec![Some("Merger")],
        ]);
        let evidence = check_key_value(&rows, 20, 20).expect("alternation should be found");

        assert_eq!(evidence.vertical, 1);
        assert_eq!(evidence.horizontal, 0);
        assert_eq!(evidence.confidence, 0.2);
    }

    #[test]
    fn repeated_values_are_not_labels() {
        let rows = sub_grid(vec![vec![Some("x"), Some("x")], vec![Some("y"), Some("y")]]);
        assert_eq!(check_key_value(&rows, 20, 20), None);
    }

    #[test]
    fn scan_limits_apply() {
        let rows = sub_grid(vec![
            vec![Some("a"), Some("b")],
            vec![Some("Key:"), Some("Value")],
        ]);
        let evidence = check_key_value(&rows, 1, 20).expect("first row should count");
        assert_eq!(evidence.horizontal, 1);
    }
}
