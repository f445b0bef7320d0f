//! Header-row scoring and the table test.
//!
//! A row's header score is the weighted mean of four signals, each in `[0, 1]`.
//! Before any signal is computed, the row runs through a list of
//! disqualifiers; a disqualified row scores 0.
use crate::spreadsheet::{CellKind, CellValue};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static HEADER_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(name|id|date|time|value|amount|total|count|type|status|description|category|code|number|qty|quantity|price)",
    )
    .expect("Hardcode regex pattern")
});

/// Data rows sampled for column consistency.
const SAMPLED_DATA_ROWS: usize = 10;

/// Tables need at least this many named header columns.
const MIN_HEADER_COLUMNS: usize = 2;

/// Mean row consistency a table must exceed.
const MIN_CONSISTENCY: f64 = 0.5;

type Disqualifier = fn(&[CellValue]) -> bool;

/// Signal over a row and its successor; `None` when it cannot be computed.
type Signal = fn(&[CellValue], Option<&[CellValue]>) -> Option<f64>;

/// Rows rejected outright, in evaluation order.
const DISQUALIFIERS: [(&str, Disqualifier); 1] = [("key/value label row", is_label_row)];

/// Scoring signals, in the order of `header_signal_weights`.
const SIGNALS: [(&str, Signal); 4] = [
    ("text share", text_share),
    ("uniqueness", uniqueness),
    ("header words", header_words),
    ("type difference", type_difference),
];

/// Outcome of the table test on one region.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TableMatch {
    /// Header row, relative to the region's first row
    pub header_index: usize,
    /// First data row, relative to the region's first row
    pub data_start_index: usize,
    /// Mean share of header columns populated in sampled data rows
    pub confidence: f64,
}

/// Labels such as `Name:` mark key/value rows, never headers.
fn is_label_row(row: &[CellValue]) -> bool {
    row.iter()
        .filter_map(CellValue::as_text)
        .any(|text| !text.trim().is_empty() && text.trim_end().ends_with(':'))
}

fn non_empty(row: &[CellValue]) -> Vec<&CellValue> {
    row.iter().filter(|cell| !cell.is_blank()).collect()
}

fn text_share(row: &[CellValue], _next: Option<&[CellValue]>) -> Option<f64> {
    if row.is_empty() {
        return None;
    }
    let texts = row.iter().filter(|cell| cell.kind() == CellKind::Text).count();
    Some(texts as f64 / row.len() as f64)
}

fn uniqueness(row: &[CellValue], _next: Option<&[CellValue]>) -> Option<f64> {
    let cells = non_empty(row);
    if cells.is_empty() {
        return None;
    }
    let distinct: HashSet<String> = cells.iter().map(|cell| cell.to_text()).collect();
    Some(distinct.len() as f64 / cells.len() as f64)
}

fn header_words(row: &[CellValue], _next: Option<&[CellValue]>) -> Option<f64> {
    let cells = non_empty(row);
    if cells.is_empty() {
        return None;
    }
    let matches = cells
        .iter()
        .map(|cell| cell.to_text())
        .filter(|text| text.starts_with(|c: char| c.is_ascii_uppercase()) || HEADER_WORD.is_match(text))
        .count();
    Some(matches as f64 / cells.len() as f64)
}

/// Share of positions whose kinds differ, ignoring positions where either cell is empty.
fn type_difference(row: &[CellValue], next: Option<&[CellValue]>) -> Option<f64> {
    let next = next?;
    let width = row.len().min(next.len());
    if width == 0 {
        return Some(0.0);
    }
    let differences = row
        .iter()
        .zip(next)
        .filter(|(upper, lower)| {
            let (upper, lower) = (upper.kind(), lower.kind());
            upper != lower && upper != CellKind::Empty && lower != CellKind::Empty
        })
        .count();
    Some(differences as f64 / width as f64)
}

/// Scores how much a row looks like a table header.
///
/// # Arguments
///
/// * `row` - Candidate header row
/// * `next` - The row immediately below, if any
/// * `weights` - Weights of the four signals
///
/// # Returns
///
/// * `f64` - Score in `[0, 1]`; 0 for disqualified rows
pub fn score_header_row(row: &[CellValue], next: Option<&[CellValue]>, weights: &[f64; 4]) -> f64 {
    if DISQUALIFIERS.iter().any(|(_, disqualifies)| disqualifies(row)) {
        return 0.0;
    }
    let (total, weight_sum) = SIGNALS
        .iter()
        .zip(weights)
        .filter_map(|((_, signal), weight)| signal(row, next).map(|score| (score * weight, *weight)))
        .fold((0.0, 0.0), |(total, sum), (score, weight)| (total + score, sum + weight));
    if weight_sum > 0.0 {
        total / weight_sum
    } else {
        0.0
    }
}

/// Finds the best-scoring row among the first `max_scan_rows`.
/// Only scores strictly above `threshold` qualify; ties keep the earlier row.
pub fn find_header_row(
    rows: &[Vec<CellValue>],
    max_scan_rows: usize,
    threshold: f64,
    weights: &[f64; 4],
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for index in 0..rows.len().min(max_scan_rows) {
        let next = rows.get(index + 1).map(Vec::as_slice);
        let score = score_header_row(&rows[index], next, weights);
        if score > threshold && best.map_or(true, |(_, max)| score > max) {
            best = Some((index, score));
        }
    }
    best
}

/// Share of expected columns populated in a row.
pub fn row_consistency(row: &[CellValue], expected_cols: &[usize]) -> f64 {
    if row.is_empty() || expected_cols.is_empty() {
        return 0.0;
    }
    let filled = expected_cols
        .iter()
        .filter(|&&col| row.get(col).is_some_and(|cell| !cell.is_blank()))
        .count();
    filled as f64 / expected_cols.len() as f64
}

/// Runs the table test over a region's rectangular sub-grid.
pub fn check_table(
    rows: &[Vec<CellValue>],
    max_scan_rows: usize,
    threshold: f64,
    weights: &[f64; 4],
) -> Option<TableMatch> {
    if rows.len() < 2 {
        return None;
    }
    let (header_index, _) = find_header_row(rows, max_scan_rows, threshold, weights)?;
    let expected_cols: Vec<usize> = rows[header_index]
        .iter()
        .enumerate()
        .filter(|(_, cell)| !cell.is_blank())
        .map(|(col, _)| col)
        .collect();
    if expected_cols.len() < MIN_HEADER_COLUMNS {
        return None;
    }

    let sampled: Vec<f64> = rows[header_index + 1..]
        .iter()
        .take(SAMPLED_DATA_ROWS)
        .map(|row| row_consistency(row, &expected_cols))
        .collect();
    if sampled.is_empty() {
        return None;
    }
    let confidence = sampled.iter().sum::<f64>() / sampled.len() as f64;
    (confidence > MIN_CONSISTENCY).then_some(TableMatch {
        header_index,
        data_start_index: header_index + 1,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::CellValue;
    use crate::structure::header::*;

    const EQUAL: [f64; 4] = [1.0; 4];

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells
            .iter()
            .map(|cell| if cell.is_empty() { CellValue::Empty } else { CellValue::from(*cell) })
            .collect()
    }

    #[test]
    fn header_scores_above_data() {
        let header = row(&["Name", "Revenue"]);
        let first = row(&["Acme", "100"]);
        let second = row(&["Beta", "200"]);

        assert_eq!(score_header_row(&header, Some(&first), &EQUAL), 0.875);
        assert_eq!(score_header_row(&first, Some(&second), &EQUAL), 0.5);
        assert_eq!(find_header_row(&[header, first, second], 20, 0.7, &EQUAL), Some((0, 0.875)));
    }

    #[test]
    fn label_rows_are_disqualified() {
        let label = row(&["Name:", "Acme Corp"]);
        let next = row(&["Founded:", "1999"]);
        assert_eq!(score_header_row(&label, Some(&next), &EQUAL), 0.0);
    }

    #[test]
    fn missing_signals_are_left_out() {
        // Only the text share applies to an all-empty row.
        assert_eq!(score_header_row(&row(&["", ""]), None, &EQUAL), 0.0);
        // No following row: mean of text share, uniqueness and header words.
        assert_eq!(score_header_row(&row(&["Name", "Total"]), None, &EQUAL), 1.0);
    }

    #[test]
    fn weights_shift_the_score() {
        let header = row(&["Name", "Revenue"]);
        let next = row(&["Acme", "100"]);
        let only_type_difference = [0.0, 0.0, 0.0, 1.0];
        assert_eq!(score_header_row(&header, Some(&next), &only_type_difference), 0.5);
    }

    #[test]
    fn threshold_is_strict() {
        let rows = vec![row(&["Name", "Revenue"]), row(&["Acme", "100"])];
        assert_eq!(find_header_row(&rows, 20, 0.875, &EQUAL), None);
    }

    #[test]
    fn distinct_header_over_numeric_rows() {
        let mut rows = vec![row(&["Region", "Units", "Price"])];
        for index in 0..10 {
            let units = (index * 3).to_string();
            let price = format!("{}.5", index);
            rows.push(row(&[&index.to_string(), &units, &price]));
        }
        let (index, score) = find_header_row(&rows, 20, 0.7, &EQUAL).expect("header should be found");
        assert_eq!(index, 0);
        assert!(score > 0.7, "score {score} should exceed the threshold");

        let table = check_table(&rows, 20, 0.7, &EQUAL).expect("rows should form a table");
        assert_eq!(table.data_start_index, 1);
        assert_eq!(table.confidence, 1.0);
    }

    #[test]
    fn sparse_rows_fail_consistency() {
        let rows = vec![
            row(&["Name", "Revenue", "Region"]),
            row(&["Acme", "", ""]),
            row(&["", "", "North"]),
        ];
        assert_eq!(row_consistency(&rows[1], &[0, 1, 2]), 1.0 / 3.0);
        assert_eq!(check_table(&rows, 20, 0.7, &EQUAL), None);
    }
}
