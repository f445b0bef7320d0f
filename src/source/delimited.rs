//! Comma and tab separated text.
use crate::source::SourceError;
use crate::spreadsheet::{CellValue, Grid, Workbook};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use tracing::debug;

/// Decodes raw bytes: a byte order mark wins, then UTF-8, then Windows-1252.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text;
    }
    match UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text,
        None => {
            debug!("Input is not valid UTF-8, decoding as {}", WINDOWS_1252.name());
            WINDOWS_1252.decode_without_bom_handling(bytes).0
        }
    }
}

/// Reads delimited text into a single-sheet workbook.
///
/// Every record becomes a row, the first one included; there is no header
/// handling here. Empty fields become [`CellValue::Empty`], everything else
/// stays text for the detectors to classify.
///
/// # Arguments
///
/// * `bytes` - File content in any supported encoding
/// * `delimiter` - Field separator, usually `b','` or `b'\t'`
/// * `sheet_name` - Name of the only sheet
pub fn read_delimited(bytes: &[u8], delimiter: u8, sheet_name: &str) -> Result<Workbook, SourceError> {
    let text = decode(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        let row: Vec<CellValue> = record
            .iter()
            .map(|field| match field {
                "" => CellValue::Empty,
                field => CellValue::Text(field.to_owned()),
            })
            .collect();
        rows.push(row);
    }
    Ok(Workbook {
        sheets: vec![(sheet_name.to_owned(), Grid::new(rows))],
    })
}

#[cfg(test)]
mod tests {
    use crate::source::delimited::*;

    #[test]
    fn ragged_records() {
        let workbook = read_delimited(b"Name,Revenue\nAcme,\"1,000\"\n\nBeta\n", b',', "sales").expect("valid csv");
        let (name, grid) = &workbook.sheets[0];
        assert_eq!(name, "sales");
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.get(1, 1), &CellValue::from("1,000"));
        assert_eq!(grid.rows()[2], vec![CellValue::from("Beta")]);
    }

    #[test]
    fn tabs_and_empty_fields() {
        let workbook = read_delimited(b"a\t\tc\n", b'\t', "t").expect("valid tsv");
        assert_eq!(
            workbook.sheets[0].1.rows()[0],
            vec![CellValue::from("a"), CellValue::Empty, CellValue::from("c")]
        );
    }

    #[test]
    fn decode_encodings() {
        assert_eq!(decode(b"\xEF\xBB\xBFName"), "Name");
        assert_eq!(decode(b"\xFF\xFEN\0o\0"), "No");
        assert_eq!(decode("Zürich".as_bytes()), "Zürich");
        assert_eq!(decode(b"Z\xFCrich"), "Zürich");
    }
}
