//! JSON workbook dumps.
//!
//! Two layouts are accepted: `{"sheets": {"Name": [[...], ...]}}` for
//! several named sheets, or a bare array of rows for a single sheet.
use crate::source::delimited::decode;
use crate::source::SourceError;
use crate::spreadsheet::{CellValue, Grid, Workbook};
use serde_json::Value;

fn cell_value(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(value) => CellValue::Boolean(value),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => CellValue::Integer(integer),
            None => number.as_f64().map(CellValue::Number).unwrap_or_default(),
        },
        Value::String(text) if text.is_empty() => CellValue::Empty,
        Value::String(text) => CellValue::Text(text),
        other => CellValue::Text(other.to_string()),
    }
}

fn grid(sheet: &str, rows: Value) -> Result<Grid, SourceError> {
    let Value::Array(rows) = rows else {
        return Err(SourceError::InvalidJsonLayout(format!("sheet '{sheet}' is not an array of rows")));
    };
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Array(cells) => Ok(cells.into_iter().map(cell_value).collect()),
            _ => Err(SourceError::InvalidJsonLayout(format!("row {} of sheet '{sheet}' is not an array", index + 1))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Grid::new)
}

/// Reads a JSON workbook dump.
///
/// # Arguments
///
/// * `bytes` - File content
/// * `default_sheet_name` - Sheet name used for the bare-array layout
pub fn read_json(bytes: &[u8], default_sheet_name: &str) -> Result<Workbook, SourceError> {
    let document: Value = serde_json::from_str(&decode(bytes))?;
    let sheets = match document {
        Value::Object(mut object) => match object.remove("sheets") {
            Some(Value::Object(sheets)) => sheets
                .into_iter()
                .map(|(name, rows)| grid(&name, rows).map(|grid| (name, grid)))
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(SourceError::InvalidJsonLayout("expected a \"sheets\" object".to_owned())),
        },
        rows @ Value::Array(_) => vec![(default_sheet_name.to_owned(), grid(default_sheet_name, rows)?)],
        _ => return Err(SourceError::InvalidJsonLayout("expected an object or an array".to_owned())),
    };
    Ok(Workbook { sheets })
}

#[cfg(test)]
mod tests {
    use crate::source::json::*;

    #[test]
    fn named_sheets_keep_order() {
        let workbook = read_json(
            br#"{"sheets": {"Summary": [["Fund: Alpha"]], "Data": [["Name", "Amount", "Active"], ["Acme", 12.5, true], [null, 3, ""]]}}"#,
            "unused",
        )
        .expect("valid dump");

        assert_eq!(workbook.sheet_names(), vec!["Summary", "Data"]);
        let data = &workbook.sheets[1].1;
        assert_eq!(
            data.rows()[1],
            vec![CellValue::from("Acme"), CellValue::Number(12.5), CellValue::Boolean(true)]
        );
        assert_eq!(data.rows()[2], vec![CellValue::Empty, CellValue::Integer(3), CellValue::Empty]);
    }

    #[test]
    fn bare_rows() {
        let workbook = read_json(br#"[["a", {"x": 1}]]"#, "rows").expect("valid dump");
        assert_eq!(workbook.sheet_names(), vec!["rows"]);
        assert_eq!(workbook.sheets[0].1.get(0, 1), &CellValue::from(r#"{"x":1}"#));
    }

    #[test]
    fn invalid_layouts() {
        assert!(matches!(read_json(b"{\"tabs\": {}}", "x"), Err(SourceError::InvalidJsonLayout(_))));
        assert!(matches!(read_json(b"[1, 2]", "x"), Err(SourceError::InvalidJsonLayout(_))));
        assert!(matches!(read_json(b"[[1", "x"), Err(SourceError::JsonError(_))));
    }
}
