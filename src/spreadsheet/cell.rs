use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static SLASHED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}").expect("Hardcode regex pattern")
});

static ISO_LIKE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}[/-]\d{1,2}[/-]\d{1,2}").expect("Hardcode regex pattern")
});

/// A raw cell value as handed over by the spreadsheet-reading collaborator.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    /// Absent cell or explicit blank
    #[default]
    Empty,
    /// Floating point number
    Number(f64),
    /// Whole number
    Integer(i64),
    /// Free text, not trimmed
    Text(String),
    /// Boolean literal
    Boolean(bool),
    /// Date or datetime already formatted by the reader
    DateLike(String),
}

/// Coarse value category used by row and region analyses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CellKind {
    Empty,
    Number,
    Date,
    Text,
}

impl CellValue {
    /// Returns true for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) | CellValue::DateLike(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Returns the textual content, if the cell holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Renders the value as the string a user would see in the cell.
    ///
    /// Integral floats are printed without a fractional part, so `100.0`
    /// and `100` compare equal after rendering.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(number) if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 => {
                format!("{}", *number as i64)
            }
            CellValue::Number(number) => number.to_string(),
            CellValue::Integer(integer) => integer.to_string(),
            CellValue::Text(text) | CellValue::DateLike(text) => text.to_owned(),
            CellValue::Boolean(value) => value.to_string(),
        }
    }

    /// Classifies the cell as empty, number, date or text.
    pub fn kind(&self) -> CellKind {
        if self.is_blank() {
            return CellKind::Empty;
        }
        match self {
            CellValue::Number(_) | CellValue::Integer(_) => CellKind::Number,
            CellValue::DateLike(_) => CellKind::Date,
            CellValue::Boolean(_) => CellKind::Text,
            CellValue::Text(text) => {
                let text = text.trim();
                if text.parse::<f64>().is_ok_and(f64::is_finite) {
                    CellKind::Number
                } else if SLASHED_DATE.is_match(text) || ISO_LIKE_DATE.is_match(text) {
                    CellKind::Date
                } else {
                    CellKind::Text
                }
            }
            CellValue::Empty => CellKind::Empty,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Converts an Excel serial day number (1900 epoch) to a calendar date.
/// Handles the Lotus 1-2-3 leap year bug: serials below 60 are shifted by one day,
/// and the fictitious 1900-02-29 (serial 60) reads as 1900-02-28.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let days = serial_days(serial)?;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::try_days(days + if days < 60 { 1 } else { 0 })?)
}

/// Whole days of a serial, or `None` when they do not fit a calendar offset.
fn serial_days(serial: f64) -> Option<i64> {
    let days = serial.trunc();
    (days.abs() < i32::MAX as f64).then_some(days as i64)
}

/// Converts an Excel serial number to a date and time of day.
///
/// # Arguments
///
/// * `serial` - Days since the epoch, the fraction being the time of day
/// * `is_1904` - Whether the workbook counts from 1904-01-01 instead of 1900
///
/// # Returns
///
/// * `Option<NaiveDateTime>` - `None` for non-finite, negative or out-of-calendar serials
pub fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    let date = if is_1904 {
        if !serial.is_finite() || serial < 0.0 {
            return None;
        }
        NaiveDate::from_ymd_opt(1904, 1, 1)?.checked_add_signed(Duration::try_days(serial_days(serial)?)?)?
    } else {
        serial_to_date(serial)?
    };
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    date.and_time(NaiveTime::MIN).checked_add_signed(Duration::try_seconds(seconds)?)
}

#[cfg(test)]
mod tests {
    use crate::spreadsheet::cell::*;

    #[test]
    fn blank_cells() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("   ").is_blank());
        assert!(!CellValue::from(" x ").is_blank());
        assert!(!CellValue::Integer(0).is_blank());
        assert!(!CellValue::Boolean(false).is_blank());
    }

    #[test]
    fn render_numbers() {
        assert_eq!(CellValue::Number(100.0).to_text(), "100");
        assert_eq!(CellValue::Number(1.5).to_text(), "1.5");
        assert_eq!(CellValue::Integer(-3).to_text(), "-3");
        assert_eq!(CellValue::Boolean(true).to_text(), "true");
    }

    #[test]
    fn classify_cells() {
        assert_eq!(CellValue::Empty.kind(), CellKind::Empty);
        assert_eq!(CellValue::from("  ").kind(), CellKind::Empty);
        assert_eq!(CellValue::from("100").kind(), CellKind::Number);
        assert_eq!(CellValue::from(" -2.5 ").kind(), CellKind::Number);
        assert_eq!(CellValue::from("inf").kind(), CellKind::Text);
        assert_eq!(CellValue::from("31/12/2023").kind(), CellKind::Date);
        assert_eq!(CellValue::from("2023-12-31").kind(), CellKind::Date);
        assert_eq!(CellValue::DateLike("2023-12-31T00:00:00".to_owned()).kind(), CellKind::Date);
        assert_eq!(CellValue::Boolean(true).kind(), CellKind::Text);
        assert_eq!(CellValue::from("Revenue").kind(), CellKind::Text);
    }

    #[test]
    fn excel_serial_dates() {
        assert_eq!(serial_to_date(1.0), NaiveDate::from_ymd_opt(1900, 1, 1));
        assert_eq!(serial_to_date(59.0), NaiveDate::from_ymd_opt(1900, 2, 28));
        // 1900-02-29 does not exist; it reads as the day before.
        assert_eq!(serial_to_date(60.0), NaiveDate::from_ymd_opt(1900, 2, 28));
        assert_eq!(serial_to_date(61.0), NaiveDate::from_ymd_opt(1900, 3, 1));
        assert_eq!(serial_to_date(45291.0), NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(serial_to_date(0.5), None);
    }

    #[test]
    fn serial_datetimes() {
        let noon = serial_to_datetime(45291.5, false).map(|value| value.to_string());
        assert_eq!(noon.as_deref(), Some("2023-12-31 12:00:00"));
        let date = serial_to_datetime(0.0, true).map(|value| value.date());
        assert_eq!(date, NaiveDate::from_ymd_opt(1904, 1, 1));
        assert_eq!(serial_to_datetime(f64::NAN, false), None);
    }

    #[test]
    fn huge_serials_are_not_dates() {
        assert_eq!(serial_to_date(1e20), None);
        assert_eq!(serial_to_date(3e9), None);
        assert_eq!(serial_to_datetime(1e20, false), None);
        assert_eq!(serial_to_datetime(1e20, true), None);
        assert_eq!(serial_to_datetime(f64::MAX, true), None);
    }
}
