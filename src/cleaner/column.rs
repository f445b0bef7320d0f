use crate::cleaner::CleaningError;
use crate::detectors::date::{is_date_column, is_date_name, parse_date, parse_date_or_serial};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::LazyLock;

static THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("Hardcode regex pattern"));

const TRUE_VALUES: [&str; 6] = ["true", "yes", "y", "1", "on", "enabled"];
const FALSE_VALUES: [&str; 6] = ["false", "no", "n", "0", "off", "disabled"];

/// A column is numeric when fewer than this share of values fail to parse.
const MAX_NUMERIC_FAILURES: f64 = 0.1;

/// Categorical columns stay below this unique-value ratio ...
const MAX_CATEGORICAL_RATIO: f64 = 0.5;
/// ... and below this many distinct values.
const MAX_CATEGORIES: usize = 100;

/// Semantic type of a cleaned column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Date,
    Integer,
    Float,
    Categorical,
    Text,
    Unknown,
}

impl ColumnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Categorical => "categorical",
            ColumnType::Text => "text",
            ColumnType::Unknown => "unknown",
        }
    }

    /// Parses a type tag, accepting common aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => Some(Self::Boolean),
            "DATE" | "DATETIME" => Some(Self::Date),
            "INT" | "INTEGER" | "BIGINT" => Some(Self::Integer),
            "FLOAT" | "DOUBLE" | "DECIMAL" => Some(Self::Float),
            "CATEGORY" | "CATEGORICAL" => Some(Self::Categorical),
            "TEXT" | "STRING" | "VARCHAR" => Some(Self::Text),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Returns true for integer and float columns.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

/// A cleaned, type-converted cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Missing,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    /// Text form used for uniqueness, lengths and dates; `None` when missing.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Boolean(value) => Some(value.to_string()),
            Value::Integer(value) => Some(value.to_string()),
            Value::Float(value) => Some(value.to_string()),
            Value::Text(value) => Some(value.to_owned()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing => serializer.serialize_none(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Float(value) if value.is_finite() => serializer.serialize_f64(*value),
            Value::Float(_) => serializer.serialize_none(),
            Value::Text(value) => serializer.serialize_str(value),
        }
    }
}

/// Parses plain numbers and `1,234.5`-style numbers; non-finite values are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let number = match text.parse::<f64>() {
        Ok(number) => number,
        Err(_) if THOUSANDS.is_match(text) => text.replace(',', "").parse::<f64>().ok()?,
        Err(_) => return None,
    };
    number.is_finite().then_some(number)
}

/// Maps boolean tokens; anything else is `None`.
pub fn parse_boolean(text: &str) -> Option<bool> {
    let text = text.trim().to_lowercase();
    if TRUE_VALUES.contains(&text.as_str()) {
        Some(true)
    } else if FALSE_VALUES.contains(&text.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// What type inference sees of one column.
pub struct ColumnSample<'a> {
    pub name: &'a str,
    /// Randomly sampled non-missing values
    pub sample: &'a [&'a str],
    /// All non-missing values
    pub values: &'a [&'a str],
}

type Rule = fn(&ColumnSample) -> Option<ColumnType>;

/// Inference rules in priority order; the first match wins.
const RULES: [(&str, Rule); 4] = [
    ("boolean", boolean_rule),
    ("date", date_rule),
    ("numeric", numeric_rule),
    ("categorical", categorical_rule),
];

fn boolean_rule(column: &ColumnSample) -> Option<ColumnType> {
    let distinct: HashSet<String> = column.sample.iter().map(|value| value.to_lowercase()).collect();
    let known = distinct
        .iter()
        .all(|value| TRUE_VALUES.contains(&value.as_str()) || FALSE_VALUES.contains(&value.as_str()));
    (distinct.len() <= 2 && known).then_some(ColumnType::Boolean)
}

fn date_rule(column: &ColumnSample) -> Option<ColumnType> {
    is_date_column(column.name, column.sample).then_some(ColumnType::Date)
}

fn numeric_rule(column: &ColumnSample) -> Option<ColumnType> {
    let numbers: Vec<f64> = column.sample.iter().filter_map(|value| parse_number(value)).collect();
    let failures = column.sample.len() - numbers.len();
    if numbers.is_empty() || failures as f64 / column.sample.len() as f64 >= MAX_NUMERIC_FAILURES {
        return None;
    }
    if numbers.iter().all(|number| number.fract() == 0.0) {
        Some(ColumnType::Integer)
    } else {
        Some(ColumnType::Float)
    }
}

fn categorical_rule(column: &ColumnSample) -> Option<ColumnType> {
    let distinct: HashSet<&str> = column.values.iter().copied().collect();
    let ratio = distinct.len() as f64 / column.values.len() as f64;
    (ratio < MAX_CATEGORICAL_RATIO && distinct.len() < MAX_CATEGORIES).then_some(ColumnType::Categorical)
}

/// Infers the semantic type of a column; `Unknown` when it has no values.
pub fn infer_column_type(column: &ColumnSample) -> ColumnType {
    if column.values.is_empty() || column.sample.is_empty() {
        return ColumnType::Unknown;
    }
    RULES
        .iter()
        .find_map(|(_, rule)| rule(column))
        .unwrap_or(ColumnType::Text)
}

/// Conversion switches taken from the settings.
#[derive(Copy, Clone, Debug)]
pub struct ConversionOptions {
    pub standardize_dates: bool,
    pub integer_missing_as_zero: bool,
}

/// Converts a column's cleaned values to its inferred type.
///
/// # Returns
///
/// * `Result<(Vec<Value>, usize), CleaningError>` - Converted values and the number of zero-filled cells
pub fn convert_column(
    name: &str,
    kind: ColumnType,
    values: &[Option<String>],
    options: ConversionOptions,
) -> Result<(Vec<Value>, usize), CleaningError> {
    let mut filled = 0;
    let converted = values
        .iter()
        .map(|value| {
            let Some(text) = value else {
                if kind == ColumnType::Integer && options.integer_missing_as_zero {
                    filled += 1;
                    return Ok(Value::Integer(0));
                }
                return Ok(Value::Missing);
            };
            Ok(match kind {
                ColumnType::Integer => match parse_number(text) {
                    Some(number) if number.abs() < i64::MAX as f64 => Value::Integer(number.trunc() as i64),
                    Some(_) => {
                        return Err(CleaningError::IntegerOutOfRange {
                            column: name.to_owned(),
                            value: text.to_owned(),
                        })
                    }
                    None if options.integer_missing_as_zero => {
                        filled += 1;
                        Value::Integer(0)
                    }
                    None => Value::Missing,
                },
                ColumnType::Float => parse_number(text).map_or(Value::Missing, Value::Float),
                ColumnType::Boolean => parse_boolean(text).map_or(Value::Missing, Value::Boolean),
                ColumnType::Date if options.standardize_dates => {
                    let parsed = if is_date_name(name) { parse_date_or_serial(text) } else { parse_date(text) };
                    match parsed {
                        Some(date) => Value::Text(date.format("%Y-%m-%d").to_string()),
                        None => Value::Text(text.to_owned()),
                    }
                }
                _ => Value::Text(text.to_owned()),
            })
        })
        .collect::<Result<Vec<Value>, CleaningError>>()?;
    Ok((converted, filled))
}

/// Keeps cleaned values as text when conversion failed.
pub fn unconverted(values: &[Option<String>]) -> Vec<Value> {
    values
        .iter()
        .map(|value| value.as_ref().map_or(Value::Missing, |text| Value::Text(text.to_owned())))
        .collect()
}
