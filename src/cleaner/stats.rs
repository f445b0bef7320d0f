use crate::cleaner::column::{ColumnType, Value};
use crate::detectors::date::parse_date_or_serial;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Most frequent categories reported per column.
const TOP_VALUES: usize = 5;

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Missing cells of one column.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct MissingStats {
    pub count: usize,
    /// Share of rows in percent, two decimals; 0 for tables without rows
    pub percentage: f64,
}

impl MissingStats {
    pub fn of(values: &[Option<String>]) -> Self {
        let count = values.iter().filter(|value| value.is_none()).count();
        let percentage = if values.is_empty() {
            0.0
        } else {
            round2(count as f64 / values.len() as f64 * 100.0)
        };
        MissingStats { count, percentage }
    }
}

/// Type-specific statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypeDetails {
    Numeric {
        min: f64,
        max: f64,
        mean: f64,
        median: f64,
        std: f64,
    },
    Categorical {
        top_values: Vec<(String, usize)>,
        category_count: usize,
        categories: Vec<String>,
    },
    Text {
        min_length: usize,
        max_length: usize,
        avg_length: f64,
    },
    Date {
        min_date: NaiveDate,
        max_date: NaiveDate,
    },
}

/// Descriptive statistics of one column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnDescription {
    #[serde(rename = "type")]
    pub kind: ColumnType,
    pub non_null_count: usize,
    pub null_count: usize,
    pub unique_count: usize,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub details: Option<TypeDetails>,
}

impl ColumnDescription {
    /// Describes converted values according to the column type.
    pub fn of(kind: ColumnType, values: &[Value]) -> Self {
        let texts: Vec<String> = values.iter().filter_map(Value::to_text).collect();
        let unique_count = texts.iter().collect::<HashSet<_>>().len();
        let details = if texts.is_empty() {
            None
        } else {
            match kind {
                ColumnType::Integer | ColumnType::Float => numeric_details(values),
                ColumnType::Categorical => Some(categorical_details(&texts)),
                ColumnType::Text => Some(text_details(&texts)),
                ColumnType::Date => date_details(&texts),
                ColumnType::Boolean | ColumnType::Unknown => None,
            }
        };
        ColumnDescription {
            kind,
            non_null_count: texts.len(),
            null_count: values.len() - texts.len(),
            unique_count,
            details,
        }
    }
}

fn numeric_details(values: &[Value]) -> Option<TypeDetails> {
    let mut numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_by(f64::total_cmp);
    let count = numbers.len();
    let mean = numbers.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (numbers[count / 2 - 1] + numbers[count / 2]) / 2.0
    } else {
        numbers[count / 2]
    };
    let std = if count > 1 {
        let variance = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };
    Some(TypeDetails::Numeric {
        min: numbers[0],
        max: numbers[count - 1],
        mean,
        median,
        std,
    })
}

fn categorical_details(texts: &[String]) -> TypeDetails {
    let mut categories: Vec<String> = vec![];
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for text in texts {
        let count = counts.entry(text.as_str()).or_default();
        if *count == 0 {
            categories.push(text.to_owned());
        }
        *count += 1;
    }
    // Stable sort keeps first-seen order among equal counts.
    let mut top_values: Vec<(String, usize)> = categories
        .iter()
        .map(|category| (category.to_owned(), counts[category.as_str()]))
        .collect();
    top_values.sort_by(|(_, a), (_, b)| b.cmp(a));
    top_values.truncate(TOP_VALUES);
    TypeDetails::Categorical {
        top_values,
        category_count: categories.len(),
        categories,
    }
}

fn text_details(texts: &[String]) -> TypeDetails {
    let lengths: Vec<usize> = texts.iter().map(|text| text.chars().count()).collect();
    TypeDetails::Text {
        min_length: lengths.iter().copied().min().unwrap_or(0),
        max_length: lengths.iter().copied().max().unwrap_or(0),
        avg_length: round2(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64),
    }
}

fn date_details(texts: &[String]) -> Option<TypeDetails> {
    let dates: Vec<NaiveDate> = texts
        .iter()
        .filter_map(|text| parse_date_or_serial(text))
        .map(|datetime| datetime.date())
        .collect();
    Some(TypeDetails::Date {
        min_date: *dates.iter().min()?,
        max_date: *dates.iter().max()?,
    })
}

#[cfg(test)]
mod tests {
    use crate::cleaner::column::{ColumnType, Value};
    use crate::cleaner::stats::*;

    #[test]
    fn missing_percentages() {
        let values = vec![Some("a".to_owned()), None, None];
        assert_eq!(MissingStats::of(&values), MissingStats { count: 2, percentage: 66.67 });
        assert_eq!(MissingStats::of(&[]), MissingStats { count: 0, percentage: 0.0 });
    }

    #[test]
    fn numeric_description() {
        let values = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4), Value::Missing];
        let description = ColumnDescription::of(ColumnType::Integer, &values);

        assert_eq!(description.non_null_count, 4);
        assert_eq!(description.null_count, 1);
        assert_eq!(description.unique_count, 4);
        let Some(TypeDetails::Numeric { min, max, mean, median, std }) = description.details else {
            panic!("numeric details expected, got {:?}", description.details);
        };
        assert_eq!((min, max, mean, median), (1.0, 4.0, 2.5, 2.5));
        assert!((std - 1.2909944).abs() < 1e-6, "std was {std}");
    }

    #[test]
    fn single_value_has_zero_deviation() {
        let description = ColumnDescription::of(ColumnType::Float, &[Value::Float(2.5)]);
        assert!(matches!(description.details, Some(TypeDetails::Numeric { std, .. }) if std == 0.0));
    }

    #[test]
    fn categorical_description() {
        let values: Vec<Value> = ["b", "a", "b", "c", "a", "b"].iter().map(|v| Value::Text(v.to_string())).collect();
        let description = ColumnDescription::of(ColumnType::Categorical, &values);
        assert_eq!(
            description.details,
            Some(TypeDetails::Categorical {
                top_values: vec![("b".to_owned(), 3), ("a".to_owned(), 2), ("c".to_owned(), 1)],
                category_count: 3,
                categories: vec!["b".to_owned(), "a".to_owned(), "c".to_owned()],
            })
        );
    }

    #[test]
    fn text_and_date_descriptions() {
        let values = vec![Value::Text("Acme".to_owned()), Value::Text("Bo".to_owned()), Value::Text("Acme".to_owned())];
        assert_eq!(
            ColumnDescription::of(ColumnType::Text, &values).details,
            Some(TypeDetails::Text { min_length: 2, max_length: 4, avg_length: 3.33 })
        );

        let values = vec![Value::Text("2023-03-01".to_owned()), Value::Text("2022-12-31".to_owned())];
        assert_eq!(
            ColumnDescription::of(ColumnType::Date, &values).details,
            Some(TypeDetails::Date {
                min_date: NaiveDate::from_ymd_opt(2022, 12, 31).expect("valid date"),
                max_date: NaiveDate::from_ymd_opt(2023, 3, 1).expect("valid date"),
            })
        );
    }
}
