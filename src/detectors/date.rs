//! Date detection and parsing.
//!
//! Values go through a fixed cascade: native chrono formats, a permissive
//! pass that strips weekdays and ordinal suffixes, anchored regex patterns
//! (numeric, named month, compact, quarter, month-year) and, only where the
//! caller allows it, the Excel serial number heuristic.
use crate::spreadsheet::cell::serial_to_datetime;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::ops::RangeInclusive;
use std::sync::LazyLock;

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

// Day-first before month-first for ambiguous slashed dates.
const DATE_FORMATS: [&str; 16] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%Y.%m.%d",
    "%d %B %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
];

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september", "october", "november",
    "december",
];

/// Whole words in a column name that hint at dates.
const DATE_NAME_TOKENS: [&str; 18] = [
    "date", "dated", "datetime", "dt", "time", "timestamp", "period", "quarter", "created", "updated", "modified",
    "effective", "expiry", "expiration", "maturity", "settlement", "asof", "dob",
];

/// Excel serial numbers outside this open interval are never dates.
const SERIAL_RANGE: (f64, f64) = (1.0, 100_000.0);

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues|tue|wed|thurs|thur|thu|fri|sat|sun)\b\.?,?")
        .expect("Hardcode regex pattern")
});

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("Hardcode regex pattern"));

static FILLER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bof\b").expect("Hardcode regex pattern"));

static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));

static NAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("Hardcode regex pattern"));

#[derive(Copy, Clone, Debug)]
enum Part {
    Day,
    Month,
    MonthName,
    Year,
    Quarter,
}

struct DatePattern {
    regex: Regex,
    parts: &'static [Part],
    years: RangeInclusive<i32>,
}

impl DatePattern {
    fn new(pattern: &str, parts: &'static [Part], years: RangeInclusive<i32>) -> Self {
        DatePattern {
            regex: Regex::new(pattern).expect("Hardcode regex pattern"),
            parts,
            years,
        }
    }

    fn parse(&self, text: &str) -> Option<NaiveDate> {
        let captures = self.regex.captures(text)?;
        let (mut year, mut month, mut day) = (None, None, None);
        for (index, part) in self.parts.iter().enumerate() {
            let value = captures.get(index + 1)?.as_str();
            match part {
                Part::Year => year = Some(expand_year(value)?),
                Part::Month => month = Some(value.parse::<u32>().ok()?),
                Part::Day => day = Some(value.parse::<u32>().ok()?),
                Part::MonthName => month = Some(month_from_name(value)?),
                Part::Quarter => {
                    let quarter = value.parse::<u32>().ok()?;
                    month = Some((quarter - 1) * 3 + 2);
                    day = Some(1);
                }
            }
        }
        let year = year.filter(|year| self.years.contains(year))?;
        build_date(year, month?, day.unwrap_or(1))
    }
}

static PATTERNS: LazyLock<Vec<DatePattern>> = LazyLock::new(|| {
    use Part::*;
    let any = 1000..=9999;
    vec![
        DatePattern::new(r"^(\d{1,2})[-/_\s](\d{1,2})[-/_\s](\d{2,4})$", &[Day, Month, Year], any.clone()),
        DatePattern::new(r"^(\d{1,2})[-/_\s](\d{1,2})[-/_\s](\d{2,4})$", &[Month, Day, Year], any.clone()),
        DatePattern::new(r"^(\d{4})[-/_\s](\d{1,2})[-/_\s](\d{1,2})$", &[Year, Month, Day], any.clone()),
        DatePattern::new(r"^(\d{1,2})[-\s]([A-Za-z]{3,9})\.?[-\s](\d{2,4})$", &[Day, MonthName, Year], any.clone()),
        DatePattern::new(r"^([A-Za-z]{3,9})\.?[-\s](\d{1,2})(?:,\s*|[-\s])(\d{2,4})$", &[MonthName, Day, Year], any.clone()),
        DatePattern::new(r"^(\d{4})(\d{2})(\d{2})$", &[Year, Month, Day], 1900..=2100),
        DatePattern::new(r"(?i)^Q([1-4])[-\s]?(\d{2,4})$", &[Quarter, Year], any.clone()),
        DatePattern::new(r"(?i)^(\d{2,4})[-\s]?Q([1-4])$", &[Year, Quarter], any.clone()),
        DatePattern::new(r"^([A-Za-z]{3,9})\.?[-\s](\d{2,4})$", &[MonthName, Year], any.clone()),
        DatePattern::new(r"^(\d{1,2})[-/_](\d{4})$", &[Month, Year], any),
    ]
});

/// Two-digit years pivot at 50: `49` is 2049, `50` is 1950.
fn expand_year(text: &str) -> Option<i32> {
    let year = text.parse::<i32>().ok()?;
    match text.len() {
        1 | 2 if year < 50 => Some(2000 + year),
        1 | 2 => Some(1900 + year),
        4 => Some(year),
        _ => None,
    }
}

/// Accepts full month names and abbreviations of at least three letters.
fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|month| month.starts_with(name.as_str()))
        .map(|index| index as u32 + 1)
}

/// Builds a date, clamping day overflow (e.g. 31 February) to the month's end.
fn build_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) || day == 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| {
        if day > 28 && day <= 31 {
            Some(last_day_of_month(year, month)?)
        } else {
            None
        }
    })
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).map(|date| date - Duration::days(1))
}

fn parse_native(text: &str) -> Option<NaiveDateTime> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            // chrono reads `%Y` greedily, so `1/2/23` would land in year 23.
            if date.year() >= 1000 {
                return Some(date.and_time(NaiveTime::MIN));
            }
        }
    }
    None
}

/// Drops weekday names, ordinal suffixes and stray punctuation.
fn loosen(text: &str) -> String {
    let text = WEEKDAY.replace_all(text, "");
    let text = ORDINAL.replace_all(&text, "$1");
    let text = FILLER.replace_all(&text, "");
    let text = SPACES.replace_all(&text, " ");
    text.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '.').to_owned()
}

fn parse_patterns(text: &str) -> Option<NaiveDateTime> {
    PATTERNS
        .iter()
        .find_map(|pattern| pattern.parse(text))
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Parses a date from text, without the Excel serial heuristic.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    parse_native(text)
        .or_else(|| {
            let loose = loosen(text);
            (loose != text).then(|| parse_native(&loose)).flatten()
        })
        .or_else(|| parse_patterns(&loosen(text)))
}

/// Parses a date from text, falling back to Excel serial numbers in `(1, 100000)`.
pub fn parse_date_or_serial(text: &str) -> Option<NaiveDateTime> {
    parse_date(text).or_else(|| {
        let serial = text.trim().parse::<f64>().ok()?;
        if serial > SERIAL_RANGE.0 && serial < SERIAL_RANGE.1 {
            serial_to_datetime(serial, false)
        } else {
            None
        }
    })
}

/// Returns true if any whole word of the column name hints at dates.
pub fn is_date_name(column_name: &str) -> bool {
    NAME_TOKEN
        .find_iter(column_name)
        .any(|token| DATE_NAME_TOKENS.contains(&token.as_str().to_ascii_lowercase().as_str()))
}

/// Decides whether a column holds dates.
///
/// A date-like column name is enough on its own. Otherwise at least half of
/// the sample must parse as textual dates, so serial numbers in a plain
/// numeric column stay numeric.
pub fn is_date_column(column_name: &str, sample: &[&str]) -> bool {
    if is_date_name(column_name) {
        return true;
    }
    let parsed = sample.iter().filter(|value| parse_date(value).is_some()).count();
    !sample.is_empty() && parsed * 2 >= sample.len()
}

/// Names the layout of a date string.
pub fn identify_format(text: &str) -> &'static str {
    static FORMATS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
        [
            (r"^\d{4}-\d{2}-\d{2}", "iso"),
            (r"^\d{1,2}/\d{1,2}/\d{2,4}", "slashed"),
            (r"^\d{1,2}-\d{1,2}-\d{2,4}", "hyphenated"),
            (r"^\d{1,2}\s+[A-Za-z]{3,9}\s+\d{2,4}", "day_month_name"),
            (r"^[A-Za-z]{3,9}\s+\d{1,2},?\s+\d{2,4}", "month_name_day"),
            (r"(?i)^Q[1-4][-\s]?\d{2,4}", "quarter"),
            (r"^\d{8}$", "compact"),
            (r"^\d+(\.\d+)?$", "excel_serial"),
        ]
        .into_iter()
        .map(|(pattern, name)| (Regex::new(pattern).expect("Hardcode regex pattern"), name))
        .collect()
    });
    let text = text.trim();
    FORMATS
        .iter()
        .find(|(regex, _)| regex.is_match(text))
        .map(|(_, name)| *name)
        .unwrap_or("custom")
}

/// Spacing between consecutive distinct dates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Unknown,
    Datetime,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// Derives granularity from the smallest gap between distinct dates.
pub fn granularity(dates: &[NaiveDateTime]) -> Granularity {
    if dates.len() < 2 {
        return Granularity::Unknown;
    }
    if dates.iter().any(|date| date.time() != NaiveTime::MIN) {
        return Granularity::Datetime;
    }
    let mut sorted = dates.to_vec();
    sorted.sort();
    sorted.dedup();
    let Some(min_gap) = sorted.windows(2).map(|pair| (pair[1] - pair[0]).num_days()).min() else {
        return Granularity::Unknown;
    };
    match min_gap {
        ..=1 => Granularity::Daily,
        2..=7 => Granularity::Weekly,
        8..=31 => Granularity::Monthly,
        32..=92 => Granularity::Quarterly,
        _ => Granularity::Yearly,
    }
}

/// Calendar coverage of a set of dates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeriodInfo {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_year: i32,
    pub end_year: i32,
    pub start_quarter: String,
    pub end_quarter: String,
    pub span_days: i64,
    pub span_years: i32,
    pub fiscal_years: Vec<i32>,
}

fn quarter_label(date: &NaiveDate) -> String {
    format!("Q{}-{}", (date.month() - 1) / 3 + 1, date.year())
}

pub fn period_info(dates: &[NaiveDateTime]) -> Option<PeriodInfo> {
    let start = dates.iter().min()?.date();
    let end = dates.iter().max()?.date();
    Some(PeriodInfo {
        start_date: start,
        end_date: end,
        start_year: start.year(),
        end_year: end.year(),
        start_quarter: quarter_label(&start),
        end_quarter: quarter_label(&end),
        span_days: (end - start).num_days(),
        span_years: end.year() - start.year() + 1,
        fiscal_years: (start.year()..=end.year()).collect(),
    })
}

/// Parse statistics of one date column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DateColumnAnalysis {
    pub parsed_count: usize,
    pub total_count: usize,
    pub parse_rate: f64,
    pub min_date: NaiveDateTime,
    pub max_date: NaiveDateTime,
    pub date_range_days: i64,
    pub formats_found: BTreeSet<&'static str>,
    pub granularity: Granularity,
    pub unique_dates: usize,
    pub period: PeriodInfo,
}

/// Parses every value of a column; `None` if nothing parses.
pub fn analyze_date_column(values: &[&str]) -> Option<DateColumnAnalysis> {
    let mut parsed = vec![];
    let mut formats_found = BTreeSet::new();
    for value in values {
        if let Some(date) = parse_date_or_serial(value) {
            parsed.push(date);
            formats_found.insert(identify_format(value));
        }
    }
    let min_date = *parsed.iter().min()?;
    let max_date = *parsed.iter().max()?;
    Some(DateColumnAnalysis {
        parsed_count: parsed.len(),
        total_count: values.len(),
        parse_rate: parsed.len() as f64 / values.len() as f64,
        min_date,
        max_date,
        date_range_days: (max_date - min_date).num_days(),
        formats_found,
        granularity: granularity(&parsed),
        unique_dates: parsed.iter().collect::<HashSet<_>>().len(),
        period: period_info(&parsed)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::detectors::date::*;

    fn ymd(text: &str) -> Option<String> {
        parse_date(text).map(|date| date.format("%Y-%m-%d").to_string())
    }

    #[test]
    fn canonical_forms_agree() {
        for text in ["31/12/2023", "2023-12-31", "December 31, 2023"] {
            assert_eq!(ymd(text).as_deref(), Some("2023-12-31"), "'{text}' should parse");
        }
    }

    #[test]
    fn native_and_loose_forms() {
        assert_eq!(ymd("12/31/2023").as_deref(), Some("2023-12-31"));
        assert_eq!(ymd("05/04/2023").as_deref(), Some("2023-04-05"));
        assert_eq!(ymd("2023-12-31T08:30:00").as_deref(), Some("2023-12-31"));
        assert_eq!(ymd("Sunday, December 31st, 2023").as_deref(), Some("2023-12-31"));
        assert_eq!(ymd("31st of December 2023").as_deref(), Some("2023-12-31"));
        assert_eq!(ymd("31 Dec 2023").as_deref(), Some("2023-12-31"));
    }

    #[test]
    fn regex_forms() {
        assert_eq!(ymd("1/2/23").as_deref(), Some("2023-02-01"));
        assert_eq!(ymd("31-12-75").as_deref(), Some("1975-12-31"));
        assert_eq!(ymd("20231231").as_deref(), Some("2023-12-31"));
        assert_eq!(ymd("Q1-2024").as_deref(), Some("2024-02-01"));
        assert_eq!(ymd("2024 Q4").as_deref(), Some("2024-11-01"));
        assert_eq!(ymd("Jan-2024").as_deref(), Some("2024-01-01"));
        assert_eq!(ymd("03/2024").as_deref(), Some("2024-03-01"));
        assert_eq!(ymd("31 Feb 2023").as_deref(), Some("2023-02-28"));
    }

    #[test]
    fn non_dates() {
        for text in ["", "Acme", "100", "1,234.5", "Marketing 2024", "12345678", "Q5-2024"] {
            assert_eq!(parse_date(text), None, "'{text}' should not parse");
        }
    }

    #[test]
    fn serial_numbers_only_on_request() {
        assert_eq!(parse_date("45291"), None);
        let date = parse_date_or_serial("45291").expect("serial should parse");
        assert_eq!(date.date(), NaiveDate::from_ymd_opt(2023, 12, 31).expect("valid date"));
        assert_eq!(parse_date_or_serial("100000"), None);
        assert_eq!(parse_date_or_serial("0.5"), None);
    }

    #[test]
    fn column_names() {
        assert!(is_date_name("Trade Date"));
        assert!(is_date_name("created_at"));
        assert!(is_date_name("maturity_dt"));
        assert!(!is_date_name("Total"));
        assert!(!is_date_name("Updates"));
        assert!(!is_date_name("Revenue"));
    }

    #[test]
    fn date_columns() {
        assert!(is_date_column("When", &["2023-01-01", "2023-02-01", "n/a"]));
        assert!(!is_date_column("Revenue", &["45291", "45292"]));
        assert!(is_date_column("Settlement Date", &["45291", "45292"]));
        assert!(!is_date_column("Name", &["Acme", "Beta"]));
        assert!(is_date_column("Closing Date", &["TBD", "pending", "soon"]));
        assert!(!is_date_column("Closing", &["TBD", "pending", "soon"]));
    }

    #[test]
    fn granularity_and_period() {
        let dates: Vec<NaiveDateTime> = ["2023-01-31", "2023-02-28", "2023-03-31", "2024-03-31"]
            .iter()
            .filter_map(|text| parse_date(text))
            .collect();
        assert_eq!(granularity(&dates), Granularity::Monthly);

        let period = period_info(&dates).expect("period should exist");
        assert_eq!(period.start_quarter, "Q1-2023");
        assert_eq!(period.end_quarter, "Q1-2024");
        assert_eq!(period.span_years, 2);
        assert_eq!(period.fiscal_years, vec![2023, 2024]);
        assert_eq!(period.span_days, 425);
    }

    #[test]
    fn analyze_column() {
        let analysis = analyze_date_column(&["2023-01-01", "2023-01-02", "oops"]).expect("dates should parse");
        assert_eq!(analysis.parsed_count, 2);
        assert_eq!(analysis.total_count, 3);
        assert_eq!(analysis.granularity, Granularity::Daily);
        assert_eq!(analysis.date_range_days, 1);
        assert!(analysis.formats_found.contains("iso"));
        assert_eq!(analyze_date_column(&["oops"]), None);
    }
}
