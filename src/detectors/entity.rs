//! Entity name detection (companies, banks, funds).
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

const SUFFIXES: &str = "Inc|LLC|Ltd|Limited|Corp|Corporation|Company|Co|Group|Holdings|Partners|LP|LLP|GmbH|AG|SA|SpA|PLC|Pty|NV|BV|AB|Pte|Pvt|Trust|Fund|Bank|Capital|Ventures|Investments?|Advisors|Management|Financial|Securities|Equity|Advisory|Consulting|Services|Solutions|Technologies|Systems|Software|Industries|Enterprises|Incorporated";

const ENTITY_NAME_TOKENS: &[&str] = &[
    "company", "corporation", "firm", "entity", "organization", "org", "client", "customer", "vendor", "supplier",
    "partner", "investor", "fund", "bank", "issuer", "borrower", "lender", "counterparty", "name", "party",
    "account", "holder", "owner", "beneficiary", "sponsor", "manager", "advisor", "trustee", "custodian",
    "underwriter", "broker", "dealer", "agent", "principal", "portfolio", "subsidiary", "affiliate", "parent",
    "group", "investee", "target",
];

const EXCLUSIONS: &[&str] = &[
    "the", "and", "or", "not", "all", "any", "none", "total", "sum", "average", "mean", "median", "min", "max",
    "count", "null", "na", "n/a", "yes", "no", "true", "false", "jan", "feb", "mar", "apr", "may", "jun", "jul",
    "aug", "sep", "oct", "nov", "dec", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

/// Share of sampled values that must contain an entity.
const MIN_ENTITY_SHARE: f64 = 0.3;

/// Values inspected when the column name gives no hint.
const SAMPLE_LIMIT: usize = 20;

static SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b(?:{SUFFIXES})\b")).expect("Hardcode regex pattern"));

static COMPANY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Inc|Corp|LLC|Ltd|Limited|Company|Co)\b").expect("Hardcode regex pattern")
});

static ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,}(?:\.[A-Z]{2,})*$").expect("Hardcode regex pattern"));

static CAMEL_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]+(?:[A-Z][a-z]+)+$").expect("Hardcode regex pattern"));

static TRAILING_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;:.\s]+$").expect("Hardcode regex pattern"));

static NAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("Hardcode regex pattern"));

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let word = r"[A-Z&][A-Za-z&\-.]*";
    [
        format!(r"\b([A-Z][A-Za-z&\-.]*(?:\s+{word})*\s+(?:{SUFFIXES}))\b"),
        r"\b([A-Z]{2,}(?:\.[A-Z]{2,})*)\b".to_owned(),
        format!(r"\b(The\s+[A-Z][A-Za-z&\-.]*(?:\s+{word})*)"),
        r"\b([A-Z][a-z]+(?:[A-Z][a-z]+)+)\b".to_owned(),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Hardcode regex pattern"))
    .collect()
});

/// Coarse entity category.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Companies,
    Banks,
    Funds,
    Others,
}

impl EntityType {
    pub fn classify(entity: &str) -> Self {
        let lower = entity.to_lowercase();
        if lower.contains("bank") {
            EntityType::Banks
        } else if ["fund", "capital", "investment", "ventures"].iter().any(|term| lower.contains(term)) {
            EntityType::Funds
        } else if COMPANY_SUFFIX.is_match(entity) {
            EntityType::Companies
        } else {
            EntityType::Others
        }
    }
}

fn clean_entity_name(name: &str) -> String {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    TRAILING_PUNCTUATION.replace(&name, "").trim().to_owned()
}

fn is_valid_entity(name: &str) -> bool {
    if name.chars().count() < 2 || EXCLUSIONS.contains(&name.to_lowercase().as_str()) {
        return false;
    }
    if !name.chars().any(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    if SUFFIX.is_match(name) || ABBREVIATION.is_match(name) || CAMEL_CASE.is_match(name) {
        return true;
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    let capitalized = words
        .iter()
        .filter(|word| word.starts_with(|c: char| c.is_uppercase()))
        .count();
    name.starts_with(|c: char| c.is_uppercase()) && name.len() > 3 && words.len() > 1 && capitalized * 2 > words.len()
}

/// Extracts distinct entity names from free text, in order of first match.
pub fn extract_entities(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut entities: Vec<String> = vec![];
    for pattern in PATTERNS.iter() {
        for captures in pattern.captures_iter(text) {
            let Some(found) = captures.get(1) else { continue };
            let entity = clean_entity_name(found.as_str());
            if is_valid_entity(&entity) && !entities.contains(&entity) {
                entities.push(entity);
            }
        }
    }
    entities
}

/// Returns true if the column name or enough sampled values point at entity names.
pub fn is_entity_column(column_name: &str, sample: &[&str]) -> bool {
    let named = NAME_TOKEN
        .find_iter(column_name)
        .any(|token| ENTITY_NAME_TOKENS.contains(&token.as_str().to_ascii_lowercase().as_str()));
    if named {
        return true;
    }
    let sample = &sample[..sample.len().min(SAMPLE_LIMIT)];
    if sample.is_empty() {
        return false;
    }
    let with_entities = sample.iter().filter(|value| !extract_entities(value).is_empty()).count();
    with_entities as f64 / sample.len() as f64 > MIN_ENTITY_SHARE
}

/// Entity statistics of one column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityColumnAnalysis {
    pub entity_count: usize,
    pub unique_entities: usize,
    /// Up to ten `(entity, occurrences)`, most frequent first
    pub most_common: Vec<(String, usize)>,
    pub primary_entity: Option<String>,
    /// Distinct entities per category
    pub entity_types: BTreeMap<EntityType, usize>,
}

/// Counts the entities found in a column's values; `None` if there are none.
pub fn analyze_entity_column(values: &[&str]) -> Option<EntityColumnAnalysis> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut entity_count = 0;
    for value in values.iter().filter(|value| !value.trim().is_empty()) {
        for entity in extract_entities(value) {
            entity_count += 1;
            *counts.entry(entity).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return None;
    }

    let mut most_common: Vec<(String, usize)> = counts.into_iter().collect();
    most_common.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));
    let mut entity_types = BTreeMap::new();
    for (entity, _) in &most_common {
        *entity_types.entry(EntityType::classify(entity)).or_default() += 1;
    }
    let unique_entities = most_common.len();
    most_common.truncate(10);

    Some(EntityColumnAnalysis {
        entity_count,
        unique_entities,
        primary_entity: most_common.first().map(|(name, _)| name.clone()),
        most_common,
        entity_types,
    })
}
