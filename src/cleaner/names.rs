use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static SPECIAL_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("Hardcode regex pattern"));

static SEPARATOR_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_]+").expect("Hardcode regex pattern"));

/// Normalizes one header into an identifier-like name; `None` if nothing is left.
fn normalize(header: &str) -> Option<String> {
    let name = SPECIAL_CHARACTERS.replace_all(header.trim(), "_");
    let name = SEPARATOR_RUNS.replace_all(&name, "_");
    let name = name.trim_matches('_');
    (!name.is_empty()).then(|| name.to_owned())
}

/// Cleans header cells into unique, non-empty column names.
///
/// Blank or fully stripped headers become `Column_<n>` (1-based position).
/// Later duplicates get `_1`, `_2`, … appended; the first occurrence keeps its name.
pub fn clean_column_names<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let base = normalize(header.as_ref()).unwrap_or_else(|| format!("Column_{}", index + 1));
            let mut name = base.clone();
            let mut counter = 1;
            while seen.contains(&name) {
                name = format!("{base}_{counter}");
                counter += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::cleaner::names::*;

    #[test]
    fn duplicates_get_suffixes() {
        assert_eq!(clean_column_names(&["A", "A", "A"]), vec!["A", "A_1", "A_2"]);
        assert_eq!(clean_column_names(&["A", "A_1", "A"]), vec!["A", "A_1", "A_2"]);
    }

    #[test]
    fn special_characters_collapse() {
        assert_eq!(
            clean_column_names(&[" Revenue ($m) ", "Q1  2024", "__id__", "%%", ""]),
            vec!["Revenue_m", "Q1_2024", "id", "Column_4", "Column_5"]
        );
    }
}
