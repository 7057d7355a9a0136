//! Coercion rules turning raw scraped text into typed values

use crate::items::fields::Field;
use thiserror::Error;

/// A scraped value failed its coercion rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {field} from {raw:?}: {reason}")]
pub struct FieldParseError {
    pub field: Field,
    pub raw: String,
    pub reason: String,
}

/// Digit-group separators removed before integer parsing
const GROUP_SEPARATORS: &[char] = &[',', '\'', '_', ' ', '\u{a0}', '\u{202f}'];

/// Parses a count such as `"45,000"` or `"1.234"` into an integer
///
/// Thousands separators are stripped first. A `.` is treated as a separator
/// only when it sits in grouping position (`1.234.567`); anything else that
/// is not a plain integer is an error.
///
/// ```
/// use ghub_scraper::items::{parse_count, Field};
///
/// assert_eq!(parse_count(Field::Stars, "45,000").unwrap(), 45000);
/// assert!(parse_count(Field::Stars, "45k").is_err());
/// ```
pub fn parse_count(field: Field, raw: &str) -> Result<u64, FieldParseError> {
    let fail = |reason: &str| FieldParseError {
        field,
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !GROUP_SEPARATORS.contains(c))
        .collect();

    if stripped.is_empty() {
        return Err(fail("no digits"));
    }

    let digits = if stripped.contains('.') {
        if !is_dot_grouped(&stripped) {
            return Err(fail("not an integer"));
        }
        stripped.replace('.', "")
    } else {
        stripped
    };

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(fail("not an integer"));
    }

    digits.parse::<u64>().map_err(|e| fail(&e.to_string()))
}

fn is_dot_grouped(s: &str) -> bool {
    let mut groups = s.split('.');
    let head_ok = groups
        .next()
        .map(|g| (1..=3).contains(&g.len()))
        .unwrap_or(false);
    head_ok && groups.all(|g| g.len() == 3)
}

/// Concatenates text fragments in document order and trims the result
///
/// Returns `None` when there is nothing but whitespace.
pub fn join_text(values: &[String]) -> Option<String> {
    let joined: String = values.concat();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First non-blank fragment, trimmed
pub fn first_text(values: &[String]) -> Option<String> {
    values
        .iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Applies the count rule to the first non-blank fragment of a field
///
/// `Ok(None)` means the page had no value; `Err` means it had one that
/// did not parse.
pub fn first_count(field: Field, values: &[String]) -> Result<Option<u64>, FieldParseError> {
    match values.iter().find(|v| !v.trim().is_empty()) {
        Some(raw) => parse_count(field, raw).map(Some),
        None => Ok(None),
    }
}
