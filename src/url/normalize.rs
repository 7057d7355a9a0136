use crate::UrlError;

/// Normalizes a URL into the canonical form used as a dedup key
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject an empty result
/// 2. Rewrite an `http:` scheme to `https:`
/// 3. Strip the trailing `/`
///
/// The function is idempotent: `normalize(normalize(u)) == normalize(u)`.
/// Runs of trailing slashes are stripped completely so that property holds
/// for inputs such as `https://x/y//`.
///
/// # Examples
///
/// ```
/// use ghub_scraper::url::normalize;
///
/// assert_eq!(normalize("http://github.com/scrapy/").unwrap(), "https://github.com/scrapy");
/// assert_eq!(normalize("https://github.com/scrapy").unwrap(), "https://github.com/scrapy");
/// ```
pub fn normalize(raw: &str) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut canonical = match strip_prefix_ignore_case(trimmed, "http:") {
        Some(rest) => format!("https:{}", rest),
        None => trimmed.to_string(),
    };

    while canonical.ends_with('/') {
        canonical.pop();
    }

    if canonical.is_empty() {
        return Err(UrlError::Empty);
    }

    Ok(canonical)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
