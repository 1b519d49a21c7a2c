//! Small text helpers shared across crates

/// Truncate a string to at most `max` characters, char-boundary safe
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

/// Normalize a URL or bare host to its comparison domain
///
/// Lowercases, strips the scheme, path, port, and a leading `www.`.
#[must_use]
pub fn normalize_domain(url: &str) -> String {
    let lower = url.trim().to_ascii_lowercase();
    let host = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let host = host.split(['/', '?', '#']).next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Split text into lowercase alphanumeric tokens
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Crude suffix stemmer for overlap comparisons
///
/// Strips common English plural/inflection suffixes. Intentionally
/// conservative: terms shorter than 5 chars pass through unchanged.
#[must_use]
pub fn stem(token: &str) -> String {
    if token.chars().count() < 5 {
        return token.to_string();
    }
    for suffix in ["ing", "ies", "ed", "es", "s"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            if stripped.chars().count() >= 3 {
                return stripped.to_string();
            }
        }
    }
    token.to_string()
}
