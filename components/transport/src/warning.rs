//! `Warning` response header parsing
//!
//! Splits a `Warning` header value on commas that fall outside quoted
//! strings, the one text-processing detail easy enough to get wrong that
//! it earns its own unit tests.

/// Split a `Warning` header value into its individual warning entries.
pub fn parse_warning_values(value: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in value.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    result.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        result.push(trimmed.to_string());
    }
    result
}
