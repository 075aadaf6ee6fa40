//! Shell-style glob matching for user quota rules.

use regex::Regex;

/// Match `value` against a glob where `*` matches any run of characters.
///
/// # Examples
///
/// ```
/// use mediastore_config::glob_matches;
///
/// assert!(glob_matches("@*:example.org", "@alice:example.org"));
/// assert!(!glob_matches("@*:example.org", "@alice:other.org"));
/// assert!(glob_matches("*", "@anyone:anywhere"));
/// ```
pub fn glob_matches(pattern: &str, value: &str) -> bool {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match Regex::new(&format!("^{}$", body)) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "Invalid quota glob");
            false
        }
    }
}
