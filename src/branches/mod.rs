use anyhow::{Context, Result};
use regex::Regex;

/// Well-known base branches checked against the user's pattern. Branches are
/// not discovered per repository; matching this fixed set once costs zero
/// extra API calls, at the price of never seeing custom branch names.
pub const CANDIDATE_BRANCHES: [&str; 5] = ["master", "main", "develop", "staging", "testing"];

/// Returns the candidates matching the pattern, in candidate order. An empty
/// result means there is nothing to scan; it is not an error.
pub fn select_branches(pattern: &str) -> Result<Vec<String>> {
    let re = Regex::new(pattern)
        .with_context(|| format!("Failed to compile branch pattern: {}", pattern))?;

    Ok(CANDIDATE_BRANCHES
        .iter()
        .filter(|name| re.is_match(name))
        .map(|name| name.to_string())
        .collect())
}
