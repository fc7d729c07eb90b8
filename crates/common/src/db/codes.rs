//! Short record codes derived from author initials
//!
//! A code is the uppercased first letter of the first one or two alphabetic
//! tokens of the author string followed by the smallest positive counter not
//! yet taken for that prefix, e.g. "Jane Doe" -> "JD1", "Doe" -> "D1".

use std::collections::HashSet;

/// Prefix used when the author has no alphabetic token
pub const FALLBACK_PREFIX: &str = "X";

/// Derive the initials prefix of an author string
pub fn code_prefix(author: &str) -> String {
    let initials: String = author
        .split_whitespace()
        .filter_map(|token| token.chars().find(|c| c.is_alphabetic()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();

    if initials.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        initials
    }
}

/// Next free code for `author` given every code already stored
pub fn next_code<'a, I>(author: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = code_prefix(author);
    let taken: HashSet<&str> = existing.into_iter().collect();

    (1u64..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| format!("{}{}", prefix, u64::MAX))
}
