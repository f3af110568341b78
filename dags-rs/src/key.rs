//! Key normalization.
//!
//! Keys are trimmed and lower-cased before use.  After normalization only
//! `a-z 0-9 _ . @ ( ) ,` are allowed; pattern keys also allow the wildcards
//! `* # ?`.

use crate::error::{Error, Result};

fn is_key_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '@' | '(' | ')' | ',')
}

fn is_wildcard(c: char) -> bool {
    matches!(c, '*' | '#' | '?')
}

/// Normalize a store key.
pub fn normalize_key(key: &str) -> Result<String> {
    normalize(key, false)
}

/// Normalize a key prefix for scans: trimmed and lower-cased, with no other
/// checks, so `""` selects every key.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().to_lowercase()
}

/// Normalize a key pattern for wildcard scans.
pub fn normalize_pattern(pattern: &str) -> Result<String> {
    normalize(pattern, true)
}

fn normalize(key: &str, wildcards: bool) -> Result<String> {
    let norm = key.trim().to_lowercase();
    if norm.is_empty() {
        return Err(Error::InvalidKey(key.to_owned()));
    }
    if let Some(bad) = norm
        .chars()
        .find(|&c| !(is_key_char(c) || wildcards && is_wildcard(c)))
    {
        tracing::trace!(key, %bad, "rejected key character");
        return Err(Error::InvalidKey(key.to_owned()));
    }
    Ok(norm)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
