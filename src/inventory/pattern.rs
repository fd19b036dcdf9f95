//! Host pattern parsing and memoization.
//!
//! Patterns follow the usual selector grammar:
//! - `all`, `*` or an empty pattern select every host
//! - `name` selects a group (with its descendants) or a single host
//! - `a:b` / `a,b` union, `a:&b` intersection, `a:!b` exclusion
//! - `~regex` matches host names against a regular expression
//! - `web*`, `db?`, `app[12]` match host names as shell globs

use std::collections::HashMap;

use parking_lot::Mutex;
use regex::Regex;

use super::{InventoryError, InventoryResult};

/// One operand of a pattern, with the operator that combines it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm<'a> {
    /// Added to the selection
    Include(&'a str),
    /// Selection is narrowed to hosts also matching this term
    Intersect(&'a str),
    /// Hosts matching this term are removed from the selection
    Exclude(&'a str),
}

impl<'a> PatternTerm<'a> {
    /// The selector without its operator
    pub fn selector(&self) -> &'a str {
        match self {
            PatternTerm::Include(s) | PatternTerm::Intersect(s) | PatternTerm::Exclude(s) => s,
        }
    }
}

/// Split a pattern into its terms.
///
/// Separators inside brackets are kept, so `app[1:3]` stays whole.
pub fn parse_terms(pattern: &str) -> Vec<PatternTerm<'_>> {
    split_pattern(pattern)
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if let Some(rest) = part.strip_prefix('&') {
                PatternTerm::Intersect(rest.trim())
            } else if let Some(rest) = part.strip_prefix('!') {
                PatternTerm::Exclude(rest.trim())
            } else {
                PatternTerm::Include(part)
            }
        })
        .filter(|term| !term.selector().is_empty())
        .collect()
}

/// Split pattern by `:` and `,` but not inside brackets
pub fn split_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut bracket_depth: usize = 0;

    for (i, ch) in pattern.char_indices() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            ':' | ',' if bracket_depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    parts.push(&pattern[start..]);
    parts
}

/// Whether a selector selects every host
pub fn is_all(selector: &str) -> bool {
    matches!(selector.trim(), "" | "all" | "*")
}

/// Whether a selector contains shell glob metacharacters
pub fn is_glob(selector: &str) -> bool {
    selector.contains(['*', '?', '['])
}

/// Compile a `~regex` selector
pub fn compile_regex(selector: &str) -> InventoryResult<Regex> {
    Regex::new(selector).map_err(|e| InventoryError::InvalidPattern(format!("{}: {}", selector, e)))
}

/// Compile a glob selector
pub fn compile_glob(selector: &str) -> InventoryResult<glob::Pattern> {
    glob::Pattern::new(selector)
        .map_err(|e| InventoryError::InvalidPattern(format!("{}: {}", selector, e)))
}

/// Memoized pattern resolutions, owned by one inventory.
///
/// Cloning yields an empty cache so a cloned inventory never serves
/// results computed against another graph.
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pattern: &str) -> Option<Vec<String>> {
        self.entries.lock().get(pattern).cloned()
    }

    pub fn insert(&self, pattern: impl Into<String>, hosts: Vec<String>) {
        self.entries.lock().insert(pattern.into(), hosts);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Clone for PatternCache {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pattern_brackets() {
        assert_eq!(split_pattern("web:db"), vec!["web", "db"]);
        assert_eq!(split_pattern("web,db"), vec!["web", "db"]);
        assert_eq!(split_pattern("app[1:3]:db"), vec!["app[1:3]", "db"]);
    }

    #[test]
    fn test_parse_terms() {
        let terms = parse_terms("web:&prod:!web3, db");
        assert_eq!(
            terms,
            vec![
                PatternTerm::Include("web"),
                PatternTerm::Intersect("prod"),
                PatternTerm::Exclude("web3"),
                PatternTerm::Include("db"),
            ]
        );
    }

    #[test]
    fn test_parse_terms_skips_empty() {
        assert_eq!(parse_terms("web::!"), vec![PatternTerm::Include("web")]);
    }

    #[test]
    fn test_is_all_and_glob() {
        assert!(is_all("all"));
        assert!(is_all("*"));
        assert!(is_all("  "));
        assert!(!is_all("web"));
        assert!(is_glob("web*"));
        assert!(is_glob("db?"));
        assert!(!is_glob("web1"));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            compile_regex("web[("),
            Err(InventoryError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_cache_clone_is_empty() {
        let cache = PatternCache::new();
        cache.insert("all", vec!["a".to_string()]);
        assert_eq!(cache.get("all"), Some(vec!["a".to_string()]));
        assert!(cache.clone().is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
