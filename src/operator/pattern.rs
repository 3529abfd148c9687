//! Path patterns
//!
//! A pattern is a logical path where `*` stands for any run of characters,
//! e.g. `room1.*` or `*.temp`. Everything else matches literally.

use regex::RegexSet;

use super::errors::{OperatorError, OperatorResult};

/// Returns true if the pattern contains a wildcard
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains('*')
}

fn to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{}$", body)
}

/// Compiled set of patterns; a path matches if any pattern does
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: RegexSet,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> OperatorResult<Self> {
        let set = RegexSet::new(patterns.iter().map(|p| to_regex(p.as_ref())))
            .map_err(|e| OperatorError::InvalidPattern(e.to_string()))?;
        Ok(Self { set })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}
