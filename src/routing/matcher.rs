//! Route matching logic.
//!
//! # Responsibilities
//! - Match the raw request uri (path + query) against a compiled pattern
//!
//! # Design Decisions
//! - No normalisation: no percent-decoding, no trailing-slash folding
//! - Anchoring is the caller's choice (`^/$` vs an unanchored fragment)
//! - Case sensitivity is the caller's choice (`(?i)` or [`RegexMatcher::case_insensitive`])

use regex::{Regex, RegexBuilder};

/// Trait for matching a request uri against a condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the uri matches this condition.
    fn matches(&self, uri: &str) -> bool;

    /// Human-readable form for logs.
    fn describe(&self) -> String;
}

/// Matches the uri against a regular expression.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn case_insensitive(pattern: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl From<Regex> for RegexMatcher {
    fn from(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn matches(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }

    fn describe(&self) -> String {
        self.regex.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_pattern_is_exact() {
        let matcher = RegexMatcher::new("^/$").unwrap();
        assert!(matcher.matches("/"));
        assert!(!matcher.matches("/?color=ffffff"));
        assert!(!matcher.matches("/index.html"));
    }

    #[test]
    fn color_pattern_is_case_insensitive() {
        let matcher = RegexMatcher::case_insensitive(r"^/\?color=[a-f0-9]*$").unwrap();
        assert!(matcher.matches("/?color=ff00aa"));
        assert!(matcher.matches("/?COLOR=FF00AA"));
        assert!(!matcher.matches("/?color=zz0000"));
        assert!(!matcher.matches("/?color=ff00aa&x=1"));
    }

    #[test]
    fn no_percent_decoding() {
        let matcher = RegexMatcher::new("^/a b$").unwrap();
        assert!(!matcher.matches("/a%20b"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(RegexMatcher::new("(").is_err());
    }
}
