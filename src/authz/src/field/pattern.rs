//! Field pattern compilation
//!
//! Translates dotted field patterns with `*` / `**` wildcards into a single
//! anchored regular expression, or into a plain set lookup when no pattern
//! has wildcards.

use regex::Regex;
use std::collections::HashSet;
use std::fmt;

use crate::error::{AuthzError, Result};

/// Compiled matcher for a rule's field patterns
#[derive(Clone)]
pub enum FieldMatcher {
    /// No wildcards: exact membership
    Exact(HashSet<String>),
    /// At least one wildcard: alternation of all patterns
    Pattern { regex: Regex, patterns: Vec<String> },
}

impl FieldMatcher {
    /// Compile a set of field patterns
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if the translated expression is rejected by
    /// the regex engine.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if !patterns.iter().any(|p| p.as_ref().contains('*')) {
            return Ok(Self::Exact(
                patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            ));
        }

        let translated: Vec<String> = patterns.iter().map(|p| translate(p.as_ref())).collect();
        let body = if translated.len() > 1 {
            format!("(?:{})", translated.join("|"))
        } else {
            translated.concat()
        };

        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| AuthzError::InvalidPattern(e.to_string()))?;

        Ok(Self::Pattern {
            regex,
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
        })
    }

    /// Whether `field` is covered by any pattern
    pub fn matches(&self, field: &str) -> bool {
        match self {
            Self::Exact(fields) => fields.contains(field),
            Self::Pattern { regex, .. } => regex.is_match(field),
        }
    }

    /// Whether the matcher needed wildcard compilation
    pub fn has_wildcards(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }

    /// Source patterns
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            Self::Exact(fields) => fields.iter().map(String::as_str).collect(),
            Self::Pattern { patterns, .. } => patterns.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Debug for FieldMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(fields) => f.debug_tuple("Exact").field(fields).finish(),
            Self::Pattern { regex, .. } => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
        }
    }
}

/// Translate one pattern into a regex fragment (without anchors)
///
/// A wildcard run is an optional leading `.`, one or more `*`, and an
/// optional trailing `.`:
///
/// - `*` matches within a segment (`[^.]`), `**` across segments (`.`)
/// - the run needs at least one character when the pattern starts with a
///   wildcard or the run sits between two dots, otherwise it may be empty
/// - a run that ends the pattern is optional as a whole, so `author.*`
///   also matches `author`
///
/// Every other character is matched literally.
pub(crate) fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let starts_with_wildcard = chars.first() == Some(&'*');
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let leading_dot = chars[i] == '.' && chars.get(i + 1) == Some(&'*');
        let stars_at = if leading_dot { i + 1 } else { i };

        if chars[stars_at] != '*' {
            out.push_str(&regex::escape(chars[i].encode_utf8(&mut [0; 4])));
            i += 1;
            continue;
        }

        let mut end = stars_at;
        while chars.get(end) == Some(&'*') {
            end += 1;
        }
        let any_depth = end - stars_at > 1;
        let trailing_dot = chars.get(end) == Some(&'.');
        if trailing_dot {
            end += 1;
        }

        let class = if any_depth { "." } else { "[^.]" };
        let quantifier = if starts_with_wildcard || (leading_dot && trailing_dot) {
            '+'
        } else {
            '*'
        };

        let mut fragment = String::new();
        if leading_dot {
            fragment.push_str(r"\.");
        }
        fragment.push_str(class);
        fragment.push(quantifier);
        if trailing_dot {
            fragment.push_str(r"\.");
        }

        if end == chars.len() {
            out.push_str(&format!("(?:{})?", fragment));
        } else {
            out.push_str(&fragment);
        }
        i = end;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> FieldMatcher {
        FieldMatcher::compile(patterns).unwrap()
    }

    #[test]
    fn test_exact_fast_path() {
        let m = matcher(&["title", "body"]);
        assert!(!m.has_wildcards());
        assert!(m.matches("title"));
        assert!(m.matches("body"));
        assert!(!m.matches("titles"));
        assert!(!m.matches("author.name"));
    }

    #[test]
    fn test_translation() {
        assert_eq!(translate("author.*"), r"author(?:\.[^.]*)?");
        assert_eq!(translate("author.**"), r"author(?:\..*)?");
        assert_eq!(translate("*.name"), r"[^.]+\.name");
        assert_eq!(translate("**.name"), r".+\.name");
        assert_eq!(translate("a.*.b"), r"a\.[^.]+\.b");
        assert_eq!(translate("a.**.b"), r"a\..+\.b");
        assert_eq!(translate("street*"), r"street(?:[^.]*)?");
        assert_eq!(translate("a.b"), r"a\.b");
    }

    #[test]
    fn test_single_level_wildcard() {
        let m = matcher(&["author.*"]);
        assert!(m.has_wildcards());
        assert!(m.matches("author"));
        assert!(m.matches("author.*"));
        assert!(m.matches("author.name"));
        assert!(!m.matches("author.pub.name"));
        assert!(!m.matches("authors"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        let m = matcher(&["author.**"]);
        assert!(m.matches("author"));
        assert!(m.matches("author.*"));
        assert!(m.matches("author.name"));
        assert!(m.matches("author.pub.name"));
        assert!(!m.matches("title"));
    }

    #[test]
    fn test_leading_wildcards() {
        let m = matcher(&["*.name"]);
        assert!(m.matches("author.name"));
        assert!(!m.matches("author.pub.name"));
        assert!(!m.matches("name"));

        let m = matcher(&["**.name"]);
        assert!(m.matches("author.name"));
        assert!(m.matches("author.pub.name"));
        assert!(!m.matches("name"));
    }

    #[test]
    fn test_inner_wildcards() {
        let m = matcher(&["author.*.name"]);
        assert!(m.matches("author.pub.name"));
        assert!(!m.matches("author.name"));
        assert!(!m.matches("author.a.b.name"));

        let m = matcher(&["author.**.name"]);
        assert!(m.matches("author.pub.name"));
        assert!(m.matches("author.a.b.name"));
        assert!(!m.matches("author.name"));
    }

    #[test]
    fn test_prefix_wildcard() {
        let m = matcher(&["street*"]);
        assert!(m.matches("street"));
        assert!(m.matches("street1"));
        assert!(m.matches("streetCode"));
        assert!(!m.matches("state"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let m = matcher(&["price($)", "tags[0].*"]);
        assert!(m.matches("price($)"));
        assert!(m.matches("tags[0].label"));
        assert!(!m.matches("priceX$X"));
        assert!(!m.matches("tagsX0X.label"));
    }

    #[test]
    fn test_alternation() {
        let m = matcher(&["title", "author.*"]);
        assert!(m.matches("title"));
        assert!(m.matches("author.name"));
        assert!(!m.matches("body"));
        assert_eq!(m.patterns(), vec!["title", "author.*"]);
    }
}
