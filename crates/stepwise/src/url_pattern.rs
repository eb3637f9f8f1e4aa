//! URL matching used by wait predicates.
//!
//! Glob semantics follow the browser-automation convention: `*` matches any
//! run of characters (including `/` and `?`), so `**/catalog/search*` matches
//! the search route with or without a query string.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// URL pattern for matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Glob pattern (e.g., "**/catalog/search*")
    Glob(String),
}

impl UrlPattern {
    /// Glob shorthand
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Anchored regex equivalent of the pattern
    #[must_use]
    pub fn to_regex(&self) -> Option<Regex> {
        let source = match self {
            Self::Exact(url) => format!("^{}$", regex::escape(url)),
            Self::Glob(pattern) => glob_source(pattern),
        };
        Regex::new(&source).ok()
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Glob(_) => self.to_regex().is_some_and(|re| re.is_match(url)),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "url == {p}"),
            Self::Glob(p) => write!(f, "url matches {p}"),
        }
    }
}

/// `^literal.*literal$`; runs of `*` collapse into one `.*`
fn glob_source(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut pieces = pattern.split('*').peekable();
    while let Some(piece) = pieces.next() {
        source.push_str(&regex::escape(piece));
        if pieces.peek().is_some() && !source.ends_with(".*") {
            source.push_str(".*");
        }
    }
    source.push('$');
    source
}

/// Decoded value of the first `key` query parameter, if the URL parses
#[must_use]
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// True when the URL carries `key` as a query parameter (any value)
#[must_use]
pub fn has_query_param(url: &str, key: &str) -> bool {
    Url::parse(url)
        .map(|parsed| parsed.query_pairs().any(|(k, _)| k == key))
        .unwrap_or_else(|_| url.contains(&format!("{key}=")))
}

/// Append `key=value` to `base`, percent-encoding the value
#[must_use]
pub fn with_query_param(base: &str, key: &str, value: &str) -> Option<String> {
    let mut parsed = Url::parse(base).ok()?;
    parsed.query_pairs_mut().append_pair(key, value);
    Some(parsed.into())
}
