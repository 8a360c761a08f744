//! URL canonicalisation and crawl scope checks.

use crate::robots::RobotsRules;
use regex::{Regex, RegexBuilder};
use tracing::debug;
use url::Url;

/// Canonicalise `raw`, resolving it against `base` when given.
///
/// The fragment is dropped and a trailing slash is removed from any path other
/// than the root. Returns `None` when the input cannot be parsed; callers drop
/// such URLs without further notice.
pub fn normalize(raw: &str, base: Option<&Url>) -> Option<String> {
    let parsed = match base {
        Some(base) => base.join(raw.trim()),
        None => Url::parse(raw.trim()),
    };

    let mut url = match parsed {
        Ok(url) => url,
        Err(e) => {
            debug!("Dropping malformed URL {:?}: {}", raw, e);
            return None;
        }
    };

    url.set_fragment(None);

    let path = url.path();
    if path != "/" && path.ends_with('/') {
        let trimmed = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            rest => rest.to_string(),
        };
        url.set_path(&trimmed);
    }

    Some(url.to_string())
}

/// True when both URLs share scheme, host and port.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            let (a, b) = (a.origin(), b.origin());
            a.is_tuple() && a == b
        }
        _ => false,
    }
}

/// Only http(s) targets can be rendered.
pub fn is_crawlable_scheme(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Case-insensitive, fully anchored `*` glob over a whole URL.
#[derive(Debug, Clone)]
pub struct WildcardMatcher {
    pattern: String,
    regex: Regex,
}

impl WildcardMatcher {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

/// Compile a wildcard pattern. `None` (or a blank pattern) means "no restriction".
pub fn compile_wildcard(pattern: Option<&str>) -> Option<WildcardMatcher> {
    let pattern = pattern.map(str::trim).filter(|p| !p.is_empty())?;
    let body = regex::escape(pattern).replace(r"\*", ".*");

    match RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => Some(WildcardMatcher {
            pattern: pattern.to_string(),
            regex,
        }),
        Err(e) => {
            debug!("Ignoring uncompilable pattern {:?}: {}", pattern, e);
            None
        }
    }
}

/// Everything the crawler needs to decide whether a URL is in scope.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    pub origin: String,
    pub same_origin: bool,
    pub include: Option<WildcardMatcher>,
    pub exclude: Option<WildcardMatcher>,
    pub robots: Option<RobotsRules>,
}

impl ScopePolicy {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            same_origin: true,
            include: None,
            exclude: None,
            robots: None,
        }
    }

    pub fn with_same_origin(mut self, same_origin: bool) -> Self {
        self.same_origin = same_origin;
        self
    }

    pub fn with_include(mut self, pattern: Option<&str>) -> Self {
        self.include = compile_wildcard(pattern);
        self
    }

    pub fn with_exclude(mut self, pattern: Option<&str>) -> Self {
        self.exclude = compile_wildcard(pattern);
        self
    }

    pub fn with_robots(mut self, robots: Option<RobotsRules>) -> Self {
        self.robots = robots;
        self
    }
}

/// Scope check used for every discovered link.
pub fn allowed(url: &str, policy: &ScopePolicy) -> bool {
    if policy.same_origin && !same_origin(url, &policy.origin) {
        return false;
    }
    if let Some(ref include) = policy.include
        && !include.is_match(url)
    {
        return false;
    }
    if let Some(ref exclude) = policy.exclude
        && exclude.is_match(url)
    {
        return false;
    }
    if let Some(ref robots) = policy.robots
        && !robots.is_allowed(url)
    {
        return false;
    }
    true
}
