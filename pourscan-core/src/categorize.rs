// Rule id / tag lookup onto the four POUR principles

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Perceivable,
    Operable,
    Understandable,
    Robust,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Perceivable,
        Category::Operable,
        Category::Understandable,
        Category::Robust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Perceivable => "perceivable",
            Category::Operable => "operable",
            Category::Understandable => "understandable",
            Category::Robust => "robust",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum RuleMatch {
    Exact(&'static str),
    Prefix(&'static str),
}

impl RuleMatch {
    fn matches(&self, rule_id: &str) -> bool {
        match self {
            RuleMatch::Exact(id) => rule_id == *id,
            RuleMatch::Prefix(prefix) => rule_id.starts_with(prefix),
        }
    }
}

use Category::*;
use RuleMatch::*;

// Evaluated top to bottom; the first hit wins.
const RULE_TABLE: &[(RuleMatch, Category)] = &[
    (Exact("color-contrast"), Perceivable),
    (Exact("image-alt"), Perceivable),
    (Exact("heading-order"), Perceivable),
    (Exact("page-has-heading-one"), Perceivable),
    (Exact("label"), Perceivable),
    (Exact("label-title-only"), Perceivable),
    (Exact("link-name"), Understandable),
    (Exact("button-name"), Understandable),
    (Exact("html-has-lang"), Understandable),
    (Exact("html-lang-valid"), Understandable),
    (Exact("skip-link"), Operable),
    (Prefix("focus-order"), Operable),
    (Exact("region"), Operable),
    (Exact("landmark-one-main"), Operable),
    (Prefix("aria-"), Robust),
    (Exact("duplicate-id"), Robust),
    (Exact("unique-id"), Robust),
];

const TAG_TABLE: &[(&str, Category)] = &[
    ("cat.color", Perceivable),
    ("cat.language", Understandable),
    ("cat.keyboard", Operable),
    ("cat.name-role-value", Robust),
];

/// Map a rule onto its principle: rule id table first, then tags, then `Robust`.
pub fn classify(rule_id: &str, tags: &[String]) -> Category {
    if let Some((_, category)) = RULE_TABLE.iter().find(|(rule, _)| rule.matches(rule_id)) {
        return *category;
    }

    TAG_TABLE
        .iter()
        .find(|(tag, _)| tags.iter().any(|t| t == tag))
        .map(|(_, category)| *category)
        .unwrap_or(Robust)
}
