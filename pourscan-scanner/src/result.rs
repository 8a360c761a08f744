use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tag and impact value given to findings the audit engine could not decide.
pub const NEEDS_REVIEW: &str = "needs-review";

/// Severity buckets recognised by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Impact {
    Critical,
    Serious,
    Moderate,
    Minor,
    NeedsReview,
}

impl Impact {
    pub const ALL: [Impact; 5] = [
        Impact::Critical,
        Impact::Serious,
        Impact::Moderate,
        Impact::Minor,
        Impact::NeedsReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::Serious => "serious",
            Impact::Moderate => "moderate",
            Impact::Minor => "minor",
            Impact::NeedsReview => NEEDS_REVIEW,
        }
    }

    /// Returns `None` for anything outside the five recognised buckets.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|impact| impact.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationNode {
    pub target: Vec<String>,
    pub html: String,
    pub failure_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    pub id: String,
    /// Raw impact string; unrecognised values are kept but not bucketed.
    pub impact: Option<String>,
    pub description: String,
    pub help: String,
    pub help_url: String,
    pub tags: Vec<String>,
    pub nodes: Vec<ViolationNode>,
}

impl ViolationRecord {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn recognised_impact(&self) -> Option<Impact> {
        self.impact.as_deref().and_then(Impact::parse)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub passes_count: usize,
    pub incomplete_count: usize,
    pub inapplicable_count: usize,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAuditResult {
    pub url: String,
    pub scanned_at: DateTime<Utc>,
    pub violations: Vec<ViolationRecord>,
    pub meta: PageMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageAuditResult {
    pub fn new(url: String, violations: Vec<ViolationRecord>, meta: PageMeta) -> Self {
        Self {
            url,
            scanned_at: Utc::now(),
            violations,
            meta,
            error: None,
        }
    }

    /// Placeholder for a page whose render or audit failed.
    pub fn with_error(url: String, error: String) -> Self {
        Self {
            url,
            scanned_at: Utc::now(),
            violations: Vec::new(),
            meta: PageMeta::default(),
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn node_count(&self) -> usize {
        self.violations.iter().map(ViolationRecord::node_count).sum()
    }
}
