use crate::categorize::{Category, classify};
use pourscan_scanner::result::{Impact, PageAuditResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of entries in `Summary::top_rules`.
pub const TOP_RULES_LIMIT: usize = 20;

/// Node counts per recognised impact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactCounts {
    pub critical: usize,
    pub serious: usize,
    pub moderate: usize,
    pub minor: usize,
    #[serde(rename = "needs-review")]
    pub needs_review: usize,
}

impl ImpactCounts {
    pub fn get(&self, impact: Impact) -> usize {
        match impact {
            Impact::Critical => self.critical,
            Impact::Serious => self.serious,
            Impact::Moderate => self.moderate,
            Impact::Minor => self.minor,
            Impact::NeedsReview => self.needs_review,
        }
    }

    fn add(&mut self, impact: Impact, nodes: usize) {
        let slot = match impact {
            Impact::Critical => &mut self.critical,
            Impact::Serious => &mut self.serious,
            Impact::Moderate => &mut self.moderate,
            Impact::Minor => &mut self.minor,
            Impact::NeedsReview => &mut self.needs_review,
        };
        *slot += nodes;
    }

    pub fn total(&self) -> usize {
        Impact::ALL.iter().map(|impact| self.get(*impact)).sum()
    }
}

/// Node counts per POUR principle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub perceivable: usize,
    pub operable: usize,
    pub understandable: usize,
    pub robust: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Perceivable => self.perceivable,
            Category::Operable => self.operable,
            Category::Understandable => self.understandable,
            Category::Robust => self.robust,
        }
    }

    fn add(&mut self, category: Category, nodes: usize) {
        let slot = match category {
            Category::Perceivable => &mut self.perceivable,
            Category::Operable => &mut self.operable,
            Category::Understandable => &mut self.understandable,
            Category::Robust => &mut self.robust,
        };
        *slot += nodes;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopRule {
    pub rule: String,
    pub nodes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub pages: usize,
    pub total_nodes: usize,
    pub total_rules: usize,
    pub by_impact_nodes: ImpactCounts,
    pub by_category_nodes: CategoryCounts,
    pub top_rules: Vec<TopRule>,
}

/// Reduce every page result into one summary.
///
/// Violations with a missing or unrecognised impact still count towards
/// `total_nodes` and the category buckets, but not towards `by_impact_nodes`.
/// `top_rules` ties keep the order in which rules were first seen.
pub fn aggregate(pages: &[PageAuditResult]) -> Summary {
    let mut summary = Summary {
        pages: pages.len(),
        ..Default::default()
    };

    // rule id -> position in `rule_nodes`, so iteration follows first sighting
    let mut rule_index: HashMap<&str, usize> = HashMap::new();
    let mut rule_nodes: Vec<TopRule> = Vec::new();

    for violation in pages.iter().flat_map(|page| page.violations.iter()) {
        let nodes = violation.node_count();
        summary.total_nodes += nodes;

        if let Some(impact) = violation.recognised_impact() {
            summary.by_impact_nodes.add(impact, nodes);
        }

        summary
            .by_category_nodes
            .add(classify(&violation.id, &violation.tags), nodes);

        match rule_index.get(violation.id.as_str()) {
            Some(&idx) => rule_nodes[idx].nodes += nodes,
            None => {
                rule_index.insert(violation.id.as_str(), rule_nodes.len());
                rule_nodes.push(TopRule {
                    rule: violation.id.clone(),
                    nodes,
                });
            }
        }
    }

    summary.total_rules = rule_nodes.len();

    // sort_by is stable
    rule_nodes.sort_by(|a, b| b.nodes.cmp(&a.nodes));
    rule_nodes.truncate(TOP_RULES_LIMIT);
    summary.top_rules = rule_nodes;

    summary
}
