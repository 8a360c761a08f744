// Turns raw audit buckets into uniform violation records

use crate::audit::{RawAudit, RawFinding, RawNode, RawTarget};
use crate::result::{NEEDS_REVIEW, PageAuditResult, PageMeta, ViolationNode, ViolationRecord};
use std::collections::BTreeSet;

/// Flatten a raw audit into violation records plus page meta.
///
/// With `include_incomplete`, every incomplete finding is appended as a
/// `needs-review` record whose id is suffixed with `-incomplete-<index>`.
pub fn normalize_violations(raw: RawAudit, include_incomplete: bool) -> (Vec<ViolationRecord>, PageMeta) {
    let RawAudit {
        violations,
        passes,
        incomplete,
        inapplicable,
    } = raw;

    let incomplete_count = incomplete.len();

    let mut records: Vec<ViolationRecord> = violations.into_iter().map(to_record).collect();

    if include_incomplete {
        records.extend(
            incomplete
                .into_iter()
                .enumerate()
                .map(|(index, finding)| needs_review_record(finding, index)),
        );
    }

    let tags: BTreeSet<String> = records
        .iter()
        .flat_map(|record| record.tags.iter().cloned())
        .collect();

    let meta = PageMeta {
        passes_count: passes.len(),
        incomplete_count,
        inapplicable_count: inapplicable.len(),
        tags,
    };

    (records, meta)
}

/// Build the result for one successfully audited page.
pub fn build_page_result(url: String, raw: RawAudit, include_incomplete: bool) -> PageAuditResult {
    let (violations, meta) = normalize_violations(raw, include_incomplete);
    PageAuditResult::new(url, violations, meta)
}

fn to_record(finding: RawFinding) -> ViolationRecord {
    ViolationRecord {
        id: finding.id,
        impact: finding.impact,
        description: finding.description,
        help: finding.help,
        help_url: finding.help_url,
        tags: finding.tags,
        nodes: finding.nodes.into_iter().map(to_node).collect(),
    }
}

fn needs_review_record(finding: RawFinding, index: usize) -> ViolationRecord {
    let mut record = to_record(finding);
    record.id = format!("{}-incomplete-{}", record.id, index);
    record.impact = Some(NEEDS_REVIEW.to_string());
    if !record.tags.iter().any(|tag| tag == NEEDS_REVIEW) {
        record.tags.push(NEEDS_REVIEW.to_string());
    }
    record
}

fn to_node(node: RawNode) -> ViolationNode {
    ViolationNode {
        target: node
            .target
            .into_iter()
            .map(|target| match target {
                RawTarget::Selector(selector) => selector,
                RawTarget::Chain(chain) => chain.join(" >>> "),
            })
            .collect(),
        html: node.html,
        failure_summary: node.failure_summary.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_finding(id: &str, impact: Option<&str>, tags: &[&str], nodes: usize) -> RawFinding {
        RawFinding {
            id: id.to_string(),
            impact: impact.map(str::to_string),
            description: format!("{} description", id),
            help: format!("{} help", id),
            help_url: format!("https://rules.test/{}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            nodes: (0..nodes)
                .map(|i| RawNode {
                    target: vec![RawTarget::Selector(format!("#n{}", i))],
                    html: format!("<div id=\"n{}\">", i),
                    failure_summary: None,
                })
                .collect(),
        }
    }

    fn sample_audit() -> RawAudit {
        RawAudit {
            violations: vec![
                raw_finding("image-alt", Some("critical"), &["wcag2a", "cat.text-alternatives"], 2),
                raw_finding("region", Some("moderate"), &["best-practice"], 1),
            ],
            passes: vec![raw_finding("document-title", None, &[], 0)],
            incomplete: vec![
                raw_finding("color-contrast", Some("serious"), &["cat.color"], 3),
                raw_finding("color-contrast", Some("serious"), &["cat.color", NEEDS_REVIEW], 1),
            ],
            inapplicable: vec![
                raw_finding("video-caption", None, &[], 0),
                raw_finding("audio-caption", None, &[], 0),
                raw_finding("blink", None, &[], 0),
            ],
        }
    }

    #[test]
    fn test_incomplete_findings_become_needs_review() {
        let (records, meta) = normalize_violations(sample_audit(), true);

        assert_eq!(records.len(), 4);
        assert_eq!(records[2].id, "color-contrast-incomplete-0");
        assert_eq!(records[3].id, "color-contrast-incomplete-1");

        for record in &records[2..] {
            assert_eq!(record.impact.as_deref(), Some(NEEDS_REVIEW));
            assert!(record.tags.iter().any(|t| t == NEEDS_REVIEW));
        }
        // no duplicate tag when the engine already supplied one
        assert_eq!(records[3].tags, vec!["cat.color", NEEDS_REVIEW]);

        assert_eq!(meta.passes_count, 1);
        assert_eq!(meta.incomplete_count, 2);
        assert_eq!(meta.inapplicable_count, 3);
        assert!(meta.tags.contains(NEEDS_REVIEW));
        assert!(meta.tags.contains("wcag2a"));
    }

    #[test]
    fn test_incomplete_excluded_when_disabled() {
        let (records, meta) = normalize_violations(sample_audit(), false);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.impact.as_deref() != Some(NEEDS_REVIEW)));
        assert_eq!(meta.incomplete_count, 2);
        assert!(!meta.tags.contains(NEEDS_REVIEW));
    }

    #[test]
    fn test_nodes_are_flattened() {
        let mut raw = sample_audit();
        raw.violations[0].nodes[1].target = vec![RawTarget::Chain(vec![
            "iframe#checkout".to_string(),
            "img".to_string(),
        ])];
        raw.violations[0].nodes[1].failure_summary = Some("Add an alt attribute".to_string());

        let (records, _) = normalize_violations(raw, false);
        let nodes = &records[0].nodes;

        assert_eq!(nodes[0].target, vec!["#n0"]);
        assert_eq!(nodes[0].failure_summary, "");
        assert_eq!(nodes[1].target, vec!["iframe#checkout >>> img"]);
        assert_eq!(nodes[1].failure_summary, "Add an alt attribute");
    }

    #[test]
    fn test_build_page_result() {
        let page = build_page_result("https://x.test/".to_string(), sample_audit(), true);
        assert_eq!(page.url, "https://x.test/");
        assert_eq!(page.node_count(), 2 + 1 + 3 + 1);
        assert!(!page.is_failed());
    }
}
