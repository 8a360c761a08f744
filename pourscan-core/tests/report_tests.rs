// Tests for report assembly, rendering and artifacts

use chrono::{Duration, TimeZone, Utc};
use pourscan_core::report::{
    ReportFormat, ScanReport, generate_json_report, generate_markdown_report,
    generate_report_id, generate_summary_json, generate_text_report, render_report,
    write_artifacts,
};
use pourscan_scanner::result::{PageAuditResult, PageMeta, ViolationNode, ViolationRecord};
use tempfile::TempDir;

fn sample_report() -> ScanReport {
    let started = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let finished = started + Duration::seconds(42);

    let violation = ViolationRecord {
        id: "image-alt".to_string(),
        impact: Some("critical".to_string()),
        description: "Images must have alternate text".to_string(),
        help: "Images must have alternate text".to_string(),
        help_url: "https://rules.test/image-alt".to_string(),
        tags: vec!["wcag2a".to_string()],
        nodes: vec![
            ViolationNode {
                target: vec!["img.hero".to_string()],
                html: "<img class=\"hero\">".to_string(),
                failure_summary: "Fix any of the following".to_string(),
            };
            2
        ],
    };

    let pages = vec![
        PageAuditResult::new(
            "https://x.test/".to_string(),
            vec![violation],
            PageMeta::default(),
        ),
        PageAuditResult::new("https://x.test/clean".to_string(), Vec::new(), PageMeta::default()),
        PageAuditResult::with_error(
            "https://x.test/broken".to_string(),
            "Timed out after 30000 ms".to_string(),
        ),
    ];

    ScanReport::assemble(
        Some("20240301120042-abcdef12".to_string()),
        "https://x.test/",
        started,
        finished,
        pages,
    )
}

// ============================================================================
// Assembly
// ============================================================================

#[test]
fn test_assemble_computes_summary() {
    let report = sample_report();
    assert_eq!(report.report_id, "20240301120042-abcdef12");
    assert_eq!(report.summary.pages, 3);
    assert_eq!(report.summary.total_nodes, 2);
    assert_eq!(report.summary.by_impact_nodes.critical, 2);
    assert_eq!(report.failed_pages().count(), 1);
    assert_eq!(report.duration_seconds(), 42);
}

#[test]
fn test_assemble_generates_id_when_missing() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
    let report = ScanReport::assemble(None, "https://x.test/", at, at, Vec::new());

    assert!(report.report_id.starts_with("20240301090507-"));
    assert_eq!(report.summary.pages, 0);
}

#[test]
fn test_report_id_format_and_uniqueness() {
    let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
    let a = generate_report_id(at);
    let b = generate_report_id(at);

    assert_ne!(a, b);
    let (stamp, suffix) = a.split_once('-').unwrap();
    assert_eq!(stamp, "20241231235959");
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
}

// ============================================================================
// Formats
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown));
    assert_eq!(ReportFormat::from_str("Markdown"), Some(ReportFormat::Markdown));
    assert_eq!(ReportFormat::from_str("pdf"), None);
}

#[test]
fn test_text_report_contents() {
    let text = generate_text_report(&sample_report());

    assert!(text.contains("POURSCAN ACCESSIBILITY REPORT"));
    assert!(text.contains("Report ID:    20240301120042-abcdef12"));
    assert!(text.contains("Pages:        3 (1 failed)"));
    assert!(text.contains("[CRITICAL]"));
    assert!(text.contains("[NEEDS-REVIEW]"));
    assert!(text.contains("perceivable"));
    assert!(text.contains("FAILED PAGES"));
    assert!(text.contains("https://x.test/broken"));
    assert!(text.contains("Timed out after 30000 ms"));
    assert!(text.contains("image-alt (2 nodes)"));
    // clean pages are not listed in the details section
    assert!(!text.contains("https://x.test/clean  ("));
}

#[test]
fn test_markdown_report_contents() {
    let md = generate_markdown_report(&sample_report());

    assert!(md.starts_with("# Accessibility report `20240301120042-abcdef12`"));
    assert!(md.contains("| critical | 2 |"));
    assert!(md.contains("| 1 | `image-alt` | 2 |"));
    assert!(md.contains("### https://x.test/clean\n\nNo violations found."));
    assert!(md.contains("> Scan failed: Timed out after 30000 ms"));
    assert!(md.contains("[`image-alt`](https://rules.test/image-alt)"));
}

#[test]
fn test_json_report_round_trips() {
    let report = sample_report();
    let json = generate_json_report(&report).unwrap();

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["reportId"], "20240301120042-abcdef12");
    assert_eq!(value["baseUrl"], "https://x.test/");
    assert_eq!(value["pages"][0]["violations"][0]["helpUrl"], "https://rules.test/image-alt");
    assert_eq!(value["pages"][2]["error"], "Timed out after 30000 ms");
    assert!(value["pages"][0].get("error").is_none());

    let parsed: ScanReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
}

#[test]
fn test_summary_json_omits_pages() {
    let json = generate_summary_json(&sample_report()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["reportId"], "20240301120042-abcdef12");
    assert_eq!(value["summary"]["totalNodes"], 2);
    assert!(value.get("pages").is_none());
}

#[test]
fn test_render_report_dispatch() {
    let report = sample_report();
    assert!(render_report(&report, ReportFormat::Json).unwrap().starts_with('{'));
    assert!(render_report(&report, ReportFormat::Markdown).unwrap().starts_with('#'));
    assert!(render_report(&report, ReportFormat::Text).unwrap().contains("End of Report"));
}

// ============================================================================
// Artifacts
// ============================================================================

#[test]
fn test_write_artifacts_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("nested").join("reports");
    let report = sample_report();

    let (report_path, summary_path) = write_artifacts(&report, &out_dir).unwrap();

    assert_eq!(
        report_path,
        out_dir.join("20240301120042-abcdef12.report.json")
    );
    assert_eq!(
        summary_path,
        out_dir.join("20240301120042-abcdef12.summary.json")
    );

    let stored: ScanReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(stored, report);

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["summary"]["pages"], 3);
}
