// Report assembly, rendering and artifact output

use crate::categorize::Category;
use crate::error::Result;
use crate::summary::{Summary, aggregate};
use chrono::{DateTime, Utc};
use pourscan_scanner::result::{Impact, PageAuditResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub report_id: String,
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: Vec<PageAuditResult>,
    pub summary: Summary,
}

impl ScanReport {
    /// Build the final report. A missing `report_id` is generated from
    /// `finished_at`.
    pub fn assemble(
        report_id: Option<String>,
        base_url: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        pages: Vec<PageAuditResult>,
    ) -> Self {
        let summary = aggregate(&pages);
        Self {
            report_id: report_id.unwrap_or_else(|| generate_report_id(finished_at)),
            base_url: base_url.into(),
            started_at,
            finished_at,
            pages,
            summary,
        }
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageAuditResult> {
        self.pages.iter().filter(|page| page.is_failed())
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// `YYYYMMDDHHMMSS-xxxxxxxx`, the suffix taken from a random v4 UUID.
pub fn generate_report_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", at.format("%Y%m%d%H%M%S"), &suffix[..8])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

pub fn render_report(report: &ScanReport, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => generate_text_report(report),
        ReportFormat::Markdown => generate_markdown_report(report),
        ReportFormat::Json => generate_json_report(report)?,
    })
}

pub fn generate_text_report(report: &ScanReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str(HEAVY_RULE);
    out.push_str("                     POURSCAN ACCESSIBILITY REPORT\n");
    out.push_str(HEAVY_RULE);
    out.push('\n');

    out.push_str(&format!("Report ID:    {}\n", report.report_id));
    out.push_str(&format!("Base URL:     {}\n", report.base_url));
    out.push_str(&format!("Started:      {}\n", format_timestamp(report.started_at)));
    out.push_str(&format!("Finished:     {}\n", format_timestamp(report.finished_at)));
    out.push_str(&format!("Duration:     {} seconds\n", report.duration_seconds()));
    out.push_str(&format!(
        "Pages:        {} ({} failed)\n",
        summary.pages,
        report.failed_pages().count()
    ));
    out.push('\n');

    out.push_str(HEAVY_RULE);
    out.push_str("SUMMARY\n");
    out.push_str(HEAVY_RULE);
    out.push('\n');

    out.push_str(&format!("Affected nodes: {}\n", summary.total_nodes));
    out.push_str(&format!("Distinct rules: {}\n\n", summary.total_rules));

    out.push_str("By impact:\n");
    for impact in Impact::ALL {
        out.push_str(&format!(
            "  {:<14} {}\n",
            format!("[{}]", impact.as_str().to_uppercase()),
            summary.by_impact_nodes.get(impact)
        ));
    }
    out.push('\n');

    out.push_str("By principle:\n");
    for category in Category::ALL {
        out.push_str(&format!(
            "  {:<14} {}\n",
            category.as_str(),
            summary.by_category_nodes.get(category)
        ));
    }
    out.push('\n');

    if !summary.top_rules.is_empty() {
        out.push_str("Top rules:\n");
        for (idx, rule) in summary.top_rules.iter().enumerate() {
            out.push_str(&format!("  {:>2}. {:<36} {} nodes\n", idx + 1, rule.rule, rule.nodes));
        }
        out.push('\n');
    }

    let failed: Vec<&PageAuditResult> = report.failed_pages().collect();
    if !failed.is_empty() {
        out.push_str(HEAVY_RULE);
        out.push_str("FAILED PAGES\n");
        out.push_str(HEAVY_RULE);
        out.push('\n');
        for page in failed {
            out.push_str(&format!("  ✗ {}\n", page.url));
            if let Some(ref error) = page.error {
                out.push_str(&wrap_text(error, 80, "      "));
            }
        }
        out.push('\n');
    }

    let with_violations: Vec<&PageAuditResult> = report
        .pages
        .iter()
        .filter(|page| !page.violations.is_empty())
        .collect();

    if !with_violations.is_empty() {
        out.push_str(HEAVY_RULE);
        out.push_str("PAGE DETAILS\n");
        out.push_str(HEAVY_RULE);
        out.push('\n');

        for page in with_violations {
            out.push_str(&format!(
                "{}  ({} violations, {} nodes)\n\n",
                page.url,
                page.violations.len(),
                page.node_count()
            ));

            for violation in &page.violations {
                let impact = violation.impact.as_deref().unwrap_or("unknown");
                out.push_str(&format!(
                    "  [{}] {} ({} nodes)\n",
                    impact.to_uppercase(),
                    violation.id,
                    violation.node_count()
                ));
                if !violation.help.is_empty() {
                    out.push_str(&wrap_text(&violation.help, 80, "      "));
                }
                if !violation.help_url.is_empty() {
                    out.push_str(&format!("      {}\n", violation.help_url));
                }
            }

            out.push('\n');
            out.push_str(LIGHT_RULE);
            out.push('\n');
        }
    }

    out.push_str(HEAVY_RULE);
    out.push_str("                            End of Report\n");
    out.push_str(HEAVY_RULE);
    out.push_str("\nGenerated by pourscan\n\n");

    out
}

pub fn generate_markdown_report(report: &ScanReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str(&format!("# Accessibility report `{}`\n\n", report.report_id));
    out.push_str(&format!("- **Base URL:** {}\n", report.base_url));
    out.push_str(&format!("- **Started:** {}\n", format_timestamp(report.started_at)));
    out.push_str(&format!("- **Finished:** {}\n", format_timestamp(report.finished_at)));
    out.push_str(&format!(
        "- **Pages:** {} ({} failed)\n",
        summary.pages,
        report.failed_pages().count()
    ));
    out.push_str(&format!("- **Affected nodes:** {}\n", summary.total_nodes));
    out.push_str(&format!("- **Distinct rules:** {}\n\n", summary.total_rules));

    out.push_str("## Nodes by impact\n\n| Impact | Nodes |\n|---|---:|\n");
    for impact in Impact::ALL {
        out.push_str(&format!(
            "| {} | {} |\n",
            impact.as_str(),
            summary.by_impact_nodes.get(impact)
        ));
    }

    out.push_str("\n## Nodes by principle\n\n| Principle | Nodes |\n|---|---:|\n");
    for category in Category::ALL {
        out.push_str(&format!(
            "| {} | {} |\n",
            category.as_str(),
            summary.by_category_nodes.get(category)
        ));
    }

    if !summary.top_rules.is_empty() {
        out.push_str("\n## Top rules\n\n| # | Rule | Nodes |\n|---:|---|---:|\n");
        for (idx, rule) in summary.top_rules.iter().enumerate() {
            out.push_str(&format!("| {} | `{}` | {} |\n", idx + 1, rule.rule, rule.nodes));
        }
    }

    out.push_str("\n## Pages\n");
    for page in &report.pages {
        out.push_str(&format!("\n### {}\n\n", page.url));

        if let Some(ref error) = page.error {
            out.push_str(&format!("> Scan failed: {}\n", error));
            continue;
        }
        if page.violations.is_empty() {
            out.push_str("No violations found.\n");
            continue;
        }

        for violation in &page.violations {
            let impact = violation.impact.as_deref().unwrap_or("unknown");
            if violation.help_url.is_empty() {
                out.push_str(&format!(
                    "- **{}** `{}` ({} nodes)",
                    impact,
                    violation.id,
                    violation.node_count()
                ));
            } else {
                out.push_str(&format!(
                    "- **{}** [`{}`]({}) ({} nodes)",
                    impact,
                    violation.id,
                    violation.help_url,
                    violation.node_count()
                ));
            }
            if !violation.help.is_empty() {
                out.push_str(&format!(": {}", violation.help));
            }
            out.push('\n');
        }
    }

    out
}

/// The full report document.
pub fn generate_json_report(report: &ScanReport) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Report identity plus summary, without the per-page results.
pub fn generate_summary_json(report: &ScanReport) -> std::result::Result<String, serde_json::Error> {
    let summary = serde_json::json!({
        "reportId": report.report_id,
        "baseUrl": report.base_url,
        "startedAt": report.started_at,
        "finishedAt": report.finished_at,
        "summary": report.summary,
    });
    serde_json::to_string_pretty(&summary)
}

/// Write `<reportId>.report.json` and `<reportId>.summary.json` into `dir`.
pub fn write_artifacts(report: &ScanReport, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;

    let report_path = dir.join(format!("{}.report.json", report.report_id));
    let summary_path = dir.join(format!("{}.summary.json", report.report_id));

    save_report(&generate_json_report(report)?, &report_path)?;
    save_report(&generate_summary_json(report)?, &summary_path)?;

    Ok((report_path, summary_path))
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > width - indent.len() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
