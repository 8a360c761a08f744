// Scan configuration as accepted at the process boundary

use crate::error::{CoreError, Result};
use pourscan_scanner::audit::AuditOptions;
use pourscan_scanner::render::{RenderOptions, WaitUntil};
use pourscan_scanner::result::Impact;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_MAX_PAGES: usize = 50;
pub const DEFAULT_DELAY_MS: u64 = 800;
pub const MIN_DELAY_MS: u64 = 250;
pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// Options for one scan run. Field names follow the JSON request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    pub url: Option<String>,
    pub max_pages: usize,
    /// Politeness delay between pages, per worker, in milliseconds.
    pub delay: u64,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub same_origin: bool,
    pub respect_robots: bool,
    pub concurrency: usize,
    pub wait_until: WaitUntil,
    pub wait_ms: u64,
    pub timeout_ms: u64,
    pub include_incomplete: bool,
    pub rules: Vec<String>,
    pub disable_rules: Vec<String>,
    pub impacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_pages: DEFAULT_MAX_PAGES,
            delay: DEFAULT_DELAY_MS,
            include: None,
            exclude: None,
            same_origin: true,
            respect_robots: true,
            concurrency: DEFAULT_CONCURRENCY,
            wait_until: WaitUntil::default(),
            wait_ms: 0,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            include_incomplete: true,
            rules: Vec::new(),
            disable_rules: Vec::new(),
            impacts: Vec::new(),
            audit_endpoint: None,
            output_dir: None,
            report_id: None,
        }
    }
}

impl ScanConfig {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Apply the floors: at least one page, one worker, a 250 ms delay and
    /// a one second timeout. Blank patterns and ids are dropped.
    pub fn normalized(mut self) -> Self {
        self.max_pages = self.max_pages.max(1);
        self.delay = self.delay.max(MIN_DELAY_MS);
        self.timeout_ms = self.timeout_ms.max(MIN_TIMEOUT_MS);
        self.concurrency = self.concurrency.max(1);
        self.url = non_blank(self.url);
        self.include = non_blank(self.include);
        self.exclude = non_blank(self.exclude);
        self.audit_endpoint = non_blank(self.audit_endpoint);
        self.report_id = non_blank(self.report_id);
        self.rules = clean_list(self.rules);
        self.disable_rules = clean_list(self.disable_rules);
        self.impacts = clean_list(self.impacts)
            .into_iter()
            .map(|impact| impact.to_lowercase())
            .collect();
        self
    }

    /// Check the start URL and impact filter, returning the parsed start URL.
    pub fn validate(&self) -> Result<Url> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CoreError::Configuration("a start URL is required".to_string()))?;

        let url = Url::parse(raw)
            .map_err(|e| CoreError::Configuration(format!("invalid start URL '{}': {}", raw, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Configuration(format!(
                "start URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        for impact in &self.impacts {
            match Impact::parse(impact) {
                Some(Impact::NeedsReview) | None => {
                    return Err(CoreError::Configuration(format!(
                        "unknown impact '{}' (expected critical, serious, moderate or minor)",
                        impact
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(ref id) = self.report_id
            && !is_safe_report_id(id)
        {
            return Err(CoreError::Configuration(format!(
                "report id '{}' must not contain path separators or '..'",
                id
            )));
        }

        Ok(url)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            wait_until: self.wait_until,
            wait_ms: self.wait_ms,
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn audit_options(&self) -> AuditOptions {
        AuditOptions {
            rules: self.rules.clone(),
            disable_rules: self.disable_rules.clone(),
            impacts: self.impacts.clone(),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}

/// Split a comma separated CLI value into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Report ids become artifact file names inside the output directory.
fn is_safe_report_id(id: &str) -> bool {
    !id.contains('/') && !id.contains('\\') && !id.contains("..")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
