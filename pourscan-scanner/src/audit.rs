use crate::error::{Result, ScanError};
use crate::render::RenderedPage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// One element selector, or a chain of selectors crossing iframes/shadow roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTarget {
    Selector(String),
    Chain(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default)]
    pub target: Vec<RawTarget>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub failure_summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
    pub id: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub help_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

/// Output of the audit engine, bucketed the way axe reports results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAudit {
    #[serde(default)]
    pub violations: Vec<RawFinding>,
    #[serde(default)]
    pub passes: Vec<RawFinding>,
    #[serde(default)]
    pub incomplete: Vec<RawFinding>,
    #[serde(default)]
    pub inapplicable: Vec<RawFinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditOptions {
    /// Run only these rules when non-empty.
    pub rules: Vec<String>,
    pub disable_rules: Vec<String>,
    /// Keep only violations with these impacts when non-empty.
    pub impacts: Vec<String>,
}

/// Accessibility rule engine run against a rendered page.
pub trait Auditor: Send + Sync {
    fn audit(
        &self,
        page: &RenderedPage,
        options: &AuditOptions,
    ) -> impl Future<Output = Result<RawAudit>> + Send;
}

/// Drop violations whose impact is not in the allow-list. An empty list keeps all.
pub fn apply_impact_filter(mut raw: RawAudit, impacts: &[String]) -> RawAudit {
    if impacts.is_empty() {
        return raw;
    }
    raw.violations.retain(|finding| {
        finding
            .impact
            .as_ref()
            .is_some_and(|impact| impacts.iter().any(|allowed| allowed == impact))
    });
    raw
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditRequest<'a> {
    url: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "is_empty_list")]
    run_only: &'a [String],
    #[serde(skip_serializing_if = "is_empty_list")]
    disable_rules: &'a [String],
}

fn is_empty_list(list: &&[String]) -> bool {
    list.is_empty()
}

/// Auditor backed by an HTTP audit service that accepts the page HTML and
/// answers with axe-shaped JSON.
pub struct RemoteAuditor {
    client: Client,
    endpoint: String,
}

impl RemoteAuditor {
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pourscan/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Auditor for RemoteAuditor {
    async fn audit(&self, page: &RenderedPage, options: &AuditOptions) -> Result<RawAudit> {
        debug!("Auditing {} via {}", page.url, self.endpoint);

        let request = AuditRequest {
            url: &page.url,
            html: &page.html,
            run_only: &options.rules,
            disable_rules: &options.disable_rules,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::AuditError(format!(
                "audit service answered {} for {}",
                status.as_u16(),
                page.url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScanError::AuditError(format!("malformed audit response: {}", e)))
    }
}
