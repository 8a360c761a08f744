// In-memory collaborators for unit tests

use crate::audit::{AuditOptions, Auditor, RawAudit, RawFinding, RawNode, RawTarget};
use crate::error::{Result, ScanError};
use crate::render::{RenderOptions, RenderedPage, Renderer};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves a fixed link graph; URLs listed in `failing` error out.
#[derive(Default)]
pub struct FakeRenderer {
    pub pages: HashMap<String, Vec<String>>,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
    pub closed: AtomicUsize,
}

impl FakeRenderer {
    pub fn new(pages: &[(&str, &[&str])]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, links)| {
                    (
                        url.to_string(),
                        links.iter().map(|l| l.to_string()).collect(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn rendered(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Renderer for FakeRenderer {
    async fn render(&self, url: &str, _options: &RenderOptions) -> Result<RenderedPage> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        tokio::task::yield_now().await;

        if self.failing.contains(url) {
            return Err(ScanError::RenderError(format!("navigation to {} failed", url)));
        }

        Ok(RenderedPage {
            url: url.to_string(),
            status_code: 200,
            content_type: Some("text/html".to_string()),
            html: format!("<html><body>{}</body></html>", url),
            links: self.pages.get(url).cloned().unwrap_or_default(),
        })
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reports one `image-alt` violation with one node per page, plus one
/// incomplete `color-contrast` finding. URLs in `failing` error out.
#[derive(Default)]
pub struct FakeAuditor {
    pub failing: HashSet<String>,
    pub audited: Mutex<Vec<String>>,
}

impl FakeAuditor {
    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn audited(&self) -> Vec<String> {
        self.audited.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Auditor for FakeAuditor {
    async fn audit(&self, page: &RenderedPage, _options: &AuditOptions) -> Result<RawAudit> {
        if let Ok(mut audited) = self.audited.lock() {
            audited.push(page.url.clone());
        }
        tokio::task::yield_now().await;

        if self.failing.contains(&page.url) {
            return Err(ScanError::AuditError(format!("engine crashed on {}", page.url)));
        }

        let node = RawNode {
            target: vec![RawTarget::Selector("img".to_string())],
            html: "<img>".to_string(),
            failure_summary: None,
        };
        Ok(RawAudit {
            violations: vec![RawFinding {
                id: "image-alt".to_string(),
                impact: Some("critical".to_string()),
                tags: vec!["wcag2a".to_string()],
                nodes: vec![node.clone()],
                ..Default::default()
            }],
            incomplete: vec![RawFinding {
                id: "color-contrast".to_string(),
                impact: Some("serious".to_string()),
                tags: vec!["cat.color".to_string()],
                nodes: vec![node],
                ..Default::default()
            }],
            ..Default::default()
        })
    }
}
