use crate::error::{Result, ScanError};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle0,
    #[default]
    NetworkIdle2,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::NetworkIdle0 => "networkidle0",
            WaitUntil::NetworkIdle2 => "networkidle2",
        }
    }
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "load" => Ok(WaitUntil::Load),
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "networkidle0" => Ok(WaitUntil::NetworkIdle0),
            "networkidle2" => Ok(WaitUntil::NetworkIdle2),
            other => Err(format!("Unknown wait strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub wait_until: WaitUntil,
    /// Extra settle time after the page is considered loaded.
    pub wait_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::default(),
            wait_ms: 0,
            timeout_ms: 30_000,
        }
    }
}

impl RenderOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub html: String,
    /// Raw href values, absolute or relative.
    pub links: Vec<String>,
}

/// Browser-like collaborator that loads a page and exposes its DOM.
///
/// One instance is shared by the crawl and the worker pool; the pipeline
/// calls [`Renderer::close`] once both phases are done.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> impl Future<Output = Result<RenderedPage>> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Renderer that fetches the served HTML over HTTP without running scripts.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let timeout = Duration::from_millis(timeout_ms);
        let client = Client::builder()
            .user_agent(concat!("pourscan/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn extract_links(html: &str) -> Result<Vec<String>> {
        let document = Html::parse_document(html);
        let link_selector = Selector::parse("a[href]")
            .map_err(|e| ScanError::ParseError(format!("link selector: {}", e)))?;

        Ok(document
            .select(&link_selector)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect())
    }
}

impl Renderer for HttpRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage> {
        debug!("Rendering {} (wait: {})", url, options.wait_until.as_str());

        let response = self
            .client
            .get(url)
            .timeout(options.timeout())
            .send()
            .await?;

        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let html = response.text().await?;

        let is_html = content_type
            .as_ref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            return Err(ScanError::RenderError(format!(
                "{} is not an HTML document ({})",
                url,
                content_type.as_deref().unwrap_or("no content-type")
            )));
        }

        let links = Self::extract_links(&html)?;

        if options.wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.wait_ms)).await;
        }

        Ok(RenderedPage {
            url: final_url,
            status_code,
            content_type,
            html,
            links,
        })
    }
}
