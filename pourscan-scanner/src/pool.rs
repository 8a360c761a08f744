use crate::audit::{AuditOptions, Auditor, RawAudit, apply_impact_filter};
use crate::crawler::ProgressCallback;
use crate::error::{Result, ScanError};
use crate::render::{RenderOptions, Renderer};
use crate::result::PageAuditResult;
use crate::violations::build_page_result;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Fixed-size pool of async workers that render and audit a URL list.
pub struct WorkerPool {
    concurrency: usize,
    delay: Duration,
    render_options: RenderOptions,
    audit_options: AuditOptions,
    include_incomplete: bool,
    progress_callback: Option<ProgressCallback>,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            delay: Duration::ZERO,
            render_options: RenderOptions::default(),
            audit_options: AuditOptions::default(),
            include_incomplete: true,
            progress_callback: None,
        }
    }

    /// Per-worker pause between pages.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn with_audit_options(mut self, options: AuditOptions) -> Self {
        self.audit_options = options;
        self
    }

    pub fn with_include_incomplete(mut self, include_incomplete: bool) -> Self {
        self.include_incomplete = include_incomplete;
        self
    }

    /// Called with (worker id, url) whenever a worker picks up a page.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Scan every URL exactly once.
    ///
    /// The returned list holds one entry per input URL, in completion order.
    /// Pages whose render or audit fails come back as placeholders carrying
    /// the error message.
    pub async fn run<R, A>(
        &self,
        renderer: Arc<R>,
        auditor: Arc<A>,
        urls: Vec<String>,
    ) -> Vec<PageAuditResult>
    where
        R: Renderer + 'static,
        A: Auditor + 'static,
    {
        if urls.is_empty() {
            return Vec::new();
        }

        let workers = self.concurrency.min(urls.len());
        info!("Scanning {} pages with {} workers", urls.len(), workers);

        let queue: Arc<Mutex<VecDeque<String>>> =
            Arc::new(Mutex::new(urls.iter().cloned().collect()));
        let results: Arc<Mutex<Vec<PageAuditResult>>> =
            Arc::new(Mutex::new(Vec::with_capacity(urls.len())));

        let mut worker_handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let renderer = renderer.clone();
            let auditor = auditor.clone();
            let queue = queue.clone();
            let results = results.clone();
            let progress_cb = self.progress_callback.clone();
            let render_options = self.render_options.clone();
            let audit_options = self.audit_options.clone();
            let include_incomplete = self.include_incomplete;
            let delay = self.delay;

            let handle = tokio::spawn(async move {
                debug!("Worker {} started", worker_id);

                loop {
                    // The only shared pop; no two workers can take the same URL
                    let next = {
                        let mut queue = queue.lock().await;
                        queue.pop_front()
                    };
                    let Some(url) = next else {
                        break;
                    };

                    if let Some(ref callback) = progress_cb {
                        callback(worker_id, url.clone());
                    }

                    let page = match Self::render_and_audit(
                        renderer.as_ref(),
                        auditor.as_ref(),
                        &url,
                        &render_options,
                        &audit_options,
                    )
                    .await
                    {
                        Ok(raw) => build_page_result(url, raw, include_incomplete),
                        Err(e) => {
                            warn!("Page scan failed for {}: {}", url, e);
                            PageAuditResult::with_error(url, e.to_string())
                        }
                    };

                    results.lock().await.push(page);

                    if !delay.is_zero() && !queue.lock().await.is_empty() {
                        tokio::time::sleep(delay).await;
                    }
                }

                debug!("Worker {} finished", worker_id);
            });

            worker_handles.push(handle);
        }

        for outcome in futures::future::join_all(worker_handles).await {
            if let Err(e) = outcome {
                warn!("Worker task failed: {}", e);
            }
        }

        let mut results = std::mem::take(&mut *results.lock().await);

        // A worker that died mid-page leaves its URL without a result
        let produced: HashSet<String> = results.iter().map(|r| r.url.clone()).collect();
        for url in urls {
            if !produced.contains(&url) {
                results.push(PageAuditResult::with_error(
                    url,
                    "worker aborted before producing a result".to_string(),
                ));
            }
        }

        info!(
            "Scan complete. {} pages, {} failed",
            results.len(),
            results.iter().filter(|r| r.is_failed()).count()
        );
        results
    }

    async fn render_and_audit<R: Renderer, A: Auditor>(
        renderer: &R,
        auditor: &A,
        url: &str,
        render_options: &RenderOptions,
        audit_options: &AuditOptions,
    ) -> Result<RawAudit> {
        let timeout = render_options.timeout();

        let page = tokio::time::timeout(timeout, renderer.render(url, render_options))
            .await
            .map_err(|_| ScanError::Timeout(render_options.timeout_ms))??;

        let raw = tokio::time::timeout(timeout, auditor.audit(&page, audit_options))
            .await
            .map_err(|_| ScanError::Timeout(render_options.timeout_ms))??;

        Ok(apply_impact_filter(raw, &audit_options.impacts))
    }
}
