use crate::config::ScanConfig;
use crate::data::ReportStore;
use crate::error::Result;
use crate::report::{ScanReport, write_artifacts};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use pourscan_scanner::result::PageAuditResult;
use pourscan_scanner::robots::{RobotsRules, fetch_robots};
use pourscan_scanner::scope::normalize;
use pourscan_scanner::{Auditor, Crawler, ProgressCallback, Renderer, ScopePolicy, WorkerPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Options for how a scan is run, as opposed to what it scans.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub show_progress: bool,
}

/// Callback for human-readable progress messages.
pub type ScanProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

struct PipelineOutput {
    base_url: String,
    started_at: DateTime<Utc>,
    pages: Vec<PageAuditResult>,
}

/// Run a full scan: crawl, audit every discovered page, aggregate and persist.
///
/// Only an invalid configuration is an error. Per-page failures end up as
/// failed entries in the report, and store or artifact failures are logged.
/// The renderer is closed before this returns, on every path.
pub async fn execute_scan<R, A>(
    config: ScanConfig,
    renderer: Arc<R>,
    auditor: Arc<A>,
    store: Option<&dyn ReportStore>,
    options: ScanOptions,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<ScanReport>
where
    R: Renderer + 'static,
    A: Auditor + 'static,
{
    let config = config.normalized();

    let progress_bar = if options.show_progress {
        Some(spinner("Starting scan..."))
    } else {
        None
    };

    let outcome = run_pipeline(
        &config,
        renderer.clone(),
        auditor,
        progress_bar.clone(),
        progress_callback.clone(),
    )
    .await;

    renderer.close().await;

    let output = match outcome {
        Ok(output) => output,
        Err(e) => {
            if let Some(ref pb) = progress_bar {
                pb.finish_and_clear();
            }
            return Err(e);
        }
    };

    let finished_at = Utc::now();
    let report = ScanReport::assemble(
        config.report_id.clone(),
        output.base_url,
        output.started_at,
        finished_at,
        output.pages,
    );

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Scan complete! {} pages, {} affected nodes",
            report.summary.pages, report.summary.total_nodes
        ));
    }

    if let Some(store) = store {
        match store.create(&report) {
            Ok(id) => info!("Stored report {}", id),
            Err(e) => warn!("Failed to store report {}: {}", report.report_id, e),
        }
    }

    if let Some(ref dir) = config.output_dir {
        match write_artifacts(&report, dir) {
            Ok((report_path, summary_path)) => {
                info!(
                    "Wrote {} and {}",
                    report_path.display(),
                    summary_path.display()
                );
                if let Some(ref callback) = progress_callback {
                    callback(format!("Report written to {}", report_path.display()));
                    callback(format!("Summary written to {}", summary_path.display()));
                }
            }
            Err(e) => warn!("Failed to write report artifacts to {}: {}", dir.display(), e),
        }
    }

    Ok(report)
}

async fn run_pipeline<R, A>(
    config: &ScanConfig,
    renderer: Arc<R>,
    auditor: Arc<A>,
    progress_bar: Option<ProgressBar>,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<PipelineOutput>
where
    R: Renderer + 'static,
    A: Auditor + 'static,
{
    let start_url = config.validate()?;
    let started_at = Utc::now();

    let notify = |msg: String| {
        if let Some(ref callback) = progress_callback {
            callback(msg);
        }
    };

    let urls = discover(config, &start_url, renderer.as_ref(), progress_bar.as_ref()).await;
    notify(format!("Discovered {} pages", urls.len()));

    let total = urls.len();
    let mut pool = WorkerPool::new(config.concurrency)
        .with_delay(config.delay())
        .with_render_options(config.render_options())
        .with_audit_options(config.audit_options())
        .with_include_incomplete(config.include_incomplete);

    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        let started = Arc::new(AtomicUsize::new(0));
        let audit_progress: ProgressCallback = Arc::new(move |worker_id: usize, url: String| {
            let count = started.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_message(format!("Auditing {}/{} [worker {}] {}", count, total, worker_id, url));
        });
        pool = pool.with_progress_callback(audit_progress);
    }

    let pages = pool.run(renderer, auditor, urls).await;

    let failed = pages.iter().filter(|page| page.is_failed()).count();
    if failed > 0 {
        notify(format!("{} of {} pages could not be scanned", failed, pages.len()));
    }

    let base_url = normalize(start_url.as_str(), None).unwrap_or_else(|| start_url.to_string());

    Ok(PipelineOutput {
        base_url,
        started_at,
        pages,
    })
}

/// Discovery only: validate, fetch robots and crawl, without auditing.
///
/// The renderer is closed before this returns, on every path.
pub async fn execute_crawl<R: Renderer>(
    config: ScanConfig,
    renderer: &R,
    options: ScanOptions,
) -> Result<Vec<String>> {
    let config = config.normalized();

    let start_url = match config.validate() {
        Ok(url) => url,
        Err(e) => {
            renderer.close().await;
            return Err(e);
        }
    };

    let progress_bar = if options.show_progress {
        Some(spinner("Starting crawl..."))
    } else {
        None
    };

    let urls = discover(&config, &start_url, renderer, progress_bar.as_ref()).await;
    renderer.close().await;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!("Crawl complete! {} pages discovered", urls.len()));
    }

    Ok(urls)
}

async fn discover<R: Renderer>(
    config: &ScanConfig,
    start_url: &Url,
    renderer: &R,
    progress_bar: Option<&ProgressBar>,
) -> Vec<String> {
    let robots = if config.respect_robots {
        load_robots(start_url, config.timeout_ms).await
    } else {
        None
    };

    let policy = ScopePolicy::new(start_url.as_str())
        .with_same_origin(config.same_origin)
        .with_include(config.include.as_deref())
        .with_exclude(config.exclude.as_deref())
        .with_robots(robots);

    let mut crawler = Crawler::new(policy)
        .with_max_pages(config.max_pages)
        .with_render_options(config.render_options());

    if let Some(pb) = progress_bar {
        let pb = pb.clone();
        let crawl_progress: ProgressCallback = Arc::new(move |seen: usize, url: String| {
            pb.set_message(format!("Discovering... {} pages found, expanding {}", seen, url));
        });
        crawler = crawler.with_progress_callback(crawl_progress);
    }

    crawler.crawl(renderer, start_url.as_str()).await
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

/// Fetch the site's robots rules. Any failure means no restriction.
async fn load_robots(start_url: &Url, timeout_ms: u64) -> Option<RobotsRules> {
    let client = match reqwest::Client::builder()
        .user_agent(concat!("pourscan/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_millis(timeout_ms))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Could not build robots client, ignoring robots.txt: {}", e);
            return None;
        }
    };

    match fetch_robots(&client, start_url).await {
        Ok(rules) => rules,
        Err(e) => {
            warn!("Failed to fetch robots.txt for {}: {}", start_url, e);
            None
        }
    }
}
