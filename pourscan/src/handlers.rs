use anyhow::{Context, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use pourscan_core::config::split_list;
use pourscan_core::data::{Database, ReportStore};
use pourscan_core::report::{ReportFormat, render_report};
use pourscan_core::scan::{ScanProgressCallback, execute_crawl};
use pourscan_core::{ScanConfig, ScanOptions, execute_scan};
use pourscan_scanner::render::WaitUntil;
use pourscan_scanner::{HttpRenderer, RemoteAuditor};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;
use url::Url;

pub const DB_FILE_NAME: &str = "pourscan.db";
pub const SAMPLE_CONFIG_NAME: &str = "scan.json";

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

/// Install the stderr log subscriber. `-v` raises the level to DEBUG.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// Lookups that tolerate ids the current subcommand does not define

fn opt<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str) -> Option<T> {
    args.try_get_one::<T>(id).ok().flatten().cloned()
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

/// Build the scan configuration from `--config` (if any) and the flags
/// given on the command line. Flags win over the file.
pub fn build_scan_config(args: &ArgMatches) -> anyhow::Result<ScanConfig> {
    let mut config = match opt::<String>(args, "config") {
        Some(path) => {
            let path = expand_path(&path);
            ScanConfig::from_file(&path)
                .with_context(|| format!("Failed to load scan config {}", path.display()))?
        }
        None => ScanConfig::default(),
    };

    if let Some(url) = opt::<String>(args, "url") {
        config.url = Some(url);
    }
    if let Some(max_pages) = opt::<usize>(args, "max-pages") {
        config.max_pages = max_pages;
    }
    if let Some(include) = opt::<String>(args, "include") {
        config.include = Some(include);
    }
    if let Some(exclude) = opt::<String>(args, "exclude") {
        config.exclude = Some(exclude);
    }
    if flag(args, "cross-origin") {
        config.same_origin = false;
    }
    if flag(args, "no-robots") {
        config.respect_robots = false;
    }
    if let Some(concurrency) = opt::<usize>(args, "concurrency") {
        config.concurrency = concurrency;
    }
    if let Some(delay) = opt::<u64>(args, "delay") {
        config.delay = delay;
    }
    if let Some(wait_until) = opt::<String>(args, "wait-until") {
        config.wait_until = WaitUntil::from_str(&wait_until).map_err(|e| anyhow!(e))?;
    }
    if let Some(wait_ms) = opt::<u64>(args, "wait-ms") {
        config.wait_ms = wait_ms;
    }
    if let Some(timeout) = opt::<u64>(args, "timeout") {
        config.timeout_ms = timeout;
    }
    if flag(args, "no-incomplete") {
        config.include_incomplete = false;
    }
    if let Some(rules) = opt::<String>(args, "rules") {
        config.rules = split_list(&rules);
    }
    if let Some(disable_rules) = opt::<String>(args, "disable-rules") {
        config.disable_rules = split_list(&disable_rules);
    }
    if let Some(impacts) = opt::<String>(args, "impacts") {
        config.impacts = split_list(&impacts);
    }
    if let Some(endpoint) = opt::<String>(args, "audit-endpoint") {
        config.audit_endpoint = Some(endpoint);
    }
    if let Some(dir) = opt::<String>(args, "output-dir") {
        config.output_dir = Some(expand_path(&dir));
    }
    if let Some(report_id) = opt::<String>(args, "report-id") {
        config.report_id = Some(report_id);
    }

    Ok(config)
}

pub fn report_format(args: &ArgMatches) -> ReportFormat {
    opt::<String>(args, "format")
        .and_then(|f| ReportFormat::from_str(&f))
        .unwrap_or(ReportFormat::Text)
}

/// Create the config directory, the database and a sample scan config.
/// Returns the database path.
pub fn init_workspace(config_dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let db_path = config_dir.join(DB_FILE_NAME);
    if force && Database::exists(&db_path) {
        Database::drop(&db_path)?;
    }
    Database::new(&db_path)
        .with_context(|| format!("Failed to create database {}", db_path.display()))?;

    let sample_path = config_dir.join(SAMPLE_CONFIG_NAME);
    if force || !sample_path.exists() {
        let sample = ScanConfig::for_url("https://example.com/");
        fs::write(&sample_path, serde_json::to_string_pretty(&sample)?)?;
    }

    Ok(db_path)
}

pub fn handle_init(args: &ArgMatches) -> anyhow::Result<()> {
    print_divider();
    println!("{}", "  POURSCAN INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(crate::commands::DEFAULT_CONFIG_DIR);
    let mut force = args.get_flag("force");
    let config_dir = expand_path(dir);
    let db_path = config_dir.join(DB_FILE_NAME);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    if Database::exists(&db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to overwrite it? [y/N]:");
        println!();

        if response == "y" || response == "yes" {
            force = true;
        } else {
            println!("{} Keeping existing database", "→".blue());
        }
    }

    let db_path = init_workspace(&config_dir, force)?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        config_dir.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!(
        "{} Sample scan config: {}",
        "✓".green().bold(),
        config_dir.join(SAMPLE_CONFIG_NAME).display().to_string().bright_white()
    );
    println!();
    Ok(())
}

fn open_store(db: &str) -> Option<Database> {
    let path = expand_path(db);
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        eprintln!("{} Could not create {}: {}", "⚠".yellow(), parent.display(), e);
        return None;
    }
    match Database::new(&path) {
        Ok(db) => Some(db),
        Err(e) => {
            eprintln!(
                "{} Could not open database {}, report will not be stored: {}",
                "⚠".yellow(),
                path.display(),
                e
            );
            None
        }
    }
}

pub async fn handle_scan(args: &ArgMatches) -> anyhow::Result<()> {
    init_logging(flag(args, "verbose"));

    let config = build_scan_config(args)?.normalized();
    let start_url = config.validate()?;
    let format = report_format(args);

    let endpoint = config.audit_endpoint.clone().ok_or_else(|| {
        anyhow!("No audit service configured; pass --audit-endpoint or set auditEndpoint")
    })?;

    eprintln!("\n{} Scanning {}", "→".blue().bold(), start_url.as_str().bright_white());
    eprintln!(
        "  Max pages: {}  Workers: {}  Delay: {} ms",
        config.max_pages, config.concurrency, config.delay
    );
    eprintln!(
        "  Same origin: {}  Robots: {}  Needs-review: {}\n",
        config.same_origin, config.respect_robots, config.include_incomplete
    );

    let renderer = Arc::new(HttpRenderer::new(config.timeout_ms)?);
    let auditor = Arc::new(RemoteAuditor::new(endpoint, config.timeout_ms)?);

    let store = if flag(args, "no-store") {
        None
    } else {
        opt::<String>(args, "db").and_then(|db| open_store(&db))
    };

    let progress: ScanProgressCallback = Arc::new(|msg: String| {
        eprintln!("{} {}", "ℹ".blue(), msg);
    });

    let report = execute_scan(
        config,
        renderer,
        auditor,
        store.as_ref().map(|db| db as &dyn ReportStore),
        ScanOptions {
            show_progress: true,
        },
        Some(progress),
    )
    .await?;

    eprintln!(
        "\n{} Scan complete: {} pages, {} affected nodes, report {}\n",
        "✓".green().bold(),
        report.summary.pages,
        report.summary.total_nodes,
        report.report_id.bright_white()
    );

    println!("{}", render_report(&report, format)?);
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) -> anyhow::Result<()> {
    init_logging(flag(args, "verbose"));

    let config = build_scan_config(args)?.normalized();
    let start_url = config.validate()?;

    eprintln!("\n{} Crawling {}", "→".blue().bold(), start_url.as_str().bright_white());
    eprintln!("  Max pages: {}\n", config.max_pages);

    let renderer = HttpRenderer::new(config.timeout_ms)?;
    let urls = execute_crawl(
        config,
        &renderer,
        ScanOptions {
            show_progress: true,
        },
    )
    .await?;

    eprintln!("\n{} Crawl complete! {} pages\n", "✓".green().bold(), urls.len());
    print!("{}", format_url_list(&urls));
    Ok(())
}

/// Group discovered URLs by host, paths indented below each host.
pub fn format_url_list(urls: &[String]) -> String {
    let mut by_host: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for raw in urls {
        match Url::parse(raw) {
            Ok(url) => {
                let host = match url.port() {
                    Some(port) => format!("{}:{}", url.host_str().unwrap_or("unknown"), port),
                    None => url.host_str().unwrap_or("unknown").to_string(),
                };
                let mut path = url.path().to_string();
                if let Some(query) = url.query() {
                    path.push('?');
                    path.push_str(query);
                }
                by_host.entry(host).or_default().push(path);
            }
            Err(_) => by_host.entry("unknown".to_string()).or_default().push(raw.clone()),
        }
    }

    let mut out = String::new();
    for (host, paths) in by_host {
        out.push_str(&format!("{}\n", host));
        for path in paths {
            out.push_str(&format!("  {}\n", path));
        }
    }
    out
}

pub fn handle_report(args: &ArgMatches) -> anyhow::Result<()> {
    let report_id = args
        .get_one::<String>("ID")
        .ok_or_else(|| anyhow!("A report id is required"))?;
    let db_path = expand_path(
        opt::<String>(args, "db")
            .as_deref()
            .unwrap_or(crate::commands::DEFAULT_DB_PATH),
    );

    if !Database::exists(&db_path) {
        bail!(
            "No database at {}; run 'pourscan init' or scan first",
            db_path.display()
        );
    }

    let db = Database::new(&db_path)?;
    let Some(report) = db.get_report(report_id)? else {
        bail!("No report with id '{}'", report_id);
    };

    println!("{}", render_report(&report, report_format(args))?);
    Ok(())
}

pub fn handle_history(args: &ArgMatches) -> anyhow::Result<()> {
    let db_path = expand_path(
        opt::<String>(args, "db")
            .as_deref()
            .unwrap_or(crate::commands::DEFAULT_DB_PATH),
    );

    if !Database::exists(&db_path) {
        println!("No reports stored yet.");
        return Ok(());
    }

    let db = Database::new(&db_path)?;
    let reports = db.list_reports()?;
    if reports.is_empty() {
        println!("No reports stored yet.");
        return Ok(());
    }

    print_divider();
    println!(
        "  {:<26} {:<20} {:>6} {:>7}  {}",
        "REPORT".bold(),
        "STARTED".bold(),
        "PAGES".bold(),
        "NODES".bold(),
        "BASE URL".bold()
    );
    print_divider();

    for listing in reports {
        let nodes = if listing.total_nodes > 0 {
            listing.total_nodes.to_string().red()
        } else {
            listing.total_nodes.to_string().green()
        };
        println!(
            "  {:<26} {:<20} {:>6} {:>7}  {}",
            listing.id.bright_white(),
            listing.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            listing.pages,
            nodes,
            listing.base_url
        );
    }
    println!();
    Ok(())
}

