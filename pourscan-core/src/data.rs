use crate::error::Result;
use crate::report::ScanReport;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;

/// Persistence seam for finished reports.
pub trait ReportStore {
    /// Persist the report and return the identity it was stored under.
    fn create(&self, report: &ScanReport) -> Result<String>;
}

/// One row of `Database::list_reports`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportListing {
    pub id: String,
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: usize,
    pub total_nodes: usize,
    pub total_rules: usize,
}

/// Per-page row kept next to the report document for quick queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub url: String,
    pub scanned_at: DateTime<Utc>,
    pub violations: usize,
    pub nodes: usize,
    pub error: Option<String>,
}

pub struct Database {
    conn: Connection,
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

impl Database {
    pub fn drop(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scan_reports (
                id TEXT PRIMARY KEY,
                base_url TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                pages INTEGER NOT NULL,
                total_nodes INTEGER NOT NULL,
                total_rules INTEGER NOT NULL,
                document TEXT NOT NULL  -- full report JSON
            );

            CREATE TABLE IF NOT EXISTS page_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_id TEXT NOT NULL,
                url TEXT NOT NULL,
                scanned_at INTEGER NOT NULL,
                violations INTEGER NOT NULL,
                nodes INTEGER NOT NULL,
                error TEXT,
                FOREIGN KEY (report_id) REFERENCES scan_reports(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_scan_reports_started ON scan_reports(started_at);
            CREATE INDEX IF NOT EXISTS idx_page_results_report ON page_results(report_id);
            ",
        )?;
        Ok(())
    }

    pub fn insert_report(&self, report: &ScanReport) -> Result<String> {
        let document = serde_json::to_string(report)?;
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO scan_reports (
                id, base_url, started_at, finished_at, pages, total_nodes, total_rules, document
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &report.report_id,
                &report.base_url,
                report.started_at.timestamp_millis(),
                report.finished_at.timestamp_millis(),
                report.summary.pages as i64,
                report.summary.total_nodes as i64,
                report.summary.total_rules as i64,
                &document,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO page_results (report_id, url, scanned_at, violations, nodes, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for page in &report.pages {
                stmt.execute(params![
                    &report.report_id,
                    &page.url,
                    page.scanned_at.timestamp_millis(),
                    page.violations.len() as i64,
                    page.node_count() as i64,
                    &page.error,
                ])?;
            }
        }

        tx.commit()?;
        Ok(report.report_id.clone())
    }

    pub fn get_report(&self, report_id: &str) -> Result<Option<ScanReport>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM scan_reports WHERE id = ?1",
                params![report_id],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    /// Stored reports, newest first.
    pub fn list_reports(&self) -> Result<Vec<ReportListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, base_url, started_at, finished_at, pages, total_nodes, total_rules
             FROM scan_reports
             ORDER BY started_at DESC, rowid DESC",
        )?;

        let reports = stmt
            .query_map([], |row| {
                Ok(ReportListing {
                    id: row.get(0)?,
                    base_url: row.get(1)?,
                    started_at: from_millis(row.get(2)?),
                    finished_at: from_millis(row.get(3)?),
                    pages: row.get::<_, i64>(4)? as usize,
                    total_nodes: row.get::<_, i64>(5)? as usize,
                    total_rules: row.get::<_, i64>(6)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(reports)
    }

    pub fn get_page_rows(&self, report_id: &str) -> Result<Vec<PageRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, scanned_at, violations, nodes, error
             FROM page_results WHERE report_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![report_id], |row| {
                Ok(PageRow {
                    url: row.get(0)?,
                    scanned_at: from_millis(row.get(1)?),
                    violations: row.get::<_, i64>(2)? as usize,
                    nodes: row.get::<_, i64>(3)? as usize,
                    error: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

impl ReportStore for Database {
    fn create(&self, report: &ScanReport) -> Result<String> {
        self.insert_report(report)
    }
}
