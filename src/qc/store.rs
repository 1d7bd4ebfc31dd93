//! SQLite-backed recommendation log source.
//!
//! The store only reads. Logs live in `recommendation_log`, one row per run
//! with the returned recommendations as a JSON snapshot; feedback lives in
//! `qc_feedback` keyed by log id.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};
use tracing::{debug, warn};

use crate::error::Result;

use super::source::QcLogSource;
use super::types::{
    FeedbackRecord, FeedbackStatus, LogPage, LogSnapshot, QcFilters, RecommendationLogEntry,
};

/// Table layout the store reads from.
pub const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS recommendation_log (
        id TEXT PRIMARY KEY,
        family_id TEXT,
        family_name TEXT NOT NULL DEFAULT '',
        source_mpn TEXT NOT NULL,
        recommendation_count INTEGER NOT NULL DEFAULT 0,
        snapshot TEXT NOT NULL DEFAULT '{}',
        data_source TEXT NOT NULL DEFAULT '',
        request_source TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_recommendation_log_created ON recommendation_log(created_at);

    CREATE TABLE IF NOT EXISTS qc_feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        log_id TEXT NOT NULL,
        status TEXT NOT NULL,
        user_comment TEXT,
        created_at TEXT NOT NULL DEFAULT ''
    );
    CREATE INDEX IF NOT EXISTS idx_qc_feedback_log ON qc_feedback(log_id);";

const LOG_COLUMNS: &str = "id, family_id, family_name, source_mpn, recommendation_count, \
     snapshot, data_source, request_source, created_at";

/// Read-only view over a recommendation log database.
pub struct SqliteLogStore {
    conn: Connection,
}

impl SqliteLogStore {
    /// Open an existing database read-only.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("Opened log store {}", db_path.display());
        Ok(Self { conn })
    }

    /// Wrap an already-open connection (e.g. an in-memory database).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn decode_log(row: &Row<'_>) -> rusqlite::Result<RawLog> {
        Ok(RawLog {
            id: row.get(0)?,
            family_id: row.get(1)?,
            family_name: row.get(2)?,
            source_mpn: row.get(3)?,
            recommendation_count: row.get(4)?,
            snapshot: row.get(5)?,
            data_source: row.get(6)?,
            request_source: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// Row as stored, before JSON and timestamp decoding.
struct RawLog {
    id: String,
    family_id: Option<String>,
    family_name: String,
    source_mpn: String,
    recommendation_count: i64,
    snapshot: String,
    data_source: String,
    request_source: String,
    created_at: String,
}

impl RawLog {
    /// Rows with an unreadable timestamp are dropped; a corrupt snapshot
    /// becomes an empty one.
    fn into_entry(self) -> Option<RecommendationLogEntry> {
        let created_at = match parse_timestamp(&self.created_at) {
            Some(ts) => ts,
            None => {
                warn!("Skipping log {}: invalid created_at '{}'", self.id, self.created_at);
                return None;
            }
        };
        let snapshot = serde_json::from_str::<LogSnapshot>(&self.snapshot).unwrap_or_else(|e| {
            warn!("Log {} has an unreadable snapshot: {}", self.id, e);
            LogSnapshot::default()
        });
        Some(RecommendationLogEntry {
            id: self.id,
            family_id: self.family_id.filter(|f| !f.is_empty()),
            family_name: self.family_name,
            source_mpn: self.source_mpn,
            recommendation_count: self.recommendation_count.max(0) as usize,
            snapshot,
            data_source: self.data_source,
            request_source: self.request_source,
            created_at,
        })
    }
}

/// RFC 3339, or SQLite's own `YYYY-MM-DD HH:MM:SS[.fff]` (taken as UTC).
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Escape LIKE wildcards so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// WHERE clause and bound parameters for the log query.
fn build_log_query(filters: &QcFilters, limit: usize) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(from) = filters.date_from {
        params.push(format_timestamp(from));
        clauses.push(format!("julianday(created_at) >= julianday(?{})", params.len()));
    }
    if let Some(to) = filters.date_to {
        params.push(format_timestamp(to));
        clauses.push(format!("julianday(created_at) <= julianday(?{})", params.len()));
    }
    if let Some(family) = filters.family_id.as_deref().filter(|f| !f.is_empty()) {
        params.push(family.to_string());
        clauses.push(format!("family_id = ?{}", params.len()));
    }
    if let Some(source) = filters.request_source.as_deref().filter(|s| !s.is_empty()) {
        params.push(source.to_string());
        clauses.push(format!("request_source = ?{}", params.len()));
    }
    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        params.push(format!("%{}%", escape_like(&search.to_lowercase())));
        let n = params.len();
        clauses.push(format!(
            "(LOWER(source_mpn) LIKE ?{n} ESCAPE '\\' OR LOWER(family_name) LIKE ?{n} ESCAPE '\\')"
        ));
    }
    if filters.has_feedback {
        clauses.push(
            "EXISTS (SELECT 1 FROM qc_feedback f WHERE f.log_id = recommendation_log.id)".to_string(),
        );
    }

    let mut sql = format!("SELECT {} FROM recommendation_log", LOG_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(
        " ORDER BY julianday(created_at) DESC, id ASC LIMIT {}",
        limit
    ));
    (sql, params)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl QcLogSource for SqliteLogStore {
    fn fetch_logs(&self, filters: &QcFilters, limit: usize) -> Result<LogPage> {
        let (sql, params) = build_log_query(filters, limit);
        debug!("Log query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), Self::decode_log)?;

        let mut page = LogPage::default();
        for row in rows {
            page.rows_read += 1;
            if let Some(entry) = row?.into_entry() {
                page.entries.push(entry);
            }
        }
        Ok(page)
    }

    fn fetch_feedback(&self, log_ids: &[String]) -> Result<Vec<FeedbackRecord>> {
        if log_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=log_ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT log_id, status, user_comment FROM qc_feedback WHERE log_id IN ({}) ORDER BY id",
            placeholders
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(log_ids.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (log_id, status, user_comment) = row?;
            match FeedbackStatus::parse(&status) {
                Some(status) => records.push(FeedbackRecord {
                    log_id,
                    status,
                    user_comment,
                }),
                None => warn!("Ignoring feedback on {} with unknown status '{}'", log_id, status),
            }
        }
        Ok(records)
    }
}
