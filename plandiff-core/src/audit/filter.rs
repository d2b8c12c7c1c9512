// plandiff-core/src/audit/filter.rs

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use super::record::AuditRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A statement selected for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffJob {
    pub database: String,
    pub statement: String,
}

/// Decides which audited statements are replayable.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    /// Records logged before this hour of day (server local time) are dropped.
    pub min_hour: u32,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self { min_hour: 8 }
    }
}

impl EligibilityFilter {
    pub fn new(min_hour: u32) -> Self {
        Self { min_hour }
    }

    pub fn to_job(&self, record: &AuditRecord) -> Option<DiffJob> {
        if !is_replayable(record) {
            return None;
        }
        if !self.within_window(&record.timestamp) {
            return None;
        }
        split_use_prefix(&record.database, &record.statement)
    }

    fn within_window(&self, timestamp: &str) -> bool {
        match NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT) {
            Ok(ts) => ts.hour() >= self.min_hour,
            Err(e) => {
                tracing::debug!(timestamp, error = %e, "unparseable audit timestamp, dropping record");
                false
            }
        }
    }
}

/// Statement-level eligibility: a successful query that reads from a relation
/// and does not depend on session variables.
pub fn is_replayable(record: &AuditRecord) -> bool {
    let lower = record.statement.trim().to_lowercase();
    record.is_query
        && !lower.contains("@@")
        && !lower.starts_with("explain")
        && lower.contains("from")
        && !record.is_error()
}

/// A leading `use <db>;` overrides the record's database and is stripped from
/// the statement.
pub fn split_use_prefix(database: &str, statement: &str) -> Option<DiffJob> {
    let trimmed = statement.trim();
    if !trimmed.to_lowercase().starts_with("use ") {
        return Some(DiffJob {
            database: database.to_string(),
            statement: trimmed.to_string(),
        });
    }

    let (use_clause, rest) = trimmed.split_once(';')?;
    let db = use_clause.split_whitespace().last()?.trim_matches('`');
    Some(DiffJob {
        database: db.to_string(),
        statement: rest.trim().to_string(),
    })
}
