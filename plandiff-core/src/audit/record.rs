// plandiff-core/src/audit/record.rs

use serde::Serialize;

/// Field delimiter inside an assembled record.
const DELIMITER: char = '|';
/// Fields 0..=13 are positional, the statement starts at 13 and the digest is last.
const MIN_FIELDS: usize = 15;

const DB_FIELD: usize = 3;
const STATE_FIELD: usize = 4;
const TIME_FIELD: usize = 5;
const IS_QUERY_FIELD: usize = 11;
const STMT_FIELD: usize = 13;

const STMT_KEY: &str = "Stmt=";
const DIGEST_KEY: &str = "Digest=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryState {
    Ok,
    Err,
}

/// One statement execution as recorded by the engine's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// `yyyy-MM-dd HH:mm:ss`, the text before the first comma.
    pub timestamp: String,
    pub database: String,
    pub is_query: bool,
    pub state: QueryState,
    pub elapsed_ms: u64,
    pub statement: String,
    /// May be empty when the engine logged `Digest=` without a value.
    pub digest: String,
}

impl AuditRecord {
    /// Extract fields from an assembled record. Short or malformed records are
    /// audit-log noise and yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let fields: Vec<&str> = text.split(DELIMITER).collect();
        if fields.len() < MIN_FIELDS {
            return None;
        }

        let (last, middle) = fields.split_last()?;
        let digest = last.trim().strip_prefix(DIGEST_KEY)?.trim().to_string();

        // A statement containing the delimiter spans several fields.
        let statement = middle[STMT_FIELD..].join("|");
        let statement = statement.trim_start().strip_prefix(STMT_KEY)?.trim().to_string();

        let timestamp = match text.find(',') {
            Some(idx) => text[..idx].trim().to_string(),
            None => return None,
        };

        let elapsed_ms = value_of(fields[TIME_FIELD])?.parse::<u64>().ok()?;
        let is_query = value_of(fields[IS_QUERY_FIELD])
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let state = if fields[STATE_FIELD].trim() == "State=ERR" {
            QueryState::Err
        } else {
            QueryState::Ok
        };

        Some(Self {
            timestamp,
            database: parse_database(fields[DB_FIELD]),
            is_query,
            state,
            elapsed_ms,
            statement,
            digest,
        })
    }

    pub fn is_error(&self) -> bool {
        self.state == QueryState::Err
    }
}

fn value_of(field: &str) -> Option<&str> {
    field.split_once('=').map(|(_, v)| v.trim())
}

/// `Db=cluster:name` -> `name`; a value without a cluster prefix is kept as is.
fn parse_database(field: &str) -> String {
    match value_of(field) {
        Some(v) => v.split_once(':').map(|(_, db)| db).unwrap_or(v).trim().to_string(),
        None => String::new(),
    }
}
