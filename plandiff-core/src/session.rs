// plandiff-core/src/session.rs

use std::fmt;

use crate::compare::Table;
use crate::error::SessionResult;

/// Which optimizer generates plans for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerMode {
    Old,
    New,
}

impl fmt::Display for PlannerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerMode::Old => write!(f, "old"),
            PlannerMode::New => write!(f, "new"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainLevel {
    Costs,
    Verbose,
}

impl ExplainLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainLevel::Costs => "costs",
            ExplainLevel::Verbose => "verbose",
        }
    }
}

/// One connection to the engine under test.
///
/// The planner mode is session state: `set_mode` must have returned before the
/// next statement is issued, so a session is only ever driven by one engine at
/// a time (`&mut self` everywhere).
pub trait PlannerSession {
    fn set_mode(&mut self, mode: PlannerMode) -> SessionResult<()>;

    fn use_database(&mut self, name: &str) -> SessionResult<()>;

    /// Run `sql` and return its result set with the wall-clock time in ms.
    fn query(&mut self, sql: &str) -> SessionResult<(Table, u64)>;

    /// Identifier of the most recent query, used to fetch its profile.
    fn last_query_id(&mut self) -> SessionResult<String>;

    fn explain(&mut self, sql: &str, level: ExplainLevel) -> SessionResult<String>;

    fn profile(&mut self, query_id: &str) -> SessionResult<String>;
}
