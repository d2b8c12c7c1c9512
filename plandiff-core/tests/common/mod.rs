#![allow(dead_code)]

use std::collections::VecDeque;

use plandiff_core::compare::Column;
use plandiff_core::error::{SessionError, SessionResult};
use plandiff_core::{DataType, ExplainLevel, PlannerMode, PlannerSession, Table, Value};

/// One audit-log record in the engine's pipe-delimited layout.
pub fn audit_line(ts: &str, db: &str, state: &str, time_ms: u64, is_query: bool, stmt: &str, digest: &str) -> String {
    format!(
        "{ts},123 [query] |Client=10.0.0.1:50001|User=root|Db=default_cluster:{db}|State={state}|Time={time_ms}|ScanBytes=0|ScanRows=0|ReturnRows=1|StmtId=7|QueryId=q-1|IsQuery={is_query}|feIp=10.0.0.2|Stmt={stmt}|Digest={digest}"
    )
}

pub fn int_table(name: &str, values: &[i64]) -> Table {
    Table::new(
        vec![Column::new(name, DataType::Integer)],
        values.iter().map(|v| vec![Value::Int(*v)]).collect(),
    )
}

pub enum Scripted {
    Rows(Table, u64),
    Syntax(&'static str),
    Transport(&'static str),
}

/// Scripted in-memory session. Queries pop responses in order; every call is
/// recorded so tests can assert on ordering.
pub struct FakeSession {
    pub mode: Option<PlannerMode>,
    pub calls: Vec<String>,
    script: VecDeque<Scripted>,
    pub explain_error: Option<&'static str>,
    pub profile_error: Option<&'static str>,
    query_seq: u32,
}

impl FakeSession {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            mode: None,
            calls: Vec::new(),
            script: script.into(),
            explain_error: None,
            profile_error: None,
            query_seq: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn mode_name(&self) -> String {
        self.mode.map(|m| m.to_string()).unwrap_or_else(|| "unset".to_string())
    }
}

impl PlannerSession for FakeSession {
    fn set_mode(&mut self, mode: PlannerMode) -> SessionResult<()> {
        self.mode = Some(mode);
        self.calls.push(format!("mode {}", mode));
        Ok(())
    }

    fn use_database(&mut self, name: &str) -> SessionResult<()> {
        self.calls.push(format!("use {}", name));
        Ok(())
    }

    fn query(&mut self, sql: &str) -> SessionResult<(Table, u64)> {
        self.calls.push(format!("query {} {}", self.mode_name(), sql));
        match self.script.pop_front() {
            Some(Scripted::Rows(t, ms)) => {
                self.query_seq += 1;
                Ok((t, ms))
            }
            Some(Scripted::Syntax(msg)) => Err(SessionError::Syntax(msg.to_string())),
            Some(Scripted::Transport(msg)) => Err(SessionError::Transport(msg.to_string())),
            None => Err(SessionError::Query("script exhausted".to_string())),
        }
    }

    fn last_query_id(&mut self) -> SessionResult<String> {
        Ok(format!("{}-{}", self.mode_name(), self.query_seq))
    }

    fn explain(&mut self, _sql: &str, level: ExplainLevel) -> SessionResult<String> {
        self.calls.push(format!("explain {} {}", self.mode_name(), level.as_str()));
        match self.explain_error {
            Some(msg) => Err(SessionError::Transport(msg.to_string())),
            None => Ok(format!("{} plan ({})\n", self.mode_name(), level.as_str())),
        }
    }

    fn profile(&mut self, query_id: &str) -> SessionResult<String> {
        self.calls.push(format!("profile {}", query_id));
        match self.profile_error {
            Some(msg) => Err(SessionError::Transport(msg.to_string())),
            None => Ok(format!("  Summary:\n    - Query ID: {}\n", query_id)),
        }
    }
}
