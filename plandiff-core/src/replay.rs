// plandiff-core/src/replay.rs
//! Append-only run logs: raw audit text of failed statements, and a JSONL
//! line per bundle.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::bundle::{DiagnosticBundle, ErrorType};

/// Raw audit records of failed statements, one per line, for reproducing them
/// outside the tool.
pub struct ReplayLog {
    file: File,
}

impl ReplayLog {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            file: open_append(path)?,
        })
    }

    pub fn append(&mut self, raw: &str) -> Result<()> {
        writeln!(self.file, "{}", raw).context("append replay log")?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    ts: String,
    run_id: &'a str,
    id: Option<u64>,
    line: usize,
    kind: ErrorType,
    db: &'a str,
    message: &'a str,
}

/// JSONL record of every bundle's classification.
pub struct SummaryLog {
    file: File,
    run_id: String,
}

impl SummaryLog {
    pub fn create(path: &Path, run_id: &str) -> Result<Self> {
        Ok(Self {
            file: open_append(path)?,
            run_id: run_id.to_string(),
        })
    }

    pub fn record(&mut self, bundle: &DiagnosticBundle, id: Option<u64>) -> Result<()> {
        let line = SummaryLine {
            ts: Utc::now().to_rfc3339(),
            run_id: &self.run_id,
            id,
            line: bundle.line,
            kind: bundle.kind,
            db: &bundle.database,
            message: &bundle.message,
        };
        let json = serde_json::to_string(&line)?;
        writeln!(self.file, "{}", json).context("append summary log")?;
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all({:?})", parent))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {:?}", path))
}
