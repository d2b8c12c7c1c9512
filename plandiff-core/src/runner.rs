// plandiff-core/src/runner.rs

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditRecords, RawRecord};
use crate::bundle::{BundleWriter, DiagnosticBundle, ErrorType};
use crate::config::PlanDiffConfig;
use crate::engine::DiffEngine;
use crate::replay::{ReplayLog, SummaryLog};
use crate::session::PlannerSession;

pub const STATISTICS_QUERY: &str = "select * from _statistics_.table_statistic_v1";
pub const STATISTICS_FILE: &str = "stats.csv";

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    /// Framed audit records read, eligible or not.
    pub records: u64,
    pub tested: u64,
    pub failed: u64,
    pub by_kind: BTreeMap<ErrorType, u64>,
}

/// Replays an audit log through a [`DiffEngine`] and persists every outcome.
pub struct DiffRunner {
    config: PlanDiffConfig,
    run_id: String,
}

impl DiffRunner {
    pub fn new(config: PlanDiffConfig) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Create the output directory, emptying it first when configured to.
    pub fn prepare_output(&self) -> Result<()> {
        let dir = &self.config.output.dir;
        if dir.exists() && self.config.output.clean_on_start {
            for entry in fs::read_dir(dir).with_context(|| format!("read_dir({:?})", dir))? {
                let path = entry?.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path).with_context(|| format!("remove_dir_all({:?})", path))?;
                } else {
                    fs::remove_file(&path).with_context(|| format!("remove_file({:?})", path))?;
                }
            }
        }
        fs::create_dir_all(dir).with_context(|| format!("create_dir_all({:?})", dir))?;
        Ok(())
    }

    pub fn run<R: BufRead, S: PlannerSession>(&self, reader: R, session: &mut S) -> Result<RunSummary> {
        self.prepare_output()?;
        let out_dir = &self.config.output.dir;
        let writer = BundleWriter::init(out_dir)?;
        let mut replay = ReplayLog::create(&self.config.replay_log_path())?;
        let mut summary_log = SummaryLog::create(&self.config.summary_log_path(), &self.run_id)?;

        if self.config.collect.statistics {
            if let Err(e) = export_statistics(session, &out_dir.join(STATISTICS_FILE)) {
                tracing::warn!(error = %e, "statistics export failed");
            }
        }

        let filter = self.config.eligibility();
        let every = self.config.progress.every.max(1);
        let mut engine = DiffEngine::new(session, self.config.diff_options());
        let mut summary = RunSummary {
            run_id: self.run_id.clone(),
            ..RunSummary::default()
        };

        tracing::info!(run_id = %self.run_id, "read file start");
        for raw in AuditRecords::from_reader(reader) {
            let raw = raw.context("reading audit log")?;
            summary.records += 1;

            let Some(record) = AuditRecord::parse(&raw.text) else {
                continue;
            };
            let Some(job) = filter.to_job(&record) else {
                continue;
            };

            let mut bundle = engine.validate(&job);
            bundle.line = raw.line;
            summary.tested += 1;
            *summary.by_kind.entry(bundle.kind).or_default() += 1;

            let persisted = persist(&writer, &mut summary_log, &mut replay, &bundle, &raw);
            if let Err(e) = &persisted {
                tracing::warn!(line = raw.line, error = %e, "diff audit exception");
            }
            if !bundle.is_success() || persisted.is_err() {
                summary.failed += 1;
            }

            if summary.tested % every == 0 {
                tracing::info!("test sql {}, error {}.", summary.tested, summary.failed);
            }
        }
        tracing::info!(tested = summary.tested, failed = summary.failed, "read file end");
        Ok(summary)
    }
}

fn persist(
    writer: &BundleWriter,
    summary_log: &mut SummaryLog,
    replay: &mut ReplayLog,
    bundle: &DiagnosticBundle,
    raw: &RawRecord,
) -> Result<()> {
    let id = writer.write(bundle)?;
    summary_log.record(bundle, id)?;
    if !bundle.is_success() {
        replay.append(&raw.text)?;
    }
    Ok(())
}

/// Dump the engine's column statistics table as headerless TSV.
pub fn export_statistics<S: PlannerSession>(session: &mut S, path: &Path) -> Result<()> {
    let (table, _) = session
        .query(STATISTICS_QUERY)
        .context("querying column statistics")?;
    let file = fs::File::create(path).with_context(|| format!("create {:?}", path))?;
    table
        .write_tsv(BufWriter::new(file))
        .with_context(|| format!("write {:?}", path))?;
    tracing::info!(rows = table.row_count(), path = %path.display(), "statistics exported");
    Ok(())
}
