use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plandiff_core::config::DEFAULT_CONFIG_FILE;
use plandiff_core::digest::{compare_reports, read_report, write_comparison};
use plandiff_core::{AuditRecord, AuditRecords, DiffRunner, DigestAggregator, PlanDiffConfig};
use plandiff_mysql::MysqlSession;

#[derive(Parser)]
#[command(
    name = "plandiff",
    about = "Replay audited queries under the old and new planner and report divergences"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Replay an audit log against both planners and write diagnostic bundles
    Diff {
        log: PathBuf,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Aggregate per-digest timings of an audit log into a benchmark report
    Bench { log: PathBuf },
    /// Compare two benchmark reports digest by digest
    Cmp {
        #[arg(long)]
        before: PathBuf,
        #[arg(long)]
        after: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Diff { log, config } => diff(&log, &config),
        Cmd::Bench { log } => bench(&log),
        Cmd::Cmp { before, after } => cmp(&before, &after),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_log(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("open audit log {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn diff(log: &Path, config: &Path) -> Result<()> {
    let cfg = PlanDiffConfig::load(config)?;
    let mut session = MysqlSession::connect(&cfg.connection)?;
    let runner = DiffRunner::new(cfg);
    let summary = runner.run(open_log(log)?, &mut session)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn bench(log: &Path) -> Result<()> {
    let mut agg = DigestAggregator::new();
    for raw in AuditRecords::from_reader(open_log(log)?) {
        let raw = raw.context("reading audit log")?;
        if let Some(record) = AuditRecord::parse(&raw.text) {
            agg.observe(&record);
        }
    }
    tracing::info!(digests = agg.len(), "aggregated");
    agg.write_report(io::stdout().lock())?;
    Ok(())
}

fn cmp(before: &Path, after: &Path) -> Result<()> {
    let before = read_report(BufReader::new(
        File::open(before).with_context(|| format!("open report {}", before.display()))?,
    ))?;
    let after = read_report(BufReader::new(
        File::open(after).with_context(|| format!("open report {}", after.display()))?,
    ))?;
    let rows = compare_reports(&before, &after);
    write_comparison(&rows, io::stdout().lock())?;
    Ok(())
}
