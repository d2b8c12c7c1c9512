// plandiff-core/src/engine.rs
//! Dual execution of one statement and classification of the outcome.
//!
//! A statement is run once under each planner mode with diagnostics off. If
//! that plain pass fails for any reason other than a syntax error, the whole
//! comparison is repeated with diagnostics on, and the second pass decides the
//! classification. [`classify`] is a pure function of the two pass outcomes.

use serde::Serialize;

use crate::audit::DiffJob;
use crate::bundle::{DiagnosticBundle, ErrorType};
use crate::compare::{compare, plan_columns, Difference, Table};
use crate::error::{SessionError, SessionResult};
use crate::session::{ExplainLevel, PlannerMode, PlannerSession};

/// Both sides under this many ms is always noise.
pub const SLOW_FLOOR_MS: u64 = 300;
/// A regression must exceed both this absolute delta and [`SLOW_RATIO`].
pub const SLOW_DELTA_MS: i64 = 300;
pub const SLOW_RATIO: f64 = 1.5;

/// Rows captured from the top of each side when no difference location exists.
pub const SNAPSHOT_ROWS: usize = 1000;
/// Rows captured on each side of the first differing row.
pub const SNAPSHOT_HALF_WINDOW: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct DiffOptions {
    /// Attach row snapshots to row-count and row-content mismatches.
    pub collect_result_data: bool,
    /// Fetch profiles for statements classified as slow.
    pub slow_profile: bool,
    /// Fetch explain plans for statements classified as slow.
    pub slow_explain: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            collect_result_data: false,
            slow_profile: true,
            slow_explain: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timing {
    pub old_ms: u64,
    pub new_ms: u64,
}

impl Timing {
    pub fn ratio(&self) -> f64 {
        self.new_ms as f64 / self.old_ms as f64
    }

    pub fn delta_ms(&self) -> i64 {
        self.new_ms as i64 - self.old_ms as i64
    }

    fn describe(&self, label: &str) -> String {
        format!(
            "{}, new: {}ms, old: {}ms, ratio: {:.2}",
            label,
            self.new_ms,
            self.old_ms,
            self.ratio()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingVerdict {
    Ignore,
    Slow,
    Fast,
}

pub fn classify_timing(t: Timing) -> TimingVerdict {
    let both_fast = t.old_ms < SLOW_FLOOR_MS && t.new_ms < SLOW_FLOOR_MS;
    if both_fast || (t.delta_ms() < SLOW_DELTA_MS && t.ratio() < SLOW_RATIO) {
        TimingVerdict::Ignore
    } else if t.new_ms > t.old_ms {
        TimingVerdict::Slow
    } else {
        TimingVerdict::Fast
    }
}

/// The result sets of one pass, old planner first.
#[derive(Debug, Clone)]
pub struct ResultPair {
    pub old: Table,
    pub new: Table,
}

/// What one pass over a statement observed.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// Rows agree, or were not comparable because of an unordered LIMIT.
    Agreed(Timing),
    RowCountMismatch {
        old_rows: usize,
        new_rows: usize,
        results: ResultPair,
    },
    /// `results` holds the sorted tables `difference.row` refers to. The
    /// difference is absent when the column sets themselves differ.
    RowMismatch {
        difference: Option<Difference>,
        detail: String,
        results: ResultPair,
    },
    Syntax(String),
    Failed(String),
}

impl PassOutcome {
    pub fn describe(&self) -> String {
        match self {
            PassOutcome::Agreed(t) => t.describe("agreed"),
            PassOutcome::RowCountMismatch {
                old_rows, new_rows, ..
            } => format!("row count mismatch: old {} rows, new {} rows", old_rows, new_rows),
            PassOutcome::RowMismatch { detail, .. } => format!("row mismatch: {}", detail),
            PassOutcome::Syntax(msg) | PassOutcome::Failed(msg) => msg.clone(),
        }
    }

    fn from_error(err: SessionError) -> Self {
        if err.is_syntax() {
            PassOutcome::Syntax(err.to_string())
        } else {
            PassOutcome::Failed(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Timing(Timing),
    RowCount,
    RowDiff,
    Syntax,
    Other,
}

/// Syntax errors are deterministic; everything else that is not agreement
/// earns a diagnostic pass.
pub fn needs_retry(first: &PassOutcome) -> bool {
    !matches!(first, PassOutcome::Agreed(_) | PassOutcome::Syntax(_))
}

pub fn classify(first: &PassOutcome, second: Option<&PassOutcome>) -> Verdict {
    match (first, second) {
        (PassOutcome::Agreed(t), _) => Verdict::Timing(*t),
        (PassOutcome::Syntax(_), _) => Verdict::Syntax,
        (_, None) => Verdict::Other,
        (_, Some(PassOutcome::Agreed(t))) => Verdict::Timing(*t),
        (_, Some(PassOutcome::RowCountMismatch { .. })) => Verdict::RowCount,
        (_, Some(PassOutcome::RowMismatch { .. })) => Verdict::RowDiff,
        (_, Some(PassOutcome::Syntax(_))) => Verdict::Syntax,
        (_, Some(PassOutcome::Failed(_))) => Verdict::Other,
    }
}

/// Row-level comparison of one pass's results.
pub fn compare_results(statement: &str, results: ResultPair, timing: Timing) -> PassOutcome {
    let (old_rows, new_rows) = (results.old.row_count(), results.new.row_count());
    if old_rows != new_rows {
        return PassOutcome::RowCountMismatch {
            old_rows,
            new_rows,
            results,
        };
    }

    // LIMIT without ORDER BY may legally return different rows.
    let lower = statement.to_lowercase();
    if lower.contains("limit") && !lower.contains("order by") {
        return PassOutcome::Agreed(timing);
    }

    let expected = results.new.sorted();
    let actual = results.old.sorted();
    let mismatch = match plan_columns(&expected, &actual) {
        Err(columns) => Some((None, columns.to_string())),
        Ok(plan) => compare(&expected, &actual, &plan).map(|d| {
            let detail = d.to_string();
            (Some(d), detail)
        }),
    };

    match mismatch {
        None => PassOutcome::Agreed(timing),
        Some((difference, detail)) => PassOutcome::RowMismatch {
            difference,
            detail,
            results: ResultPair {
                old: actual,
                new: expected,
            },
        },
    }
}

/// Drives one session through the two-pass comparison.
pub struct DiffEngine<'s, S: PlannerSession> {
    session: &'s mut S,
    options: DiffOptions,
}

impl<'s, S: PlannerSession> DiffEngine<'s, S> {
    pub fn new(session: &'s mut S, options: DiffOptions) -> Self {
        Self { session, options }
    }

    pub fn session(&mut self) -> &mut S {
        &mut *self.session
    }

    pub fn validate(&mut self, job: &DiffJob) -> DiagnosticBundle {
        let mut bundle = DiagnosticBundle::new(&job.database, &job.statement);

        let first = self.run_pass(job, &mut bundle);
        let second = if needs_retry(&first) {
            tracing::debug!(db = %job.database, "plain pass failed, retrying with diagnostics");
            bundle.note_failure(ErrorType::Other, 1, &first.describe());
            Some(self.run_pass(job, &mut bundle))
        } else {
            None
        };

        let pass_no = if second.is_some() { 2 } else { 1 };
        let last = second.as_ref().unwrap_or(&first);
        match classify(&first, second.as_ref()) {
            Verdict::Timing(t) => self.log_time_cost(job, t, &mut bundle),
            Verdict::Syntax => bundle.note_failure(ErrorType::Syntax, pass_no, &last.describe()),
            Verdict::Other => bundle.note_failure(ErrorType::Other, pass_no, &last.describe()),
            Verdict::RowCount => {
                bundle.note_failure(ErrorType::RowCount, 2, &last.describe());
                if let PassOutcome::RowCountMismatch { results, .. } = last {
                    self.collect_data_head(results, &mut bundle);
                }
                self.collect_explain(job, &mut bundle);
                self.collect_profile(&mut bundle);
            }
            Verdict::RowDiff => {
                bundle.note_failure(ErrorType::RowDiff, 2, &last.describe());
                if let PassOutcome::RowMismatch {
                    difference, results, ..
                } = last
                {
                    match difference {
                        Some(d) => self.collect_data_window(results, d.row, &mut bundle),
                        None => self.collect_data_head(results, &mut bundle),
                    }
                }
                self.collect_explain(job, &mut bundle);
                self.collect_profile(&mut bundle);
            }
        }
        bundle
    }

    fn run_pass(&mut self, job: &DiffJob, bundle: &mut DiagnosticBundle) -> PassOutcome {
        match self.execute_both(job, bundle) {
            Ok((results, timing)) => compare_results(&job.statement, results, timing),
            Err(e) => PassOutcome::from_error(e),
        }
    }

    fn execute_both(
        &mut self,
        job: &DiffJob,
        bundle: &mut DiagnosticBundle,
    ) -> SessionResult<(ResultPair, Timing)> {
        if !job.database.trim().is_empty() {
            self.session.use_database(&job.database)?;
        }

        self.session.set_mode(PlannerMode::Old)?;
        let (old, old_ms) = self.session.query(&job.statement)?;
        bundle.old_query_id = self.session.last_query_id()?;

        self.session.set_mode(PlannerMode::New)?;
        let (new, new_ms) = self.session.query(&job.statement)?;
        bundle.new_query_id = self.session.last_query_id()?;

        Ok((ResultPair { old, new }, Timing { old_ms, new_ms }))
    }

    fn log_time_cost(&mut self, job: &DiffJob, t: Timing, bundle: &mut DiagnosticBundle) {
        match classify_timing(t) {
            TimingVerdict::Ignore => {
                bundle.kind = ErrorType::Success;
                bundle.message = t.describe("ignore");
            }
            TimingVerdict::Fast => {
                bundle.kind = ErrorType::Success;
                bundle.message = t.describe("fast");
            }
            TimingVerdict::Slow => {
                bundle.kind = ErrorType::Slow;
                if self.options.slow_profile {
                    self.collect_profile(bundle);
                }
                if self.options.slow_explain {
                    self.collect_explain(job, bundle);
                }
                bundle.message = t.describe("slow");
            }
        }
    }

    fn collect_data_head(&self, results: &ResultPair, bundle: &mut DiagnosticBundle) {
        if !self.options.collect_result_data {
            return;
        }
        bundle.old_data = results.old.format_rows(0, SNAPSHOT_ROWS);
        bundle.new_data = results.new.format_rows(0, SNAPSHOT_ROWS);
    }

    fn collect_data_window(&self, results: &ResultPair, row: usize, bundle: &mut DiagnosticBundle) {
        if !self.options.collect_result_data {
            return;
        }
        let start = row.saturating_sub(SNAPSHOT_HALF_WINDOW);
        let end = row.saturating_add(SNAPSHOT_HALF_WINDOW);
        bundle.old_data = results.old.format_rows(start, end);
        bundle.new_data = results.new.format_rows(start, end);
    }

    fn collect_explain(&mut self, job: &DiffJob, bundle: &mut DiagnosticBundle) {
        bundle.new_explain = self
            .explain_in(PlannerMode::New, &job.statement, ExplainLevel::Costs)
            .unwrap_or_else(|e| substitute("new explain", e));
        bundle.old_explain = self
            .explain_in(PlannerMode::Old, &job.statement, ExplainLevel::Verbose)
            .unwrap_or_else(|e| substitute("old explain", e));
    }

    fn collect_profile(&mut self, bundle: &mut DiagnosticBundle) {
        let old_id = bundle.old_query_id.clone();
        let new_id = bundle.new_query_id.clone();
        bundle.old_profile = self
            .profile_in(PlannerMode::Old, &old_id)
            .unwrap_or_else(|e| substitute("old profile", e));
        bundle.new_profile = self
            .profile_in(PlannerMode::New, &new_id)
            .unwrap_or_else(|e| substitute("new profile", e));
    }

    fn explain_in(&mut self, mode: PlannerMode, sql: &str, level: ExplainLevel) -> SessionResult<String> {
        self.session.set_mode(mode)?;
        self.session.explain(sql, level)
    }

    fn profile_in(&mut self, mode: PlannerMode, query_id: &str) -> SessionResult<String> {
        self.session.set_mode(mode)?;
        self.session.profile(query_id)
    }
}

fn substitute(slot: &str, err: SessionError) -> String {
    tracing::debug!(slot, error = %err, "diagnostic collection failed");
    format!("{} failed: {}\n", slot, err)
}
