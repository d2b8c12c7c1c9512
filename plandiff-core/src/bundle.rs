// plandiff-core/src/bundle.rs
//! Per-statement outcome record and its severity-tiered persistence.
//!
//! Layout under the output root:
//! - `<kind>/<id>_sql` for every non-success bundle
//! - `<kind>/<id>_{new,old}_plain` and `_profile` unless the bundle is a syntax error
//! - `<kind>/<id>_{new,old}_data` for row-count and row-content mismatches only

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

/// Outcome classes, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Success,
    Slow,
    RowCount,
    RowDiff,
    Syntax,
    Other,
}

impl ErrorType {
    pub const ALL: [ErrorType; 6] = [
        ErrorType::Success,
        ErrorType::Slow,
        ErrorType::RowCount,
        ErrorType::RowDiff,
        ErrorType::Syntax,
        ErrorType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Success => "success",
            ErrorType::Slow => "slow",
            ErrorType::RowCount => "row_count",
            ErrorType::RowDiff => "row_diff",
            ErrorType::Syntax => "syntax",
            ErrorType::Other => "other",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything collected while diffing one statement.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticBundle {
    /// Audit-log line number of the statement, for the human-readable message.
    pub line: usize,
    pub database: String,
    pub statement: String,
    pub kind: ErrorType,
    pub message: String,
    pub old_query_id: String,
    pub new_query_id: String,
    #[serde(skip)]
    pub old_explain: String,
    #[serde(skip)]
    pub new_explain: String,
    #[serde(skip)]
    pub old_profile: String,
    #[serde(skip)]
    pub new_profile: String,
    #[serde(skip)]
    pub old_data: String,
    #[serde(skip)]
    pub new_data: String,
}

impl DiagnosticBundle {
    pub fn new(database: &str, statement: &str) -> Self {
        Self {
            line: 0,
            database: database.to_string(),
            statement: statement.to_string(),
            kind: ErrorType::Success,
            message: String::new(),
            old_query_id: String::new(),
            new_query_id: String::new(),
            old_explain: String::new(),
            new_explain: String::new(),
            old_profile: String::new(),
            new_profile: String::new(),
            old_data: String::new(),
            new_data: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == ErrorType::Success
    }

    /// Classify and append a numbered failure note to the message.
    pub fn note_failure(&mut self, kind: ErrorType, pass: u8, detail: &str) {
        self.kind = kind;
        self.message = format!("{}\nNo.{} ERROR:\n{}", self.message, pass, detail)
            .trim()
            .to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Statement,
    NewExplain,
    OldExplain,
    NewProfile,
    OldProfile,
    NewData,
    OldData,
}

impl ArtifactKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Statement => "sql",
            ArtifactKind::NewExplain => "new_plain",
            ArtifactKind::OldExplain => "old_plain",
            ArtifactKind::NewProfile => "new_profile",
            ArtifactKind::OldProfile => "old_profile",
            ArtifactKind::NewData => "new_data",
            ArtifactKind::OldData => "old_data",
        }
    }
}

/// A file the policy decided to write, before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArtifact {
    pub kind: ArtifactKind,
    pub contents: String,
}

struct PolicyTier {
    /// Evaluation stops at the first tier whose gate rejects the bundle kind.
    gate: fn(ErrorType) -> bool,
    produce: fn(&DiagnosticBundle) -> Vec<PlannedArtifact>,
}

const WRITE_POLICY: &[PolicyTier] = &[
    PolicyTier {
        gate: is_failure,
        produce: statement_artifacts,
    },
    PolicyTier {
        gate: has_plans,
        produce: plan_artifacts,
    },
    PolicyTier {
        gate: has_data,
        produce: data_artifacts,
    },
];

fn is_failure(kind: ErrorType) -> bool {
    kind != ErrorType::Success
}

// Syntax errors never reached the planner.
fn has_plans(kind: ErrorType) -> bool {
    kind != ErrorType::Syntax
}

fn has_data(kind: ErrorType) -> bool {
    matches!(kind, ErrorType::RowCount | ErrorType::RowDiff)
}

/// Artifacts to persist for `bundle`, blank contents already dropped.
pub fn planned_artifacts(bundle: &DiagnosticBundle) -> Vec<PlannedArtifact> {
    let mut out = Vec::new();
    for tier in WRITE_POLICY {
        if !(tier.gate)(bundle.kind) {
            break;
        }
        out.extend(
            (tier.produce)(bundle)
                .into_iter()
                .filter(|a| !a.contents.trim().is_empty()),
        );
    }
    out
}

fn statement_artifacts(b: &DiagnosticBundle) -> Vec<PlannedArtifact> {
    let contents = format!(
        "use {};\n{}\nLine: {}, ERROR: {}\n",
        b.database, b.statement, b.line, b.message
    );
    vec![PlannedArtifact {
        kind: ArtifactKind::Statement,
        contents,
    }]
}

fn plan_artifacts(b: &DiagnosticBundle) -> Vec<PlannedArtifact> {
    vec![
        artifact(ArtifactKind::NewExplain, &b.new_explain),
        artifact(ArtifactKind::OldExplain, &b.old_explain),
        artifact(ArtifactKind::NewProfile, &b.new_profile),
        artifact(ArtifactKind::OldProfile, &b.old_profile),
    ]
}

fn data_artifacts(b: &DiagnosticBundle) -> Vec<PlannedArtifact> {
    vec![
        artifact(ArtifactKind::NewData, &b.new_data),
        artifact(ArtifactKind::OldData, &b.old_data),
    ]
}

fn artifact(kind: ArtifactKind, contents: &str) -> PlannedArtifact {
    PlannedArtifact {
        kind,
        contents: contents.to_string(),
    }
}

/// Writes bundles into the per-kind directory tree.
///
/// Every written bundle takes the next value of a shared counter; clones share
/// it, so ids stay unique if writers run on several threads.
#[derive(Debug, Clone)]
pub struct BundleWriter {
    root: PathBuf,
    next_id: Arc<AtomicU64>,
}

impl BundleWriter {
    /// Create the per-kind directories (every kind but success) under `root`.
    pub fn init(root: &Path) -> Result<Self> {
        for kind in ErrorType::ALL.iter().filter(|k| **k != ErrorType::Success) {
            let dir = root.join(kind.as_str());
            fs::create_dir_all(&dir).with_context(|| format!("create_dir_all({:?})", dir))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `bundle`. Success bundles only produce a summary log line and
    /// return `None`; others return the id their files were named with.
    pub fn write(&self, bundle: &DiagnosticBundle) -> Result<Option<u64>> {
        if bundle.is_success() {
            tracing::info!("{} | {} | {}", bundle.database, bundle.statement, bundle.message);
            return Ok(None);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let dir = self.root.join(bundle.kind.as_str());
        for planned in planned_artifacts(bundle) {
            let path = dir.join(format!("{}_{}", id, planned.kind.suffix()));
            let mut f = fs::File::create(&path).with_context(|| format!("create {:?}", path))?;
            f.write_all(planned.contents.as_bytes())
                .with_context(|| format!("write {:?}", path))?;
        }
        tracing::debug!(id, kind = %bundle.kind, line = bundle.line, "bundle written");
        Ok(Some(id))
    }
}
