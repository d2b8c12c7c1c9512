//! Differential replay of audited statements against two planner modes.
//!
//! The pipeline is `audit` (framing + filtering) -> `engine` (dual execution,
//! comparison, classification) -> `bundle` (tiered persistence). `digest`
//! aggregates timings per statement digest for benchmark reports.

pub mod audit;
pub mod bundle;
pub mod compare;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod replay;
pub mod runner;
pub mod session;

pub use audit::{AuditRecord, AuditRecords, DiffJob, EligibilityFilter, RawRecord};
pub use bundle::{BundleWriter, DiagnosticBundle, ErrorType};
pub use compare::{ColumnPlan, DataType, Difference, Table, Value};
pub use config::PlanDiffConfig;
pub use digest::{DigestAggregator, DigestStat};
pub use engine::{DiffEngine, DiffOptions};
pub use error::SessionError;
pub use runner::{DiffRunner, RunSummary};
pub use session::{ExplainLevel, PlannerMode, PlannerSession};
