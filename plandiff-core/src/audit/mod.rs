// plandiff-core/src/audit/mod.rs

pub mod assembler;
pub mod filter;
pub mod record;

pub use assembler::{AuditRecords, LossyLines, RawRecord, RecordFramer, START_MARKER};
pub use filter::{DiffJob, EligibilityFilter};
pub use record::{AuditRecord, QueryState};
