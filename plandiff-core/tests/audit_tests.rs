mod common;

use std::io::Cursor;

use common::audit_line;
use plandiff_core::audit::filter::{is_replayable, split_use_prefix};
use plandiff_core::audit::{QueryState, RecordFramer};
use plandiff_core::{AuditRecord, AuditRecords, DiffJob, EligibilityFilter};

#[test]
fn continuation_lines_join_the_open_record() -> anyhow::Result<()> {
    let first = audit_line("2023-05-01 09:00:00", "shop", "EOF", 12, true, "select *", "d1");
    let log = format!(
        "{}\n  from orders\n  where id = 1|Digest=ignored\n{}\n",
        first,
        audit_line("2023-05-01 09:00:01", "shop", "EOF", 5, true, "select 1 from t", "d2")
    );
    let records: Vec<_> = AuditRecords::from_reader(Cursor::new(log)).collect::<Result<_, _>>()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].line, 1);
    assert!(records[0].text.ends_with("  from orders   where id = 1|Digest=ignored"));
    assert_eq!(records[1].line, 4);
    Ok(())
}

#[test]
fn trailing_record_is_flushed_at_end_of_input() {
    let mut framer = RecordFramer::new();
    assert!(framer.push(&audit_line("2023-05-01 09:00:00", "a", "EOF", 1, true, "select 1 from t", "d")).is_none());
    assert!(framer.push("continued").is_none());
    let rec = framer.finish().expect("trailing record");
    assert_eq!(rec.line, 1);
    assert!(rec.text.ends_with(" continued"));
    assert!(framer.finish().is_none());
}

#[test]
fn blank_input_yields_nothing() {
    let records: Vec<_> = AuditRecords::from_reader(Cursor::new("\n\n")).collect();
    assert!(records.is_empty());
}

#[test]
fn fields_are_extracted_by_position() {
    let text = audit_line("2023-05-01 10:11:12", "shop", "EOF", 345, true, "select a from t", "abc123");
    let rec = AuditRecord::parse(&text).expect("parsed");
    assert_eq!(rec.timestamp, "2023-05-01 10:11:12");
    assert_eq!(rec.database, "shop");
    assert_eq!(rec.elapsed_ms, 345);
    assert!(rec.is_query);
    assert_eq!(rec.state, QueryState::Ok);
    assert_eq!(rec.statement, "select a from t");
    assert_eq!(rec.digest, "abc123");
}

#[test]
fn statement_containing_the_delimiter_is_rejoined() {
    let text = audit_line("2023-05-01 10:11:12", "shop", "EOF", 1, true, "select a || b from t", "");
    let rec = AuditRecord::parse(&text).expect("parsed");
    assert_eq!(rec.statement, "select a || b from t");
    assert_eq!(rec.digest, "");
}

#[test]
fn malformed_records_are_dropped() {
    assert!(AuditRecord::parse("2023-05-01 10:11:12,1 [query] |Client=x|User=y").is_none());
    let no_digest = audit_line("2023-05-01 10:11:12", "a", "EOF", 1, true, "select 1 from t", "x")
        .replace("|Digest=x", "|Other=x");
    assert!(AuditRecord::parse(&no_digest).is_none());
    let bad_time = audit_line("2023-05-01 10:11:12", "a", "EOF", 1, true, "select 1 from t", "x")
        .replace("Time=1", "Time=fast");
    assert!(AuditRecord::parse(&bad_time).is_none());
}

#[test]
fn error_state_is_recognized() {
    let text = audit_line("2023-05-01 10:11:12", "a", "ERR", 1, true, "select 1 from t", "x");
    let rec = AuditRecord::parse(&text).expect("parsed");
    assert!(rec.is_error());
}

fn record(ts: &str, stmt: &str) -> AuditRecord {
    AuditRecord::parse(&audit_line(ts, "db1", "EOF", 10, true, stmt, "d")).expect("parsed")
}

#[test]
fn use_prefix_overrides_the_database() {
    let job = split_use_prefix("ignored", "use shop; select * from t");
    assert_eq!(
        job,
        Some(DiffJob {
            database: "shop".to_string(),
            statement: "select * from t".to_string(),
        })
    );
    let quoted = split_use_prefix("x", "USE `sales`;select 1 from t").expect("job");
    assert_eq!(quoted.database, "sales");
    assert!(split_use_prefix("x", "use shop").is_none());
}

#[test]
fn only_replayable_statements_become_jobs() {
    let filter = EligibilityFilter::default();
    assert!(filter.to_job(&record("2023-05-01 09:00:00", "select * from t")).is_some());
    assert!(filter.to_job(&record("2023-05-01 07:59:59", "select * from t")).is_none());
    assert!(filter.to_job(&record("2023-05-01 09:00:00", "select @@version from t")).is_none());
    assert!(filter.to_job(&record("2023-05-01 09:00:00", "explain select * from t")).is_none());
    assert!(filter.to_job(&record("2023-05-01 09:00:00", "select 1")).is_none());
    assert!(filter.to_job(&record("not a timestamp", "select * from t")).is_none());

    let mut failed = record("2023-05-01 09:00:00", "select * from t");
    failed.state = QueryState::Err;
    assert!(!is_replayable(&failed));
    let mut not_query = record("2023-05-01 09:00:00", "select * from t");
    not_query.is_query = false;
    assert!(!is_replayable(&not_query));
}

#[test]
fn hour_window_is_configurable() {
    let filter = EligibilityFilter::new(0);
    assert!(filter.to_job(&record("2023-05-01 03:00:00", "select * from t")).is_some());
}

#[test]
fn invalid_utf8_is_replaced_not_fatal() -> anyhow::Result<()> {
    let mut log = audit_line("2023-05-01 09:00:00", "shop", "EOF", 1, true, "select *", "d1").into_bytes();
    log.extend_from_slice(b"\r\n  from t where name = '\xe9'\r\n");
    log.extend_from_slice(audit_line("2023-05-01 09:00:01", "shop", "EOF", 1, true, "select 1 from t", "d2").as_bytes());
    let records: Vec<_> = AuditRecords::from_reader(Cursor::new(log)).collect::<Result<_, _>>()?;
    assert_eq!(records.len(), 2);
    assert!(records[0].text.ends_with("  from t where name = '\u{FFFD}'"));
    assert!(!records[0].text.contains('\r'));
    assert_eq!(records[1].line, 3);
    Ok(())
}
