mod common;

use common::{int_table, FakeSession, Scripted};
use plandiff_core::compare::Column;
use plandiff_core::engine::{classify_timing, Timing, TimingVerdict};
use plandiff_core::{DataType, DiffEngine, DiffJob, DiffOptions, ErrorType, Table, Value};

fn job(stmt: &str) -> DiffJob {
    DiffJob {
        database: "shop".to_string(),
        statement: stmt.to_string(),
    }
}

fn agreed(old_ms: u64, new_ms: u64) -> Vec<Scripted> {
    vec![
        Scripted::Rows(int_table("id", &[1, 2]), old_ms),
        Scripted::Rows(int_table("id", &[2, 1]), new_ms),
    ]
}

fn with_data() -> DiffOptions {
    DiffOptions {
        collect_result_data: true,
        ..DiffOptions::default()
    }
}

#[test]
fn timing_thresholds() {
    let verdict = |old_ms, new_ms| classify_timing(Timing { old_ms, new_ms });
    assert_eq!(verdict(200, 250), TimingVerdict::Ignore);
    assert_eq!(verdict(1000, 1100), TimingVerdict::Ignore);
    assert_eq!(verdict(1000, 2000), TimingVerdict::Slow);
    assert_eq!(verdict(2000, 1000), TimingVerdict::Fast);
    assert_eq!(verdict(1000, 1299), TimingVerdict::Ignore);
    // Either threshold alone is enough once a side reaches the floor.
    assert_eq!(verdict(300, 590), TimingVerdict::Slow);
    assert_eq!(verdict(10_000, 10_400), TimingVerdict::Slow);
}

#[test]
fn old_planner_runs_before_new() {
    let mut session = FakeSession::new(agreed(10, 10));
    DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(
        session.calls,
        vec![
            "use shop",
            "mode old",
            "query old select id from t",
            "mode new",
            "query new select id from t",
        ]
    );
}

#[test]
fn agreement_within_noise_is_success() {
    let mut session = FakeSession::new(agreed(200, 250));
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Success);
    assert!(bundle.message.starts_with("ignore"));
    assert_eq!(bundle.old_query_id, "old-1");
    assert_eq!(bundle.new_query_id, "new-2");
}

#[test]
fn faster_new_planner_is_success() {
    let mut session = FakeSession::new(agreed(2000, 1000));
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Success);
    assert!(bundle.message.starts_with("fast"));
    assert!(bundle.old_profile.is_empty());
}

#[test]
fn slow_statement_collects_plans_and_profiles() {
    let mut session = FakeSession::new(agreed(1000, 2000));
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Slow);
    assert_eq!(bundle.message, "slow, new: 2000ms, old: 1000ms, ratio: 2.00");
    assert_eq!(bundle.new_explain, "new plan (costs)\n");
    assert_eq!(bundle.old_explain, "old plan (verbose)\n");
    assert!(bundle.old_profile.contains("old-1"));
    assert!(bundle.new_profile.contains("new-2"));
    assert!(bundle.old_data.is_empty());
}

#[test]
fn slow_collection_can_be_switched_off() {
    let mut session = FakeSession::new(agreed(1000, 2000));
    let options = DiffOptions {
        slow_profile: false,
        slow_explain: false,
        ..DiffOptions::default()
    };
    let bundle = DiffEngine::new(&mut session, options).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Slow);
    assert!(bundle.new_explain.is_empty());
    assert!(bundle.new_profile.is_empty());
}

#[test]
fn syntax_error_is_not_retried() {
    let mut session = FakeSession::new(vec![Scripted::Syntax("unexpected token")]);
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("selec id from t"));
    assert_eq!(bundle.kind, ErrorType::Syntax);
    assert_eq!(bundle.message, "No.1 ERROR:\nsyntax error: unexpected token");
    let queries = session.calls.iter().filter(|c| c.starts_with("query")).count();
    assert_eq!(queries, 1);
}

#[test]
fn row_count_mismatch_is_retried_and_snapshotted() {
    let mut script = Vec::new();
    for _ in 0..2 {
        script.push(Scripted::Rows(int_table("id", &[1, 2]), 10));
        script.push(Scripted::Rows(int_table("id", &[1, 2, 3]), 10));
    }
    let mut session = FakeSession::new(script);
    let bundle = DiffEngine::new(&mut session, with_data()).validate(&job("select id from t"));

    assert_eq!(bundle.kind, ErrorType::RowCount);
    assert!(bundle.message.starts_with("No.1 ERROR:\nrow count mismatch: old 2 rows, new 3 rows"));
    assert!(bundle.message.contains("\nNo.2 ERROR:\n"));
    assert_eq!(bundle.old_data, "id\n1\n2\n");
    assert_eq!(bundle.new_data, "id\n1\n2\n3\n");
    assert!(!bundle.new_explain.is_empty());
    assert!(!bundle.old_profile.is_empty());
    assert_eq!(session.remaining(), 0);
}

#[test]
fn data_snapshots_are_opt_in() {
    let mut script = Vec::new();
    for _ in 0..2 {
        script.push(Scripted::Rows(int_table("id", &[1]), 10));
        script.push(Scripted::Rows(int_table("id", &[1, 2]), 10));
    }
    let mut session = FakeSession::new(script);
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::RowCount);
    assert!(bundle.old_data.is_empty());
}

fn wide(n: i64, changed_at: Option<i64>) -> Table {
    let rows = (0..n)
        .map(|i| {
            let v = if Some(i) == changed_at { -1 } else { i * 10 };
            vec![Value::Int(i), Value::Int(v)]
        })
        .collect();
    Table::new(
        vec![Column::new("id", DataType::Integer), Column::new("v", DataType::Integer)],
        rows,
    )
}

#[test]
fn row_diff_snapshot_is_windowed_around_first_difference() {
    let mut script = Vec::new();
    for _ in 0..2 {
        script.push(Scripted::Rows(wide(1000, None), 10));
        script.push(Scripted::Rows(wide(1000, Some(700)), 10));
    }
    let mut session = FakeSession::new(script);
    let bundle = DiffEngine::new(&mut session, with_data()).validate(&job("select id, v from t"));

    assert_eq!(bundle.kind, ErrorType::RowDiff);
    assert!(bundle.message.contains("value (row=700, col=v): expected: <-1> but was: <7000>"));
    // rows 200..1000 plus the header
    assert_eq!(bundle.old_data.lines().count(), 801);
    assert!(bundle.old_data.starts_with("id\tv\n200\t2000\n"));
    assert!(bundle.new_data.contains("\n700\t-1\n"));
}

#[test]
fn differing_column_sets_fall_back_to_head_snapshot() {
    let mut script = Vec::new();
    for _ in 0..2 {
        script.push(Scripted::Rows(int_table("a", &[1]), 10));
        script.push(Scripted::Rows(int_table("b", &[1]), 10));
    }
    let mut session = FakeSession::new(script);
    let bundle = DiffEngine::new(&mut session, with_data()).validate(&job("select * from t"));
    assert_eq!(bundle.kind, ErrorType::RowDiff);
    assert!(bundle.message.contains("column sets differ"));
    assert_eq!(bundle.old_data, "a\n1\n");
    assert_eq!(bundle.new_data, "b\n1\n");
}

#[test]
fn unordered_limit_is_not_compared() {
    let mut session = FakeSession::new(vec![
        Scripted::Rows(int_table("id", &[1, 2]), 10),
        Scripted::Rows(int_table("id", &[3, 4]), 10),
    ]);
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t limit 2"));
    assert_eq!(bundle.kind, ErrorType::Success);
}

#[test]
fn ordered_limit_is_compared() {
    let mut script = Vec::new();
    for _ in 0..2 {
        script.push(Scripted::Rows(int_table("id", &[1, 2]), 10));
        script.push(Scripted::Rows(int_table("id", &[3, 4]), 10));
    }
    let mut session = FakeSession::new(script);
    let bundle = DiffEngine::new(&mut session, DiffOptions::default())
        .validate(&job("select id from t order by id limit 2"));
    assert_eq!(bundle.kind, ErrorType::RowDiff);
}

#[test]
fn transient_failure_recovered_on_retry_is_success() {
    let mut script = vec![Scripted::Transport("connection reset")];
    script.extend(agreed(10, 12));
    let mut session = FakeSession::new(script);
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Success);
}

#[test]
fn persistent_failure_is_other_with_both_notes() {
    let mut session = FakeSession::new(vec![
        Scripted::Transport("connection reset"),
        Scripted::Transport("connection refused"),
    ]);
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Other);
    assert_eq!(
        bundle.message,
        "No.1 ERROR:\ntransport error: connection reset\nNo.2 ERROR:\ntransport error: connection refused"
    );
}

#[test]
fn syntax_error_on_retry_is_syntax() {
    let mut session = FakeSession::new(vec![
        Scripted::Transport("connection reset"),
        Scripted::Syntax("no viable alternative"),
    ]);
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Syntax);
    assert!(bundle.message.ends_with("No.2 ERROR:\nsyntax error: no viable alternative"));
}

#[test]
fn diagnostic_failures_are_substituted_into_their_slot() {
    let mut session = FakeSession::new(agreed(1000, 2000));
    session.profile_error = Some("profile endpoint down");
    session.explain_error = Some("explain rejected");
    let bundle = DiffEngine::new(&mut session, DiffOptions::default()).validate(&job("select id from t"));
    assert_eq!(bundle.kind, ErrorType::Slow);
    assert_eq!(bundle.old_profile, "old profile failed: transport error: profile endpoint down\n");
    assert_eq!(bundle.new_explain, "new explain failed: transport error: explain rejected\n");
}

#[test]
fn empty_database_skips_use() {
    let mut session = FakeSession::new(agreed(1, 1));
    let job = DiffJob {
        database: String::new(),
        statement: "select id from t".to_string(),
    };
    DiffEngine::new(&mut session, DiffOptions::default()).validate(&job);
    assert!(!session.calls.iter().any(|c| c.starts_with("use")));
}
