// plandiff-core/src/compare/comparator.rs

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::table::{DataType, Table, Value};

/// Column-name fragments of functions whose value differs between any two
/// executions. Matched case-insensitively as substrings of the column name.
pub const VOLATILE_FUNCTIONS: &[&str] = &[
    "rand()",
    "random()",
    "current_time()",
    "localtime()",
    "localtimestamp()",
    "now()",
    "unix_timestamp()",
    "utc_timestamp()",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareKind {
    /// Volatile column, never compared.
    Skip,
    /// Floating point, equal when `|expected - actual| < 1`.
    Tolerant,
    Exact(DataType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPlan {
    pub name: String,
    pub kind: CompareKind,
}

/// The first cell at which two tables disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difference {
    pub row: usize,
    pub column: String,
    pub expected: Value,
    pub actual: Value,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value (row={}, col={}): expected: <{}> but was: <{}>",
            self.row, self.column, self.expected, self.actual
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column sets differ: expected [{}] but was [{}]", .expected.join(", "), .actual.join(", "))]
pub struct ColumnMismatch {
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

pub fn is_volatile(column: &str) -> bool {
    let lower = column.to_lowercase();
    VOLATILE_FUNCTIONS.iter().any(|f| lower.contains(f))
}

/// Build the comparison plan for two result sets: their shared columns in
/// sorted name order, each with the type it is compared by.
pub fn plan_columns(expected: &Table, actual: &Table) -> Result<Vec<ColumnPlan>, ColumnMismatch> {
    let mut expected_names: Vec<String> = expected.columns().iter().map(|c| c.name.clone()).collect();
    let mut actual_names: Vec<String> = actual.columns().iter().map(|c| c.name.clone()).collect();
    expected_names.sort();
    actual_names.sort();
    if expected_names != actual_names {
        return Err(ColumnMismatch {
            expected: expected_names,
            actual: actual_names,
        });
    }

    let plan = expected_names
        .into_iter()
        .map(|name| {
            let kind = if is_volatile(&name) {
                CompareKind::Skip
            } else {
                let left = column_type(expected, &name);
                let right = column_type(actual, &name);
                let resolved = resolve_type(left, right);
                if resolved.is_floating() {
                    CompareKind::Tolerant
                } else {
                    CompareKind::Exact(resolved)
                }
            };
            ColumnPlan { name, kind }
        })
        .collect();
    Ok(plan)
}

/// Compare two equally sized tables cell by cell, row-major, in plan order.
/// Stops at the first difference.
///
/// Row counts must already agree; rows beyond the shorter table are not visited.
pub fn compare(expected: &Table, actual: &Table, plan: &[ColumnPlan]) -> Option<Difference> {
    if std::ptr::eq(expected, actual) {
        tracing::debug!("tables reference the same object, skipping comparison");
        return None;
    }

    let indices: Vec<(&ColumnPlan, usize, usize)> = plan
        .iter()
        .filter(|p| p.kind != CompareKind::Skip)
        .filter_map(|p| {
            let e = expected.column_index(&p.name)?;
            let a = actual.column_index(&p.name)?;
            Some((p, e, a))
        })
        .collect();

    let rows = expected.row_count().min(actual.row_count());
    for row in 0..rows {
        let (erow, arow) = (&expected.rows()[row], &actual.rows()[row]);
        for (p, ei, ai) in &indices {
            let ev = erow.get(*ei).cloned().unwrap_or(Value::Null);
            let av = arow.get(*ai).cloned().unwrap_or(Value::Null);
            let equal = match p.kind {
                CompareKind::Skip => true,
                CompareKind::Tolerant => tolerant_equal(&ev, &av),
                CompareKind::Exact(dt) => dt.values_equal(&ev, &av),
            };
            if !equal {
                return Some(Difference {
                    row,
                    column: p.name.clone(),
                    expected: ev,
                    actual: av,
                });
            }
        }
    }
    None
}

fn tolerant_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            let diff = x - y;
            diff > -1.0 && diff < 1.0
        }
        _ => DataType::Double.values_equal(a, b),
    }
}

fn column_type(table: &Table, name: &str) -> DataType {
    table
        .columns()
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.data_type)
        .unwrap_or(DataType::Text)
}

fn resolve_type(left: DataType, right: DataType) -> DataType {
    if left == right {
        left
    } else if left.is_floating() || right.is_floating() {
        DataType::Double
    } else if left.is_numeric() && right.is_numeric() {
        DataType::Decimal
    } else {
        DataType::Text
    }
}
