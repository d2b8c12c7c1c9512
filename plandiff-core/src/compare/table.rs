// plandiff-core/src/compare/table.rs

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::decimal::ExactDecimal;

/// Declared type of a result column, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Integer,
    Decimal,
    Float,
    Double,
    Boolean,
    Temporal,
    Text,
}

impl DataType {
    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::Decimal | DataType::Float | DataType::Double
        )
    }

    /// Exact, type-aware equality. Floating columns are routed to the tolerant
    /// comparator by the column plan before they get here.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => match self {
                DataType::Integer => match (a.as_i128(), b.as_i128()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.render() == b.render(),
                },
                DataType::Decimal => match (a.as_decimal(), b.as_decimal()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.render() == b.render(),
                },
                DataType::Float | DataType::Double => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.render() == b.render(),
                },
                DataType::Boolean => match (a.as_bool(), b.as_bool()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.render() == b.render(),
                },
                DataType::Temporal | DataType::Text => a.render() == b.render(),
            },
        }
    }

    /// Total order used to sort result sets before comparison. In numeric
    /// columns, nulls sort first, then numbers, then unparseable text.
    pub fn order(&self, a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => match self {
                DataType::Integer => ranked(a, b, Value::as_i128, |x, y| x.cmp(&y)),
                DataType::Decimal => ranked(a, b, Value::as_decimal, |x, y| x.cmp(&y)),
                DataType::Float | DataType::Double => {
                    ranked(a, b, Value::as_f64, |x, y| x.total_cmp(&y))
                }
                DataType::Boolean | DataType::Temporal | DataType::Text => {
                    a.render().cmp(&b.render())
                }
            },
        }
    }
}

fn ranked<T>(
    a: &Value,
    b: &Value,
    key: fn(&Value) -> Option<T>,
    cmp: fn(T, T) -> Ordering,
) -> Ordering {
    match (key(a), key(b)) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.render().cmp(&b.render()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Int(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Exact decimal reading of the value's text form.
    pub fn as_decimal(&self) -> Option<ExactDecimal> {
        match self {
            Value::Null => None,
            other => ExactDecimal::parse(&other.render()),
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(i128::from(*v)),
            Value::Text(s) => s.trim().parse::<i128>().ok(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Int(v) => Some(*v != 0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Some(true),
                "0" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Textual form used in snapshots and reports; NULL renders as `NULL`.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Real(v) => v.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type }
    }
}

/// A materialized result set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Stable sort by every column, in declaration order.
    pub fn sorted(&self) -> Table {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            for (i, col) in self.columns.iter().enumerate() {
                let (x, y) = (cell(a, i), cell(b, i));
                let ord = col.data_type.order(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Render rows `[start, end)` as a tab-separated snapshot with a header line.
    /// The range is clamped to the table.
    pub fn format_rows(&self, start: usize, end: usize) -> String {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        let mut out = self
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join("\t");
        out.push('\n');
        for row in &self.rows[start..end] {
            let line = row.iter().map(Value::render).collect::<Vec<_>>().join("\t");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Headerless TSV export. Temporal values lose a trailing `.0` fraction.
    pub fn write_tsv<W: Write>(&self, mut w: W) -> io::Result<()> {
        for row in &self.rows {
            let line = row
                .iter()
                .zip(&self.columns)
                .map(|(v, c)| match v {
                    Value::Null => "NULL".to_string(),
                    _ if c.data_type == DataType::Temporal => {
                        let s = v.render();
                        s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
                    }
                    _ => v.render(),
                })
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(w, "{line}")?;
        }
        w.flush()
    }
}

static NULL: Value = Value::Null;

fn cell(row: &[Value], idx: usize) -> &Value {
    row.get(idx).unwrap_or(&NULL)
}
