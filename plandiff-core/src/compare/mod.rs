// plandiff-core/src/compare/mod.rs

pub mod comparator;
pub mod decimal;
pub mod table;

pub use comparator::{compare, plan_columns, ColumnMismatch, ColumnPlan, CompareKind, Difference, VOLATILE_FUNCTIONS};
pub use decimal::ExactDecimal;
pub use table::{Column, DataType, Table, Value};
