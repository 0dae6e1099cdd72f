// src/budget/mod.rs

//! Budget reshaping: wide multi-header budget sheet → one row per
//! (month, payment type, company size, subscription length).

pub mod batch;
pub mod coerce;
pub mod error;
pub mod month;
pub mod raw_table;
pub mod reshape;

pub use batch::{budget_schema, rows_to_record_batch};
pub use error::ReshapeError;
pub use raw_table::{Cell, RawBudgetTable, LABEL_COUNT};
pub use reshape::{
    reshape, reshape_with_warnings, MetricPolicy, NormalizedBudgetRow, NumericCoercionWarning,
    ReshapeOptions, Reshaped, LABEL_COLUMNS, OUTPUT_COLUMNS,
};
