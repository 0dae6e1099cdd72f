// src/budget/batch.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::reshape::{NormalizedBudgetRow, OUTPUT_COLUMNS};

/// Columns typed as Float64; everything else is Utf8.
const NUMERIC_COLUMNS: [&str; 3] = ["license_count", "billings_per_license", "billings"];

/// Arrow schema of the normalized budget table, in [`OUTPUT_COLUMNS`] order.
pub fn budget_schema() -> SchemaRef {
    let fields: Vec<Field> = OUTPUT_COLUMNS
        .iter()
        .map(|name| {
            let dt = if NUMERIC_COLUMNS.contains(name) {
                DataType::Float64
            } else {
                DataType::Utf8
            };
            Field::new(*name, dt, /* nullable = */ true)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

/// Build a single `RecordBatch` from normalized rows.
pub fn rows_to_record_batch(rows: &[NormalizedBudgetRow]) -> Result<RecordBatch> {
    fn strings<'a>(
        rows: &'a [NormalizedBudgetRow],
        f: impl Fn(&'a NormalizedBudgetRow) -> &'a str,
    ) -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(f)))
    }
    fn floats(
        rows: &[NormalizedBudgetRow],
        f: impl Fn(&NormalizedBudgetRow) -> Option<f64>,
    ) -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<Float64Array>())
    }

    let columns: Vec<ArrayRef> = vec![
        strings(rows, |r| r.ds.as_str()),
        strings(rows, |r| r.payment_status.as_str()),
        strings(rows, |r| r.payment_type.as_str()),
        strings(rows, |r| r.company_size.as_str()),
        strings(rows, |r| r.subscription_length.as_str()),
        Arc::new(
            rows.iter()
                .map(|r| r.previous_subscription_length.as_deref())
                .collect::<StringArray>(),
        ),
        floats(rows, |r| r.license_count),
        floats(rows, |r| r.billings_per_license),
        floats(rows, |r| r.billings),
        strings(rows, |r| r.last_updated.as_str()),
        strings(rows, |r| r.data_type.as_str()),
    ];

    RecordBatch::try_new(budget_schema(), columns).context("building budget record batch")
}
