// src/budget/reshape.rs

use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::coerce::{coerce_numeric, Coerced};
use super::error::ReshapeError;
use super::month::parse_month;
use super::raw_table::{RawBudgetTable, LABEL_COUNT};

/// Names given, by position, to the first four columns of the budget sheet.
pub const LABEL_COLUMNS: [&str; LABEL_COUNT] = [
    "metric",
    "payment_type",
    "subscription_length",
    "company_size",
];

/// Output column order. The warehouse table is shared with the forecast, so
/// this must not change.
pub const OUTPUT_COLUMNS: [&str; 11] = [
    "ds",
    "payment_status",
    "payment_type",
    "company_size",
    "subscription_length",
    "previous_subscription_length",
    "license_count",
    "billings_per_license",
    "billings",
    "last_updated",
    "data_type",
];

pub const PAYMENT_STATUS: &str = "Completed";
pub const DATA_TYPE: &str = "budget";

/// One budget amount for one month and one label combination.
///
/// Field order matches [`OUTPUT_COLUMNS`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBudgetRow {
    pub ds: String,
    pub payment_status: String,
    pub payment_type: String,
    pub company_size: String,
    pub subscription_length: String,
    pub previous_subscription_length: Option<String>,
    pub license_count: Option<f64>,
    pub billings_per_license: Option<f64>,
    pub billings: Option<f64>,
    pub last_updated: String,
    pub data_type: String,
}

/// What to do with the `metric` label, which the output schema has no column for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricPolicy {
    /// Drop it. Rows from different metrics end up side by side, indistinguishable.
    #[default]
    Collapse,
    /// Fail if the sheet holds more than one distinct metric.
    RequireSingle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReshapeOptions {
    /// Stamp written to `last_updated` on every row.
    pub last_updated: NaiveDate,
    pub metric_policy: MetricPolicy,
}

impl Default for ReshapeOptions {
    fn default() -> Self {
        Self {
            last_updated: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap_or_default(),
            metric_policy: MetricPolicy::default(),
        }
    }
}

/// A budget cell that held text which isn't a number. Its `billings` is null.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericCoercionWarning {
    /// Zero-based data row in the raw table (header excluded).
    pub row: usize,
    /// Zero-based column in the raw table.
    pub column: usize,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reshaped {
    pub rows: Vec<NormalizedBudgetRow>,
    pub warnings: Vec<NumericCoercionWarning>,
}

/// Reshape a wide budget table into normalized long rows.
///
/// Produces exactly `raw.num_rows() * (raw.num_columns() - 4)` rows, ordered by
/// raw row, then month column. Duplicate label combinations are kept as-is.
pub fn reshape(
    raw: &RawBudgetTable,
    opts: &ReshapeOptions,
) -> Result<Vec<NormalizedBudgetRow>, ReshapeError> {
    reshape_with_warnings(raw, opts).map(|r| r.rows)
}

/// [`reshape`], also returning every cell that failed numeric coercion.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(rows = raw.num_rows(), columns = raw.num_columns())
)]
pub fn reshape_with_warnings(
    raw: &RawBudgetTable,
    opts: &ReshapeOptions,
) -> Result<Reshaped, ReshapeError> {
    // 1) label & index: the first four columns, by position
    if raw.num_columns() < LABEL_COUNT {
        return Err(ReshapeError::InsufficientColumns {
            found: raw.num_columns(),
        });
    }
    let keys: Vec<[String; LABEL_COUNT]> = (0..raw.num_rows())
        .map(|r| std::array::from_fn(|c| raw.cell(r, c).as_label()))
        .collect();
    check_metrics(&keys, opts.metric_policy)?;

    // 2) normalize the time axis; every header must parse before anything is emitted
    let months = raw
        .month_headers()
        .iter()
        .enumerate()
        .map(|(i, header)| {
            parse_month(header).ok_or_else(|| ReshapeError::MalformedHeader {
                column: i + LABEL_COUNT,
                header: header.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if months.is_empty() {
        warn!("budget table has no month columns");
    }

    // 3) melt + 4) enrich, in output column order
    let last_updated = opts.last_updated.format("%Y-%m-%d").to_string();
    let mut rows = Vec::with_capacity(keys.len() * months.len());
    let mut warnings = Vec::new();

    for (r, [_metric, payment_type, subscription_length, company_size]) in keys.iter().enumerate() {
        for (m, ds) in months.iter().enumerate() {
            let column = m + LABEL_COUNT;
            let cell = raw.cell(r, column);
            let coerced = coerce_numeric(cell);
            if coerced == Coerced::Unparsable {
                let raw_text = cell.as_label();
                warn!(row = r, column, raw = %raw_text, "non-numeric budget cell; billings set to null");
                warnings.push(NumericCoercionWarning {
                    row: r,
                    column,
                    raw: raw_text,
                });
            }

            rows.push(NormalizedBudgetRow {
                ds: ds.clone(),
                payment_status: PAYMENT_STATUS.to_string(),
                payment_type: payment_type.clone(),
                company_size: company_size.clone(),
                subscription_length: subscription_length.clone(),
                previous_subscription_length: None,
                license_count: Some(0.0),
                billings_per_license: Some(0.0),
                billings: coerced.value(),
                last_updated: last_updated.clone(),
                data_type: DATA_TYPE.to_string(),
            });
        }
    }

    debug!(
        out_rows = rows.len(),
        months = months.len(),
        coercion_warnings = warnings.len(),
        "budget reshaped"
    );
    Ok(Reshaped { rows, warnings })
}

fn check_metrics(keys: &[[String; LABEL_COUNT]], policy: MetricPolicy) -> Result<(), ReshapeError> {
    let metrics: BTreeSet<&str> = keys.iter().map(|k| k[0].as_str()).collect();
    if metrics.len() <= 1 {
        return Ok(());
    }
    match policy {
        MetricPolicy::Collapse => {
            warn!(?metrics, "multiple metrics in budget; metric column is dropped");
            Ok(())
        }
        MetricPolicy::RequireSingle => Err(ReshapeError::MixedMetrics {
            metrics: metrics.into_iter().map(str::to_string).collect(),
        }),
    }
}
