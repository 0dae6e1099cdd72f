// src/budget/error.rs

use thiserror::Error;

/// Structural problems that make a budget table impossible to reshape.
///
/// Cell-level problems are not errors; they degrade to null `billings`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReshapeError {
    #[error(
        "budget table has {found} column(s); need at least 4 \
         (metric, payment_type, subscription_length, company_size)"
    )]
    InsufficientColumns { found: usize },

    #[error("month header {header:?} in column {column} is not a date")]
    MalformedHeader { column: usize, header: String },

    #[error(
        "budget table holds {} distinct metrics ({}); dropping the metric column would merge them",
        .metrics.len(),
        .metrics.join(", ")
    )]
    MixedMetrics { metrics: Vec<String> },
}
