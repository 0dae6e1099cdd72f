// src/upload/budget.rs

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use tracing::{debug, info};

use super::{write_truncate, UploadSummary};
use crate::budget::{reshape_with_warnings, rows_to_record_batch};
use crate::config::LoaderConfig;
use crate::source::read_budget;
use crate::warehouse::TableWriter;

/// Read the budget file, reshape it, and replace the destination table with it.
///
/// `writer = None` runs everything except the upload.
#[tracing::instrument(level = "info", skip_all, fields(path = %cfg.budget_path.display()))]
pub fn upload_budget(cfg: &LoaderConfig, writer: Option<&dyn TableWriter>) -> Result<UploadSummary> {
    info!("uploading the budget");

    let raw = read_budget(&cfg.budget_path)?;
    info!(rows = raw.num_rows(), columns = raw.num_columns(), "budget file read");

    let reshaped = reshape_with_warnings(&raw, &cfg.reshape_options())
        .with_context(|| format!("parsing budget {}", cfg.budget_path.display()))?;
    let batch = rows_to_record_batch(&reshaped.rows)?;
    debug!("budget:\n{}", pretty_format_batches(&[batch.clone()])?);
    info!(rows = batch.num_rows(), "budget parsed");

    let destination = cfg.destination();
    let written = write_truncate(writer, &batch, &destination)?;

    Ok(UploadSummary {
        destination,
        rows: batch.num_rows(),
        coercion_warnings: reshaped.warnings.len(),
        written,
    })
}
