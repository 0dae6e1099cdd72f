// src/upload/forecast.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    csv::WriterBuilder,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use std::{path::Path, sync::Arc};
use tempfile::NamedTempFile;
use tracing::info;

use super::{write_truncate, UploadSummary};
use crate::config::LoaderConfig;
use crate::source::read_flat_csv;
use crate::warehouse::TableWriter;

const LAST_UPDATED: &str = "last_updated";

/// Upload the forecast CSV unchanged, replacing the destination table.
#[tracing::instrument(level = "info", skip_all, fields(path = %cfg.forecast_path.display()))]
pub fn upload_forecast(
    cfg: &LoaderConfig,
    writer: Option<&dyn TableWriter>,
) -> Result<UploadSummary> {
    info!("uploading the forecast");

    let batch = read_flat_csv(&cfg.forecast_path)?;
    info!(rows = batch.num_rows(), columns = batch.num_columns(), "forecast file read");

    let destination = cfg.destination();
    let written = write_truncate(writer, &batch, &destination)?;

    Ok(UploadSummary {
        destination,
        rows: batch.num_rows(),
        coercion_warnings: 0,
        written,
    })
}

/// Set `last_updated` to `date` on every row of the forecast CSV at `path`,
/// rewriting the file in place. An existing `last_updated` column is replaced
/// where it stands; otherwise the column is appended.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn stamp_last_updated(path: &Path, date: NaiveDate) -> Result<usize> {
    let batch = read_flat_csv(path)?;
    let stamped = with_last_updated(&batch, date)?;

    // write next to the original, then rename over it
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let tmp = NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {:?}", dir))?;
    {
        let mut writer = WriterBuilder::new().with_header(true).build(tmp.as_file());
        writer.write(&stamped).context("writing stamped forecast")?;
    }
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;

    info!(rows = stamped.num_rows(), %date, "forecast stamped with last_updated");
    Ok(stamped.num_rows())
}

fn with_last_updated(batch: &RecordBatch, date: NaiveDate) -> Result<RecordBatch> {
    let stamp = date.format("%Y-%m-%d").to_string();
    let column: ArrayRef = Arc::new(StringArray::from_iter_values(
        std::iter::repeat(stamp.as_str()).take(batch.num_rows()),
    ));
    let field = Arc::new(Field::new(LAST_UPDATED, DataType::Utf8, true));

    let schema = batch.schema();
    let mut fields: Vec<_> = schema.fields().iter().cloned().collect();
    let mut columns = batch.columns().to_vec();
    match schema.index_of(LAST_UPDATED) {
        Ok(i) => {
            fields[i] = field;
            columns[i] = column;
        }
        Err(_) => {
            fields.push(field);
            columns.push(column);
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("adding last_updated column")
}
