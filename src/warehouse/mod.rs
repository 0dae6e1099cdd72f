// src/warehouse/mod.rs

//! Destinations for tidy tables.
//!
//! Everything that writes implements [`TableWriter`]: BigQuery (staged through
//! GCS) for real runs, and a local parquet directory for dry runs and tests.

pub mod auth;
pub mod bigquery;
pub mod parquet_dir;

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::fmt;

use crate::config::{LoaderConfig, SinkKind};

pub use bigquery::BigQueryWriter;
pub use parquet_dir::ParquetDirWriter;

/// What to do with rows already in the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace everything in the table.
    Truncate,
    Append,
    /// Only write if the table holds no data; fail otherwise.
    Empty,
}

/// `dataset.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// Writes one batch to one destination table. Blocks until the write is
/// committed or has failed; implementations do not retry.
pub trait TableWriter {
    fn write_table(&self, batch: &RecordBatch, dest: &TableRef, mode: WriteMode) -> Result<()>;
}

/// Build the writer selected in the config.
pub fn writer_for(cfg: &LoaderConfig) -> Result<Box<dyn TableWriter>> {
    let writer: Box<dyn TableWriter> = match cfg.sink {
        SinkKind::Bigquery => Box::new(BigQueryWriter::from_config(&cfg.bigquery)?),
        SinkKind::Parquet => Box::new(ParquetDirWriter::new(&cfg.parquet_root)?),
    };
    Ok(writer)
}

/// Serialize a batch into an in-memory, snappy-compressed parquet file.
pub fn batch_to_parquet_bytes(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::{
        array::{Float64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::{io::Write, sync::Arc};

    fn read_back(bytes: &[u8]) -> Result<Vec<RecordBatch>> {
        let mut tmp = tempfile::tempfile()?;
        tmp.write_all(bytes)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(tmp)?.build()?;
        Ok(reader.collect::<Result<Vec<_>, _>>()?)
    }

    #[test]
    fn test_table_ref_display() {
        assert_eq!(
            TableRef::new("test_estrazdas", "nordpass_b2b_forecast").to_string(),
            "test_estrazdas.nordpass_b2b_forecast"
        );
    }

    #[test]
    fn test_parquet_bytes_round_trip_keeps_nulls() -> Result<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("ds", DataType::Utf8, true),
            Field::new("billings", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["2025-01", "2025-02"])),
                Arc::new(Float64Array::from(vec![Some(1.0), None])),
            ],
        )?;
        let batches = read_back(&batch_to_parquet_bytes(&batch)?)?;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].columns(), batch.columns());
        Ok(())
    }
}
