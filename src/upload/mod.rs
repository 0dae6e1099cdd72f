// src/upload/mod.rs

//! End-to-end runs: read a source file, (maybe) transform it, (maybe) write it.

pub mod budget;
pub mod forecast;

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use tracing::{info, warn};

use crate::warehouse::{TableRef, TableWriter, WriteMode};

pub use self::budget::upload_budget;
pub use forecast::{stamp_last_updated, upload_forecast};

/// What a pipeline run did.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSummary {
    pub destination: TableRef,
    pub rows: usize,
    /// Budget cells that could not be read as numbers (always 0 for the forecast).
    pub coercion_warnings: usize,
    /// False when the write was disabled for this run.
    pub written: bool,
}

/// Write with `Truncate`, or log and skip when no writer is given.
fn write_truncate(
    writer: Option<&dyn TableWriter>,
    batch: &RecordBatch,
    dest: &TableRef,
) -> Result<bool> {
    let Some(writer) = writer else {
        warn!(table = %dest, rows = batch.num_rows(), "write disabled; nothing uploaded");
        return Ok(false);
    };
    writer.write_table(batch, dest, WriteMode::Truncate)?;
    info!(table = %dest, rows = batch.num_rows(), "data uploaded");
    Ok(true)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Writer that only records what it was asked to write.
    #[derive(Default)]
    pub struct RecordingWriter {
        pub calls: Mutex<Vec<(TableRef, WriteMode, RecordBatch)>>,
    }

    impl TableWriter for RecordingWriter {
        fn write_table(&self, batch: &RecordBatch, dest: &TableRef, mode: WriteMode) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((dest.clone(), mode, batch.clone()));
            Ok(())
        }
    }

    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, FmtSubscriber};
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,budgetload=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
