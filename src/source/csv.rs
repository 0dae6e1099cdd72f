// src/source/csv.rs

use anyhow::{Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io::{Seek, SeekFrom},
    path::Path,
    sync::Arc,
};
use tracing::debug;

use crate::budget::{Cell, RawBudgetTable};

const BATCH_SIZE: usize = 8192;

/// Read a budget laid out as CSV. All values stay text; coercion happens in the reshape.
pub fn read_budget_csv(path: &Path) -> Result<RawBudgetTable> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening budget CSV {}", path.display()))?;

    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
        let row: Vec<Cell> = record
            .iter()
            .map(|v| if v.is_empty() { Cell::Empty } else { Cell::from(v) })
            .collect();
        if row.iter().all(Cell::is_blank) {
            continue;
        }
        rows.push(row);
    }

    debug!(columns = headers.len(), rows = rows.len(), "budget CSV read");
    Ok(RawBudgetTable::new(headers, rows))
}

/// Read a CSV into a single Arrow batch with an inferred schema, as-is.
pub fn read_flat_csv(path: &Path) -> Result<RecordBatch> {
    let mut file =
        File::open(path).with_context(|| format!("opening CSV {}", path.display()))?;

    let format = Format::default().with_header(true);
    let (schema, records) = format
        .infer_schema(&mut file, None)
        .with_context(|| format!("inferring schema of {}", path.display()))?;
    file.seek(SeekFrom::Start(0))?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(BATCH_SIZE)
        .build(file)
        .with_context(|| format!("building CSV reader for {}", path.display()))?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("reading {}", path.display()))?;
    let batch = concat_batches(&schema, &batches).context("concatenating CSV batches")?;

    debug!(
        columns = batch.num_columns(),
        rows = batch.num_rows(),
        inferred_from = records,
        "flat CSV read"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use arrow::array::{Array, StringArray};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> Result<NamedTempFile> {
        let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile()?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        Ok(tmp)
    }

    #[test]
    fn test_read_budget_csv() -> Result<()> {
        let tmp = csv_file(
            "\u{feff}Metric,Payment,Length,Size,2025-01,2025-02\n\
             Billings,Monthly,1mo,SMB,100,\"1,200\"\n\
             ,,,,,\n\
             Billings,Annual,12mo,Enterprise,,300\n",
        )?;
        let table = read_budget_csv(tmp.path())?;

        assert_eq!(table.headers[0], "Metric");
        assert_eq!(table.month_headers(), &["2025-01".to_string(), "2025-02".to_string()]);
        // blank line skipped
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.cell(0, 5), &Cell::from("1,200"));
        assert_eq!(table.cell(1, 4), &Cell::Empty);
        assert_eq!(table.cell(1, 5), &Cell::from("300"));
        Ok(())
    }

    #[test]
    fn test_read_budget_dispatches_on_csv() -> Result<()> {
        let tmp = csv_file("a,b,c,d,Apr-2025\nM,P,L,S,5\n")?;
        let table = crate::source::read_budget(tmp.path())?;
        assert_eq!(table.num_columns(), 5);
        assert_eq!(table.num_rows(), 1);
        Ok(())
    }

    #[test]
    fn test_read_flat_csv() -> Result<()> {
        let tmp = csv_file("ds,payment_type,billings\n2025-01,Monthly,10.5\n2025-02,Annual,\n")?;
        let batch = read_flat_csv(tmp.path())?;

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);
        let pt = batch
            .column_by_name("payment_type")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(pt.value(1), "Annual");
        assert!(batch.column_by_name("billings").unwrap().is_null(1));
        Ok(())
    }

    #[test]
    fn test_missing_csv_is_an_error() {
        let err = read_flat_csv(Path::new("no/such/forecast.csv")).unwrap_err();
        assert!(format!("{err:#}").contains("no/such/forecast.csv"));
    }
}
