// src/source/spreadsheet.rs

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::debug;

use crate::budget::{Cell, RawBudgetTable};

/// Read the first worksheet: row one is the header, every later non-blank row is data.
///
/// Date-formatted header cells come back as `YYYY-MM-DD` text.
pub fn read_first_sheet(path: &Path) -> Result<RawBudgetTable> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("opening workbook {}", path.display()))?;
    let sheet_name = workbook.sheet_names().first().cloned().unwrap_or_default();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", path.display()))?
        .with_context(|| format!("reading sheet {:?} of {}", sheet_name, path.display()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("sheet {:?} of {} is empty", sheet_name, path.display()))?
        .iter()
        .map(header_text)
        .collect();

    let data: Vec<Vec<Cell>> = rows
        .map(|r| r.iter().map(to_cell).collect::<Vec<_>>())
        .filter(|r| !r.iter().all(Cell::is_blank))
        .collect();

    debug!(sheet = %sheet_name, columns = headers.len(), rows = data.len(), "sheet read");
    Ok(RawBudgetTable::new(headers, data))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => to_cell(other).as_label(),
    }
}

fn to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{reshape_with_warnings, ReshapeOptions};
    use std::path::PathBuf;

    /// Two sheets ("Budget", then "Notes"). The budget's first two month
    /// headers are date-formatted cells, the third is text; row 3 is blank.
    fn fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/budget_q2.xlsx")
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(to_cell(&Data::Int(5)), Cell::Number(5.0));
        assert_eq!(to_cell(&Data::Float(1.5)), Cell::Number(1.5));
        assert_eq!(to_cell(&Data::Empty), Cell::Empty);
        assert_eq!(to_cell(&Data::String("N/A".into())), Cell::from("N/A"));
    }

    #[test]
    fn test_header_text() {
        assert_eq!(header_text(&Data::String(" Apr-2025 ".into())), "Apr-2025");
        assert_eq!(header_text(&Data::Float(12.0)), "12");
        assert_eq!(
            header_text(&Data::DateTimeIso("2025-04-01T00:00:00".into())),
            "2025-04-01T00:00:00"
        );
    }

    #[test]
    fn test_reads_first_sheet_with_date_headers() -> Result<()> {
        let raw = read_first_sheet(&fixture())?;
        assert_eq!(
            raw.headers,
            vec![
                "Metric",
                "Payment type",
                "Subscription",
                "Company size",
                "2025-04-01",
                "2025-05-01",
                "Jun-2025",
            ]
        );
        // the blank spreadsheet row is dropped
        assert_eq!(raw.num_rows(), 2);
        assert_eq!(raw.cell(0, 5), &Cell::Number(200.5));
        assert_eq!(raw.cell(1, 3), &Cell::from("Enterprise"));
        assert!(raw.cell(1, 5).is_blank());
        Ok(())
    }

    #[test]
    fn test_workbook_reshapes_end_to_end() -> Result<()> {
        let raw = read_first_sheet(&fixture())?;
        let reshaped = reshape_with_warnings(&raw, &ReshapeOptions::default())?;

        let ds: Vec<&str> = reshaped.rows.iter().map(|r| r.ds.as_str()).collect();
        assert_eq!(
            ds,
            vec!["2025-04", "2025-05", "2025-06", "2025-04", "2025-05", "2025-06"]
        );
        let billings: Vec<Option<f64>> = reshaped.rows.iter().map(|r| r.billings).collect();
        assert_eq!(
            billings,
            vec![Some(100.0), Some(200.5), None, Some(1500.0), None, Some(300.0)]
        );
        assert_eq!(reshaped.rows[3].payment_type, "Annual");
        assert_eq!(reshaped.rows[3].subscription_length, "12mo");

        // only the "N/A" text cell warns; the empty cell does not
        assert_eq!(reshaped.warnings.len(), 1);
        assert_eq!(reshaped.warnings[0].raw, "N/A");
        Ok(())
    }
}
