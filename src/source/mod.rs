// src/source/mod.rs

//! Reading budget and forecast files from local disk.

pub mod csv;
pub mod spreadsheet;

use anyhow::{bail, Result};
use std::path::Path;

use crate::budget::RawBudgetTable;

pub use self::csv::{read_budget_csv, read_flat_csv};
pub use spreadsheet::read_first_sheet;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Read a raw budget table, picking the reader from the file extension.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn read_budget(path: &Path) -> Result<RawBudgetTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        read_first_sheet(path)
    } else if ext == "csv" {
        read_budget_csv(path)
    } else {
        bail!(
            "unsupported budget file {}: expected one of {:?} or csv",
            path.display(),
            SPREADSHEET_EXTENSIONS
        )
    }
}
