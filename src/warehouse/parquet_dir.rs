// src/warehouse/parquet_dir.rs

use anyhow::{bail, Context, Result};
use arrow::record_batch::RecordBatch;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use super::{batch_to_parquet_bytes, TableRef, TableWriter, WriteMode};

/// Local stand-in for the warehouse: each table is a directory of parquet parts
/// at `<root>/<dataset>/<table>/part-NNNNN.parquet`.
pub struct ParquetDirWriter {
    root: PathBuf,
}

impl ParquetDirWriter {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating parquet root {:?}", &root))?;
        Ok(Self { root })
    }

    pub fn table_dir(&self, dest: &TableRef) -> PathBuf {
        self.root.join(&dest.dataset).join(&dest.table)
    }

    /// Existing part files, sorted by name.
    pub fn parts(&self, dest: &TableRef) -> Result<Vec<PathBuf>> {
        let dir = self.table_dir(dest);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut parts: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("listing {:?}", &dir))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| is_part(p))
            .collect();
        parts.sort();
        Ok(parts)
    }
}

fn is_part(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("part-") && n.ends_with(".parquet"))
}

impl TableWriter for ParquetDirWriter {
    fn write_table(&self, batch: &RecordBatch, dest: &TableRef, mode: WriteMode) -> Result<()> {
        let dir = self.table_dir(dest);
        fs::create_dir_all(&dir).with_context(|| format!("creating table dir {:?}", &dir))?;

        let existing = self.parts(dest)?;
        if mode == WriteMode::Empty && !existing.is_empty() {
            bail!("table {} already has {} part(s)", dest, existing.len());
        }

        let index = match mode {
            WriteMode::Append => existing.len(),
            WriteMode::Truncate | WriteMode::Empty => 0,
        };
        let path = dir.join(format!("part-{:05}.parquet", index));
        let tmp_path = dir.join(format!(".part-{:05}.parquet.tmp", index));

        // old parts stay untouched until the new one is fully on disk
        let bytes = batch_to_parquet_bytes(batch)?;
        fs::write(&tmp_path, &bytes).with_context(|| format!("writing {:?}", &tmp_path))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("renaming {:?} -> {:?}", &tmp_path, &path))?;

        if mode == WriteMode::Truncate {
            let stale: Vec<&PathBuf> = existing.iter().filter(|p| **p != path).collect();
            for p in &stale {
                fs::remove_file(p).with_context(|| format!("removing {:?}", p))?;
            }
            debug!(table = %dest, removed = stale.len(), "truncated");
        }

        info!(table = %dest, rows = batch.num_rows(), bytes = bytes.len(), path = %path.display(), "wrote parquet part");
        Ok(())
    }
}
