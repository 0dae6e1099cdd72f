// src/config.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::budget::{MetricPolicy, ReshapeOptions};
use crate::warehouse::TableRef;

/// Where tidy tables get written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Bigquery,
    /// Local `parquet_root/<dataset>/<table>/` directory.
    Parquet,
}

/// Connection settings for the BigQuery sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BigQueryConfig {
    /// Falls back to the credentials' project, then `$GOOGLE_CLOUD_PROJECT`.
    pub project_id: Option<String>,
    /// Service-account JSON key. When unset, application default credentials
    /// are tried, then `ini_path`.
    pub credentials_path: Option<PathBuf>,
    /// `[GCP] credentials_path` / `project_id`.
    pub ini_path: PathBuf,
    /// GCS bucket the parquet payload is staged in before the load job.
    pub staging_bucket: Option<String>,
    pub staging_prefix: String,
    pub location: Option<String>,
    pub poll_interval_ms: u64,
    pub job_timeout_secs: u64,
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_path: None,
            ini_path: PathBuf::from("bq.ini"),
            staging_bucket: None,
            staging_prefix: "budgetload/staging".into(),
            location: None,
            poll_interval_ms: 1_000,
            job_timeout_secs: 600,
        }
    }
}

/// Everything a run needs. Every field has a default, so an empty (or absent)
/// YAML file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub budget_path: PathBuf,
    pub forecast_path: PathBuf,
    pub dataset_id: String,
    pub table_id: String,
    /// Stamp for the `last_updated` column.
    pub last_updated: NaiveDate,
    /// When false, pipelines read and transform but skip the write.
    pub write_enabled: bool,
    /// Fail instead of silently merging when the budget holds several metrics.
    pub require_single_metric: bool,
    pub sink: SinkKind,
    pub parquet_root: PathBuf,
    pub bigquery: BigQueryConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            budget_path: PathBuf::from("data/nordpass_b2b_budget_q2.xlsx"),
            forecast_path: PathBuf::from("data/nordpass_b2b_forecast.csv"),
            dataset_id: "test_estrazdas".into(),
            table_id: "nordpass_b2b_forecast".into(),
            last_updated: ReshapeOptions::default().last_updated,
            write_enabled: true,
            require_single_metric: false,
            sink: SinkKind::Bigquery,
            parquet_root: PathBuf::from("warehouse"),
            bigquery: BigQueryConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load from a YAML file; `None` means all defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("no config file given; using defaults");
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_yaml_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn destination(&self) -> TableRef {
        TableRef::new(&self.dataset_id, &self.table_id)
    }

    pub fn reshape_options(&self) -> ReshapeOptions {
        ReshapeOptions {
            last_updated: self.last_updated,
            metric_policy: if self.require_single_metric {
                MetricPolicy::RequireSingle
            } else {
                MetricPolicy::Collapse
            },
        }
    }
}
