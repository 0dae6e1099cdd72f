// src/warehouse/bigquery.rs

use anyhow::{bail, Context, Result};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use google_cloud_bigquery::{
    client::Client as BqClient,
    http::{
        job::{
            get::GetJobRequest, CreateDisposition, Job, JobConfiguration, JobConfigurationLoad,
            JobReference, JobState, JobStatus, JobType, WriteDisposition,
        },
        table::{SourceFormat, TableReference},
    },
};
use google_cloud_storage::{
    client::Client as StorageClient,
    http::objects::{
        delete::DeleteObjectRequest,
        upload::{Media, UploadObjectRequest, UploadType},
    },
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, warn};

use super::{auth, batch_to_parquet_bytes, TableRef, TableWriter, WriteMode};
use crate::config::BigQueryConfig;

/// A load job that finished with an error result.
#[derive(Debug, Error)]
#[error("load job {job_id} into {dest} failed: {reason}: {message}")]
pub struct LoadJobError {
    pub job_id: String,
    pub dest: String,
    pub reason: String,
    pub message: String,
    /// Per-row/per-file details, when BigQuery gives any.
    pub details: Vec<String>,
}

/// The parts of a job status the writer acts on.
#[derive(Debug, Clone, Default, PartialEq)]
struct LoadStatus {
    done: bool,
    /// `(reason, message)` of the job's error result.
    error: Option<(String, String)>,
    details: Vec<String>,
}

impl From<&JobStatus> for LoadStatus {
    fn from(status: &JobStatus) -> Self {
        Self {
            done: matches!(status.state, JobState::Done),
            error: status.error_result.as_ref().map(|e| {
                (
                    e.reason.clone().unwrap_or_default(),
                    e.message.clone().unwrap_or_default(),
                )
            }),
            details: status
                .errors
                .iter()
                .flatten()
                .filter_map(|e| e.message.clone())
                .collect(),
        }
    }
}

impl LoadStatus {
    /// `None` while the job is still pending/running.
    fn outcome(&self, job_id: &str, dest: &TableRef) -> Option<Result<(), LoadJobError>> {
        if !self.done {
            return None;
        }
        Some(match &self.error {
            None => Ok(()),
            Some((reason, message)) => Err(LoadJobError {
                job_id: job_id.to_string(),
                dest: dest.to_string(),
                reason: reason.clone(),
                message: message.clone(),
                details: self.details.clone(),
            }),
        })
    }
}

/// Loads batches into BigQuery: the parquet payload is staged in GCS, loaded
/// with a load job, and removed once the job is done.
pub struct BigQueryWriter {
    bigquery: BqClient,
    storage: StorageClient,
    project_id: String,
    staging_bucket: String,
    staging_prefix: String,
    location: Option<String>,
    poll_interval: Duration,
    job_timeout: Duration,
    // dropped last: the clients hold handles into it
    runtime: Runtime,
}

impl BigQueryWriter {
    pub fn from_config(cfg: &BigQueryConfig) -> Result<Self> {
        let staging_bucket = cfg
            .staging_bucket
            .clone()
            .filter(|b| !b.trim().is_empty())
            .context("bigquery.staging_bucket is required for the BigQuery sink")?;
        let _ = rustls::crypto::ring::default_provider().install_default();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("starting tokio runtime")?;
        let creds = runtime.block_on(auth::resolve(cfg))?;
        let bigquery = runtime
            .block_on(BqClient::new(creds.bigquery))
            .context("creating BigQuery client")?;
        let storage = StorageClient::new(creds.storage);
        info!(project = %creds.project_id, bucket = %staging_bucket, "BigQuery writer ready");

        Ok(Self {
            bigquery,
            storage,
            project_id: creds.project_id,
            staging_bucket,
            staging_prefix: cfg.staging_prefix.clone(),
            location: cfg.location.clone(),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            job_timeout: Duration::from_secs(cfg.job_timeout_secs),
            runtime,
        })
    }

    async fn load(
        &self,
        payload: Vec<u8>,
        dest: &TableRef,
        mode: WriteMode,
        job_id: &str,
    ) -> Result<()> {
        let object = staged_object(&self.staging_prefix, dest, job_id);
        self.stage(payload, &object).await?;
        let outcome = self.run_job(dest, mode, job_id, &object).await;
        self.unstage(&object).await;
        outcome
    }

    async fn stage(&self, payload: Vec<u8>, object: &str) -> Result<()> {
        let bytes = payload.len();
        let upload_type = UploadType::Simple(Media::new(object.to_string()));
        let request = UploadObjectRequest {
            bucket: self.staging_bucket.clone(),
            ..Default::default()
        };
        self.storage
            .upload_object(&request, payload, &upload_type)
            .await
            .with_context(|| format!("staging parquet to gs://{}/{}", self.staging_bucket, object))?;
        debug!(bytes, object, "parquet staged");
        Ok(())
    }

    async fn unstage(&self, object: &str) {
        let request = DeleteObjectRequest {
            bucket: self.staging_bucket.clone(),
            object: object.to_string(),
            ..Default::default()
        };
        if let Err(e) = self.storage.delete_object(&request).await {
            warn!(error = %e, object, "could not delete staged parquet");
        }
    }

    async fn run_job(
        &self,
        dest: &TableRef,
        mode: WriteMode,
        job_id: &str,
        object: &str,
    ) -> Result<()> {
        let job = load_job(
            &self.project_id,
            self.location.as_deref(),
            dest,
            mode,
            job_id,
            &gcs_uri(&self.staging_bucket, object),
        );
        let mut current = self
            .bigquery
            .job()
            .create(&job)
            .await
            .context("creating load job")?;

        let request = GetJobRequest {
            location: current.job_reference.location.clone().or_else(|| self.location.clone()),
        };
        let start = Instant::now();
        loop {
            let status = LoadStatus::from(&current.status);
            if let Some(outcome) = status.outcome(job_id, dest) {
                return outcome.map_err(Into::into);
            }
            if start.elapsed() > self.job_timeout {
                bail!("load job {} did not finish within {:?}", job_id, self.job_timeout);
            }
            tokio::time::sleep(self.poll_interval).await;

            current = self
                .bigquery
                .job()
                .get(&self.project_id, job_id, &request)
                .await
                .context("polling load job")?;
            debug!(job_id, state = ?current.status.state, "polled load job");
        }
    }
}

impl TableWriter for BigQueryWriter {
    #[instrument(level = "info", skip(self, batch), fields(table = %dest, rows = batch.num_rows()))]
    fn write_table(&self, batch: &RecordBatch, dest: &TableRef, mode: WriteMode) -> Result<()> {
        let payload = batch_to_parquet_bytes(batch)?;
        let job_id = new_job_id(dest);
        debug!(bytes = payload.len(), ?mode, job_id = %job_id, "loading parquet payload");

        self.runtime
            .block_on(self.load(payload, dest, mode, &job_id))
            .with_context(|| format!("loading into {}", dest))?;

        info!(job_id = %job_id, "load job done");
        Ok(())
    }
}

fn write_disposition(mode: WriteMode) -> WriteDisposition {
    match mode {
        WriteMode::Truncate => WriteDisposition::WriteTruncate,
        WriteMode::Append => WriteDisposition::WriteAppend,
        WriteMode::Empty => WriteDisposition::WriteEmpty,
    }
}

fn load_job(
    project_id: &str,
    location: Option<&str>,
    dest: &TableRef,
    mode: WriteMode,
    job_id: &str,
    source_uri: &str,
) -> Job {
    Job {
        job_reference: JobReference {
            project_id: project_id.to_string(),
            job_id: job_id.to_string(),
            location: location.map(str::to_string),
        },
        configuration: JobConfiguration {
            job: JobType::Load(JobConfigurationLoad {
                source_uris: vec![source_uri.to_string()],
                destination_table: TableReference {
                    project_id: project_id.to_string(),
                    dataset_id: dest.dataset.clone(),
                    table_id: dest.table.clone(),
                },
                source_format: Some(SourceFormat::Parquet),
                write_disposition: Some(write_disposition(mode)),
                create_disposition: Some(CreateDisposition::CreateIfNeeded),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Job ids may only hold letters, digits, `_` and `-`.
fn new_job_id(dest: &TableRef) -> String {
    format!(
        "budgetload_{}_{}",
        dest.table.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_"),
        Utc::now().format("%Y%m%d%H%M%S%6f")
    )
}

fn staged_object(prefix: &str, dest: &TableRef, job_id: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}/{}.parquet", dest.dataset, dest.table, job_id)
    } else {
        format!("{}/{}/{}/{}.parquet", prefix, dest.dataset, dest.table, job_id)
    }
}

fn gcs_uri(bucket: &str, object: &str) -> String {
    format!("gs://{}/{}", bucket, object)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> TableRef {
        TableRef::new("test_estrazdas", "nordpass_b2b_forecast")
    }

    #[test]
    fn test_load_job_targets_staged_parquet() {
        let job = load_job(
            "proj-1",
            Some("EU"),
            &dest(),
            WriteMode::Truncate,
            "job_1",
            "gs://staging/budgetload/job_1.parquet",
        );
        assert_eq!(job.job_reference.project_id, "proj-1");
        assert_eq!(job.job_reference.job_id, "job_1");
        assert_eq!(job.job_reference.location.as_deref(), Some("EU"));

        let JobType::Load(load) = &job.configuration.job else {
            panic!("expected a load job");
        };
        assert_eq!(load.source_uris, vec!["gs://staging/budgetload/job_1.parquet"]);
        assert_eq!(load.destination_table.project_id, "proj-1");
        assert_eq!(load.destination_table.dataset_id, "test_estrazdas");
        assert_eq!(load.destination_table.table_id, "nordpass_b2b_forecast");
        assert!(matches!(load.source_format, Some(SourceFormat::Parquet)));
        assert!(matches!(load.write_disposition, Some(WriteDisposition::WriteTruncate)));
        assert!(matches!(load.create_disposition, Some(CreateDisposition::CreateIfNeeded)));
    }

    #[test]
    fn test_write_dispositions() {
        assert!(matches!(write_disposition(WriteMode::Truncate), WriteDisposition::WriteTruncate));
        assert!(matches!(write_disposition(WriteMode::Append), WriteDisposition::WriteAppend));
        assert!(matches!(write_disposition(WriteMode::Empty), WriteDisposition::WriteEmpty));
    }

    #[test]
    fn test_staged_object_names() {
        assert_eq!(
            staged_object("budgetload/staging/", &dest(), "job_1"),
            "budgetload/staging/test_estrazdas/nordpass_b2b_forecast/job_1.parquet"
        );
        assert_eq!(
            staged_object("", &TableRef::new("d", "t"), "j"),
            "d/t/j.parquet"
        );
        assert_eq!(gcs_uri("bkt", "d/t/j.parquet"), "gs://bkt/d/t/j.parquet");
    }

    #[test]
    fn test_job_ids_are_safe() {
        let id = new_job_id(&TableRef::new("d", "budget.q2-final"));
        assert!(id.starts_with("budgetload_budget_q2_final_"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_missing_staging_bucket_is_rejected() {
        let err = BigQueryWriter::from_config(&BigQueryConfig::default())
            .err()
            .expect("no staging bucket configured");
        assert!(err.to_string().contains("staging_bucket"));
    }

    #[test]
    fn test_job_outcome() {
        let dest = TableRef::new("d", "t");

        let running = LoadStatus::default();
        assert!(running.outcome("j1", &dest).is_none());

        let done = LoadStatus {
            done: true,
            ..LoadStatus::default()
        };
        assert!(matches!(done.outcome("j1", &dest), Some(Ok(()))));

        let failed = LoadStatus {
            done: true,
            error: Some(("invalid".into(), "bad schema".into())),
            details: vec!["column billings: type mismatch".into()],
        };
        let err = failed.outcome("j2", &dest).unwrap().unwrap_err();
        assert_eq!(err.job_id, "j2");
        assert_eq!(err.details, vec!["column billings: type mismatch"]);
        assert_eq!(
            err.to_string(),
            "load job j2 into d.t failed: invalid: bad schema"
        );
    }
}
