// src/warehouse/auth.rs

//! Credentials for the GCS and BigQuery clients.
//!
//! Tried in order:
//! 1. `bigquery.credentials_path`, a service-account key named in the config;
//! 2. application default credentials (`GOOGLE_APPLICATION_CREDENTIALS`, the
//!    gcloud user login, or the metadata server);
//! 3. `[GCP] credentials_path` + `project_id` from the ini file (`bq.ini`).

use anyhow::{anyhow, Context, Result};
use google_cloud_auth::credentials::CredentialsFile;
use google_cloud_bigquery::client::ClientConfig as BqConfig;
use google_cloud_storage::client::ClientConfig as StorageConfig;
use serde::Deserialize;
use std::{
    env,
    future::Future,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::config::BigQueryConfig;

pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// A service-account key on disk, plus the project to bill if the source named one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    pub path: PathBuf,
    pub project_id: Option<String>,
}

/// Which link of the chain produced the credentials.
#[derive(Debug)]
pub enum Source<T> {
    Key(KeyFile),
    ApplicationDefault(T),
}

/// Authenticated client configs for both APIs.
pub struct GcpCredentials {
    pub bigquery: BqConfig,
    pub storage: StorageConfig,
    pub project_id: String,
}

type ClientConfigs = (BqConfig, StorageConfig, Option<String>);

#[derive(Debug, Deserialize)]
struct IniFile {
    #[serde(alias = "GCP")]
    gcp: IniGcpSection,
}

#[derive(Debug, Deserialize)]
struct IniGcpSection {
    credentials_path: PathBuf,
    project_id: String,
}

/// Walk the chain and build both client configs.
pub async fn resolve(cfg: &BigQueryConfig) -> Result<GcpCredentials> {
    let (bigquery, storage, from_credentials) =
        match choose_source(cfg, application_default).await? {
            Source::ApplicationDefault(found) => {
                info!("using application default credentials");
                found
            }
            Source::Key(key) => {
                info!(path = %key.path.display(), "using service-account key");
                from_key_file(&key).await?
            }
        };
    let project_id = pick_project_id(
        cfg.project_id.as_deref(),
        from_credentials,
        env::var(PROJECT_ENV).ok(),
    )?;
    debug!(project = %project_id, "GCP project resolved");

    Ok(GcpCredentials {
        bigquery,
        storage,
        project_id,
    })
}

/// A configured key wins without touching ADC; the ini file is only read when ADC fails.
pub async fn choose_source<T, F, Fut>(cfg: &BigQueryConfig, adc: F) -> Result<Source<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if let Some(path) = &cfg.credentials_path {
        return Ok(Source::Key(KeyFile {
            path: path.clone(),
            project_id: None,
        }));
    }
    match adc().await {
        Ok(found) => Ok(Source::ApplicationDefault(found)),
        Err(adc_err) => {
            warn!(error = %format!("{adc_err:#}"), ini = %cfg.ini_path.display(), "no application default credentials; trying ini file");
            let key = read_ini(&cfg.ini_path).with_context(|| {
                format!("no application default credentials ({adc_err:#}) and no usable ini fallback")
            })?;
            Ok(Source::Key(key))
        }
    }
}

/// Read `[GCP] credentials_path` and `project_id` from an ini file.
pub fn read_ini(path: &Path) -> Result<KeyFile> {
    let ini = ::config::Config::builder()
        .add_source(::config::File::from(path).format(::config::FileFormat::Ini))
        .build()
        .and_then(|c| c.try_deserialize::<IniFile>())
        .with_context(|| format!("reading [GCP] section of {}", path.display()))?;
    Ok(KeyFile {
        path: ini.gcp.credentials_path,
        project_id: Some(ini.gcp.project_id),
    })
}

/// Configured value, then whatever the credentials carry, then the environment.
pub fn pick_project_id(
    configured: Option<&str>,
    from_credentials: Option<String>,
    from_env: Option<String>,
) -> Result<String> {
    [configured.map(str::to_string), from_credentials, from_env]
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("no GCP project id: set bigquery.project_id or ${}", PROJECT_ENV))
}

async fn application_default() -> Result<ClientConfigs> {
    let (bigquery, project) = BqConfig::new_with_auth()
        .await
        .context("authenticating BigQuery client")?;
    let storage = StorageConfig::default()
        .with_auth()
        .await
        .context("authenticating GCS client")?;
    Ok((bigquery, storage, project))
}

async fn from_key_file(key: &KeyFile) -> Result<ClientConfigs> {
    let (bigquery, from_file) = BqConfig::new_with_credentials(load_key(&key.path).await?)
        .await
        .context("authenticating BigQuery client")?;
    let storage = StorageConfig::default()
        .with_credentials(load_key(&key.path).await?)
        .await
        .context("authenticating GCS client")?;
    Ok((bigquery, storage, key.project_id.clone().or(from_file)))
}

async fn load_key(path: &Path) -> Result<CredentialsFile> {
    CredentialsFile::new_from_file(path.to_string_lossy().into_owned())
        .await
        .with_context(|| format!("reading service-account key {}", path.display()))
}
