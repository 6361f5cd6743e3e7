use crate::config::Settings;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PATH: &str = "/datasets/fe_data.csv";
const DEFAULT_RETRIES: u32 = 3;

/// Where the worker obtains raw dataset bytes (CSV, or a ZIP archive
/// containing it). Parsing is the dataset module's job.
#[async_trait::async_trait]
pub trait DatasetSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_dataset(&self) -> Result<Vec<u8>>;
}

/// Local snapshot file, the common case for scheduled builds.
#[derive(Debug, Clone)]
pub struct FileDatasetSource {
    path: PathBuf,
}

impl FileDatasetSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl DatasetSource for FileDatasetSource {
    fn source_name(&self) -> &'static str {
        "local_file"
    }

    async fn fetch_dataset(&self) -> Result<Vec<u8>> {
        let path = self.path.clone();
        let bytes = tokio::task::spawn_blocking(move || std::fs::read(&path))
            .await
            .context("join dataset read task failed")?
            .with_context(|| format!("read dataset file {} failed", self.path.display()))?;
        anyhow::ensure!(!bytes.is_empty(), "dataset file {} is empty", self.path.display());
        Ok(bytes)
    }
}

/// Download from the data portal. The portal is flaky enough that bounded
/// retries with backoff are required for unattended runs.
#[derive(Debug, Clone)]
pub struct HttpDatasetSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpDatasetSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_dataset_base_url()?.to_string();
        let api_key = settings.dataset_api_key.clone();

        let timeout_secs = std::env::var("DATASET_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("DATASET_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let path = std::env::var("DATASET_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build dataset http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        join_url(&self.base_url, &self.path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self) -> Result<Vec<u8>> {
        let url = self.url();
        let headers = self.headers()?;

        let res = self
            .http
            .get(url.as_str())
            .headers(headers)
            .send()
            .await
            .context("dataset download request failed")?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .context("failed to read dataset response body")?;

        if !status.is_success() {
            anyhow::bail!("dataset download HTTP {status} from {url}");
        }
        anyhow::ensure!(!bytes.is_empty(), "dataset download returned an empty body");

        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl DatasetSource for HttpDatasetSource {
    fn source_name(&self) -> &'static str {
        "http_portal"
    }

    async fn fetch_dataset(&self) -> Result<Vec<u8>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "dataset download failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
