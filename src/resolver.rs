//! Runtime metadata resolution over HTTP.
//!
//! `GET <base>/metadata/<logicalName>.json`, expecting a success status and a
//! body matching the sidecar schema. Anything else is a [`FetchError`].
//!
//! One attempt by default. A [`RetryPolicy`] with more attempts retries
//! transport failures and 5xx responses after a fixed backoff; 4xx and
//! malformed bodies are final.

use crate::config::RuntimeConfig;
use crate::metadata::{MetadataDocument, parse_metadata};
use crate::naming;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("malformed metadata at {url}: {message}")]
    Malformed { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed { .. } => false,
        }
    }
}

/// Source of metadata documents for the view.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, logical_name: &str) -> Result<MetadataDocument, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(200),
        }
    }
}

/// [`MetadataResolver`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    base: String,
    retry: RetryPolicy,
}

impl HttpResolver {
    /// `base` is the URL the artifact root is served under, e.g.
    /// `https://example.com/assets/images`.
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Resolver for `origin` + `runtime.base_path`, with the configured
    /// timeout and retry policy.
    pub fn from_runtime_config(
        origin: &str,
        runtime: &RuntimeConfig,
    ) -> Result<Self, reqwest::Error> {
        let base = naming::join_url(origin, &runtime.base_path);
        Ok(
            Self::new(base, Duration::from_secs(runtime.timeout_secs))?.with_retry(RetryPolicy {
                max_attempts: runtime.max_attempts.max(1),
                backoff: Duration::from_millis(runtime.retry_backoff_ms),
            }),
        )
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn metadata_url(&self, logical_name: &str) -> String {
        naming::join_url(&self.base, &naming::metadata_path(logical_name))
    }

    async fn fetch_once(&self, url: &str) -> Result<MetadataDocument, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(transport)?;
        parse_metadata(&body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl MetadataResolver for HttpResolver {
    async fn resolve(&self, logical_name: &str) -> Result<MetadataDocument, FetchError> {
        let url = self.metadata_url(logical_name);
        let mut attempt = 1;
        loop {
            match self.fetch_once(&url).await {
                Ok(doc) => return Ok(doc),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    tracing::debug!(%url, attempt, error = %e, "retrying metadata fetch");
                    attempt += 1;
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "metadata fetch failed");
                    return Err(e);
                }
            }
        }
    }
}
