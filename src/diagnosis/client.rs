use std::{future::Future, time::Duration};

use anyhow::{bail, Context};
use axum::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DiagnosisConfig;

const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Image forwarded to the inference service as the `file` form field.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub body: Bytes,
    pub file_name: String,
    pub content_type: String,
}

/// Boundary to the external image-classification service. Responses are
/// opaque JSON handed back to the caller unchanged.
#[async_trait]
pub trait DiagnosisClient: Send + Sync {
    async fn conditions(&self) -> anyhow::Result<Value>;
    async fn health(&self) -> anyhow::Result<Value>;
    async fn predict(&self, image: ImageUpload) -> anyhow::Result<Value>;
}

#[derive(Clone)]
pub struct HttpDiagnosisClient {
    http: Client,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl HttpDiagnosisClient {
    pub fn new(config: &DiagnosisConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build diagnosis HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Runs `send` until it succeeds, the error is not transient, or the retry
    /// budget is spent. Timeouts, connect errors and 5xx are transient; the
    /// delay grows linearly with the attempt number.
    async fn with_retry<F, Fut>(&self, what: &str, mut send: F) -> anyhow::Result<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = send().await;
            let transient = match &outcome {
                Ok(resp) => resp.status().is_server_error(),
                Err(e) => e.is_timeout() || e.is_connect(),
            };
            if transient && attempt < self.max_retries {
                attempt += 1;
                warn!(%what, attempt, "diagnosis call failed, retrying");
                tokio::time::sleep(self.backoff * attempt).await;
                continue;
            }

            let resp = outcome.with_context(|| format!("{what} request failed"))?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                let snippet: String = text.chars().take(300).collect();
                bail!("{what} returned {status}: {snippet}");
            }
            debug!(%what, attempts = attempt + 1, "diagnosis call succeeded");
            return resp
                .json::<Value>()
                .await
                .with_context(|| format!("{what} returned invalid JSON"));
        }
    }
}

#[async_trait]
impl DiagnosisClient for HttpDiagnosisClient {
    async fn conditions(&self) -> anyhow::Result<Value> {
        let url = self.url("/api/conditions");
        let http = &self.http;
        self.with_retry("GET /api/conditions", || http.get(&url).send())
            .await
    }

    async fn health(&self) -> anyhow::Result<Value> {
        let url = self.url("/health");
        let http = &self.http;
        self.with_retry("GET /health", || http.get(&url).send()).await
    }

    async fn predict(&self, image: ImageUpload) -> anyhow::Result<Value> {
        let url = self.url("/api/predict");
        let http = &self.http;
        let url = &url;
        let image = &image;
        // multipart::Form is consumed by send, so it is rebuilt per attempt.
        self.with_retry("POST /api/predict", || async move {
            let part = multipart::Part::stream(image.body.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.content_type)?;
            let form = multipart::Form::new().part("file", part);
            http.post(url).multipart(form).send().await
        })
        .await
    }
}

#[cfg(test)]
pub use fake::FakeDiagnosisClient;

#[cfg(test)]
mod fake {
    use super::*;
    use serde_json::json;

    /// Canned responses; `healthy = false` makes every call fail.
    pub struct FakeDiagnosisClient {
        pub healthy: bool,
    }

    impl FakeDiagnosisClient {
        fn check(&self) -> anyhow::Result<()> {
            if !self.healthy {
                bail!("connection refused");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DiagnosisClient for FakeDiagnosisClient {
        async fn conditions(&self) -> anyhow::Result<Value> {
            self.check()?;
            Ok(json!({ "conditions": ["normal", "placenta_previa"] }))
        }

        async fn health(&self) -> anyhow::Result<Value> {
            self.check()?;
            Ok(json!({ "status": "healthy" }))
        }

        async fn predict(&self, image: ImageUpload) -> anyhow::Result<Value> {
            self.check()?;
            Ok(json!({
                "success": true,
                "prediction": "normal",
                "fileName": image.file_name,
                "size": image.body.len(),
            }))
        }
    }
}
