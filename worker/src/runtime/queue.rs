//! Pull-based serving: take a job from the queue, handle it, post the result.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

use crate::{config::QueueConfig, handler::JobHandler, output::JobResponse};

const ID_PLACEHOLDER: &str = "$ID";

pub struct QueueClient {
    http: Client,
    config: QueueConfig,
}

impl QueueClient {
    pub fn new(config: QueueConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(key).context("RUNPOD_AI_API_KEY is not a valid header value")?,
            );
        }
        let http = Client::builder()
            .default_headers(headers)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build queue HTTP client")?;
        Ok(Self { http, config })
    }

    fn job_url(&self) -> String {
        self.config.get_job_url.replace(ID_PLACEHOLDER, &self.config.worker_id)
    }

    fn output_url(&self, job_id: &str) -> String {
        self.config.post_output_url.replace(ID_PLACEHOLDER, job_id)
    }

    /// Next job, or `None` when the queue is empty.
    pub async fn fetch_job(&self) -> anyhow::Result<Option<Value>> {
        let response = self
            .http
            .get(self.job_url())
            .send()
            .await
            .context("Job fetch request failed")?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response.text().await.context("Failed to read job body")?;
        if !status.is_success() {
            anyhow::bail!("Job fetch returned {status}: {body}");
        }
        if body.trim().is_empty() {
            return Ok(None);
        }

        let job: Value = serde_json::from_str(&body).context("Job body is not JSON")?;
        if job.is_null() {
            return Ok(None);
        }
        if job_id(&job).is_none() {
            anyhow::bail!("Job has no id: {body}");
        }
        Ok(Some(job))
    }

    pub async fn post_output(&self, job_id: &str, response: &JobResponse) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(self.output_url(job_id))
            .json(response)
            .send()
            .await
            .with_context(|| format!("Posting result for job {job_id} failed"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Result post for job {job_id} returned {status}: {body}");
        }
        Ok(())
    }

    fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.config.idle_sleep_ms)
    }
}

fn job_id(job: &Value) -> Option<&str> {
    job.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
}

/// Take and finish at most one job. Returns whether a job was handled.
pub async fn poll_once(client: &QueueClient, handler: &JobHandler) -> anyhow::Result<bool> {
    let Some(job) = client.fetch_job().await? else {
        return Ok(false);
    };
    let id = job_id(&job).unwrap_or_default().to_string();
    let response = handler.handle(&job).await;
    client.post_output(&id, &response).await?;
    info!("Job {id} reported ({})", if response.is_error() { "error" } else { "ok" });
    Ok(true)
}

/// Poll until Ctrl-C. Queue and network errors are logged and retried.
pub async fn run(handler: Arc<JobHandler>, config: QueueConfig) -> anyhow::Result<()> {
    let client = QueueClient::new(config)?;
    info!("Polling jobs from {}", client.job_url());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let sleep = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                return Ok(());
            }
            polled = poll_once(&client, &handler) => match polled {
                Ok(true) => None,
                Ok(false) => Some(client.idle_sleep()),
                Err(e) => {
                    warn!("Queue poll failed: {e:#}");
                    Some(client.idle_sleep())
                }
            },
        };
        if let Some(duration) = sleep {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> QueueClient {
        QueueClient::new(QueueConfig {
            get_job_url: "https://api.example/v2/ep/job-take/$ID?gpu=x".to_string(),
            post_output_url: "https://api.example/v2/ep/job-done/$ID".to_string(),
            worker_id: "pod-7".to_string(),
            api_key: Some("secret".to_string()),
            idle_sleep_ms: 10,
        })
        .unwrap()
    }

    #[test]
    fn test_url_placeholders() {
        let client = client();
        assert_eq!(client.job_url(), "https://api.example/v2/ep/job-take/pod-7?gpu=x");
        assert_eq!(client.output_url("job-42"), "https://api.example/v2/ep/job-done/job-42");
    }

    #[test]
    fn test_job_id() {
        assert_eq!(job_id(&serde_json::json!({"id": "a"})), Some("a"));
        assert_eq!(job_id(&serde_json::json!({"id": ""})), None);
        assert_eq!(job_id(&serde_json::json!({"input": {}})), None);
    }
}
