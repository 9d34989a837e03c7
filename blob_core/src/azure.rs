use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::{sas::BlobSas, BlobStore, ConnectionString};

// Allowance for clock drift between this host and the storage service.
const START_SKEW_SECS: i64 = 300;
// The write token only has to outlive a single PUT.
const WRITE_SAS_SECS: i64 = 900;

#[derive(Debug, Clone)]
pub struct AzureBlobStoreConfig {
    pub connection: ConnectionString,
    pub container: String,
    /// Lifetime of the read URL handed back to callers.
    pub read_expiry: Duration,
    pub timeout: Duration,
}

/// Azure Blob Storage, authenticated with SAS tokens signed from the account key.
pub struct AzureBlobStore {
    client: Client,
    config: AzureBlobStoreConfig,
}

impl AzureBlobStore {
    pub fn new(config: AzureBlobStoreConfig) -> anyhow::Result<Self> {
        if config.container.trim().is_empty() {
            anyhow::bail!("blob container name is empty");
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build blob storage HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn container(&self) -> &str {
        &self.config.container
    }

    fn blob_url(&self, blob: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.connection.blob_endpoint, self.config.container, blob
        )
    }

    fn protocol(&self) -> &'static str {
        if self.config.connection.blob_endpoint.starts_with("https://") {
            "https"
        } else {
            "https,http"
        }
    }

    fn signed_url(&self, blob: &str, permissions: &str, now: DateTime<Utc>, lifetime_secs: i64) -> anyhow::Result<String> {
        let sas = BlobSas {
            account: &self.config.connection.account_name,
            container: &self.config.container,
            blob,
            permissions,
            start: Some(now - chrono::Duration::seconds(START_SKEW_SECS)),
            expiry: now + chrono::Duration::seconds(lifetime_secs),
            protocol: Some(self.protocol()),
        };
        let query = sas.query(&self.config.connection.account_key)?;
        Ok(format!("{}?{}", self.blob_url(blob), query))
    }

    /// Read-only URL for `blob`, valid for the configured read lifetime from `now`.
    pub fn read_url(&self, blob: &str, now: DateTime<Utc>) -> anyhow::Result<String> {
        let lifetime = i64::try_from(self.config.read_expiry.as_secs()).unwrap_or(i64::MAX / 2);
        self.signed_url(blob, "r", now, lifetime)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let now = Utc::now();
        let put_url = self.signed_url(name, "cw", now, WRITE_SAS_SECS)?;
        let size = bytes.len();

        tracing::debug!("uploading {} ({} bytes) to container {}", name, size, self.config.container);

        let response = self
            .client
            .put(&put_url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", crate::sas::SAS_VERSION)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("blob upload of {name} failed to send"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("blob upload of {name} rejected ({status}): {error_text}");
        }

        tracing::info!("uploaded {} ({} bytes)", name, size);
        self.read_url(name, now)
    }

    fn name(&self) -> &str {
        "azure"
    }
}
