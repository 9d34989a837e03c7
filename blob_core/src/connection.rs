use std::str::FromStr;

use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};

/// Parsed `AZURE_STORAGE_CONNECTION_STRING`.
#[derive(Clone)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: Vec<u8>,
    /// Base URL blobs live under, without trailing slash.
    pub blob_endpoint: String,
}

// Keep the key out of logs.
impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl FromStr for ConnectionString {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut protocol = "https";
        let mut suffix = "core.windows.net";
        let mut account_name = None;
        let mut account_key = None;
        let mut blob_endpoint = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // AccountKey is base64 and may itself contain '='
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("malformed connection string segment '{part}'"))?;
            match key {
                "DefaultEndpointsProtocol" => protocol = value,
                "EndpointSuffix" => suffix = value,
                "AccountName" => account_name = Some(value),
                "AccountKey" => account_key = Some(value),
                "BlobEndpoint" => blob_endpoint = Some(value),
                _ => {}
            }
        }

        let account_name = account_name
            .ok_or_else(|| anyhow::anyhow!("connection string has no AccountName"))?
            .to_string();
        let account_key = general_purpose::STANDARD
            .decode(account_key.ok_or_else(|| anyhow::anyhow!("connection string has no AccountKey"))?)
            .context("AccountKey is not valid base64")?;
        let blob_endpoint = match blob_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("{protocol}://{account_name}.blob.{suffix}"),
        };

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }
}
