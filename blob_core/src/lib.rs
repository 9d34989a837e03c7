mod azure;
mod connection;
pub mod sas;

use async_trait::async_trait;

pub use azure::{AzureBlobStore, AzureBlobStoreConfig};
pub use connection::ConnectionString;

/// Somewhere finished audio can be parked and fetched back over HTTP.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name` and return a time-limited, read-only URL for it.
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}
