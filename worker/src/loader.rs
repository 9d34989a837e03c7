use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use blob_core::{AzureBlobStore, AzureBlobStoreConfig, BlobStore, ConnectionString};
use tts_core::{paths::ModelLocator, HttpBackend, HttpBackendConfig, TtsBackend};

use crate::{
    config::{BackendConfig, BlobConfig},
    lifecycle::BackendLoader,
};

/// Loader for the configured backend kind.
pub fn loader_for(config: &BackendConfig) -> Arc<dyn BackendLoader> {
    match config {
        BackendConfig::Http(http) => Arc::new(HttpLoader { config: http.clone() }),
        BackendConfig::Piper(locator) => Arc::new(PiperLoader {
            locator: locator.clone(),
        }),
    }
}

/// Blob store for uploads, if a connection string is configured.
/// A malformed connection string is a startup error.
pub fn blob_store_for(config: &BlobConfig) -> anyhow::Result<Option<Arc<dyn BlobStore>>> {
    let Some(raw) = &config.connection_string else {
        return Ok(None);
    };
    let connection: ConnectionString = raw.parse().context("invalid AZURE_STORAGE_CONNECTION_STRING")?;
    let store = AzureBlobStore::new(AzureBlobStoreConfig {
        connection,
        container: config.container.clone(),
        read_expiry: Duration::from_secs(config.read_expiry_secs),
        timeout: Duration::from_secs(config.timeout_secs),
    })?;
    Ok(Some(Arc::new(store)))
}

pub struct HttpLoader {
    config: HttpBackendConfig,
}

#[async_trait]
impl BackendLoader for HttpLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn TtsBackend>> {
        let backend = HttpBackend::connect(self.config.clone()).await?;
        Ok(Arc::new(backend))
    }

    fn describe(&self) -> String {
        format!("{} (model {})", self.config.base_url, self.config.model)
    }
}

pub struct PiperLoader {
    locator: ModelLocator,
}

#[async_trait]
impl BackendLoader for PiperLoader {
    #[cfg(feature = "piper")]
    async fn load(&self) -> anyhow::Result<Arc<dyn TtsBackend>> {
        let cfg_path = self.locator.resolve()?;
        tracing::info!("Loading Piper voice from {}", cfg_path.display());
        // ONNX session setup blocks for seconds
        let backend = tokio::task::spawn_blocking(move || tts_core::PiperBackend::load(cfg_path))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {e}"))??;
        Ok(Arc::new(backend))
    }

    #[cfg(not(feature = "piper"))]
    async fn load(&self) -> anyhow::Result<Arc<dyn TtsBackend>> {
        anyhow::bail!("this worker was built without Piper support (enable the `piper` feature)")
    }

    fn describe(&self) -> String {
        match (&self.locator.explicit, &self.locator.file_name) {
            (Some(path), _) => format!("piper {}", path.display()),
            (None, Some(name)) => format!("piper {name}"),
            (None, None) => "piper <unconfigured>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_describe() {
        let http = loader_for(&BackendConfig::Http(HttpBackendConfig::default()));
        assert_eq!(http.describe(), "http://127.0.0.1:8880 (model kokoro)");

        let piper = loader_for(&BackendConfig::Piper(ModelLocator {
            explicit: Some(PathBuf::from("/models/voice.onnx.json")),
            ..Default::default()
        }));
        assert_eq!(piper.describe(), "piper /models/voice.onnx.json");
    }

    fn blob_config(connection_string: Option<&str>) -> BlobConfig {
        BlobConfig {
            connection_string: connection_string.map(str::to_string),
            container: "tts-output".to_string(),
            read_expiry_secs: 3600,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_blob_store_optional() {
        assert!(blob_store_for(&blob_config(None)).unwrap().is_none());

        let store = blob_store_for(&blob_config(Some(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;EndpointSuffix=core.windows.net",
        )))
        .unwrap()
        .expect("store configured");
        assert_eq!(store.name(), "azure");
    }

    #[test]
    fn test_malformed_connection_string_is_an_error() {
        let err = blob_store_for(&blob_config(Some("AccountName=acct"))).err().expect("rejected");
        assert!(format!("{err:#}").contains("AZURE_STORAGE_CONNECTION_STRING"));
    }

    #[tokio::test]
    async fn test_unreachable_http_backend_fails_to_load() {
        let loader = loader_for(&BackendConfig::Http(HttpBackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        }));
        assert!(loader.load().await.is_err());
    }

    #[tokio::test]
    async fn test_unresolvable_piper_model_fails_to_load() {
        let loader = loader_for(&BackendConfig::Piper(ModelLocator {
            explicit: None,
            file_name: Some("missing.onnx.json".to_string()),
            search_dirs: vec![PathBuf::from("/nonexistent")],
        }));
        assert!(loader.load().await.is_err());
    }
}
