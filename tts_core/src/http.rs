//! Backend that proxies an OpenAI-compatible speech endpoint
//! (Kokoro-FastAPI and friends) and streams raw PCM back.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header, Client};
use serde::Serialize;

use crate::{stream::PcmAssembler, AudioChunk, ChunkStream, TtsBackend};

const SPEECH_PATH: &str = "/v1/audio/speech";

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Rate of the PCM the endpoint returns. The wire format carries no header.
    pub sample_rate: u32,
    /// Readiness probe run by [`HttpBackend::connect`]. `None` skips it.
    pub health_path: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8880".to_string(),
            model: "kokoro".to_string(),
            api_key: None,
            sample_rate: 24_000,
            health_path: Some("/health".to_string()),
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
    stream: bool,
}

pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
    name: String,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> anyhow::Result<Self> {
        if config.sample_rate == 0 {
            anyhow::bail!("TTS sample rate must be positive");
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONNECTION, header::HeaderValue::from_static("keep-alive"));
        if let Some(key) = &config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .context("TTS API key is not a valid header value")?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Some(Duration::from_secs(5)))
            .tcp_nodelay(true)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .default_headers(headers)
            .build()
            .context("failed to build TTS HTTP client")?;

        let name = format!("http:{}", config.model);
        Ok(Self { client, config, name })
    }

    /// Build the client and run the readiness probe.
    pub async fn connect(config: HttpBackendConfig) -> anyhow::Result<Self> {
        let backend = Self::new(config)?;
        backend.probe().await?;
        Ok(backend)
    }

    pub async fn probe(&self) -> anyhow::Result<()> {
        let Some(path) = self.config.health_path.as_deref() else {
            return Ok(());
        };
        let url = self.url(path);
        tracing::debug!("probing TTS endpoint at {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("TTS endpoint {url} unreachable"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("TTS endpoint {url} not ready ({status})");
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl TtsBackend for HttpBackend {
    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> anyhow::Result<ChunkStream> {
        let url = self.url(SPEECH_PATH);
        tracing::debug!(
            "TTS request: model={}, voice={}, speed={}, input_len={}",
            self.config.model,
            voice,
            speed,
            text.len()
        );

        let body = SpeechRequest {
            model: &self.config.model,
            input: text,
            voice,
            speed,
            response_format: "pcm",
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to send request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("TTS endpoint returned {status}: {error_text}");
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let chunks = async_stream::stream! {
            let mut assembler = PcmAssembler::default();
            while let Some(block) = bytes.next().await {
                match block {
                    Ok(block) => {
                        let chunk = assembler.push(&block);
                        if !chunk.is_empty() {
                            yield Ok::<AudioChunk, anyhow::Error>(chunk);
                        }
                    }
                    Err(e) => {
                        yield Err(anyhow::Error::new(e).context("TTS response stream broke"));
                        return;
                    }
                }
            }
            if assembler.has_remainder() {
                tracing::warn!("TTS response ended mid-sample, dropping trailing byte");
            }
        };

        Ok(Box::pin(chunks))
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn name(&self) -> &str {
        &self.name
    }
}
