//! Shapes returned to the hosting runtime, and delivery of the encoded audio.

use base64::{engine::general_purpose, Engine as _};
use blob_core::BlobStore;
use serde::Serialize;
use tracing::{info, warn};
use tts_core::AudioFormat;

use crate::config::OutputMode;

/// Exactly one of `{output}` or `{error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobResponse {
    Output { output: JobOutput },
    Error { error: String },
}

impl JobResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, JobResponse::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Success,
    /// Blob upload failed, audio returned inline instead.
    FallbackInline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutput {
    pub status: OutputStatus,
    #[serde(flatten)]
    pub delivery: Delivery,
    pub length_bytes: usize,
    pub format: String,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Delivery {
    Inline {
        audio_b64: String,
    },
    Uploaded {
        playable_url: String,
        file_name: String,
        size_mb: f64,
    },
    Fallback {
        audio_b64: String,
        azure_error: String,
    },
}

/// Encoded audio plus what callers need to interpret it.
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

/// Return the audio inline, or park it in blob storage and fall back to inline if that fails.
pub async fn deliver(
    audio: EncodedAudio,
    mode: OutputMode,
    store: Option<&dyn BlobStore>,
    job_id: &str,
) -> JobOutput {
    let length_bytes = audio.bytes.len();
    let (status, delivery) = match mode {
        OutputMode::Inline => (
            OutputStatus::Success,
            Delivery::Inline {
                audio_b64: general_purpose::STANDARD.encode(&audio.bytes),
            },
        ),
        OutputMode::Blob => {
            let file_name = blob_name(job_id, audio.format, chrono::Utc::now().timestamp_millis());
            match upload(store, &file_name, &audio).await {
                Ok(playable_url) => {
                    info!("Uploaded {file_name}");
                    (
                        OutputStatus::Success,
                        Delivery::Uploaded {
                            playable_url,
                            file_name,
                            size_mb: size_mb(length_bytes),
                        },
                    )
                }
                Err(e) => {
                    let azure_error = format!("{e:#}");
                    warn!("Upload failed, returning audio inline: {azure_error}");
                    (
                        OutputStatus::FallbackInline,
                        Delivery::Fallback {
                            audio_b64: general_purpose::STANDARD.encode(&audio.bytes),
                            azure_error,
                        },
                    )
                }
            }
        }
    };

    JobOutput {
        status,
        delivery,
        length_bytes,
        format: audio.format.to_string(),
        sample_rate: audio.sample_rate,
        duration_ms: audio.duration_ms,
    }
}

async fn upload(store: Option<&dyn BlobStore>, file_name: &str, audio: &EncodedAudio) -> anyhow::Result<String> {
    let store = store.ok_or_else(|| {
        anyhow::anyhow!("blob storage is not configured (set AZURE_STORAGE_CONNECTION_STRING)")
    })?;
    store
        .upload(file_name, audio.bytes.clone(), audio.format.content_type())
        .await
}

/// `{job_id}_{unix_millis}.{ext}` with anything outside `[A-Za-z0-9_-]` in the id replaced.
pub fn blob_name(job_id: &str, format: AudioFormat, unix_millis: i64) -> String {
    let id: String = job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{id}_{unix_millis}.{}", format.extension())
}

fn size_mb(bytes: usize) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 1000.0).round() / 1000.0
}
