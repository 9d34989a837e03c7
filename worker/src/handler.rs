use std::{panic::AssertUnwindSafe, sync::Arc, time::Instant};

use blob_core::BlobStore;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{error, info};
use tts_core::{drain_chunks, AudioFormat};

use crate::{
    config::{OutputMode, WorkerConfig},
    error::{JobError, NO_AUDIO},
    lifecycle::BackendLifecycle,
    output::{deliver, EncodedAudio, JobOutput, JobResponse},
    validation::{parse_job_input, InputRules},
};

const PREVIEW_CHARS: usize = 60;

/// Turns one job payload into one job response.
pub struct JobHandler {
    lifecycle: Arc<BackendLifecycle>,
    blob_store: Option<Arc<dyn BlobStore>>,
    output_mode: OutputMode,
    audio_format: AudioFormat,
    rules: InputRules,
}

impl JobHandler {
    pub fn new(
        lifecycle: Arc<BackendLifecycle>,
        blob_store: Option<Arc<dyn BlobStore>>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            lifecycle,
            blob_store,
            output_mode: config.output_mode,
            audio_format: config.audio_format,
            rules: InputRules {
                default_voice: config.default_voice.clone(),
                max_text_length: config.max_text_length,
            },
        }
    }

    pub fn lifecycle(&self) -> &BackendLifecycle {
        &self.lifecycle
    }

    /// Never fails: every error, and any panic from a backend, becomes `{error}`.
    pub async fn handle(&self, job: &Value) -> JobResponse {
        let job_id = job
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        info!("Handler start: job {job_id}");
        let started = Instant::now();

        let result = AssertUnwindSafe(self.run(job, &job_id))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(JobError::Internal(panic_message(panic.as_ref()))));

        match result {
            Ok(output) => {
                info!(
                    "Job {job_id} done: {} bytes, {} ms audio, {:.2}s",
                    output.length_bytes,
                    output.duration_ms,
                    started.elapsed().as_secs_f64()
                );
                JobResponse::Output { output }
            }
            Err(e) => {
                let error = e.describe();
                error!("Job {job_id} failed: {error}");
                JobResponse::Error { error }
            }
        }
    }

    async fn run(&self, job: &Value, job_id: &str) -> Result<JobOutput, JobError> {
        let request = parse_job_input(job, &self.rules)?;
        info!(
            "Gen: {}... | voice: {} | speed: {}",
            preview(&request.text),
            request.voice,
            request.speed
        );

        let backend = self.lifecycle.get_backend().await?;

        let stream = backend
            .synthesize(&request.text, &request.voice, request.speed)
            .await
            .map_err(JobError::synthesis)?;
        let drained = drain_chunks(stream).await.map_err(JobError::synthesis)?;
        if drained.chunks == 0 || drained.samples.is_empty() {
            return Err(JobError::Synthesis(NO_AUDIO.to_string()));
        }

        let sample_rate = backend.sample_rate();
        let bytes = tts_core::encode(&drained.samples, sample_rate, self.audio_format)
            .map_err(JobError::Encoding)?;

        let audio = EncodedAudio {
            bytes,
            format: self.audio_format,
            sample_rate,
            duration_ms: drained.duration_ms(sample_rate),
        };
        Ok(deliver(audio, self.output_mode, self.blob_store.as_deref(), job_id).await)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_is_char_bounded() {
        let text = "ü".repeat(100);
        assert_eq!(preview(&text).chars().count(), 60);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert!(panic_message(boxed.as_ref()).contains("non-string"));
    }
}
