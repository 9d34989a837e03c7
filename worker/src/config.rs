// Worker configuration, read once from the environment at startup

use std::{path::PathBuf, str::FromStr, time::Duration};

use tts_core::{paths::ModelLocator, AudioFormat, HttpBackendConfig};

pub const DEFAULT_VOICE: &str = "af_bella";

/// Where finished audio goes. Chosen per worker, never per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Inline,
    Blob,
}

impl FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" | "base64" => Ok(OutputMode::Inline),
            "blob" | "azure" => Ok(OutputMode::Blob),
            other => Err(anyhow::anyhow!("unknown OUTPUT_MODE '{other}' (expected inline or blob)")),
        }
    }
}

/// How jobs reach this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Local HTTP endpoint, one request per job.
    Http,
    /// Poll a remote job queue.
    Queue,
}

impl FromStr for WorkerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "local" => Ok(WorkerMode::Http),
            "queue" | "serverless" => Ok(WorkerMode::Queue),
            other => Err(anyhow::anyhow!("unknown WORKER_MODE '{other}' (expected http or queue)")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    Http(HttpBackendConfig),
    Piper(ModelLocator),
}

#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Raw connection string; parsed when the store is built.
    pub connection_string: Option<String>,
    pub container: String,
    pub read_expiry_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Job fetch URL, `$ID` is replaced by the worker id.
    pub get_job_url: String,
    /// Result URL, `$ID` is replaced by the job id.
    pub post_output_url: String,
    pub worker_id: String,
    pub api_key: Option<String>,
    pub idle_sleep_ms: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub port: u16,
    pub mode: WorkerMode,
    pub job_timeout_secs: u64,
    pub output_mode: OutputMode,
    pub audio_format: AudioFormat,
    pub max_text_length: usize,
    pub default_voice: String,
    pub warmup_on_start: bool,
    pub backend: BackendConfig,
    pub blob: BlobConfig,
    pub queue: Option<QueueConfig>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            mode: WorkerMode::Http,
            job_timeout_secs: 1800,
            output_mode: OutputMode::Inline,
            audio_format: AudioFormat::Wav,
            max_text_length: 5000,
            default_voice: DEFAULT_VOICE.to_string(),
            warmup_on_start: false,
            backend: BackendConfig::Http(HttpBackendConfig::default()),
            blob: BlobConfig {
                connection_string: None,
                container: "tts-output".to_string(),
                read_expiry_secs: 3600,
                timeout_secs: 120,
            },
            queue: None,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let num = |key: &str, default: u64| -> u64 {
            get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };
        let defaults = Self::default();

        let port = get("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port);
        let job_timeout_secs = num("JOB_TIMEOUT_SECS", defaults.job_timeout_secs);

        let output_mode = match get("OUTPUT_MODE") {
            Some(v) => v.parse()?,
            None => defaults.output_mode,
        };
        let audio_format = match get("AUDIO_FORMAT") {
            Some(v) => v.parse()?,
            None => defaults.audio_format,
        };
        let max_text_length = num("MAX_TEXT_LENGTH", defaults.max_text_length as u64) as usize;
        let default_voice = get("DEFAULT_VOICE").unwrap_or(defaults.default_voice);
        let warmup_on_start = get("WARMUP_ON_START")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let backend = match get("TTS_BACKEND").map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("http") | Some("kokoro") => {
                let http = HttpBackendConfig::default();
                BackendConfig::Http(HttpBackendConfig {
                    base_url: get("TTS_BASE_URL").unwrap_or(http.base_url),
                    model: get("TTS_MODEL").unwrap_or(http.model),
                    api_key: get("TTS_API_KEY"),
                    sample_rate: num("TTS_SAMPLE_RATE", http.sample_rate as u64) as u32,
                    // Blank disables the probe, so read the raw value here.
                    health_path: match lookup("TTS_HEALTH_PATH") {
                        Some(v) if v.trim().is_empty() => None,
                        Some(v) => Some(v.trim().to_string()),
                        None => http.health_path,
                    },
                    timeout: Duration::from_secs(num("TTS_TIMEOUT_SECS", http.timeout.as_secs())),
                })
            }
            Some("piper") => BackendConfig::Piper(ModelLocator {
                explicit: get("PIPER_CONFIG_PATH").map(PathBuf::from),
                file_name: get("PIPER_MODEL_NAME"),
                search_dirs: ModelLocator::dirs_from_list(
                    &get("PIPER_MODEL_DIRS").unwrap_or_else(|| "./models:/app/models".to_string()),
                ),
            }),
            Some(other) => anyhow::bail!("unknown TTS_BACKEND '{other}' (expected http or piper)"),
        };

        let blob = BlobConfig {
            connection_string: get("AZURE_STORAGE_CONNECTION_STRING"),
            container: get("AZURE_CONTAINER").unwrap_or(defaults.blob.container),
            read_expiry_secs: num("AZURE_SAS_EXPIRY_SECS", defaults.blob.read_expiry_secs),
            timeout_secs: num("AZURE_TIMEOUT_SECS", defaults.blob.timeout_secs),
        };

        let queue = get("RUNPOD_WEBHOOK_GET_JOB").map(|get_job_url| QueueConfig {
            get_job_url,
            post_output_url: get("RUNPOD_WEBHOOK_POST_OUTPUT").unwrap_or_default(),
            worker_id: get("RUNPOD_POD_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            api_key: get("RUNPOD_AI_API_KEY"),
            idle_sleep_ms: num("QUEUE_IDLE_SLEEP_MS", 1000),
        });

        let mode = match get("WORKER_MODE") {
            Some(v) => v.parse()?,
            None if queue.is_some() => WorkerMode::Queue,
            None => WorkerMode::Http,
        };
        if mode == WorkerMode::Queue {
            match &queue {
                None => anyhow::bail!("WORKER_MODE=queue needs RUNPOD_WEBHOOK_GET_JOB"),
                Some(q) if q.post_output_url.is_empty() => {
                    anyhow::bail!("WORKER_MODE=queue needs RUNPOD_WEBHOOK_POST_OUTPUT")
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            port,
            mode,
            job_timeout_secs,
            output_mode,
            audio_format,
            max_text_length,
            default_voice,
            warmup_on_start,
            backend,
            blob,
            queue,
        })
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}
