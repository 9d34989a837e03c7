//! Fakes shared by the worker integration tests

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use blob_core::BlobStore;
use tts_core::{AudioChunk, ChunkStream, TtsBackend};
use worker::{
    config::{OutputMode, WorkerConfig},
    runtime, BackendLifecycle, BackendLoader, JobHandler,
};

pub const SAMPLE_RATE: u32 = 24_000;

/// What the fake backend does for every synthesis call.
#[derive(Clone)]
pub enum Script {
    Chunks(Vec<Vec<f32>>),
    /// Yields the first chunk, then fails.
    FailMidStream,
    Panic,
}

pub struct FakeBackend {
    pub script: Script,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TtsBackend for FakeBackend {
    async fn synthesize(&self, _text: &str, _voice: &str, _speed: f32) -> anyhow::Result<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items: Vec<anyhow::Result<AudioChunk>> = match &self.script {
            Script::Chunks(chunks) => chunks.iter().cloned().map(|c| Ok(AudioChunk::new(c))).collect(),
            Script::FailMidStream => vec![
                Ok(AudioChunk::new(vec![0.1; 4])),
                Err(anyhow::anyhow!("CUDA out of memory")),
            ],
            Script::Panic => panic!("voice tensor missing"),
        };
        Ok(Box::pin(futures_util::stream::iter(items)))
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Counts loads; fails the first `failures` of them.
pub struct FakeLoader {
    pub script: Script,
    pub failures: usize,
    pub delay: Duration,
    pub loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(script: Script) -> Arc<Self> {
        Self::failing(script, 0)
    }

    pub fn failing(script: Script, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            script,
            failures,
            delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendLoader for FakeLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn TtsBackend>> {
        let n = self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if n < self.failures {
            anyhow::bail!("RuntimeError: model weights not found");
        }
        Ok(Arc::new(FakeBackend {
            script: self.script.clone(),
            calls: AtomicUsize::new(0),
        }))
    }

    fn describe(&self) -> String {
        "fake loader".to_string()
    }
}

/// Records uploads; optionally refuses them.
pub struct FakeStore {
    pub fail: bool,
    pub uploads: Mutex<Vec<(String, usize)>>,
}

impl FakeStore {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            uploads: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BlobStore for FakeStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<String> {
        self.uploads.lock().unwrap().push((name.to_string(), bytes.len()));
        if self.fail {
            anyhow::bail!("403 Forbidden: AuthenticationFailed");
        }
        Ok(format!("https://acct.blob.core.windows.net/tts-output/{name}?sp=r&sig=abc"))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn three_chunks() -> Script {
    Script::Chunks(vec![vec![0.1; 100], vec![0.2; 50], vec![-0.3; 25]])
}

pub fn create_handler(
    loader: Arc<FakeLoader>,
    store: Option<Arc<FakeStore>>,
    output_mode: OutputMode,
) -> Arc<JobHandler> {
    let config = WorkerConfig {
        output_mode,
        ..WorkerConfig::default()
    };
    let lifecycle = Arc::new(BackendLifecycle::new(loader));
    let store = store.map(|s| s as Arc<dyn BlobStore>);
    Arc::new(JobHandler::new(lifecycle, store, &config))
}

/// Create a test app instance around an inline-output handler
pub fn create_test_app(loader: Arc<FakeLoader>) -> Router {
    runtime::http::router(
        create_handler(loader, None, OutputMode::Inline),
        Duration::from_secs(30),
    )
}
