//! Process-wide TTS backend.
//!
//! The backend is built lazily on the first job and then shared by every job
//! the process serves. Concurrent first calls wait on a single load; a failed
//! load leaves the slot empty so the next job tries again.

use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Instant,
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};
use tts_core::TtsBackend;

use crate::error::JobError;

/// Builds and loads a backend. Runs at most once per successful initialization.
#[async_trait]
pub trait BackendLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<Arc<dyn TtsBackend>>;

    /// Human-readable target, e.g. a model path or endpoint URL.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    /// Last load failed. Retried exactly like `Uninitialized`.
    Failed,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::Initializing,
            2 => Phase::Ready,
            3 => Phase::Failed,
            _ => Phase::Uninitialized,
        }
    }
}

pub struct BackendLifecycle {
    loader: Arc<dyn BackendLoader>,
    slot: OnceCell<Arc<dyn TtsBackend>>,
    phase: AtomicU8,
}

impl BackendLifecycle {
    pub fn new(loader: Arc<dyn BackendLoader>) -> Self {
        Self {
            loader,
            slot: OnceCell::new(),
            phase: AtomicU8::new(Phase::Uninitialized as u8),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// The shared backend, loading it first if no load has succeeded yet.
    pub async fn get_backend(&self) -> Result<Arc<dyn TtsBackend>, JobError> {
        if let Some(backend) = self.slot.get() {
            return Ok(Arc::clone(backend));
        }
        let backend = self
            .slot
            .get_or_try_init(|| self.initialize())
            .await
            .map_err(JobError::Initialization)?;
        Ok(Arc::clone(backend))
    }

    /// Eager load at process start. Failure is logged and left for the first job to retry.
    pub async fn warm_up(&self) {
        if let Err(e) = self.get_backend().await {
            warn!("Backend warm-up failed, will retry on first job: {e}");
        }
    }

    async fn initialize(&self) -> anyhow::Result<Arc<dyn TtsBackend>> {
        let mut guard = PhaseGuard::enter(&self.phase);
        let target = self.loader.describe();
        info!("Backend load start: {target}");
        let started = Instant::now();

        match self.loader.load().await {
            Ok(backend) => {
                guard.finish(Phase::Ready);
                info!(
                    "Backend loaded OK: {} ({} Hz) in {:.2}s",
                    backend.name(),
                    backend.sample_rate(),
                    started.elapsed().as_secs_f64()
                );
                Ok(backend)
            }
            Err(e) => {
                guard.finish(Phase::Failed);
                error!("Backend load failed for {target}: {e:#}");
                Err(e)
            }
        }
    }
}

/// Marks the phase `Initializing` and rolls it back if the load future is dropped midway.
struct PhaseGuard<'a> {
    phase: &'a AtomicU8,
    done: bool,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a AtomicU8) -> Self {
        phase.store(Phase::Initializing as u8, Ordering::Release);
        Self { phase, done: false }
    }

    fn finish(&mut self, outcome: Phase) {
        self.phase.store(outcome as u8, Ordering::Release);
        self.done = true;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.phase.store(Phase::Uninitialized as u8, Ordering::Release);
        }
    }
}
