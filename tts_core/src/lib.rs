pub mod http;
pub mod paths;
#[cfg(feature = "piper")]
pub mod piper;
pub mod stream;
pub mod wav;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

pub use http::{HttpBackend, HttpBackendConfig};
#[cfg(feature = "piper")]
pub use piper::PiperBackend;
pub use stream::{drain_chunks, Drained};
pub use wav::{decode_wav, encode, AudioFormat};

/// One block of mono samples in `[-1.0, 1.0]`, in the order the backend produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Lazy, finite, non-restartable sequence of audio chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<AudioChunk>> + Send>>;

/// Speech synthesis backend shared by every job of a worker process.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Start synthesis. Errors raised before the first chunk are returned here,
    /// errors raised mid-stream surface as stream items.
    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> anyhow::Result<ChunkStream>;

    /// Sample rate of every chunk this backend produces.
    fn sample_rate(&self) -> u32;

    fn name(&self) -> &str;
}

