//! Local Piper voices.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};

use crate::{paths::read_sample_rate, stream::blocking_stream, AudioChunk, ChunkStream, TtsBackend};

// Chunks buffered between the inference thread and the consumer.
const CHANNEL_DEPTH: usize = 8;

pub struct PiperBackend {
    synth: Arc<PiperSpeechSynthesizer>,
    sample_rate: u32,
    name: String,
}

// Manual Debug implementation since PiperSpeechSynthesizer doesn't implement Debug
impl std::fmt::Debug for PiperBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiperBackend")
            .field("synth", &"<PiperSpeechSynthesizer>")
            .field("sample_rate", &self.sample_rate)
            .field("name", &self.name)
            .finish()
    }
}

impl PiperBackend {
    /// Load the voice described by `cfg_path`. Blocks while the ONNX session is built.
    pub fn load<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<Self> {
        let cfg_path = cfg_path.as_ref();
        let sample_rate = read_sample_rate(cfg_path)?;
        let model = piper_rs::from_config_path(cfg_path)
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = PiperSpeechSynthesizer::new(model)?;

        let name = cfg_path
            .file_name()
            .map(|n| format!("piper:{}", n.to_string_lossy()))
            .unwrap_or_else(|| "piper".to_string());

        Ok(Self {
            synth: Arc::new(synth),
            sample_rate,
            name,
        })
    }
}

#[async_trait]
impl TtsBackend for PiperBackend {
    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> anyhow::Result<ChunkStream> {
        // A Piper model is a single voice with its length scale baked into the config.
        tracing::debug!("{} ignores voice '{}'", self.name, voice);
        if (speed - 1.0).abs() > f32::EPSILON {
            tracing::warn!("{} does not support speed {speed}, using the model default", self.name);
        }

        let synth = Arc::clone(&self.synth);
        let text = text.to_string();

        Ok(blocking_stream(CHANNEL_DEPTH, move |tx| {
            let iter: PiperSpeechStreamParallel = match synth.synthesize_parallel(text, None) {
                Ok(iter) => iter,
                Err(e) => {
                    let _ = tx.blocking_send(Err(anyhow::anyhow!("piper synth error: {e}")));
                    return;
                }
            };
            for part in iter {
                let item = part
                    .map(|p| AudioChunk::new(p.into_vec()))
                    .map_err(|e| anyhow::anyhow!("chunk error: {e}"));
                let failed = item.is_err();
                // Receiver gone means the job was dropped.
                if tx.blocking_send(item).is_err() || failed {
                    return;
                }
            }
        }))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.name
    }
}
