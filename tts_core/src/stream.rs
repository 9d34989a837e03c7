//! Streaming synthesis helpers.
//!
//! Backends hand out their audio as a stream of [`AudioChunk`]s. The worker
//! never returns partial audio, so everything here drains a stream to the end
//! before the caller sees any samples.

use futures_util::StreamExt;

use crate::{AudioChunk, ChunkStream};

/// Everything a synthesis stream produced, concatenated in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drained {
    pub samples: Vec<f32>,
    pub chunks: usize,
}

impl Drained {
    pub fn duration_ms(&self, sample_rate: u32) -> u64 {
        if sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / sample_rate as u64
    }
}

/// Pull every chunk out of `stream`. The first failing item aborts the drain.
pub async fn drain_chunks(mut stream: ChunkStream) -> anyhow::Result<Drained> {
    let mut drained = Drained::default();
    while let Some(item) = stream.next().await {
        let chunk = item.map_err(|e| e.context(format!("chunk {} failed", drained.chunks)))?;
        drained.samples.extend(chunk.samples);
        drained.chunks += 1;
    }
    Ok(drained)
}

/// Sending half of a [`blocking_stream`].
#[cfg(feature = "blocking")]
pub type ChunkSender = tokio::sync::mpsc::Sender<anyhow::Result<AudioChunk>>;

/// Run `produce` on the blocking pool and stream what it sends.
///
/// The stream ends once `produce` returns and drops its sender. If it panics
/// instead, the stream yields an error after the last chunk it managed to send,
/// so a crashed inference thread never looks like a short, complete result.
#[cfg(feature = "blocking")]
pub fn blocking_stream<F>(depth: usize, produce: F) -> ChunkStream
where
    F: FnOnce(ChunkSender) + Send + 'static,
{
    let (tx, mut rx) = tokio::sync::mpsc::channel(depth);
    let worker = tokio::task::spawn_blocking(move || produce(tx));

    Box::pin(async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
        if let Err(e) = worker.await {
            yield Err(anyhow::anyhow!("inference thread panicked: {e}"));
        }
    })
}

/// Reassembles 16-bit little-endian PCM from arbitrarily split byte blocks.
#[derive(Debug, Default)]
pub(crate) struct PcmAssembler {
    carry: Option<u8>,
}

impl PcmAssembler {
    /// Convert `bytes` into a chunk, holding back a dangling odd byte for the next call.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> AudioChunk {
        let mut samples = Vec::with_capacity(bytes.len() / 2 + 1);
        let mut rest = bytes;

        if let Some(lo) = self.carry.take() {
            match rest.split_first() {
                Some((&hi, tail)) => {
                    samples.push(pcm_to_f32(lo, hi));
                    rest = tail;
                }
                None => {
                    self.carry = Some(lo);
                    return AudioChunk::default();
                }
            }
        }

        let mut pairs = rest.chunks_exact(2);
        for pair in &mut pairs {
            samples.push(pcm_to_f32(pair[0], pair[1]));
        }
        if let [odd] = pairs.remainder() {
            self.carry = Some(*odd);
        }

        AudioChunk::new(samples)
    }

    /// True when a half sample is still pending.
    pub(crate) fn has_remainder(&self) -> bool {
        self.carry.is_some()
    }
}

fn pcm_to_f32(lo: u8, hi: u8) -> f32 {
    i16::from_le_bytes([lo, hi]) as f32 / 32768.0
}
