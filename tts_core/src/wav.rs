use std::{fmt, io::Cursor, str::FromStr};

use anyhow::Context;

/// Container the worker hands back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// 16-bit PCM mono RIFF/WAVE.
    #[default]
    Wav,
    /// Headerless 16-bit little-endian mono PCM.
    Pcm,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Pcm => "audio/L16",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(AudioFormat::Wav),
            "pcm" | "raw" => Ok(AudioFormat::Pcm),
            other => Err(anyhow::anyhow!(
                "unsupported audio format '{other}' (expected wav or pcm)"
            )),
        }
    }
}

const I16_MAX_F32: f32 = i16::MAX as f32;

/// Clamp and convert f32 [-1.0, 1.0] -> i16
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * I16_MAX_F32) as i16
}

/// Encode mono f32 samples into the requested container.
pub fn encode(samples: &[f32], sample_rate: u32, format: AudioFormat) -> anyhow::Result<Vec<u8>> {
    if sample_rate == 0 {
        anyhow::bail!("sample rate must be positive");
    }
    match format {
        AudioFormat::Wav => encode_wav(samples, sample_rate),
        AudioFormat::Pcm => Ok(encode_pcm(samples)),
    }
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).context("wav header write failed")?;
        for &s in samples {
            writer.write_sample(to_i16(s)).context("wav sample write failed")?;
        }
        writer.finalize().context("wav finalize failed")?;
    }

    Ok(cursor.into_inner())
}

fn encode_pcm(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        out.extend_from_slice(&to_i16(s).to_le_bytes());
    }
    out
}

/// Decode a 16-bit PCM WAV produced by [`encode`]. Returns the raw samples and the sample rate.
pub fn decode_wav(bytes: &[u8]) -> anyhow::Result<(Vec<i16>, u32)> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).context("not a WAV container")?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        anyhow::bail!(
            "expected 16-bit integer PCM, got {} bits {:?}",
            spec.bits_per_sample,
            spec.sample_format
        );
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("truncated WAV data")?;
    Ok((samples, spec.sample_rate))
}
