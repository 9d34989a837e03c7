//! Locating model files on disk.
//!
//! Worker images rarely agree on where the weights live, so a model is looked
//! up by an explicit path first and then by name under a list of directories.

use std::path::{Path, PathBuf};

/// Where to look for a model config file.
#[derive(Debug, Clone, Default)]
pub struct ModelLocator {
    /// Used as-is when set. A missing file is an error, not a reason to keep searching.
    pub explicit: Option<PathBuf>,
    /// File name searched for under each directory, e.g. `en_US-lessac-medium.onnx.json`.
    pub file_name: Option<String>,
    pub search_dirs: Vec<PathBuf>,
}

impl ModelLocator {
    /// Parse a `:`-separated directory list such as the one in `PIPER_MODEL_DIRS`.
    pub fn dirs_from_list(list: &str) -> Vec<PathBuf> {
        list.split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    pub fn resolve(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.explicit {
            if path.is_file() {
                return Ok(path.clone());
            }
            anyhow::bail!("model config {} does not exist", path.display());
        }

        let name = self
            .file_name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no model path or model name configured"))?;

        let mut tried = Vec::with_capacity(self.search_dirs.len());
        for dir in &self.search_dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                tracing::debug!("resolved model {} -> {}", name, candidate.display());
                return Ok(candidate);
            }
            tried.push(candidate);
        }

        Err(anyhow::anyhow!(
            "model '{}' not found; tried: {}",
            name,
            display_list(&tried)
        ))
    }
}

fn display_list(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<no search directories>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read `audio.sample_rate` from a Piper-style model config JSON.
pub fn read_sample_rate<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<u32> {
    use anyhow::Context;

    let text = std::fs::read_to_string(cfg_path.as_ref())
        .with_context(|| format!("Failed to read config file: {}", cfg_path.as_ref().display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

    let sample_rate = json
        .get("audio")
        .and_then(|a| a.get("sample_rate"))
        .and_then(|sr| sr.as_u64())
        .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

    u32::try_from(sample_rate).with_context(|| format!("sample rate {sample_rate} out of range"))
}
