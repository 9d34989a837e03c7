use thiserror::Error;

/// Everything that can end a job early.
#[derive(Debug, Error)]
pub enum JobError {
    /// Empty text, unparsable speed, malformed job. The message is shown as-is.
    #[error("{0}")]
    Input(String),

    #[error("{0:#}")]
    Initialization(anyhow::Error),

    #[error("{0}")]
    Synthesis(String),

    #[error("{0:#}")]
    Encoding(anyhow::Error),

    /// A backend panicked mid-job.
    #[error("{0}")]
    Internal(String),
}

impl JobError {
    pub fn synthesis(err: anyhow::Error) -> Self {
        JobError::Synthesis(format!("{err:#}"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Input(_) => "InputError",
            JobError::Initialization(_) => "InitializationError",
            JobError::Synthesis(_) => "SynthesisError",
            JobError::Encoding(_) => "EncodingError",
            JobError::Internal(_) => "InternalError",
        }
    }

    /// Text placed in the `error` field of a job response.
    pub fn describe(&self) -> String {
        match self {
            JobError::Input(msg) if msg == NO_TEXT => msg.clone(),
            other => format!("{}: {}", other.kind(), other),
        }
    }
}

pub const NO_TEXT: &str = "No text provided";
pub const NO_AUDIO: &str = "no audio generated";
