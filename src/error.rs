use std::path::PathBuf;

/// Convenient alias for results returned by the classification core.
pub type Result<T> = std::result::Result<T, EmotionError>;

#[derive(thiserror::Error, Debug)]
pub enum EmotionError {
    #[error("invalid waveform: {0}")]
    InvalidWaveform(String),

    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("unknown label code '{0}'")]
    UnknownLabelCode(String),

    #[error("file name {0:?} does not carry an emotion code field")]
    MalformedFileName(PathBuf),

    #[error("no audio files found under {0:?}")]
    EmptyCorpus(PathBuf),

    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to load artifact {path:?}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("failed to write artifact {path:?}: {reason}")]
    ArtifactWrite { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("a recording is already in progress")]
    Busy,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EmotionError {
    pub(crate) fn decode(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Decode {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }

    pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { expected, actual })
        }
    }
}
