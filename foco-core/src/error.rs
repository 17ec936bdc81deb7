use thiserror::Error;

/// All errors produced by foco-core.
#[derive(Debug, Error)]
pub enum FocoError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("interpretation error: {0}")]
    Interpretation(String),

    #[error("device {address}: {reason}")]
    Device { address: String, reason: String },

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("controller is no longer running")]
    ControllerClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FocoError>;
