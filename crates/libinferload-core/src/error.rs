use std::path::PathBuf;

use thiserror::Error;

/// Main error type for inferload operations
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown {kind} category: '{value}'")]
    UnknownCategory { kind: &'static str, value: String },

    #[error("sampler is already running")]
    SamplerAlreadyRunning,

    #[error("resource metrics unavailable: {0}")]
    SamplerUnavailable(String),

    #[error("sampler thread panicked")]
    SamplerPanicked,

    #[error("corpus '{}' unavailable: {source}", path.display())]
    CorpusUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot summarize an empty batch")]
    EmptyBatch,

    #[error("no successful requests in batch")]
    NoSuccesses,

    #[error("request worker panicked")]
    WorkerPanicked,
}

impl BenchError {
    /// Get the exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Config(_) => 2,
            BenchError::UnknownCategory { .. } => 2,
            BenchError::TomlParse(_) => 2,
            BenchError::Io(_) => 3,
            BenchError::CorpusUnavailable { .. } => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
