use std::path::PathBuf;

/// Errors from ingestion and configuration.
///
/// Analysis itself is total: silent windows, low correlations and missing
/// timing metadata are expressed as absent results, never as errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid note at index {index}: {reason}")]
    InvalidNote { index: usize, reason: String },

    #[error("invalid tempo change at index {index}: {reason}")]
    InvalidTempo { index: usize, reason: String },

    #[error("invalid time signature at index {index}: {reason}")]
    InvalidTimeSignature { index: usize, reason: String },

    #[error("invalid measure boundaries: {0}")]
    InvalidMeasureGrid(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("failed to serialize timeline: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
