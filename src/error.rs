use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload session {0} not found")]
    SessionNotFound(String),

    #[error("Invalid chunk index: {0}")]
    InvalidChunkIndex(i64),

    #[error("Total chunks mismatch: expected {expected}, got {claimed}")]
    TotalChunksMismatch { expected: u32, claimed: i64 },

    #[error("Upload incomplete: missing chunks {missing:?}")]
    Incomplete { missing: Vec<u32> },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Reassembly failed: {0}")]
    Reassembly(String),

    #[error("Rejected by {stage}: {reason}")]
    Vetoed { stage: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, UploadError>;
