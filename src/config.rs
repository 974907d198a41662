/// Server Configuration
///
/// Defaults, TOML file loading, and environment overrides for the ingest
/// server. Precedence, lowest to highest: built-in defaults, config file,
/// environment variables, command-line flags.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UploadError};

/// Default chunk size clients are told to use: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Upper bound on configurable chunk size; per-chunk memory is bounded by
/// this value.
pub const MAX_CHUNK_SIZE: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Staging area for in-flight chunks.
    pub uploads_dir: PathBuf,
    /// Destination for reassembled files.
    pub completed_dir: PathBuf,
    /// JSON catalog of registered datasets.
    pub catalog_path: PathBuf,
    /// Chunk size in bytes.
    pub chunk_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            uploads_dir: PathBuf::from("uploads"),
            completed_dir: PathBuf::from("completed"),
            catalog_path: PathBuf::from("catalog.json"),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file. Missing keys fall back to the
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            UploadError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| UploadError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Apply `UPLOADS_DIR`, `COMPLETED_DIR`, `CATALOG_PATH`, and
    /// `CHUNK_SIZE` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("UPLOADS_DIR") {
            self.uploads_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("COMPLETED_DIR") {
            self.completed_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("CATALOG_PATH") {
            self.catalog_path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var("CHUNK_SIZE") {
            self.chunk_size = raw.parse().map_err(|_| {
                UploadError::Config(format!("CHUNK_SIZE must be a positive integer, got {raw:?}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(UploadError::Config(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(UploadError::Config(format!(
                "chunk size must not exceed {MAX_CHUNK_SIZE} bytes"
            )));
        }
        if self.uploads_dir.as_os_str().is_empty() {
            return Err(UploadError::Config(
                "uploads directory cannot be empty".to_string(),
            ));
        }
        if self.completed_dir.as_os_str().is_empty() {
            return Err(UploadError::Config(
                "completed directory cannot be empty".to_string(),
            ));
        }
        if self.uploads_dir == self.completed_dir {
            return Err(UploadError::Config(
                "uploads and completed directories must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest request body the chunk endpoint should accept; leaves room
    /// for multipart framing around a full-size chunk.
    pub fn body_limit_bytes(&self) -> usize {
        (self.chunk_size as usize).saturating_mul(2).max(64 * 1024)
    }
}
