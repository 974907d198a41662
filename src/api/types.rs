/// Wire Types
///
/// Request and response bodies for the upload endpoints, camelCase on the
/// wire.
use serde::{Deserialize, Serialize};

use crate::metadata::FileMetadata;
use crate::upload::UploadId;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    pub filename: String,
    pub total_size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub upload_id: UploadId,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub success: bool,
    /// Chunks received so far for the session.
    pub received_chunks: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub upload_id: UploadId,
    pub total_chunks: u32,
    pub received_chunks: Vec<u32>,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub success: bool,
    pub filepath: String,
    pub metadata: FileMetadata,
    pub downstream_job_id: Option<String>,
    pub message: String,
}

/// Error body; the `detail` field mirrors what upload clients already
/// expect from the original deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
