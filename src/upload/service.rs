/// Upload Service
///
/// Orchestrates the upload lifecycle over the chunk store and session
/// registry: session creation, idempotent chunk intake, status reporting
/// (including the on-disk fallback when in-memory state was lost), and
/// completion with reassembly, checksumming, and cleanup.
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::error::{Result, UploadError};
use crate::metadata::{FileKind, FileMetadata};
use crate::upload::session::{SessionRegistry, UploadSession};
use crate::upload::storage::ChunkStore;
use crate::upload::UploadId;

/// Acknowledgement for one accepted chunk.
#[derive(Debug, Clone)]
pub struct ChunkReceipt {
    /// Chunks received so far for the session.
    pub received_chunks: usize,
    pub message: &'static str,
}

/// Point-in-time view of an upload session.
///
/// `total_chunks` is `None` for a partial status reconstructed from disk
/// after the in-memory session was lost; the total cannot be recovered
/// from chunk files alone.
#[derive(Debug, Clone, Serialize)]
pub struct UploadStatus {
    pub upload_id: UploadId,
    pub total_chunks: Option<u32>,
    pub received_chunks: Vec<u32>,
    pub is_complete: bool,
}

/// Chunked upload engine.
pub struct UploadService {
    store: Arc<ChunkStore>,
    registry: SessionRegistry,
    chunk_size: u64,
}

impl UploadService {
    pub fn new(store: Arc<ChunkStore>, chunk_size: u64) -> Self {
        Self {
            store,
            registry: SessionRegistry::new(),
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Start a new upload session and return its id and the chunk size
    /// clients must use.
    pub async fn init(
        &self,
        filename: &str,
        total_size: u64,
        checksum: Option<String>,
    ) -> Result<(UploadId, u64)> {
        if total_size == 0 {
            return Err(UploadError::Validation(
                "totalSize must be greater than zero".to_string(),
            ));
        }

        let session = UploadSession::new(
            filename.to_string(),
            total_size,
            self.chunk_size,
            checksum,
        );
        let upload_id = session.upload_id;
        log::info!(
            "Initialized upload {} for {:?} ({} bytes, {} chunks)",
            upload_id,
            filename,
            total_size,
            session.total_chunks
        );
        self.registry.insert(session).await;

        Ok((upload_id, self.chunk_size))
    }

    /// Accept one chunk, idempotently.
    ///
    /// A committed chunk of the same length short-circuits without a
    /// rewrite; the comparison is size-only, so a retry carrying different
    /// bytes of equal length is acknowledged as the already-stored chunk.
    pub async fn upload_chunk(
        &self,
        upload_id: &UploadId,
        chunk_index: i64,
        data: &[u8],
        total_chunks: i64,
    ) -> Result<ChunkReceipt> {
        let session = self
            .registry
            .get(upload_id)
            .await
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))?;

        if chunk_index < 0 || chunk_index >= i64::from(session.total_chunks) {
            return Err(UploadError::InvalidChunkIndex(chunk_index));
        }
        let index = chunk_index as u32;

        if total_chunks != i64::from(session.total_chunks) {
            return Err(UploadError::TotalChunksMismatch {
                expected: session.total_chunks,
                claimed: total_chunks,
            });
        }

        if self.store.chunk_exists(upload_id, index).await
            && self.store.chunk_size(upload_id, index).await == Some(data.len() as u64)
        {
            let received = self.mark_received(upload_id, index).await?;
            return Ok(ChunkReceipt {
                received_chunks: received,
                message: "chunk already uploaded (idempotent)",
            });
        }

        self.store.store_chunk(upload_id, index, data).await?;
        let received = self.mark_received(upload_id, index).await?;
        Ok(ChunkReceipt {
            received_chunks: received,
            message: "chunk uploaded successfully",
        })
    }

    async fn mark_received(&self, upload_id: &UploadId, index: u32) -> Result<usize> {
        self.registry
            .with_session_mut(upload_id, |session| {
                session.received_chunks.insert(index);
                session.received_chunks.len()
            })
            .await
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))
    }

    /// Report upload progress.
    ///
    /// When the session is unknown but chunk files exist on disk, a partial
    /// status with an unknown total is returned so clients can still see
    /// what survived a restart.
    pub async fn status(&self, upload_id: &UploadId) -> Result<Option<UploadStatus>> {
        if let Some(session) = self.registry.get(upload_id).await {
            return Ok(Some(UploadStatus {
                upload_id: *upload_id,
                total_chunks: Some(session.total_chunks),
                received_chunks: session.received_chunks.iter().copied().collect(),
                is_complete: session.is_complete(),
            }));
        }

        let on_disk = self.store.list_chunks(upload_id).await?;
        if on_disk.is_empty() {
            return Ok(None);
        }
        Ok(Some(UploadStatus {
            upload_id: *upload_id,
            total_chunks: None,
            received_chunks: on_disk,
            is_complete: false,
        }))
    }

    /// Reassemble a complete upload into its final file.
    ///
    /// On success the session is removed from the registry and its staging
    /// directory deleted; the returned path and metadata describe the
    /// persistent artifact. Post-completion sinks are run by the caller,
    /// not here.
    pub async fn complete(&self, upload_id: &UploadId) -> Result<(PathBuf, FileMetadata)> {
        let session = self
            .registry
            .get(upload_id)
            .await
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))?;

        if !session.is_complete() {
            return Err(UploadError::Incomplete {
                missing: session.missing_chunks(),
            });
        }

        let output_path = self
            .store
            .reassemble_file(
                upload_id,
                session.total_chunks,
                &session.filename,
                Some(session.total_size),
            )
            .await?;

        // Only hash when the client asked for it at init; the hint itself
        // is replaced by the freshly computed digest.
        let checksum = match session.checksum.as_deref() {
            Some(hint) if !hint.is_empty() => {
                Some(self.store.file_checksum(&output_path).await?)
            }
            _ => None,
        };

        let metadata = FileMetadata {
            upload_id: *upload_id,
            filename: session.filename.clone(),
            size: session.total_size,
            checksum,
            timestamp: Utc::now().to_rfc3339(),
            file_type: FileKind::from_filename(&session.filename),
            filepath: output_path.display().to_string(),
        };

        if let Err(e) = self.store.cleanup_chunks(upload_id).await {
            log::warn!("Cleanup after completing upload {}: {}", upload_id, e);
        }
        self.registry.remove(upload_id).await;

        log::info!("Upload {} completed as {}", upload_id, metadata.filepath);
        Ok((output_path, metadata))
    }
}
