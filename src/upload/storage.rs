/// Chunk Storage
///
/// Filesystem persistence for upload chunks and reassembled files. Chunks
/// are committed with a write-to-temp-then-rename protocol so a partially
/// written chunk is never observable under its committed name, and retries
/// absorb the transient races between concurrent stores and cleanup.
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, UploadError};
use crate::upload::UploadId;

/// Attempts for a single chunk store before giving up.
const MAX_STORE_ATTEMPTS: u32 = 3;

/// Block size for streaming checksum computation.
const CHECKSUM_BLOCK_SIZE: usize = 8192;

/// Filesystem store for staged chunks and completed files.
///
/// All operations are safe to call concurrently, including against the
/// same upload. Commit safety rests on idempotent directory creation and
/// the atomicity of a same-directory rename.
pub struct ChunkStore {
    uploads_root: PathBuf,
    completed_root: PathBuf,
}

impl ChunkStore {
    /// Create a store rooted at the given staging and output directories,
    /// creating both if absent.
    pub async fn new(
        uploads_root: impl Into<PathBuf>,
        completed_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let uploads_root = uploads_root.into();
        let completed_root = completed_root.into();

        fs::create_dir_all(&uploads_root).await.map_err(|e| {
            UploadError::Storage(format!(
                "failed to create uploads directory {}: {e}",
                uploads_root.display()
            ))
        })?;
        fs::create_dir_all(&completed_root).await.map_err(|e| {
            UploadError::Storage(format!(
                "failed to create completed directory {}: {e}",
                completed_root.display()
            ))
        })?;

        Ok(Self {
            uploads_root,
            completed_root,
        })
    }

    /// Staging directory for one upload session.
    pub fn upload_dir(&self, upload_id: &UploadId) -> PathBuf {
        self.uploads_root.join(upload_id.to_string())
    }

    /// Committed path for a chunk index.
    pub fn chunk_path(&self, upload_id: &UploadId, index: u32) -> PathBuf {
        self.upload_dir(upload_id).join(format!("{index}.chunk"))
    }

    /// Output path for a completed file.
    pub fn completed_path(&self, output_name: &str) -> PathBuf {
        self.completed_root.join(output_name)
    }

    /// Store one chunk atomically.
    ///
    /// The payload is written to `<index>.chunk.tmp` and renamed over the
    /// committed name, so callers either observe the full chunk or nothing.
    /// Repeated stores of identical bytes are idempotent; when two writers
    /// race with different bytes the last successful rename wins. Transient
    /// failures (a racing cleanup removing the directory mid-write) are
    /// retried with a short backoff.
    pub async fn store_chunk(&self, upload_id: &UploadId, index: u32, data: &[u8]) -> Result<()> {
        let dir = self.upload_dir(upload_id);
        let temp_path = dir.join(format!("{index}.chunk.tmp"));
        let chunk_path = dir.join(format!("{index}.chunk"));

        let mut last_error = None;
        for attempt in 0..MAX_STORE_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
            }

            match Self::write_and_commit(&dir, &temp_path, &chunk_path, data).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!(
                        "Attempt {} to store chunk {} for upload {} failed: {}",
                        attempt + 1,
                        index,
                        upload_id,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        log::error!(
            "Giving up storing chunk {} for upload {} after {} attempts: {}",
            index,
            upload_id,
            MAX_STORE_ATTEMPTS,
            cause
        );
        Err(UploadError::Storage(format!(
            "failed to store chunk {index} for upload {upload_id}: {cause}"
        )))
    }

    async fn write_and_commit(
        dir: &Path,
        temp_path: &Path,
        chunk_path: &Path,
        data: &[u8],
    ) -> std::io::Result<()> {
        // create_dir_all tolerates a concurrent writer creating the same
        // session directory.
        fs::create_dir_all(dir).await?;

        let mut file = fs::File::create(temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        // Same-directory rename; atomic on POSIX filesystems.
        fs::rename(temp_path, chunk_path).await?;
        Ok(())
    }

    /// Whether a committed chunk exists for the index.
    pub async fn chunk_exists(&self, upload_id: &UploadId, index: u32) -> bool {
        fs::try_exists(self.chunk_path(upload_id, index))
            .await
            .unwrap_or(false)
    }

    /// Size of a committed chunk, if present.
    pub async fn chunk_size(&self, upload_id: &UploadId, index: u32) -> Option<u64> {
        fs::metadata(self.chunk_path(upload_id, index))
            .await
            .ok()
            .map(|m| m.len())
    }

    /// Read a committed chunk in full.
    pub async fn get_chunk(&self, upload_id: &UploadId, index: u32) -> Result<Option<Vec<u8>>> {
        match fs::read(self.chunk_path(upload_id, index)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Enumerate committed chunk indices for an upload, ascending.
    ///
    /// Only files named `<integer>.chunk` count; temp files and foreign
    /// names are ignored. A missing session directory yields an empty list.
    pub async fn list_chunks(&self, upload_id: &UploadId) -> Result<Vec<u32>> {
        let dir = self.upload_dir(upload_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("chunk") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(index) = stem.parse::<u32>() {
                indices.push(index);
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }

    /// Concatenate chunks `0..total_chunks` into `<completed_root>/<output_name>`.
    ///
    /// Fails without writing when the committed set is not exactly
    /// `{0, …, total_chunks - 1}`. A partial output is deleted on any
    /// mid-stream failure or when the result does not match `expected_size`.
    /// Staging chunks are left in place; cleanup is a separate step.
    pub async fn reassemble_file(
        &self,
        upload_id: &UploadId,
        total_chunks: u32,
        output_name: &str,
        expected_size: Option<u64>,
    ) -> Result<PathBuf> {
        let committed: BTreeSet<u32> = self.list_chunks(upload_id).await?.into_iter().collect();
        let missing: Vec<u32> = (0..total_chunks)
            .filter(|index| !committed.contains(index))
            .collect();
        if !missing.is_empty() || committed.len() as u64 != u64::from(total_chunks) {
            return Err(UploadError::Reassembly(format!(
                "missing chunks {missing:?} for upload {upload_id}"
            )));
        }

        let output_path = self.completed_path(output_name);
        match self
            .write_output(upload_id, total_chunks, &output_path, expected_size)
            .await
        {
            Ok(()) => Ok(output_path),
            Err(e) => {
                log::error!("Reassembly for upload {} failed: {}", upload_id, e);
                Self::remove_if_present(&output_path).await;
                Err(e)
            }
        }
    }

    async fn write_output(
        &self,
        upload_id: &UploadId,
        total_chunks: u32,
        output_path: &Path,
        expected_size: Option<u64>,
    ) -> Result<()> {
        let mut output = fs::File::create(output_path).await?;
        for index in 0..total_chunks {
            let chunk = self.get_chunk(upload_id, index).await?.ok_or_else(|| {
                UploadError::Reassembly(format!(
                    "chunk {index} for upload {upload_id} disappeared during reassembly"
                ))
            })?;
            output.write_all(&chunk).await?;
        }
        output.sync_all().await?;

        if let Some(expected) = expected_size {
            let actual = output.metadata().await?.len();
            if actual != expected {
                return Err(UploadError::Reassembly(format!(
                    "size mismatch: expected {expected} bytes, got {actual} bytes"
                )));
            }
        }

        Ok(())
    }

    async fn remove_if_present(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    /// Recursively delete the staging directory for an upload.
    pub async fn cleanup_chunks(&self, upload_id: &UploadId) -> Result<()> {
        let dir = self.upload_dir(upload_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UploadError::Storage(format!(
                "failed to clean up chunks for upload {upload_id}: {e}"
            ))),
        }
    }

    /// Streaming SHA-256 of a file as 64 lowercase hex characters.
    pub async fn file_checksum(&self, path: &Path) -> Result<String> {
        let mut file = fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHECKSUM_BLOCK_SIZE];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }
}
