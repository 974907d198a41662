/// Dataset Catalog
///
/// A JSON document of registered uploads, rewritten whole on every
/// registration. Writers serialize through a mutex; the file bottlenecks
/// concurrent completions, which is acceptable at this deployment scale.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{Result, UploadError};
use crate::metadata::{CatalogEntry, Lineage};
use crate::upload::UploadId;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    uploads: Vec<CatalogEntry>,
}

/// Append-style registry of completed dataset uploads.
pub struct CatalogStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CatalogStore {
    /// Open the catalog at `path`, creating an empty document if absent.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !fs::try_exists(&path).await.unwrap_or(false) {
            let empty = serde_json::to_vec_pretty(&CatalogDocument::default())?;
            fs::write(&path, empty).await.map_err(|e| {
                UploadError::Storage(format!(
                    "failed to create catalog {}: {e}",
                    path.display()
                ))
            })?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Append an entry and rewrite the document. Returns the registered id.
    pub async fn register(&self, entry: CatalogEntry) -> Result<UploadId> {
        let _guard = self.write_lock.lock().await;

        let id = entry.id;
        let mut document = self.load().await?;
        document.uploads.push(entry);

        let serialized = serde_json::to_vec_pretty(&document)?;
        fs::write(&self.path, serialized).await.map_err(|e| {
            UploadError::Storage(format!("failed to write catalog {}: {e}", self.path.display()))
        })?;

        Ok(id)
    }

    /// Look up the lineage block recorded for an upload.
    pub async fn lineage(&self, upload_id: &UploadId) -> Result<Option<Lineage>> {
        let document = self.load().await?;
        Ok(document
            .uploads
            .into_iter()
            .find(|entry| entry.id == *upload_id)
            .map(|entry| entry.metadata.lineage))
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.uploads.len())
    }

    async fn load(&self) -> Result<CatalogDocument> {
        let raw = fs::read(&self.path).await.map_err(|e| {
            UploadError::Storage(format!("failed to read catalog {}: {e}", self.path.display()))
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
