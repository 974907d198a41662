/// Post-Completion Pipeline
///
/// An ordered list of typed sinks applied to a reassembled file. Vetoing
/// sinks (format, schema, security) can reject the artifact, which deletes
/// the file; the remaining sinks enrich metadata, register datasets in the
/// catalog, and notify downstream systems, and their failures are logged
/// rather than surfaced.
pub mod catalog;
pub mod enrichment;
pub mod scanning;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::fs;

use crate::error::{Result, UploadError};
use crate::metadata::{CatalogEntry, FileKind, FileMetadata};

pub use catalog::CatalogStore;
pub use enrichment::{DownstreamNotifier, MetadataEnricher};
pub use scanning::{ScanResults, SecurityScanner};
pub use validation::{FormatValidator, SchemaValidator};

/// Outcome of one sink over one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(String),
}

/// Everything the pipeline has learned about a completed upload.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub metadata: FileMetadata,
    pub scan: Option<ScanResults>,
    pub enhanced: Option<crate::metadata::EnhancedMetadata>,
    pub downstream_job_id: Option<String>,
}

impl CompletionReport {
    pub fn new(metadata: FileMetadata) -> Self {
        Self {
            metadata,
            scan: None,
            enhanced: None,
            downstream_job_id: None,
        }
    }
}

/// One stage of the post-completion pipeline.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a rejection from this sink discards the completed file.
    fn can_veto(&self) -> bool {
        false
    }

    async fn apply(&self, path: &Path, report: &mut CompletionReport) -> Result<Verdict>;
}

/// Writes enriched dataset records into the catalog.
pub struct CatalogRegistrar {
    catalog: Arc<CatalogStore>,
}

impl CatalogRegistrar {
    pub fn new(catalog: Arc<CatalogStore>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CompletionSink for CatalogRegistrar {
    fn name(&self) -> &'static str {
        "catalog registration"
    }

    async fn apply(&self, _path: &Path, report: &mut CompletionReport) -> Result<Verdict> {
        if report.metadata.file_type != FileKind::Dataset {
            return Ok(Verdict::Accepted);
        }

        let Some(enhanced) = report.enhanced.clone() else {
            return Ok(Verdict::Rejected(
                "no enriched metadata to register".to_string(),
            ));
        };

        let entry = CatalogEntry {
            id: report.metadata.upload_id,
            registered_at: Utc::now().to_rfc3339(),
            metadata: enhanced,
        };
        let id = self.catalog.register(entry).await?;
        log::info!("Registered dataset {} in catalog", id);

        Ok(Verdict::Accepted)
    }
}

/// The ordered sink chain run after a successful completion.
pub struct CompletionPipeline {
    sinks: Vec<Box<dyn CompletionSink>>,
}

impl CompletionPipeline {
    /// The standard chain: format, schema, scan, enrich, register, notify.
    pub fn new(catalog: Arc<CatalogStore>) -> Self {
        Self::with_sinks(vec![
            Box::new(FormatValidator),
            Box::new(SchemaValidator),
            Box::new(SecurityScanner),
            Box::new(MetadataEnricher),
            Box::new(CatalogRegistrar::new(catalog)),
            Box::new(DownstreamNotifier),
        ])
    }

    pub fn with_sinks(sinks: Vec<Box<dyn CompletionSink>>) -> Self {
        Self { sinks }
    }

    /// Apply every sink in order.
    ///
    /// A rejection or error from a vetoing sink deletes the reassembled
    /// file and short-circuits. Non-vetoing failures are logged and the
    /// chain continues.
    pub async fn run(&self, path: &Path, metadata: &FileMetadata) -> Result<CompletionReport> {
        let mut report = CompletionReport::new(metadata.clone());

        for sink in &self.sinks {
            let verdict = match sink.apply(path, &mut report).await {
                Ok(verdict) => verdict,
                Err(e) if sink.can_veto() => Verdict::Rejected(e.to_string()),
                Err(e) => {
                    log::warn!("Post-completion sink {:?} failed: {}", sink.name(), e);
                    continue;
                }
            };

            match verdict {
                Verdict::Accepted => {}
                Verdict::Rejected(reason) if sink.can_veto() => {
                    log::warn!(
                        "{} vetoed {}: {}; removing file",
                        sink.name(),
                        path.display(),
                        reason
                    );
                    discard(path).await;
                    return Err(UploadError::Vetoed {
                        stage: sink.name(),
                        reason,
                    });
                }
                Verdict::Rejected(reason) => {
                    log::warn!(
                        "Post-completion sink {:?} rejected {}: {}",
                        sink.name(),
                        path.display(),
                        reason
                    );
                }
            }
        }

        Ok(report)
    }
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::error!("Failed to remove vetoed file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn metadata_for(filename: &str, path: &Path) -> FileMetadata {
        FileMetadata {
            upload_id: Uuid::new_v4(),
            filename: filename.to_string(),
            size: 0,
            checksum: None,
            timestamp: "2025-06-01T00:00:00+00:00".to_string(),
            file_type: FileKind::from_filename(filename),
            filepath: path.display().to_string(),
        }
    }

    async fn standard_pipeline(temp_dir: &TempDir) -> CompletionPipeline {
        let catalog = Arc::new(
            CatalogStore::new(temp_dir.path().join("catalog.json"))
                .await
                .unwrap(),
        );
        CompletionPipeline::new(catalog)
    }

    #[tokio::test]
    async fn test_veto_deletes_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jsonl");
        tokio::fs::write(&path, b"{\"ok\":true}\nnot json\n")
            .await
            .unwrap();

        let pipeline = standard_pipeline(&temp_dir).await;
        let err = pipeline
            .run(&path, &metadata_for("bad.jsonl", &path))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Vetoed { stage, .. } if stage == "format validation"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dataset_flows_through_every_stage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("good.jsonl");
        tokio::fs::write(&path, b"{\"row\":1}\n{\"row\":2}\n")
            .await
            .unwrap();

        let catalog = Arc::new(
            CatalogStore::new(temp_dir.path().join("catalog.json"))
                .await
                .unwrap(),
        );
        let pipeline = CompletionPipeline::new(Arc::clone(&catalog));

        let metadata = metadata_for("good.jsonl", &path);
        let report = pipeline.run(&path, &metadata).await.unwrap();

        assert!(path.exists());
        assert!(report.scan.is_some());
        let enhanced = report.enhanced.unwrap();
        assert_eq!(
            enhanced.dataset_info.unwrap().estimated_records,
            Some(2)
        );
        assert_eq!(catalog.len().await.unwrap(), 1);
        assert!(catalog
            .lineage(&metadata.upload_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_non_dataset_skips_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("weights.pt");
        tokio::fs::write(&path, b"weights").await.unwrap();

        let catalog = Arc::new(
            CatalogStore::new(temp_dir.path().join("catalog.json"))
                .await
                .unwrap(),
        );
        let pipeline = CompletionPipeline::new(Arc::clone(&catalog));

        let report = pipeline
            .run(&path, &metadata_for("weights.pt", &path))
            .await
            .unwrap();

        assert!(path.exists());
        assert!(report.enhanced.unwrap().model_info.is_some());
        assert_eq!(catalog.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_veto_failure_does_not_fail_the_run() {
        struct FailingSink;

        #[async_trait]
        impl CompletionSink for FailingSink {
            fn name(&self) -> &'static str {
                "flaky notifier"
            }

            async fn apply(
                &self,
                _path: &Path,
                _report: &mut CompletionReport,
            ) -> Result<Verdict> {
                Err(UploadError::Storage("downstream queue offline".to_string()))
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.csv");
        tokio::fs::write(&path, b"a,b\n1,2\n").await.unwrap();

        let pipeline = CompletionPipeline::with_sinks(vec![
            Box::new(FailingSink),
            Box::new(MetadataEnricher),
        ]);

        let report = pipeline
            .run(&path, &metadata_for("data.csv", &path))
            .await
            .unwrap();
        assert!(report.enhanced.is_some());
        assert!(path.exists());
    }
}
