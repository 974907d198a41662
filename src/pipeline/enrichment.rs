/// Metadata Enrichment & Downstream Notification Sinks
///
/// Builds the enhanced catalog record (lineage plus dataset/model detail)
/// and triggers downstream jobs for datasets. Neither stage can veto a
/// completed upload.
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::metadata::{
    extension, DatasetInfo, EnhancedMetadata, FileKind, Lineage, ModelInfo,
};
use crate::pipeline::{CompletionReport, CompletionSink, Verdict};

/// ML framework implied by a model artifact extension.
fn model_framework(ext: &str) -> &'static str {
    match ext {
        "pt" | "pth" | "ckpt" => "pytorch",
        "safetensors" => "safetensors",
        "onnx" => "onnx",
        "pb" => "tensorflow",
        "h5" => "keras",
        _ => "unknown",
    }
}

/// Builds the enhanced metadata record for catalog and lineage tracking.
pub struct MetadataEnricher;

#[async_trait]
impl CompletionSink for MetadataEnricher {
    fn name(&self) -> &'static str {
        "metadata enrichment"
    }

    async fn apply(&self, path: &Path, report: &mut CompletionReport) -> Result<Verdict> {
        let metadata = &report.metadata;
        let ext = extension(&metadata.filename);
        let dotted_format = ext
            .as_deref()
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let dataset_info = match (metadata.file_type, ext.as_deref()) {
            (FileKind::Dataset, Some(ext)) => Some(DatasetInfo {
                format: dotted_format.clone(),
                estimated_records: estimate_record_count(path, ext).await,
                preview_available: true,
            }),
            _ => None,
        };

        let model_info = match (metadata.file_type, ext.as_deref()) {
            (FileKind::ModelArtifact, Some(ext)) => Some(ModelInfo {
                format: dotted_format,
                framework: model_framework(ext).to_string(),
            }),
            _ => None,
        };

        report.enhanced = Some(EnhancedMetadata {
            base: metadata.clone(),
            lineage: Lineage {
                source: "user_upload".to_string(),
                upload_timestamp: metadata.timestamp.clone(),
                downstream_jobs: Vec::new(),
            },
            dataset_info,
            model_info,
        });

        Ok(Verdict::Accepted)
    }
}

/// Line-based record estimate: one record per JSONL line, CSV lines minus
/// the header. Estimation failures yield no estimate rather than an error.
async fn estimate_record_count(path: &Path, ext: &str) -> Option<u64> {
    match ext {
        "jsonl" => count_lines(path).await.ok(),
        "csv" => count_lines(path).await.ok().map(|n| n.saturating_sub(1)),
        _ => None,
    }
}

async fn count_lines(path: &Path) -> std::io::Result<u64> {
    let file = fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut count = 0u64;
    while lines.next_line().await?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Kicks off downstream processing for datasets: the fine-tuning pipeline
/// and the data curation system. Both triggers are integration stubs that
/// report no job until a queue is wired in.
pub struct DownstreamNotifier;

impl DownstreamNotifier {
    async fn trigger_fine_tuning(&self, path: &Path) -> Option<String> {
        log::info!(
            "Would trigger fine-tuning pipeline for {}",
            path.display()
        );
        None
    }

    async fn trigger_data_curation(&self, path: &Path) -> Option<String> {
        log::info!("Would trigger data curation for {}", path.display());
        None
    }
}

#[async_trait]
impl CompletionSink for DownstreamNotifier {
    fn name(&self) -> &'static str {
        "downstream notification"
    }

    async fn apply(&self, path: &Path, report: &mut CompletionReport) -> Result<Verdict> {
        if report.metadata.file_type != FileKind::Dataset {
            return Ok(Verdict::Accepted);
        }

        report.downstream_job_id = self.trigger_fine_tuning(path).await;
        let _curation_job = self.trigger_data_curation(path).await;

        Ok(Verdict::Accepted)
    }
}
