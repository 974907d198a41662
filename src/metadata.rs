/// File Classification & Metadata
///
/// Types describing a completed upload: the wire-level metadata record,
/// the extension-based file classification used to route post-completion
/// handling, and the enriched catalog records built by the pipeline.
use serde::{Deserialize, Serialize};

use crate::upload::UploadId;

/// Broad classification of an uploaded file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Dataset,
    ModelArtifact,
    Archive,
    Unknown,
}

/// Extensions recognized as dataset files.
pub const DATASET_EXTENSIONS: &[&str] = &["jsonl", "json", "csv", "parquet", "tsv", "txt"];

/// Extensions recognized as model artifacts.
pub const MODEL_EXTENSIONS: &[&str] = &["pt", "pth", "ckpt", "safetensors", "onnx", "pb", "h5"];

/// Extensions recognized as archives.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tar", "gz", "bz2"];

impl FileKind {
    /// Classify a filename by its lowercased final extension.
    pub fn from_filename(filename: &str) -> Self {
        match extension(filename) {
            Some(ext) if DATASET_EXTENSIONS.contains(&ext.as_str()) => FileKind::Dataset,
            Some(ext) if MODEL_EXTENSIONS.contains(&ext.as_str()) => FileKind::ModelArtifact,
            Some(ext) if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) => FileKind::Archive,
            _ => FileKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Dataset => "dataset",
            FileKind::ModelArtifact => "model_artifact",
            FileKind::Archive => "archive",
            FileKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lowercased text after the last `.` in a filename, if any.
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Metadata emitted for a successfully completed upload.
///
/// Serialized with camelCase keys on the wire and in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub upload_id: UploadId,
    pub filename: String,
    pub size: u64,
    /// Whole-file SHA-256, present iff the client supplied a checksum hint.
    pub checksum: Option<String>,
    /// RFC 3339 completion timestamp.
    pub timestamp: String,
    pub file_type: FileKind,
    pub filepath: String,
}

/// Provenance block attached to every enriched record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub source: String,
    pub upload_timestamp: String,
    pub downstream_jobs: Vec<String>,
}

/// Dataset-specific enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Format as a dotted extension, e.g. `.jsonl`.
    pub format: String,
    pub estimated_records: Option<u64>,
    pub preview_available: bool,
}

/// Model-artifact-specific enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub format: String,
    pub framework: String,
}

/// Base metadata plus lineage and type-specific details, as written to the
/// catalog and handed to downstream systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedMetadata {
    #[serde(flatten)]
    pub base: FileMetadata,
    pub lineage: Lineage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_info: Option<DatasetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

/// One catalog row: an enriched record plus registration bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: UploadId,
    pub registered_at: String,
    #[serde(flatten)]
    pub metadata: EnhancedMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_filename("train.jsonl"), FileKind::Dataset);
        assert_eq!(FileKind::from_filename("table.CSV"), FileKind::Dataset);
        assert_eq!(FileKind::from_filename("weights.safetensors"), FileKind::ModelArtifact);
        assert_eq!(FileKind::from_filename("model.pt"), FileKind::ModelArtifact);
        assert_eq!(FileKind::from_filename("bundle.tar"), FileKind::Archive);
        assert_eq!(FileKind::from_filename("notes.md"), FileKind::Unknown);
    }

    #[test]
    fn test_file_kind_without_extension() {
        assert_eq!(FileKind::from_filename("README"), FileKind::Unknown);
        assert_eq!(FileKind::from_filename(""), FileKind::Unknown);
        assert_eq!(FileKind::from_filename("trailing."), FileKind::Unknown);
    }

    #[test]
    fn test_extension_uses_last_dot() {
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("data.JSONL").as_deref(), Some("jsonl"));
        assert_eq!(extension("no_dot"), None);
    }

    #[test]
    fn test_metadata_wire_keys_are_camel_case() {
        let metadata = FileMetadata {
            upload_id: uuid::Uuid::new_v4(),
            filename: "a.jsonl".to_string(),
            size: 42,
            checksum: None,
            timestamp: "2025-01-01T00:00:00+00:00".to_string(),
            file_type: FileKind::Dataset,
            filepath: "/tmp/a.jsonl".to_string(),
        };

        let value = serde_json::to_value(&metadata).unwrap();
        assert!(value.get("uploadId").is_some());
        assert!(value.get("fileType").is_some());
        assert_eq!(value["fileType"], "dataset");
    }
}
