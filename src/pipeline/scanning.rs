/// Security Scanning Sink
///
/// Placeholder stage for virus and PII scanning. Records a skipped scan
/// result today; a real engine (ClamAV, a PII detector) plugs in behind
/// the same sink and vetoes on findings.
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::pipeline::{CompletionReport, CompletionSink, Verdict};

#[derive(Debug, Clone, Serialize)]
pub struct ScanSection {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PiiSection {
    pub status: String,
    pub message: String,
    pub detected_pii: Vec<String>,
}

/// Outcome of a security scan over one completed file.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResults {
    pub virus_scan: ScanSection,
    pub pii_detection: PiiSection,
    pub timestamp: String,
}

impl ScanResults {
    pub fn skipped() -> Self {
        Self {
            virus_scan: ScanSection {
                status: "skipped".to_string(),
                message: "virus scanning not implemented".to_string(),
            },
            pii_detection: PiiSection {
                status: "skipped".to_string(),
                message: "PII detection not implemented".to_string(),
                detected_pii: Vec::new(),
            },
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub struct SecurityScanner;

#[async_trait]
impl CompletionSink for SecurityScanner {
    fn name(&self) -> &'static str {
        "security scan"
    }

    fn can_veto(&self) -> bool {
        true
    }

    async fn apply(&self, path: &Path, report: &mut CompletionReport) -> Result<Verdict> {
        log::debug!("Security scan (skipped) for {}", path.display());
        report.scan = Some(ScanResults::skipped());
        Ok(Verdict::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FileKind, FileMetadata};
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_scanner_records_skipped_results() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("payload.bin");
        tokio::fs::write(&path, b"data").await.unwrap();

        let mut report = CompletionReport::new(FileMetadata {
            upload_id: Uuid::new_v4(),
            filename: "payload.bin".to_string(),
            size: 4,
            checksum: None,
            timestamp: "2025-06-01T00:00:00+00:00".to_string(),
            file_type: FileKind::Unknown,
            filepath: path.display().to_string(),
        });

        let verdict = SecurityScanner.apply(&path, &mut report).await.unwrap();
        assert_eq!(verdict, Verdict::Accepted);

        let scan = report.scan.unwrap();
        assert_eq!(scan.virus_scan.status, "skipped");
        assert_eq!(scan.pii_detection.status, "skipped");
        assert!(scan.pii_detection.detected_pii.is_empty());
    }
}
