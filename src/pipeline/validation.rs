/// Format & Schema Validation Sinks
///
/// The first two stages of the post-completion pipeline. Format
/// validation inspects dataset files; schema validation is a reserved
/// hook that accepts everything until real schema checks land.
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::metadata::{extension, FileKind, DATASET_EXTENSIONS};
use crate::pipeline::{CompletionReport, CompletionSink, Verdict};

/// Non-empty lines probed at the head of a JSONL file.
const JSONL_PROBE_LINES: usize = 10;

/// Rejects datasets whose format is unrecognized or whose JSONL head does
/// not parse.
pub struct FormatValidator;

#[async_trait]
impl CompletionSink for FormatValidator {
    fn name(&self) -> &'static str {
        "format validation"
    }

    fn can_veto(&self) -> bool {
        true
    }

    async fn apply(&self, path: &Path, report: &mut CompletionReport) -> Result<Verdict> {
        if report.metadata.file_type != FileKind::Dataset {
            return Ok(Verdict::Accepted);
        }

        let Some(ext) = extension(&report.metadata.filename) else {
            return Ok(Verdict::Rejected(
                "dataset file has no extension".to_string(),
            ));
        };
        if !DATASET_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(Verdict::Rejected(format!(
                "invalid dataset format: .{ext}"
            )));
        }

        if ext == "jsonl" {
            if let Some(reason) = probe_jsonl(path, JSONL_PROBE_LINES).await? {
                return Ok(Verdict::Rejected(reason));
            }
        }

        // Other dataset formats are accepted without deeper inspection.
        Ok(Verdict::Accepted)
    }
}

/// Parse the first `limit` non-empty lines as independent JSON values.
/// Returns a rejection reason naming the offending 1-based line number.
async fn probe_jsonl(path: &Path, limit: usize) -> Result<Option<String>> {
    let file = fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut line_number = 0usize;
    let mut probed = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if serde_json::from_str::<serde_json::Value>(trimmed).is_err() {
            return Ok(Some(format!("invalid JSONL format at line {line_number}")));
        }
        probed += 1;
        if probed >= limit {
            break;
        }
    }

    Ok(None)
}

/// Reserved hook for dataset schema checks (required fields, types, label
/// distributions). Accepts everything in v1.
pub struct SchemaValidator;

#[async_trait]
impl CompletionSink for SchemaValidator {
    fn name(&self) -> &'static str {
        "schema validation"
    }

    fn can_veto(&self) -> bool {
        true
    }

    async fn apply(&self, _path: &Path, _report: &mut CompletionReport) -> Result<Verdict> {
        Ok(Verdict::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FileMetadata;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn report_for(filename: &str) -> CompletionReport {
        CompletionReport::new(FileMetadata {
            upload_id: Uuid::new_v4(),
            filename: filename.to_string(),
            size: 0,
            checksum: None,
            timestamp: "2025-06-01T00:00:00+00:00".to_string(),
            file_type: FileKind::from_filename(filename),
            filepath: String::new(),
        })
    }

    #[tokio::test]
    async fn test_non_dataset_files_pass_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.pt");
        tokio::fs::write(&path, b"not json at all").await.unwrap();

        let verdict = FormatValidator
            .apply(&path, &mut report_for("model.pt"))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_valid_jsonl_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.jsonl");
        tokio::fs::write(&path, b"{\"t\":\"a\"}\n{\"t\":\"b\"}\n")
            .await
            .unwrap();

        let verdict = FormatValidator
            .apply(&path, &mut report_for("data.jsonl"))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_broken_jsonl_rejected_with_line_number() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.jsonl");
        tokio::fs::write(&path, b"{\"t\":\"a\"}\n{\"t\":\"b\"}\ninvalid\n")
            .await
            .unwrap();

        let verdict = FormatValidator
            .apply(&path, &mut report_for("data.jsonl"))
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Rejected("invalid JSONL format at line 3".to_string())
        );
    }

    #[tokio::test]
    async fn test_jsonl_probe_skips_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.jsonl");
        tokio::fs::write(&path, b"\n\n{\"ok\":true}\n\n{\"ok\":false}\n")
            .await
            .unwrap();

        let verdict = FormatValidator
            .apply(&path, &mut report_for("data.jsonl"))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_jsonl_probe_stops_after_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.jsonl");

        // Ten valid lines, then garbage the probe must never reach.
        let mut content = String::new();
        for i in 0..10 {
            content.push_str(&format!("{{\"row\":{i}}}\n"));
        }
        content.push_str("trailing garbage beyond the probe window\n");
        tokio::fs::write(&path, content).await.unwrap();

        let verdict = FormatValidator
            .apply(&path, &mut report_for("data.jsonl"))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_other_dataset_formats_accepted_without_inspection() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("table.csv");
        tokio::fs::write(&path, b"a,b\n1,2\n").await.unwrap();

        let verdict = FormatValidator
            .apply(&path, &mut report_for("table.csv"))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[tokio::test]
    async fn test_schema_validator_is_a_noop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.jsonl");
        tokio::fs::write(&path, b"{}\n").await.unwrap();

        let verdict = SchemaValidator
            .apply(&path, &mut report_for("data.jsonl"))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accepted);
    }
}
