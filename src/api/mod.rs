/// HTTP Request Adapter
///
/// Parses transport-level upload requests into engine calls and maps
/// engine errors to status codes. Validation problems surface as 422,
/// engine-level client errors as 400, lookups of unknown uploads as 404,
/// and internal faults as 500.
pub mod types;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use uuid::Uuid;

use crate::error::UploadError;
use crate::pipeline::CompletionPipeline;
use crate::upload::{UploadId, UploadService};

use types::{
    ChunkUploadResponse, CompleteUploadResponse, ErrorBody, InitUploadRequest,
    InitUploadResponse, UploadStatusResponse,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<UploadService>,
    pub pipeline: Arc<CompletionPipeline>,
}

impl AppState {
    pub fn new(service: Arc<UploadService>, pipeline: Arc<CompletionPipeline>) -> Self {
        Self { service, pipeline }
    }
}

/// Build the upload router. `body_limit` bounds the chunk endpoint's
/// request size and should exceed the configured chunk size.
pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/upload/init", post(init_upload))
        .route("/api/upload/chunk", post(upload_chunk))
        .route("/api/upload/status/:upload_id", get(upload_status))
        .route("/api/upload/complete/:upload_id", post(complete_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Transport-level error: a status code plus a JSON `detail` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn unprocessable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.into(),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let status = match &err {
            UploadError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::SessionNotFound(_)
            | UploadError::InvalidChunkIndex(_)
            | UploadError::TotalChunksMismatch { .. }
            | UploadError::Incomplete { .. }
            | UploadError::Storage(_)
            | UploadError::Reassembly(_)
            | UploadError::Vetoed { .. } => StatusCode::BAD_REQUEST,
            UploadError::Io(_) | UploadError::Serialization(_) | UploadError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Resumable chunked upload service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "init": "POST /api/upload/init",
            "chunk": "POST /api/upload/chunk",
            "status": "GET /api/upload/status/{uploadId}",
            "complete": "POST /api/upload/complete/{uploadId}",
        },
    }))
}

async fn init_upload(
    State(state): State<AppState>,
    Json(request): Json<InitUploadRequest>,
) -> Result<Json<InitUploadResponse>, ApiError> {
    if request.total_size == 0 {
        return Err(ApiError::unprocessable("totalSize must be greater than zero"));
    }

    let (upload_id, chunk_size) = state
        .service
        .init(&request.filename, request.total_size, request.checksum)
        .await?;

    Ok(Json(InitUploadResponse {
        upload_id,
        chunk_size,
    }))
}

async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ChunkUploadResponse>, ApiError> {
    let mut upload_id: Option<String> = None;
    let mut chunk_index: Option<i64> = None;
    let mut total_chunks: Option<i64> = None;
    let mut payload: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::unprocessable(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("uploadId") => upload_id = Some(read_text_field(field, "uploadId").await?),
            Some("chunkIndex") => {
                let raw = read_text_field(field, "chunkIndex").await?;
                chunk_index = Some(parse_form_int(&raw, "chunkIndex")?);
            }
            Some("totalChunks") => {
                let raw = read_text_field(field, "totalChunks").await?;
                total_chunks = Some(parse_form_int(&raw, "totalChunks")?);
            }
            Some("chunk") => {
                payload = Some(field.bytes().await.map_err(|e| {
                    ApiError::unprocessable(format!("failed to read chunk field: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let upload_id = upload_id.ok_or_else(|| missing_field("uploadId"))?;
    let chunk_index = chunk_index.ok_or_else(|| missing_field("chunkIndex"))?;
    let total_chunks = total_chunks.ok_or_else(|| missing_field("totalChunks"))?;
    let payload = payload.ok_or_else(|| missing_field("chunk"))?;

    let upload_id = parse_upload_id(&upload_id)?;
    let receipt = state
        .service
        .upload_chunk(&upload_id, chunk_index, &payload, total_chunks)
        .await?;

    Ok(Json(ChunkUploadResponse {
        success: true,
        received_chunks: receipt.received_chunks,
        message: receipt.message.to_string(),
    }))
}

async fn upload_status(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<UploadStatusResponse>, ApiError> {
    let not_found = || ApiError::not_found(format!("Upload session {upload_id} not found"));

    let id = Uuid::parse_str(&upload_id).map_err(|_| not_found())?;
    let status = state.service.status(&id).await?.ok_or_else(not_found)?;

    let response = match status.total_chunks {
        Some(total_chunks) => UploadStatusResponse {
            upload_id: id,
            total_chunks,
            received_chunks: status.received_chunks,
            is_complete: status.is_complete,
        },
        None => infer_partial_status(id, status.received_chunks).ok_or_else(not_found)?,
    };

    Ok(Json(response))
}

/// Status view when only on-disk chunks are known: the best available
/// total is one past the highest committed index.
fn infer_partial_status(
    upload_id: UploadId,
    received_chunks: Vec<u32>,
) -> Option<UploadStatusResponse> {
    let highest = received_chunks.iter().copied().max()?;
    let inferred_total = highest + 1;
    Some(UploadStatusResponse {
        upload_id,
        total_chunks: inferred_total,
        is_complete: received_chunks.len() as u64 == u64::from(inferred_total),
        received_chunks,
    })
}

async fn complete_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<CompleteUploadResponse>, ApiError> {
    let id = parse_upload_id(&upload_id)?;

    let (path, metadata) = state.service.complete(&id).await?;
    let report = state.pipeline.run(&path, &metadata).await?;

    Ok(Json(CompleteUploadResponse {
        success: true,
        filepath: metadata.filepath.clone(),
        metadata,
        downstream_job_id: report.downstream_job_id,
        message: "Upload completed successfully".to_string(),
    }))
}

async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::unprocessable(format!("failed to read form field {name}: {e}")))
}

fn parse_form_int(raw: &str, name: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::unprocessable(format!("form field {name} must be an integer")))
}

fn missing_field(name: &str) -> ApiError {
    ApiError::unprocessable(format!("missing form field: {name}"))
}

/// An id that does not parse cannot name a live session; report it the
/// same way as any other unknown session.
fn parse_upload_id(raw: &str) -> Result<UploadId, ApiError> {
    Uuid::parse_str(raw).map_err(|_| UploadError::SessionNotFound(raw.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases: Vec<(UploadError, StatusCode)> = vec![
            (
                UploadError::Validation("bad".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                UploadError::SessionNotFound("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (UploadError::InvalidChunkIndex(9), StatusCode::BAD_REQUEST),
            (
                UploadError::Incomplete { missing: vec![1] },
                StatusCode::BAD_REQUEST,
            ),
            (
                UploadError::Vetoed {
                    stage: "format validation",
                    reason: "bad".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                UploadError::Config("broken".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let api_error = ApiError::from(err);
            assert_eq!(api_error.status, expected, "{}", api_error.detail);
        }
    }

    #[test]
    fn test_parse_form_int() {
        assert_eq!(parse_form_int("42", "chunkIndex").unwrap(), 42);
        assert_eq!(parse_form_int(" -1 ", "chunkIndex").unwrap(), -1);
        assert!(parse_form_int("four", "chunkIndex").is_err());
        assert!(parse_form_int("", "chunkIndex").is_err());
    }

    #[test]
    fn test_partial_status_inference() {
        let id = Uuid::new_v4();

        let inferred = infer_partial_status(id, vec![0, 1, 2]).unwrap();
        assert_eq!(inferred.total_chunks, 3);
        assert!(inferred.is_complete);

        let sparse = infer_partial_status(id, vec![0, 4]).unwrap();
        assert_eq!(sparse.total_chunks, 5);
        assert!(!sparse.is_complete);

        assert!(infer_partial_status(id, Vec::new()).is_none());
    }

    #[test]
    fn test_malformed_upload_id_maps_to_session_not_found() {
        let err = parse_upload_id("not-a-uuid").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.detail.contains("not-a-uuid"));
    }
}
