//! v1 Document handlers.

use axum::extract::{Multipart, State};

use crate::api::v1::dto::IngestDocumentResponse;
use crate::api::v1::response::{ApiResponse, ErrorCode};
use crate::api::AppState;

/// `POST /api/v1/documents:ingest`
///
/// Multipart form with a required `file` and an optional `source` name.
/// The document is chunked and indexed before the response is sent.
pub async fn ingest_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResponse<IngestDocumentResponse> {
    let max_bytes = state.config.rag.max_upload_bytes;
    let mut file: Option<(Vec<u8>, String, Option<String>)> = None;
    let mut source: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiResponse::error(
                    ErrorCode::InvalidRequest,
                    format!("Invalid multipart body: {e}"),
                )
            }
        };

        match field.name().unwrap_or("") {
            "file" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = match field.bytes().await {
                    Ok(b) => b,
                    Err(e) => {
                        return ApiResponse::error(
                            ErrorCode::InvalidRequest,
                            format!("Failed to read file: {e}"),
                        );
                    }
                };
                if bytes.len() > max_bytes {
                    return ApiResponse::error(
                        ErrorCode::InvalidRequest,
                        format!("File too large: {} bytes (max {max_bytes} bytes)", bytes.len()),
                    );
                }
                file = Some((bytes.to_vec(), name, content_type));
            }
            "source" => match field.text().await {
                Ok(text) if !text.trim().is_empty() => source = Some(text.trim().to_string()),
                Ok(_) => {}
                Err(e) => {
                    return ApiResponse::error(
                        ErrorCode::InvalidRequest,
                        format!("Invalid source: {e}"),
                    );
                }
            },
            _ => {}
        }
    }

    let Some((bytes, name, content_type)) = file else {
        return ApiResponse::error(ErrorCode::InvalidRequest, "Missing required 'file' field");
    };
    let source = source.unwrap_or_else(|| name.clone());

    match state
        .ingestor
        .ingest_bytes(&bytes, content_type.as_deref(), &name, &source)
        .await
    {
        Ok(report) => ApiResponse::created(report.into()),
        Err(e) => e.into(),
    }
}
