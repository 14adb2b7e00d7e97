//! v1 Chat handler.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;

use crate::api::v1::dto::ChatRequest;
use crate::api::v1::response::{ApiResponse, ErrorCode};
use crate::api::AppState;
use crate::models::{ChatMessage, TurnRequest, UploadedFile};

type Rejection = ApiResponse<()>;

/// `POST /api/v1/chat`
///
/// Accepts JSON or a multipart form (`messages` as a JSON string,
/// `sessionId`, optional `file`). On success the reply is streamed as
/// `text/plain`; invalid requests get the JSON error envelope.
pub async fn chat(State(state): State<AppState>, request: Request) -> Response {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let turn = if is_multipart {
        read_multipart(&state, request).await
    } else {
        read_json(&state, request).await
    };
    let turn = match turn {
        Ok(turn) => turn,
        Err(rejection) => return rejection.into_response(),
    };

    let session_id = turn.session_id.clone();
    match state
        .orchestrator
        .run_turn(turn, state.shutdown.child_token())
        .await
    {
        Ok(tokens) => {
            tracing::debug!(session_id = %session_id, "Streaming chat reply");
            let body = Body::from_stream(tokens.map(Ok::<_, Infallible>));
            (
                [
                    (CONTENT_TYPE, "text/plain; charset=utf-8"),
                    (CACHE_CONTROL, "no-cache"),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => ApiResponse::<()>::from(e).into_response(),
    }
}

async fn read_json(state: &AppState, request: Request) -> Result<TurnRequest, Rejection> {
    let Json(body) = Json::<ChatRequest>::from_request(request, state)
        .await
        .map_err(|e| ApiResponse::error(ErrorCode::InvalidRequest, e.body_text()))?;

    Ok(TurnRequest {
        session_id: body.session_id(),
        messages: body.messages,
        file: None,
    })
}

async fn read_multipart(state: &AppState, request: Request) -> Result<TurnRequest, Rejection> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiResponse::error(ErrorCode::InvalidRequest, e.body_text()))?;

    let max_bytes = state.config.rag.max_upload_bytes;
    let mut messages: Option<Vec<ChatMessage>> = None;
    let mut session_id: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid multipart body: {e}"))
    })? {
        match field.name().unwrap_or("") {
            "messages" => {
                let raw = field.text().await.map_err(|e| {
                    ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid messages: {e}"))
                })?;
                let parsed = serde_json::from_str(&raw).map_err(|e| {
                    ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid messages: {e}"))
                })?;
                messages = Some(parsed);
            }
            "sessionId" | "session_id" => {
                let raw = field.text().await.map_err(|e| {
                    ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid sessionId: {e}"))
                })?;
                session_id = Some(raw);
            }
            "file" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiResponse::error(ErrorCode::InvalidRequest, format!("Failed to read file: {e}"))
                })?;
                if bytes.len() > max_bytes {
                    return Err(ApiResponse::error(
                        ErrorCode::InvalidRequest,
                        format!("File too large: {} bytes (max {max_bytes} bytes)", bytes.len()),
                    ));
                }
                file = Some(UploadedFile {
                    name,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let body = ChatRequest {
        messages: messages.unwrap_or_default(),
        session_id,
    };
    Ok(TurnRequest {
        session_id: body.session_id(),
        messages: body.messages,
        file,
    })
}
