//! v1 Memory handlers.

use axum::extract::{Path, State};
use axum_extra::extract::Query;

use crate::api::v1::dto::{ListMemoriesQuery, ListMemoriesResponse, MemoryResponse};
use crate::api::v1::response::ApiResponse;
use crate::api::AppState;
use crate::models::DeleteReport;

/// `GET /api/v1/memories`
///
/// Memories of the configured user, newest first.
pub async fn list_memories(
    State(state): State<AppState>,
    Query(query): Query<ListMemoriesQuery>,
) -> ApiResponse<ListMemoriesResponse> {
    match state.memory.list(query.limit).await {
        Ok(records) => {
            let memories: Vec<MemoryResponse> = records.into_iter().map(Into::into).collect();
            ApiResponse::success(ListMemoriesResponse {
                total: memories.len(),
                memories,
            })
        }
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/memories/{memoryId}`
pub async fn delete_memory(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
) -> ApiResponse<DeleteReport> {
    match state.memory.delete(&memory_id).await {
        Ok(report) => ApiResponse::success(report),
        Err(e) => e.into(),
    }
}
