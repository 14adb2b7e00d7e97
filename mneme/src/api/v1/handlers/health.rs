use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub embeddings: EmbeddingsStatus,
    pub vector: VectorStatus,
    pub llm: LlmStatus,
    pub web_search: WebSearchStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsStatus {
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorStatus {
    pub backend: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmStatus {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchStatus {
    pub configured: bool,
}

/// `GET /api/v1/health`
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let info = &state.info;

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        embeddings: EmbeddingsStatus {
            model: info.embedding_model.clone(),
            dimensions: info.embedding_dimensions,
        },
        vector: VectorStatus {
            backend: info.vector_backend.to_string(),
        },
        llm: LlmStatus {
            model: info.chat_model.clone(),
            fallback_model: info.fallback_model.clone(),
        },
        web_search: WebSearchStatus {
            configured: info.web_search_configured,
        },
    })
}
