use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;

pub fn v1_router() -> Router<AppState> {
    let memories = Router::new()
        .route("/", get(handlers::memories::list_memories))
        .route("/{memoryId}", delete(handlers::memories::delete_memory));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/chat", post(handlers::chat::chat))
        .route(
            "/documents:ingest",
            post(handlers::documents::ingest_document),
        )
        .nest("/memories", memories)
}
