mod api;
mod provider;

pub use api::{ApiConfig, EmbeddingApiClient};
pub use provider::{Embedder, EmbeddingMode, EmbeddingProvider};
