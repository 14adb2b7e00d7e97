use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::{Database, LibSqlBackend, MemoryRecordStore};
use crate::embeddings::{Embedder, EmbeddingProvider};
use crate::error::Result;
use crate::intelligence::ImportanceScorer;
use crate::llm::{ChatBackend, LlmProvider};
use crate::models::VectorFilter;
use crate::processing::{ContentExtractor, DocumentIngestor, WordChunker};
use crate::services::{
    MemoryService, MemoryWriter, SemanticRetriever, SessionStore, TavilyClient, TurnComponents,
    TurnOrchestrator, WebRetriever, WebSearch,
};
use crate::vector::{build_vector_index, VectorIndex};

/// The external capabilities the server is wired from.
pub struct Backends {
    pub store: Arc<dyn MemoryRecordStore>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatBackend>,
    pub chat_fallback: Option<Arc<dyn ChatBackend>>,
    pub scorer: Arc<dyn ChatBackend>,
    pub scorer_fallback: Option<Arc<dyn ChatBackend>>,
    pub web: Arc<dyn WebSearch>,
}

impl Backends {
    /// Connects the database, loads the embedding model and builds the
    /// configured vector index and LLM clients. LLM and web search problems
    /// only surface when first used.
    pub async fn from_config(config: &Config) -> Result<Self> {
        tracing::info!("Initializing database...");
        let db = Database::new(&config.database).await?;

        tracing::info!(model = %config.embeddings.model, "Loading embedding model...");
        let embedder = EmbeddingProvider::new(&config.embeddings)?;
        let index = build_vector_index(&config.vector, &db, embedder.dimensions()).await?;

        let llm = &config.llm;
        let chat = provider(llm.with_model(&llm.model));
        let chat_fallback = llm
            .fallback_model
            .as_deref()
            .map(|model| provider(llm.with_model(model)));
        let scorer = provider(llm.with_model(&llm.scorer_model));
        let scorer_fallback = llm
            .scorer_fallback_model
            .as_deref()
            .map(|model| provider(llm.with_model(model)));

        Ok(Self {
            store: Arc::new(LibSqlBackend::new(db)),
            index,
            embedder: Arc::new(embedder),
            chat,
            chat_fallback,
            scorer,
            scorer_fallback,
            web: Arc::new(TavilyClient::new(&config.search)?),
        })
    }
}

fn provider(config: crate::config::LlmConfig) -> Arc<dyn ChatBackend> {
    let provider = LlmProvider::new(Some(&config));
    if !provider.is_available() {
        tracing::warn!(model = %config.model, "LLM unavailable - calls to this model will fail");
    }
    Arc::new(provider)
}

/// Snapshot of what the server runs on, reported by the health endpoint.
#[derive(Debug, Clone)]
pub struct BackendInfo {
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub vector_backend: &'static str,
    pub chat_model: String,
    pub fallback_model: Option<String>,
    pub web_search_configured: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub memory: Arc<MemoryService>,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub ingestor: Arc<DocumentIngestor>,
    pub info: Arc<BackendInfo>,
    /// Cancelled on server shutdown; chat streams use child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, backends: Backends, shutdown: CancellationToken) -> Self {
        let Backends {
            store,
            index,
            embedder,
            chat,
            chat_fallback,
            scorer,
            scorer_fallback,
            web,
        } = backends;

        let info = BackendInfo {
            embedding_model: embedder.model_name().to_string(),
            embedding_dimensions: embedder.dimensions(),
            vector_backend: index.backend_name(),
            chat_model: chat.name().to_string(),
            fallback_model: chat_fallback.as_ref().map(|b| b.name().to_string()),
            web_search_configured: config.search.tavily_api_key.is_some(),
        };

        let memory_ns = config.vector.memory_namespace.as_str();
        let document_ns = config.vector.document_namespace.as_str();

        let memory = Arc::new(MemoryService::new(
            store,
            Arc::clone(&index),
            Arc::clone(&embedder),
            ImportanceScorer::new(scorer, scorer_fallback),
            memory_ns,
            &config.memory,
        ));
        let writer = MemoryWriter::new(Arc::clone(&memory), config.memory.write_mode);

        let memory_retriever = SemanticRetriever::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            memory_ns,
            config.memory.top_k,
            config.memory.min_relevance,
        )
        .with_filter(
            VectorFilter::new()
                .eq("type", "memory")
                .eq("userId", &config.memory.user_id),
        );
        let document_retriever = SemanticRetriever::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            document_ns,
            config.rag.top_k,
            config.rag.min_relevance,
        );

        let orchestrator = TurnOrchestrator::new(TurnComponents {
            memory: Arc::clone(&memory),
            writer,
            memory_retriever: Arc::new(memory_retriever),
            document_retriever: Arc::new(document_retriever),
            web: Arc::new(WebRetriever::new(web, config.search.max_results)),
            sessions: SessionStore::new(config.session.capacity, config.session.max_turns),
            extractor: ContentExtractor::new(),
            primary: chat,
            fallback: chat_fallback,
        });

        let ingestor = DocumentIngestor::new(
            WordChunker::from_config(&config.rag),
            embedder,
            index,
            document_ns,
        );

        Self {
            config: Arc::new(config),
            memory,
            orchestrator: Arc::new(orchestrator),
            ingestor: Arc::new(ingestor),
            info: Arc::new(info),
            shutdown,
        }
    }

    pub async fn from_config(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let backends = Backends::from_config(&config).await?;
        Ok(Self::new(config, backends, shutdown))
    }
}
