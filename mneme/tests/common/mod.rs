// Common test utilities for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use futures::StreamExt;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use mneme::api::{AppState, Backends};
use mneme::config::{Config, DatabaseConfig, MemoryWriteMode, VectorBackendKind};
use mneme::db::{Database, LibSqlBackend, MemoryRecordStore};
use mneme::embeddings::{Embedder, EmbeddingMode};
use mneme::error::{MnemeError, Result};
use mneme::llm::{ChatBackend, CompletionOptions, TokenStream};
use mneme::models::{ChatMessage, VectorFilter, VectorMatch, VectorRecord};
use mneme::services::{WebResults, WebSearch};
use mneme::vector::{InMemoryVectorIndex, VectorIndex};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

const VOCABULARY: &[&str] = &[
    "name", "tea", "coffee", "rust", "nurse", "revenue", "weather", "marathon", "python", "vegan",
];
const RESIDUAL_DIMS: usize = 16;
const RESIDUAL_WEIGHT: f32 = 0.05;

/// Deterministic bag-of-words embedder. Topic words get their own axis;
/// every other token adds a small weight to one of a few hashed axes, so
/// texts sharing a topic word are near-identical and texts without one are
/// far apart.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut values = vec![0.0; VOCABULARY.len() + RESIDUAL_DIMS];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            match VOCABULARY.iter().position(|word| *word == token) {
                Some(axis) => values[axis] += 1.0,
                None => {
                    let hash = token
                        .bytes()
                        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
                    values[VOCABULARY.len() + hash as usize % RESIDUAL_DIMS] += RESIDUAL_WEIGHT;
                }
            }
        }
        values
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: Vec<String>, _mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + RESIDUAL_DIMS
    }

    fn model_name(&self) -> &str {
        "test/keyword"
    }
}

// ---------------------------------------------------------------------------
// Chat backends
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum StreamScript {
    Tokens(Vec<String>),
    /// Fails before producing anything.
    Fail(String),
    /// Produces some tokens, then fails.
    FailAfter(Vec<String>, String),
    /// Produces the tokens, then never finishes.
    Hang(Vec<String>),
}

/// A chat backend that replays a fixed script and records what it was sent.
pub struct ScriptedChat {
    name: String,
    script: StreamScript,
    completion: std::result::Result<String, String>,
    pub stream_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedChat {
    pub fn new(name: &str, script: StreamScript) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            completion: Ok(r#"{"importance": 0.1, "memory": null}"#.to_string()),
            stream_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(name: &str, tokens: &[&str]) -> Arc<Self> {
        Self::new(
            name,
            StreamScript::Tokens(tokens.iter().map(|t| t.to_string()).collect()),
        )
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Self::new(name, StreamScript::Fail(message.to_string()))
    }

    /// A scorer that answers every completion with `reply`.
    pub fn scorer(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: "test/scorer".to_string(),
            script: StreamScript::Tokens(Vec::new()),
            completion: Ok(reply.to_string()),
            stream_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }

    pub fn streams(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        self.completion.clone().map_err(MnemeError::Llm)
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();

        let ok = |tokens: &[String]| -> Vec<Result<String>> {
            tokens.iter().cloned().map(Ok).collect()
        };

        let stream: TokenStream = match &self.script {
            StreamScript::Tokens(tokens) => Box::pin(futures::stream::iter(ok(tokens))),
            StreamScript::Fail(message) => return Err(MnemeError::Llm(message.clone())),
            StreamScript::FailAfter(tokens, message) => {
                let mut items = ok(tokens);
                items.push(Err(MnemeError::Llm(message.clone())));
                Box::pin(futures::stream::iter(items))
            }
            StreamScript::Hang(tokens) => Box::pin(
                futures::stream::iter(ok(tokens)).chain(futures::stream::pending()),
            ),
        };
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// Vector index and web search
// ---------------------------------------------------------------------------

/// In-memory index whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyIndex {
    inner: InMemoryVectorIndex,
    pub fail_upserts: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FlakyIndex {
    pub async fn len(&self, namespace: &str) -> usize {
        self.inner.len(namespace).await
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(MnemeError::VectorIndex("index unreachable".to_string()));
        }
        self.inner.upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: u32,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        self.inner.query(namespace, vector, top_k, filter).await
    }

    async fn delete(&self, namespace: &str, ids: &[String]) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MnemeError::VectorIndex("index unreachable".to_string()));
        }
        self.inner.delete(namespace, ids).await
    }

    async fn delete_matching(&self, namespace: &str, filter: &VectorFilter) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MnemeError::VectorIndex("index unreachable".to_string()));
        }
        self.inner.delete_matching(namespace, filter).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky-memory"
    }
}

#[derive(Default)]
pub struct StaticWeb {
    pub results: WebResults,
    pub calls: AtomicUsize,
}

#[async_trait]
impl WebSearch for StaticWeb {
    async fn search(&self, _query: &str) -> Result<WebResults> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub state: AppState,
    pub store: Arc<LibSqlBackend>,
    pub index: Arc<FlakyIndex>,
    pub chat: Arc<ScriptedChat>,
    pub fallback: Arc<ScriptedChat>,
    pub scorer: Arc<ScriptedChat>,
    pub web: Arc<StaticWeb>,
    _dir: TempDir,
}

pub struct HarnessOptions {
    pub chat: Arc<ScriptedChat>,
    pub fallback: Arc<ScriptedChat>,
    pub scorer: Arc<ScriptedChat>,
    pub web: StaticWeb,
    pub write_mode: MemoryWriteMode,
    pub embedder: Arc<dyn Embedder>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            chat: ScriptedChat::replying("test/primary", &["Hello", " there"]),
            fallback: ScriptedChat::replying("test/fallback", &["Fallback", " reply"]),
            scorer: ScriptedChat::scorer(r#"{"importance": 0.1, "memory": null}"#),
            web: StaticWeb::default(),
            write_mode: MemoryWriteMode::Inline,
            embedder: Arc::new(KeywordEmbedder),
        }
    }
}

pub fn test_config(dir: &TempDir, write_mode: MemoryWriteMode) -> Config {
    let mut config = Config::from_env();
    config.database = DatabaseConfig {
        url: format!("file:{}", dir.path().join("mneme-test.db").display()),
        auth_token: None,
        local_path: None,
    };
    config.vector.backend = VectorBackendKind::Memory;
    config.memory.user_id = "default-user".to_string();
    config.memory.write_mode = write_mode;
    config.session.max_turns = 12;
    config
}

pub async fn harness(options: HarnessOptions) -> Harness {
    init_test_logger();

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, options.write_mode);

    let db = Database::new(&config.database).await.unwrap();
    let store = Arc::new(LibSqlBackend::new(db));
    let index = Arc::new(FlakyIndex::default());
    let web = Arc::new(options.web);

    let backends = Backends {
        store: store.clone() as Arc<dyn MemoryRecordStore>,
        index: index.clone() as Arc<dyn VectorIndex>,
        embedder: options.embedder,
        chat: options.chat.clone(),
        chat_fallback: Some(options.fallback.clone()),
        scorer: options.scorer.clone(),
        scorer_fallback: None,
        web: web.clone(),
    };

    Harness {
        state: AppState::new(config, backends, CancellationToken::new()),
        store,
        index,
        chat: options.chat,
        fallback: options.fallback,
        scorer: options.scorer,
        web,
        _dir: dir,
    }
}

/// Drains a turn stream into one string.
pub async fn collect(stream: mneme::services::TurnStream) -> String {
    stream.collect::<Vec<_>>().await.concat()
}

// Re-export commonly used crates for convenience
pub use serial_test::serial;
pub use tempfile;
pub use wiremock;
