use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

fn parse_env_or<T: FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingsConfig,
    pub vector: VectorConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub rag: RagConfig,
    pub search: SearchConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on how long shutdown waits for in-flight memory writes.
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum VectorBackendKind {
    LibSql,
    Pinecone,
    Memory,
}

impl FromStr for VectorBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "libsql" | "sqlite" => Ok(Self::LibSql),
            "pinecone" => Ok(Self::Pinecone),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown vector backend '{other}'")),
        }
    }
}

impl std::fmt::Display for VectorBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LibSql => write!(f, "libsql"),
            Self::Pinecone => write!(f, "pinecone"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorConfig {
    pub backend: VectorBackendKind,
    pub pinecone_api_key: Option<String>,
    pub pinecone_index_host: Option<String>,
    pub memory_namespace: String,
    pub document_namespace: String,
    pub timeout_secs: u64,
}

/// Chat/completion models. `model` streams answers, `scorer_model` rates
/// memory importance; each has an optional fallback tried exactly once.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub fallback_model: Option<String>,
    pub scorer_model: String,
    pub scorer_fallback_model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl LlmConfig {
    /// Same credentials and transport settings, different model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MemoryWriteMode {
    /// Spawn the commit and never wait for it.
    Background,
    /// Await the commit before generation starts.
    Inline,
    /// Spawn the commit and wait for it at most this long.
    Bounded(Duration),
}

impl FromStr for MemoryWriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "background" => Ok(Self::Background),
            "inline" => Ok(Self::Inline),
            _ => match value.strip_prefix("bounded:") {
                Some(ms) => ms
                    .parse::<u64>()
                    .map(|ms| Self::Bounded(Duration::from_millis(ms)))
                    .map_err(|e| format!("invalid bounded wait '{ms}': {e}")),
                None => Err(format!("unknown memory write mode '{value}'")),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    pub user_id: String,
    pub duplicate_threshold: f32,
    pub duplicate_top_k: u32,
    pub min_relevance: f32,
    pub top_k: u32,
    pub importance_threshold: f64,
    pub write_mode: MemoryWriteMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    pub top_k: u32,
    pub min_relevance: f32,
    pub chunk_max_words: usize,
    pub chunk_overlap_words: usize,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub tavily_api_key: Option<String>,
    pub base_url: String,
    pub max_results: usize,
    pub search_depth: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub max_turns: usize,
    pub capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("MNEME_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("MNEME_PORT", 4000),
                shutdown_grace_secs: parse_env_or("SHUTDOWN_GRACE_SECS", 10),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:mneme.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            embeddings: EmbeddingsConfig {
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "BAAI/bge-small-en-v1.5".to_string()),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 384),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 64),
                api_key: non_empty_env("EMBEDDING_API_KEY"),
                base_url: non_empty_env("EMBEDDING_BASE_URL"),
                timeout_secs: parse_env_or("EMBEDDING_TIMEOUT", 30),
                max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 2),
            },
            vector: VectorConfig {
                backend: parse_env_or("VECTOR_BACKEND", VectorBackendKind::LibSql),
                pinecone_api_key: non_empty_env("PINECONE_API_KEY"),
                pinecone_index_host: non_empty_env("PINECONE_INDEX_HOST"),
                memory_namespace: env::var("MEMORY_NAMESPACE")
                    .unwrap_or_else(|_| "memory".to_string()),
                document_namespace: env::var("DOCUMENT_NAMESPACE")
                    .unwrap_or_else(|_| "documents".to_string()),
                timeout_secs: parse_env_or("VECTOR_TIMEOUT", 30),
            },
            llm: LlmConfig {
                model: env::var("LLM_MODEL")
                    .unwrap_or_else(|_| "openrouter/openrouter/auto".to_string()),
                fallback_model: match env::var("LLM_FALLBACK_MODEL") {
                    Ok(model) if model.trim().is_empty() => None,
                    Ok(model) => Some(model),
                    Err(_) => Some(
                        "openrouter/google/gemini-2.0-flash-lite-preview-02-05:free".to_string(),
                    ),
                },
                scorer_model: env::var("SCORER_MODEL")
                    .unwrap_or_else(|_| "openrouter/openrouter/free".to_string()),
                scorer_fallback_model: match env::var("SCORER_FALLBACK_MODEL") {
                    Ok(model) if model.trim().is_empty() => None,
                    Ok(model) => Some(model),
                    Err(_) => Some(
                        "openrouter/google/gemini-2.0-flash-lite-preview-02-05:free".to_string(),
                    ),
                },
                api_key: non_empty_env("LLM_API_KEY").or_else(|| non_empty_env("OPENROUTER_API_KEY")),
                base_url: non_empty_env("LLM_BASE_URL"),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 60),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 0),
            },
            memory: MemoryConfig {
                user_id: env::var("MEMORY_USER_ID").unwrap_or_else(|_| "default-user".to_string()),
                duplicate_threshold: parse_env_or("MEMORY_DUPLICATE_THRESHOLD", 0.92),
                duplicate_top_k: parse_env_or("MEMORY_DUPLICATE_TOP_K", 5),
                min_relevance: parse_env_or("MEMORY_MIN_RELEVANCE", 0.75),
                top_k: parse_env_or("MEMORY_TOP_K", 10),
                importance_threshold: parse_env_or("MEMORY_IMPORTANCE_THRESHOLD", 0.8),
                write_mode: parse_env_or("MEMORY_WRITE_MODE", MemoryWriteMode::Background),
            },
            rag: RagConfig {
                top_k: parse_env_or("RAG_TOP_K", 5),
                min_relevance: parse_env_or("RAG_MIN_RELEVANCE", 0.75),
                chunk_max_words: parse_env_or("CHUNK_MAX_WORDS", 500),
                chunk_overlap_words: parse_env_or("CHUNK_OVERLAP_WORDS", 100),
                max_upload_bytes: parse_env_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            },
            search: SearchConfig {
                tavily_api_key: non_empty_env("TAVILY_API_KEY"),
                base_url: env::var("TAVILY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.tavily.com".to_string()),
                max_results: parse_env_or("WEB_MAX_RESULTS", 5),
                search_depth: env::var("WEB_SEARCH_DEPTH").unwrap_or_else(|_| "basic".to_string()),
                timeout_secs: parse_env_or("WEB_SEARCH_TIMEOUT", 20),
            },
            session: SessionConfig {
                max_turns: parse_env_or("SESSION_MAX_TURNS", 12),
                capacity: parse_env_or("SESSION_CAPACITY", 1000),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Optional override read once at startup; `None` keeps the configured default.
    pub fn log_format() -> Option<String> {
        parse_env_opt("LOG_FORMAT")
    }
}

/// Known embedding providers that use OpenAI-compatible APIs
const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio", "local"];

/// Known LLM providers that use OpenAI-compatible APIs
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse a model name into (provider, model) tuple.
pub fn parse_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}

/// Parse an LLM model name into (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_memory_config_defaults() {
        std::env::remove_var("MEMORY_DUPLICATE_THRESHOLD");
        std::env::remove_var("MEMORY_MIN_RELEVANCE");
        std::env::remove_var("MEMORY_TOP_K");
        std::env::remove_var("MEMORY_WRITE_MODE");

        let config = Config::default();
        assert_eq!(config.memory.duplicate_threshold, 0.92);
        assert_eq!(config.memory.min_relevance, 0.75);
        assert_eq!(config.memory.top_k, 10);
        assert_eq!(config.memory.duplicate_top_k, 5);
        assert_eq!(config.memory.write_mode, MemoryWriteMode::Background);
        assert_eq!(config.session.max_turns, 12);
        assert_eq!(config.rag.top_k, 5);
    }

    #[test]
    #[serial]
    fn test_write_mode_from_env() {
        std::env::set_var("MEMORY_WRITE_MODE", "bounded:250");
        let config = Config::default();
        assert_eq!(
            config.memory.write_mode,
            MemoryWriteMode::Bounded(Duration::from_millis(250))
        );

        std::env::set_var("MEMORY_WRITE_MODE", "sometimes");
        let config = Config::default();
        assert_eq!(config.memory.write_mode, MemoryWriteMode::Background);

        std::env::remove_var("MEMORY_WRITE_MODE");
    }

    #[test]
    #[serial]
    fn test_llm_fallback_can_be_disabled() {
        std::env::set_var("LLM_FALLBACK_MODEL", "");
        let config = Config::default();
        assert!(config.llm.fallback_model.is_none());

        std::env::remove_var("LLM_FALLBACK_MODEL");
        let config = Config::default();
        assert!(config.llm.fallback_model.is_some());
    }

    #[test]
    #[serial]
    fn test_llm_api_key_falls_back_to_openrouter_key() {
        std::env::remove_var("LLM_API_KEY");
        std::env::set_var("OPENROUTER_API_KEY", "sk-or-test");
        let config = Config::default();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-or-test"));
        std::env::remove_var("OPENROUTER_API_KEY");
    }

    #[test]
    #[serial]
    fn test_vector_backend_parsing() {
        std::env::set_var("VECTOR_BACKEND", "pinecone");
        assert_eq!(Config::default().vector.backend, VectorBackendKind::Pinecone);

        std::env::set_var("VECTOR_BACKEND", "bogus");
        assert_eq!(Config::default().vector.backend, VectorBackendKind::LibSql);

        std::env::remove_var("VECTOR_BACKEND");
    }

    #[test]
    #[serial]
    fn test_parse_env_or_valid_value() {
        std::env::set_var("__TEST_PARSE_PORT", "8080");
        let result: u16 = parse_env_or("__TEST_PARSE_PORT", 3000);
        assert_eq!(result, 8080);
        std::env::remove_var("__TEST_PARSE_PORT");
    }

    #[test]
    fn test_parse_llm_provider_model() {
        assert_eq!(
            parse_llm_provider_model("openrouter/openrouter/auto"),
            ("openrouter", "openrouter/auto")
        );
        assert_eq!(parse_llm_provider_model("llama3"), ("local", "llama3"));
        assert_eq!(
            parse_provider_model("openai/text-embedding-3-small"),
            ("openai", "text-embedding-3-small")
        );
    }
}
