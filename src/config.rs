//! Layered application configuration.
//!
//! Settings load from built-in defaults, an optional TOML file, then
//! environment variables prefixed `RAGCORE_` (e.g. `RAGCORE_CHUNK_MAX_SIZE`),
//! each layer overriding the previous one.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level settings object consumed by every component in the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chunker tuning.
    pub chunk_target_size: usize,
    /// Chunker tuning: hard cap per chunk before a split is forced.
    pub chunk_max_size: usize,
    /// Chunker tuning: trailing-token overlap carried into the next chunk.
    pub chunk_overlap: usize,

    /// Declared embedding vector length (1024 for the reference BGE-M3 model).
    pub embedding_dimension: usize,
    /// Batch size for embedding requests.
    pub embedding_batch_size: usize,

    /// Dense search candidate pool size before fusion.
    pub retrieval_top_k_vector: usize,
    /// Lexical search candidate pool size before fusion.
    pub retrieval_top_k_bm25: usize,
    /// RRF `k` constant.
    pub retrieval_rrf_k: u32,
    /// Final number of chunks returned after fusion/rerank.
    pub retrieval_final_top_k: usize,
    /// Neighbor chunks pulled in on each side during context expansion.
    pub context_window_chunks: usize,
    /// Confidence threshold above which a rerank candidate pool is kept.
    pub reranker_top_k: usize,

    /// Token budget for a single-pass RAG prompt.
    pub generation_max_context_tokens: usize,
    /// Whether the answer generator must cite sources or may refuse instead.
    pub require_citations: bool,

    /// File extensions the ingestion pipeline accepts.
    pub supported_extensions: Vec<String>,
    /// Upload size cap in megabytes.
    pub max_file_size_mb: u64,

    /// Maximum number of in-flight summarizer LLM calls per document.
    pub summarizer_concurrency: usize,
    /// Cap on agent loop reason/act/observe steps.
    pub agent_max_steps: u32,
    /// Confidence floor for auto-linking a version match.
    pub version_auto_link_threshold: f32,
    /// Title trigram similarity floor for version candidate lookup.
    pub version_title_similarity_threshold: f32,
    /// Cosine similarity floor for doc-summary candidate lookup.
    pub version_content_similarity_threshold: f32,

    /// Main LLM provider model name.
    pub llm_model: String,
    /// Light LLM model name, used for summarization/routing/version checks.
    pub light_llm_model: String,
    /// Base URL for the OpenAI-compatible LLM API.
    pub llm_api_base: Option<String>,
    /// LLM retry attempts on transient failure.
    pub llm_retry_attempts: u32,
    /// LLM retry minimum backoff in seconds.
    pub llm_retry_min_backoff_secs: u64,
    /// LLM retry maximum backoff in seconds.
    pub llm_retry_max_backoff_secs: u64,

    /// Vector store connection URL (Qdrant).
    pub vector_store_url: String,
    /// Vector store collection name.
    pub vector_collection_name: String,
    /// Lexical store (Tantivy) index directory.
    pub lexical_index_dir: String,
    /// Metadata store (SQLite) connection URL.
    pub metadata_database_url: String,
    /// Object store root (local directory or `s3://bucket` URL).
    pub object_store_root: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_target_size: 500,
            chunk_max_size: 800,
            chunk_overlap: 50,

            embedding_dimension: 1024,
            embedding_batch_size: 32,

            retrieval_top_k_vector: 20,
            retrieval_top_k_bm25: 20,
            retrieval_rrf_k: 60,
            retrieval_final_top_k: 5,
            context_window_chunks: 1,
            reranker_top_k: 5,

            generation_max_context_tokens: 12_000,
            require_citations: true,

            supported_extensions: [
                ".pdf", ".docx", ".doc", ".pptx", ".xlsx", ".csv", ".txt", ".md",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_file_size_mb: 100,

            summarizer_concurrency: 10,
            agent_max_steps: 8,
            version_auto_link_threshold: 0.8,
            version_title_similarity_threshold: 0.4,
            version_content_similarity_threshold: 0.75,

            llm_model: "gpt-4o".to_string(),
            light_llm_model: "gpt-4o-mini".to_string(),
            llm_api_base: None,
            llm_retry_attempts: 3,
            llm_retry_min_backoff_secs: 2,
            llm_retry_max_backoff_secs: 30,

            vector_store_url: "http://localhost:6334".to_string(),
            vector_collection_name: "doc_chunks".to_string(),
            lexical_index_dir: "./data/lexical-index".to_string(),
            metadata_database_url: "sqlite://./data/ragcore.db".to_string(),
            object_store_root: "./data/objects".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional `ragcore.toml` in the current
    /// directory, then `RAGCORE_`-prefixed environment variables.
    ///
    /// Loading the configuration file/environment itself is an ambient
    /// collaborator concern; what the core consumes is the resulting typed
    /// struct.
    pub fn from_env() -> Result<Self> {
        let figure = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default()).map_err(config_err)?)
            .add_source(config::File::with_name("ragcore").required(false))
            .add_source(config::Environment::with_prefix("RAGCORE").separator("__"))
            .build()
            .map_err(config_err)?;

        figure.try_deserialize().map_err(config_err)
    }
}

fn config_err(err: config::ConfigError) -> Error {
    Error::Config {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_tuning() {
        let settings = Settings::default();
        assert_eq!(settings.chunk_target_size, 500);
        assert_eq!(settings.chunk_max_size, 800);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.retrieval_rrf_k, 60);
        assert_eq!(settings.embedding_dimension, 1024);
    }

    #[test]
    fn supported_extensions_cover_all_parser_formats() {
        let settings = Settings::default();
        for ext in [".pdf", ".docx", ".pptx", ".xlsx", ".csv", ".txt", ".md"] {
            assert!(settings.supported_extensions.iter().any(|e| e == ext));
        }
    }
}
