//! # ragcore
//!
//! Core of a hybrid retrieval-augmented generation engine: ingests
//! heterogeneous documents, builds dense/lexical/metadata/object indexes
//! over them, detects and links document versions, and answers
//! natural-language queries with citations via three escalating execution
//! routes (simple RAG, cross-document synthesis, a tool-using agent).
//!
//! ## Subsystems
//!
//! - [`chunking`] — token-bounded semantic chunking with overlap.
//! - [`summarization`] — section/document summaries, entities, contextual
//!   chunk descriptions.
//! - [`embedding`] — dense vector generation.
//! - [`rerank`] — cross-encoder-style relevance rescoring.
//! - [`storage`] — vector, lexical, metadata, and object store traits.
//! - [`version_detect`] — candidate predecessor detection and version
//!   linking.
//! - [`diffing`] — three-layer (textual/structural/semantic) version diff.
//! - [`ingestion`] — the document lifecycle state machine tying the above
//!   together.
//! - [`retriever`] — dense + lexical hybrid search, fusion, reranking.
//! - [`routing`] — LLM-classified query routing.
//! - [`generation`] — single-pass and map-reduce answer generation.
//! - [`agent`] — the bounded tool-using reason/act/observe loop.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod core;
pub mod diffing;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod llm;
pub mod parsing;
pub mod rerank;
pub mod retriever;
pub mod routing;
pub mod search;
pub mod storage;
pub mod summarization;
pub mod tokenizer;
pub mod version_detect;

// Re-export commonly used types at crate root
pub use config::Settings;
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    AgentResponse, AgentStep, Chunk, ChunkBuilder, ChunkType, Citation, Document, ParsedDocument, ProcessingStatus, QueryPlan, RetrievedChunk, Route,
    Section, TableData, VersionDiff, VersionMatchResult, VersionStatus, Visibility,
};

// Re-export storage types
pub use storage::{LexicalStore, MetadataStore, ObjectStore, VectorStore};

// Re-export chunking types
pub use chunking::{ChunkingConfig, chunk_document};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, cosine_similarity, create_embedder};

// Re-export search types
pub use search::{RrfConfig, reciprocal_rank_fusion, weighted_rrf};

// Re-export the higher-level engines
pub use diffing::DiffEngine;
pub use generation::AnswerGenerator;
pub use ingestion::IngestionPipeline;
pub use retriever::HybridRetriever;
pub use routing::QueryRouter;
pub use version_detect::VersionDetector;
