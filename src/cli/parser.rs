//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. This binary is a
//! thin administrative/debugging surface over the core engine — the
//! primary integration point is still the library API, consumed by the
//! (out-of-scope) HTTP transport layer.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ragcore: hybrid RAG engine — ingestion, version lifecycle, retrieval,
/// and agentic query orchestration over heterogeneous documents.
#[derive(Parser, Debug)]
#[command(name = "ragcore-cli")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a `ragcore.toml` settings file. Falls back to defaults and
    /// `RAGCORE_`-prefixed environment variables if absent.
    #[arg(short, long, env = "RAGCORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) tracing output on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a file through the full lifecycle (parse, chunk, summarize,
    /// detect version, embed, index).
    Ingest {
        /// Path to the file to ingest.
        file: PathBuf,

        /// Document type tag, skips auto-detection if supplied.
        #[arg(long)]
        doc_type: Option<String>,

        /// Comma-separated tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Document group identifier (UUID).
        #[arg(long)]
        group_id: Option<String>,

        /// Owning department.
        #[arg(long)]
        department: Option<String>,
    },

    /// Delete a document and all of its chunks across every store.
    Delete {
        /// Document identifier.
        doc_id: String,
    },

    /// Show one document's metadata and processing status.
    Get {
        /// Document identifier.
        doc_id: String,
    },

    /// List documents matching optional filters.
    #[command(name = "list", alias = "ls")]
    ListDocuments {
        /// Restrict to one document type.
        #[arg(long)]
        doc_type: Option<String>,

        /// Restrict to one group (UUID).
        #[arg(long)]
        group_id: Option<String>,

        /// Restrict to documents carrying this tag.
        #[arg(long)]
        tag: Option<String>,

        /// Maximum number of documents to return.
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Run hybrid retrieval directly, bypassing the router and generator.
    Search {
        /// Query text.
        query: String,

        /// Number of chunks to return after fusion/rerank.
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Include superseded versions, not just the latest.
        #[arg(long)]
        all_versions: bool,

        /// Restrict to one document (UUID).
        #[arg(long)]
        doc_id: Option<String>,
    },

    /// Ask a question; the router picks simple RAG, cross-document
    /// synthesis, or the agent loop.
    Query {
        /// The question to answer.
        question: String,

        /// Force a specific route instead of letting the router decide
        /// (`simple_rag`, `enhanced_rag`, `agent`).
        #[arg(long)]
        route: Option<String>,
    },

    /// Run the agent loop directly on a question.
    Agent {
        /// The question to answer.
        question: String,
    },

    /// Compare two document versions (cached if already computed).
    Compare {
        /// Older (or either) document identifier.
        doc_id: String,

        /// Other document identifier.
        other_doc_id: String,
    },

    /// Walk a document's version chain from oldest to newest.
    History {
        /// Any document identifier within the chain.
        doc_id: String,
    },
}
