//! The four persistent stores the ingestion pipeline and hybrid retriever
//! write to and read from: vector (dense similarity), lexical (BM25),
//! metadata (document/chunk rows of record), and object (raw bytes).
//!
//! Each store is a `Send + Sync` async trait with one production
//! implementation (backed by the named crate) and one in-memory fake used
//! by pipeline/retrieval tests that should not depend on live services.

pub mod fakes;
pub mod lexical;
pub mod metadata;
pub mod object;
pub mod vector;

pub use fakes::{InMemoryLexicalStore, InMemoryMetadataStore, InMemoryObjectStore, InMemoryVectorStore};
pub use lexical::{LexicalDoc, LexicalFilter, LexicalSearchHit, LexicalStore, TantivyLexicalStore};
pub use metadata::{MetadataStore, SectionSummary, SqliteMetadataStore};
pub use object::{FsObjectStore, ObjectStore};
pub use vector::{QdrantVectorStore, VectorFilter, VectorPoint, VectorSearchHit, VectorStore};

/// Default relative path for the lexical index directory.
pub const DEFAULT_LEXICAL_INDEX_DIR: &str = "./data/lexical-index";

/// Default SQLite metadata database URL.
pub const DEFAULT_METADATA_DATABASE_URL: &str = "sqlite://./data/ragcore.db";
