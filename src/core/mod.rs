//! Core domain models for ragcore.
//!
//! Pure data structures with no I/O: documents and their sections, chunks,
//! retrieval-time projections, and version/agent types. Every store,
//! parser, and orchestrator in the crate speaks these types at its
//! boundary.
pub mod agent;
pub mod chunk;
pub mod document;
pub mod retrieval;
pub mod version;

pub use agent::{AgentResponse, AgentStep, QueryPlan, Route};
pub use chunk::{Chunk, ChunkBuilder, ChunkType};
pub use document::{Document, ParsedDocument, ProcessingStatus, Section, TableData, VersionStatus, Visibility};
pub use retrieval::{Citation, RetrievedChunk};
pub use version::{
    ChangeDetail, DiffStats, SectionRename, SectionTextDiff, SemanticDiff, StructuralDiff, TextChange, TextDiff,
    VersionDiff, VersionMatchResult,
};
