//! Chunk representation for ragcore.
//!
//! A [`Chunk`] is the smallest indexed unit: a contiguous, token-bounded text
//! fragment carrying section and page provenance. Chunks are produced by the
//! chunker, mutated in bulk only by version-status propagation, and are the
//! unit retrieval operates over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the kind of content a chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Ordinary section body text.
    Text,
    /// A markdown-rendered table, kept as its own chunk.
    Table,
    /// A caption/description generated for a non-text asset (reserved for a
    /// future image pipeline; the core never produces this variant itself).
    ImageDescription,
    /// A per-section summary produced by the summarizer.
    SectionSummary,
    /// The whole-document summary produced by the summarizer.
    DocSummary,
}

impl ChunkType {
    /// Stable lowercase tag, used as the payload field value in both the
    /// vector and lexical stores.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::ImageDescription => "image_description",
            Self::SectionSummary => "section_summary",
            Self::DocSummary => "doc_summary",
        }
    }
}

/// A document chunk: belongs to exactly one document, carries a dense
/// sequence index, and is the unit both indexing and retrieval operate over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier, stable across all three stores.
    pub chunk_id: Uuid,
    /// Owning document.
    pub doc_id: Uuid,
    /// Denormalized document title, for display without a join.
    pub doc_title: String,
    /// Hierarchical path like `"Ch. 3 > 3.2 Payment"`.
    pub section_path: String,
    /// Pages this chunk's content spans, if the source format has pages.
    pub page_numbers: Vec<u32>,
    /// Dense, strictly increasing sequence index within the document.
    pub chunk_index: usize,
    /// Discriminates text/table/summary content.
    pub chunk_type: ChunkType,
    /// Chunk body. For contextually enriched chunks this already carries the
    /// prepended contextual description.
    pub content: String,
    /// Token count under the system tokenizer.
    pub token_count: usize,
    /// Mirrors the owning document's group at write time.
    pub group_id: Option<Uuid>,
    /// Mirrors the owning document's department at write time.
    pub department: Option<String>,
    /// Mirrors the owning document's `is_latest` at write time.
    pub is_latest: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Creates a new chunk, defaulting type to [`ChunkType::Text`].
    #[must_use]
    pub fn new(doc_id: Uuid, doc_title: impl Into<String>, content: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            chunk_id: Uuid::new_v4(),
            doc_id,
            doc_title: doc_title.into(),
            section_path: String::new(),
            page_numbers: Vec::new(),
            chunk_index,
            chunk_type: ChunkType::Text,
            content: content.into(),
            token_count: 0,
            group_id: None,
            department: None,
            is_latest: true,
            created_at: Utc::now(),
        }
    }

    /// Byte length of the chunk content.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Whether the chunk has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// First `max_len` characters of content, on a char boundary.
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let end = find_char_boundary(&self.content, max_len);
            &self.content[..end]
        }
    }
}

fn find_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut boundary = pos;
    while !s.is_char_boundary(boundary) && boundary > 0 {
        boundary -= 1;
    }
    boundary
}

/// Fluent builder for constructing chunks, mirroring the fields the chunker
/// and the summarizer's appended summary/doc-summary chunks both need to set.
#[derive(Debug, Default)]
pub struct ChunkBuilder {
    doc_id: Option<Uuid>,
    doc_title: Option<String>,
    section_path: Option<String>,
    page_numbers: Vec<u32>,
    chunk_index: Option<usize>,
    chunk_type: Option<ChunkType>,
    content: Option<String>,
    token_count: Option<usize>,
    group_id: Option<Uuid>,
    department: Option<String>,
    is_latest: bool,
}

impl ChunkBuilder {
    /// Creates a new, empty builder. `is_latest` defaults to `true`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            is_latest: true,
            ..Self::default()
        }
    }

    /// Sets the owning document identifier.
    #[must_use]
    pub const fn doc_id(mut self, doc_id: Uuid) -> Self {
        self.doc_id = Some(doc_id);
        self
    }

    /// Sets the denormalized document title.
    #[must_use]
    pub fn doc_title(mut self, title: impl Into<String>) -> Self {
        self.doc_title = Some(title.into());
        self
    }

    /// Sets the hierarchical section path.
    #[must_use]
    pub fn section_path(mut self, path: impl Into<String>) -> Self {
        self.section_path = Some(path.into());
        self
    }

    /// Sets the page numbers this chunk spans.
    #[must_use]
    pub fn page_numbers(mut self, pages: Vec<u32>) -> Self {
        self.page_numbers = pages;
        self
    }

    /// Sets the sequence index within the document.
    #[must_use]
    pub const fn chunk_index(mut self, index: usize) -> Self {
        self.chunk_index = Some(index);
        self
    }

    /// Sets the chunk type.
    #[must_use]
    pub const fn chunk_type(mut self, chunk_type: ChunkType) -> Self {
        self.chunk_type = Some(chunk_type);
        self
    }

    /// Sets the chunk content.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the token count.
    #[must_use]
    pub const fn token_count(mut self, count: usize) -> Self {
        self.token_count = Some(count);
        self
    }

    /// Sets the group identifier.
    #[must_use]
    pub const fn group_id(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Sets the department.
    #[must_use]
    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Sets `is_latest`.
    #[must_use]
    pub const fn is_latest(mut self, is_latest: bool) -> Self {
        self.is_latest = is_latest;
        self
    }

    /// Builds the chunk. Missing `doc_id`/`content` default to
    /// `Uuid::nil()`/empty string respectively — callers constructing real
    /// chunks always set both explicitly.
    #[must_use]
    pub fn build(self) -> Chunk {
        let content = self.content.unwrap_or_default();
        Chunk {
            chunk_id: Uuid::new_v4(),
            doc_id: self.doc_id.unwrap_or_default(),
            doc_title: self.doc_title.unwrap_or_default(),
            section_path: self.section_path.unwrap_or_default(),
            page_numbers: self.page_numbers,
            chunk_index: self.chunk_index.unwrap_or(0),
            chunk_type: self.chunk_type.unwrap_or(ChunkType::Text),
            token_count: self.token_count.unwrap_or(0),
            content,
            group_id: self.group_id,
            department: self.department,
            is_latest: self.is_latest,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_new_defaults_to_text() {
        let chunk = Chunk::new(Uuid::nil(), "Title", "content", 0);
        assert_eq!(chunk.chunk_type, ChunkType::Text);
        assert!(chunk.is_latest);
        assert_eq!(chunk.chunk_index, 0);
    }

    #[test]
    fn test_chunk_size_and_empty() {
        let chunk = Chunk::new(Uuid::nil(), "t", "Hello, world!", 0);
        assert_eq!(chunk.size(), 13);
        assert!(!chunk.is_empty());
    }

    #[test]
    fn test_chunk_preview_truncates_on_char_boundary() {
        let chunk = Chunk::new(Uuid::nil(), "t", "Hello, world!", 0);
        assert_eq!(chunk.preview(5), "Hello");
        assert_eq!(chunk.preview(100), "Hello, world!");
    }

    #[test]
    fn test_chunk_builder_sets_all_fields() {
        let doc_id = Uuid::new_v4();
        let chunk = ChunkBuilder::new()
            .doc_id(doc_id)
            .doc_title("Policy Manual")
            .section_path("Ch. 3 > 3.2 Payment")
            .page_numbers(vec![4, 5])
            .chunk_index(2)
            .chunk_type(ChunkType::Table)
            .content("| a | b |")
            .token_count(12)
            .is_latest(false)
            .build();

        assert_eq!(chunk.doc_id, doc_id);
        assert_eq!(chunk.section_path, "Ch. 3 > 3.2 Payment");
        assert_eq!(chunk.page_numbers, vec![4, 5]);
        assert_eq!(chunk.chunk_type, ChunkType::Table);
        assert_eq!(chunk.token_count, 12);
        assert!(!chunk.is_latest);
    }

    #[test]
    fn test_chunk_type_as_str() {
        assert_eq!(ChunkType::DocSummary.as_str(), "doc_summary");
        assert_eq!(ChunkType::SectionSummary.as_str(), "section_summary");
    }

    #[test]
    fn test_chunk_serialization_roundtrip() {
        let chunk = Chunk::new(Uuid::new_v4(), "t", "content", 0);
        let json = serde_json::to_string(&chunk).expect("serialize");
        let deserialized: Chunk = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(deserialized.content, "content");
    }
}
