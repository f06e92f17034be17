//! Types surfaced to callers at the retrieval boundary: chunks annotated
//! with a fused score, and citations extracted from a generated answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunk::ChunkType;

/// A chunk retrieved for a query, carrying its fused/rerank score and the
/// document metadata a citation needs without a further lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Identifier of the underlying chunk.
    pub chunk_id: Uuid,
    /// Owning document.
    pub doc_id: Uuid,
    /// Denormalized document title.
    pub doc_title: String,
    /// Hierarchical section path.
    pub section_path: String,
    /// Pages this chunk spans.
    pub page_numbers: Vec<u32>,
    /// Sequence index within the document.
    pub chunk_index: usize,
    /// Chunk type.
    pub chunk_type: ChunkType,
    /// Chunk content, possibly context-expanded with neighbor chunks.
    pub content: String,
    /// Group the owning document belongs to, if any.
    pub group_id: Option<Uuid>,
    /// Department the owning document belongs to, if any.
    pub department: Option<String>,
    /// Final ranking score: RRF score, or rerank score if reranking ran.
    pub score: f32,
}

impl RetrievedChunk {
    /// 100-character content snippet used when building a [`Citation`].
    #[must_use]
    pub fn snippet(&self, max_len: usize) -> String {
        if self.content.chars().count() <= max_len {
            self.content.clone()
        } else {
            self.content.chars().take(max_len).collect()
        }
    }
}

/// A source citation attached to a generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Identifier of the cited chunk.
    pub chunk_id: Uuid,
    /// Owning document.
    pub doc_id: Uuid,
    /// Document title, as it should appear in the citation.
    pub doc_title: String,
    /// Section path, as it should appear in the citation.
    pub section_path: String,
    /// Pages referenced.
    pub page_numbers: Vec<u32>,
    /// 100-character snippet of the cited content.
    pub snippet: String,
}

impl Citation {
    /// Build a citation from a retrieved chunk, truncating the snippet to
    /// 100 characters.
    #[must_use]
    pub fn from_chunk(chunk: &RetrievedChunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            doc_id: chunk.doc_id,
            doc_title: chunk.doc_title.clone(),
            section_path: chunk.section_path.clone(),
            page_numbers: chunk.page_numbers.clone(),
            snippet: chunk.snippet(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            doc_id: Uuid::new_v4(),
            doc_title: "Policy Manual".to_string(),
            section_path: "Ch. 1".to_string(),
            page_numbers: vec![1],
            chunk_index: 0,
            chunk_type: ChunkType::Text,
            content: "a".repeat(150),
            group_id: None,
            department: None,
            score: 0.8,
        }
    }

    #[test]
    fn test_snippet_truncates_at_100_chars() {
        let chunk = sample_chunk();
        assert_eq!(chunk.snippet(100).chars().count(), 100);
    }

    #[test]
    fn test_snippet_keeps_short_content_whole() {
        let mut chunk = sample_chunk();
        chunk.content = "short".to_string();
        assert_eq!(chunk.snippet(100), "short");
    }

    #[test]
    fn test_citation_from_chunk_copies_provenance() {
        let chunk = sample_chunk();
        let citation = Citation::from_chunk(&chunk);
        assert_eq!(citation.doc_id, chunk.doc_id);
        assert_eq!(citation.snippet.chars().count(), 100);
    }
}
