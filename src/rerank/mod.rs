//! Reranking: a second, more expensive relevance pass over a short list of
//! retrieval candidates.
//!
//! There is no cross-encoder crate in the dependency tree, so the default
//! implementation is a lexical-overlap heuristic. The trait boundary keeps
//! a real cross-encoder swappable in without touching the retriever.

use crate::core::RetrievedChunk;
use crate::error::Result;

/// Reranks retrieved chunks against the original query, returning them in
/// final order (best first). Implementations may reorder, but must not
/// drop or add chunks.
pub trait Reranker: Send + Sync {
    /// Reranks `chunks` against `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reranking backend itself fails (e.g. a
    /// remote model call). Implementations that cannot fail should return
    /// `Ok`.
    fn rerank(&self, query: &str, chunks: Vec<RetrievedChunk>) -> Result<Vec<RetrievedChunk>>;
}

/// Heuristic reranker used when no cross-encoder model is configured:
/// rescales each chunk's existing fusion score by its query-term overlap,
/// so a high-fusion-score chunk that happens not to mention any query term
/// verbatim loses ground to one that does.
pub struct FallbackReranker;

impl FallbackReranker {
    /// Builds the heuristic reranker. Stateless.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn overlap_score(query: &str, content: &str) -> f32 {
        let terms: Vec<String> = query.to_lowercase().split_whitespace().map(ToString::to_string).collect();
        if terms.is_empty() {
            return 0.0;
        }
        let lower = content.to_lowercase();
        let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
        matched as f32 / terms.len() as f32
    }
}

impl Default for FallbackReranker {
    fn default() -> Self {
        Self::new()
    }
}

impl Reranker for FallbackReranker {
    fn rerank(&self, query: &str, mut chunks: Vec<RetrievedChunk>) -> Result<Vec<RetrievedChunk>> {
        for chunk in &mut chunks {
            let overlap = Self::overlap_score(query, &chunk.content);
            chunk.score = 0.5 * chunk.score + 0.5 * overlap;
        }
        chunks.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkType;
    use uuid::Uuid;

    fn chunk(content: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            doc_id: Uuid::new_v4(),
            doc_title: "Doc".to_string(),
            section_path: "Ch. 1".to_string(),
            page_numbers: vec![1],
            chunk_index: 0,
            chunk_type: ChunkType::Text,
            content: content.to_string(),
            group_id: None,
            department: None,
            score,
        }
    }

    #[test]
    fn boosts_chunks_that_actually_mention_query_terms() {
        let reranker = FallbackReranker::new();
        let chunks = vec![chunk("totally unrelated text", 0.9), chunk("refund policy details here", 0.5)];
        let reranked = reranker.rerank("refund policy", chunks).unwrap();
        assert!(reranked[0].content.contains("refund policy"));
    }
}
