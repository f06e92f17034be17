//! Hybrid retriever: dense + lexical search, Reciprocal Rank Fusion,
//! optional reranking, and context-window expansion.
//!
//! The fusion math mirrors [`crate::search::reciprocal_rank_fusion`]'s
//! formula (`1 / (k + rank + 1)`), reimplemented directly over chunk
//! [`Uuid`]s rather than the `i64` ids that module was written for, so
//! ranked lists from [`VectorStore`] and [`LexicalStore`] need no
//! intermediate id mapping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::core::{ChunkType, RetrievedChunk};
use crate::embedding::Embedder;
use crate::error::{Error, Result, RetrievalError};
use crate::rerank::Reranker;
use crate::storage::lexical::LexicalFilter;
use crate::storage::metadata::MetadataStore;
use crate::storage::vector::VectorFilter;
use crate::storage::{LexicalStore, VectorStore};

/// Which chunk versions a search should consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMode {
    /// Only chunks belonging to the latest version of each document.
    LatestOnly,
    /// Every version, superseded or not.
    AllVersions,
    /// Pin to exactly the document named by `RetrievalFilters::doc_id`,
    /// regardless of its `is_latest` status. Used when the caller already
    /// knows which version it wants (e.g. an agent tool call following a
    /// `get_version_history` lookup) rather than wanting whichever version
    /// is currently latest.
    Specific,
}

/// Metadata-level constraints applied identically to dense and lexical
/// search.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    /// Restrict to one document.
    pub doc_id: Option<Uuid>,
    /// Restrict to one document type tag.
    pub doc_type: Option<String>,
    /// Restrict to one document group.
    pub group_id: Option<Uuid>,
    /// Caller's accessible-document set. `None` means unrestricted
    /// (administrative caller); `Some(empty)` forces zero results;
    /// `Some(ids)` constrains both stores to that id set.
    pub accessible_doc_ids: Option<Vec<Uuid>>,
}

/// One retrieval request.
pub struct RetrievalRequest<'a> {
    /// Natural-language query text.
    pub query: &'a str,
    /// Version scope.
    pub version_mode: VersionMode,
    /// Metadata + permission filters.
    pub filters: RetrievalFilters,
    /// Final number of chunks to return, post-fusion and post-rerank.
    pub top_k: usize,
}

/// Hybrid retriever combining a vector store, a lexical store, a metadata
/// store (for context-window expansion), an embedder, and an optional
/// reranker.
pub struct HybridRetriever {
    vector_store: Arc<dyn VectorStore>,
    lexical_store: Arc<dyn LexicalStore>,
    metadata_store: Arc<dyn MetadataStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    rrf_k: u32,
    vector_top_k: usize,
    bm25_top_k: usize,
    context_window_chunks: usize,
}

impl HybridRetriever {
    /// Builds a retriever. `reranker: None` skips the rerank stage
    /// entirely (it is optional per the retrieval pipeline).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        lexical_store: Arc<dyn LexicalStore>,
        metadata_store: Arc<dyn MetadataStore>,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
        rrf_k: u32,
        vector_top_k: usize,
        bm25_top_k: usize,
        context_window_chunks: usize,
    ) -> Self {
        Self { vector_store, lexical_store, metadata_store, embedder, reranker, rrf_k, vector_top_k, bm25_top_k, context_window_chunks }
    }

    /// Runs the full hybrid retrieval pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::AllSourcesFailed`] if both the vector and
    /// lexical searches fail, or propagates embedding/store/rerank errors.
    pub async fn retrieve(&self, request: &RetrievalRequest<'_>) -> Result<Vec<RetrievedChunk>> {
        if let Some(ids) = &request.filters.accessible_doc_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }

        let is_latest = match request.version_mode {
            VersionMode::LatestOnly => Some(true),
            VersionMode::AllVersions | VersionMode::Specific => None,
        };

        let vector_filter = VectorFilter {
            doc_id: request.filters.doc_id,
            doc_type: request.filters.doc_type.clone(),
            chunk_type: None,
            is_latest,
            group_id: request.filters.group_id,
            doc_id_in: request.filters.accessible_doc_ids.clone(),
        };
        let lexical_filter = LexicalFilter {
            doc_id: request.filters.doc_id,
            doc_type: request.filters.doc_type.clone(),
            is_latest,
            group_id: request.filters.group_id,
            doc_id_in: request.filters.accessible_doc_ids.clone(),
        };

        let query_vector = self.embedder.embed(request.query).ok();

        let vector_result = match &query_vector {
            Some(vec) => self.vector_store.search(vec, &vector_filter, self.vector_top_k).await,
            None => Ok(Vec::new()),
        };
        let lexical_result = self.lexical_store.search(request.query, &lexical_filter, self.bm25_top_k).await;

        let (vector_hits, lexical_hits) = match (vector_result, lexical_result) {
            (Ok(v), Ok(l)) => (v, l),
            (Ok(v), Err(_)) => (v, Vec::new()),
            (Err(_), Ok(l)) => (Vec::new(), l),
            (Err(e1), Err(e2)) => return Err(Error::Retrieval(RetrievalError::AllSourcesFailed(format!("vector: {e1}; lexical: {e2}")))),
        };

        let vector_ids: Vec<Uuid> = vector_hits.iter().map(|h| h.chunk_id).collect();
        let lexical_ids: Vec<Uuid> = lexical_hits.iter().map(|h| h.chunk_id).collect();
        let fused = fuse(&[&vector_ids, &lexical_ids], self.rrf_k);

        let rerank_pool = request.top_k.saturating_mul(3).max(request.top_k);
        let candidate_ids: Vec<Uuid> = fused.into_iter().take(rerank_pool.max(1)).map(|(id, _)| id).collect();
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let doc_lookup: HashMap<Uuid, Uuid> = vector_hits
            .iter()
            .map(|h| (h.chunk_id, h.doc_id))
            .chain(lexical_hits.iter().map(|h| (h.chunk_id, h.doc_id)))
            .collect();

        let mut chunks = Vec::with_capacity(candidate_ids.len());
        for chunk_id in &candidate_ids {
            if let Some(&doc_id) = doc_lookup.get(chunk_id) {
                if let Some(chunk) = self.fetch_retrieved_chunk(doc_id, *chunk_id).await? {
                    chunks.push(chunk);
                }
            }
        }

        let reranked = if let Some(reranker) = &self.reranker { reranker.rerank(request.query, chunks)? } else { chunks };

        let top = reranked.into_iter().take(request.top_k).collect::<Vec<_>>();
        self.expand_context_windows(top).await
    }

    async fn fetch_retrieved_chunk(&self, doc_id: Uuid, chunk_id: Uuid) -> Result<Option<RetrievedChunk>> {
        let chunks = self.metadata_store.get_chunks(doc_id).await?;
        Ok(chunks.into_iter().find(|c| c.chunk_id == chunk_id).map(|c| RetrievedChunk {
            chunk_id: c.chunk_id,
            doc_id: c.doc_id,
            doc_title: c.doc_title,
            section_path: c.section_path,
            page_numbers: c.page_numbers,
            chunk_index: c.chunk_index,
            chunk_type: c.chunk_type,
            content: c.content,
            group_id: c.group_id,
            department: c.department,
            score: 0.0,
        }))
    }

    /// Expands each result to include its immediate neighbor chunks
    /// (`±context_window_chunks` by `chunk_index`), concatenating their
    /// content while preserving the anchor's other fields.
    async fn expand_context_windows(&self, anchors: Vec<RetrievedChunk>) -> Result<Vec<RetrievedChunk>> {
        if self.context_window_chunks == 0 {
            return Ok(anchors);
        }

        let mut per_doc_chunks: HashMap<Uuid, Vec<RetrievedChunk>> = HashMap::new();
        let mut expanded = Vec::with_capacity(anchors.len());

        for anchor in anchors {
            let doc_chunks = match per_doc_chunks.get(&anchor.doc_id) {
                Some(chunks) => chunks,
                None => {
                    let fetched = self.metadata_store.get_chunks(anchor.doc_id).await?;
                    per_doc_chunks.entry(anchor.doc_id).or_insert(
                        fetched
                            .into_iter()
                            .map(|c| RetrievedChunk {
                                chunk_id: c.chunk_id,
                                doc_id: c.doc_id,
                                doc_title: c.doc_title,
                                section_path: c.section_path,
                                page_numbers: c.page_numbers,
                                chunk_index: c.chunk_index,
                                chunk_type: c.chunk_type,
                                content: c.content,
                                group_id: c.group_id,
                                department: c.department,
                                score: 0.0,
                            })
                            .collect(),
                    )
                }
            };

            let lo = anchor.chunk_index.saturating_sub(self.context_window_chunks);
            let hi = anchor.chunk_index + self.context_window_chunks;
            let mut neighbors: Vec<&RetrievedChunk> = doc_chunks
                .iter()
                .filter(|c| c.chunk_type == ChunkType::Text && c.chunk_index >= lo && c.chunk_index <= hi)
                .collect();
            neighbors.sort_by_key(|c| c.chunk_index);

            let content = if neighbors.is_empty() { anchor.content.clone() } else { neighbors.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n") };

            expanded.push(RetrievedChunk { content, ..anchor });
        }

        Ok(expanded)
    }
}

fn fuse(ranked_lists: &[&[Uuid]], k: u32) -> Vec<(Uuid, f64)> {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();

    for list in ranked_lists {
        for (rank, &id) in list.iter().enumerate() {
            let rrf_score = 1.0 / f64::from(k + rank as u32 + 1);
            *scores.entry(id).or_insert(0.0) += rrf_score;
            if seen.insert(id) {
                order.push(id);
            }
        }
    }

    let mut results: Vec<(Uuid, f64)> = order.into_iter().map(|id| (id, scores[&id])).collect();
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuse_ranks_items_present_in_both_lists_highest() {
        let shared = Uuid::new_v4();
        let only_a = Uuid::new_v4();
        let only_b = Uuid::new_v4();
        let list_a = vec![shared, only_a];
        let list_b = vec![shared, only_b];
        let fused = fuse(&[&list_a, &list_b], 60);
        assert_eq!(fused[0].0, shared);
    }

    #[test]
    fn fuse_of_empty_lists_is_empty() {
        let empty: Vec<Uuid> = Vec::new();
        assert!(fuse(&[&empty, &empty], 60).is_empty());
    }
}
