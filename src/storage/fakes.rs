//! In-memory fake store implementations, so ingestion/retrieval logic is
//! testable without live Qdrant, Tantivy, SQLite, or object-store services.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::lexical::{LexicalDoc, LexicalFilter, LexicalSearchHit, LexicalStore};
use super::metadata::{MetadataStore, SectionSummary};
use super::object::ObjectStore;
use super::vector::{VectorFilter, VectorPoint, VectorSearchHit, VectorStore};
use crate::core::document::{Document, ProcessingStatus};
use crate::core::{Chunk, VersionDiff};
use crate::embedding::cosine_similarity;
use crate::error::{Error, Result, StoreError};

/// In-memory [`VectorStore`], scoring by plain cosine similarity with a
/// linear scan — adequate for unit-test fixture sizes.
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: Mutex<HashMap<Uuid, VectorPoint>>,
}

impl InMemoryVectorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(point: &VectorPoint, filter: &VectorFilter) -> bool {
        if let Some(doc_id) = filter.doc_id {
            if point.doc_id != doc_id {
                return false;
            }
        }
        if let Some(doc_type) = &filter.doc_type {
            if &point.doc_type != doc_type {
                return false;
            }
        }
        if let Some(chunk_type) = filter.chunk_type {
            if point.chunk_type != chunk_type {
                return false;
            }
        }
        if let Some(is_latest) = filter.is_latest {
            if point.is_latest != is_latest {
                return false;
            }
        }
        if let Some(group_id) = filter.group_id {
            if point.group_id != Some(group_id) {
                return false;
            }
        }
        if let Some(ids) = &filter.doc_id_in {
            if !ids.contains(&point.doc_id) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, _dimension: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert_batch(&self, points: &[VectorPoint]) -> Result<()> {
        let mut store = self.points.lock().map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        for point in points {
            store.insert(point.chunk_id, point.clone());
        }
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], filter: &VectorFilter, top_k: usize) -> Result<Vec<VectorSearchHit>> {
        let store = self.points.lock().map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        let mut hits: Vec<VectorSearchHit> = store
            .values()
            .filter(|p| Self::matches(p, filter))
            .map(|p| VectorSearchHit { chunk_id: p.chunk_id, doc_id: p.doc_id, score: cosine_similarity(query_vector, &p.vector) })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn search_doc_summaries(&self, query_vector: &[f32], similarity_threshold: f32, top_k: usize) -> Result<Vec<VectorSearchHit>> {
        let filter = VectorFilter { chunk_type: Some(crate::core::ChunkType::DocSummary), is_latest: Some(true), ..Default::default() };
        let hits = self.search(query_vector, &filter, top_k).await?;
        Ok(hits.into_iter().filter(|h| h.score >= similarity_threshold).collect())
    }

    async fn set_is_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()> {
        let mut store = self.points.lock().map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        for point in store.values_mut() {
            if point.doc_id == doc_id {
                point.is_latest = is_latest;
            }
        }
        Ok(())
    }

    async fn delete_by_ids(&self, chunk_ids: &[Uuid]) -> Result<()> {
        let mut store = self.points.lock().map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        for id in chunk_ids {
            store.remove(id);
        }
        Ok(())
    }

    async fn delete_by_doc_id(&self, doc_id: Uuid) -> Result<()> {
        let mut store = self.points.lock().map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        store.retain(|_, p| p.doc_id != doc_id);
        Ok(())
    }
}

/// In-memory [`LexicalStore`] using naive substring/term overlap scoring in
/// place of real BM25 — enough to exercise fusion and filtering logic.
#[derive(Default)]
pub struct InMemoryLexicalStore {
    docs: Mutex<HashMap<Uuid, LexicalDoc>>,
}

impl InMemoryLexicalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(doc: &LexicalDoc, filter: &LexicalFilter) -> bool {
        if let Some(doc_id) = filter.doc_id {
            if doc.doc_id != doc_id {
                return false;
            }
        }
        if let Some(doc_type) = &filter.doc_type {
            if &doc.doc_type != doc_type {
                return false;
            }
        }
        if let Some(is_latest) = filter.is_latest {
            if doc.is_latest != is_latest {
                return false;
            }
        }
        if let Some(group_id) = filter.group_id {
            if doc.group_id != Some(group_id) {
                return false;
            }
        }
        if let Some(ids) = &filter.doc_id_in {
            if !ids.contains(&doc.doc_id) {
                return false;
            }
        }
        true
    }

    fn term_overlap_score(query: &str, text: &str) -> f32 {
        let query_terms: Vec<String> = query.to_lowercase().split_whitespace().map(ToString::to_string).collect();
        if query_terms.is_empty() {
            return 0.0;
        }
        let lower = text.to_lowercase();
        let matched = query_terms.iter().filter(|t| lower.contains(t.as_str())).count();
        matched as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl LexicalStore for InMemoryLexicalStore {
    async fn index_and_refresh(&self, docs: &[LexicalDoc]) -> Result<()> {
        let mut store = self.docs.lock().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        for doc in docs {
            store.insert(doc.chunk_id, doc.clone());
        }
        Ok(())
    }

    async fn search(&self, query: &str, filter: &LexicalFilter, top_k: usize) -> Result<Vec<LexicalSearchHit>> {
        if let Some(ids) = &filter.doc_id_in {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }
        let store = self.docs.lock().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        let mut hits: Vec<LexicalSearchHit> = store
            .values()
            .filter(|d| Self::matches(d, filter))
            .map(|d| {
                let score = 3.0 * Self::term_overlap_score(query, &d.content)
                    + Self::term_overlap_score(query, &d.section_path)
                    + Self::term_overlap_score(query, &d.doc_title);
                LexicalSearchHit { chunk_id: d.chunk_id, doc_id: d.doc_id, score }
            })
            .filter(|h| h.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn fetch_document_chunks(&self, doc_id: Uuid, page_range: Option<(i64, i64)>) -> Result<Vec<LexicalDoc>> {
        let store = self.docs.lock().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        let mut docs: Vec<LexicalDoc> = store
            .values()
            .filter(|d| d.doc_id == doc_id)
            .filter(|d| match page_range {
                Some((lo, hi)) => d.page_numbers.iter().any(|p| *p >= lo && *p <= hi),
                None => true,
            })
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.chunk_index);
        Ok(docs)
    }

    async fn set_is_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()> {
        let mut store = self.docs.lock().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        for doc in store.values_mut() {
            if doc.doc_id == doc_id {
                doc.is_latest = is_latest;
            }
        }
        Ok(())
    }

    async fn delete_by_doc_id(&self, doc_id: Uuid) -> Result<()> {
        let mut store = self.docs.lock().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        store.retain(|_, d| d.doc_id != doc_id);
        Ok(())
    }
}

/// In-memory [`MetadataStore`].
#[derive(Default)]
pub struct InMemoryMetadataStore {
    documents: Mutex<HashMap<Uuid, Document>>,
    chunks: Mutex<HashMap<Uuid, Vec<Chunk>>>,
    section_summaries: Mutex<HashMap<(Uuid, String), SectionSummary>>,
    version_diffs: Mutex<HashMap<(Uuid, Uuid), VersionDiff>>,
}

impl InMemoryMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let docs = self.documents.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        Ok(docs
            .values()
            .find(|d| d.content_hash == content_hash && d.processing_status != ProcessingStatus::Error)
            .cloned())
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        let mut docs = self.documents.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        docs.insert(doc.doc_id, doc.clone());
        Ok(())
    }

    async fn get_document(&self, doc_id: Uuid) -> Result<Option<Document>> {
        let docs = self.documents.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        Ok(docs.get(&doc_id).cloned())
    }

    async fn update_document(&self, doc: &Document) -> Result<()> {
        let mut docs = self.documents.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        docs.insert(doc.doc_id, doc.clone());
        Ok(())
    }

    async fn find_title_similar(&self, title: &str, threshold: f32, limit: usize) -> Result<Vec<Document>> {
        let docs = self.documents.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        let mut scored: Vec<(f32, Document)> = docs
            .values()
            .filter(|d| d.processing_status == ProcessingStatus::Ready && d.is_latest)
            .map(|d| (strsim::jaro_winkler(title, &d.title) as f32, d.clone()))
            .filter(|(sim, _)| *sim > threshold)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, d)| d).collect())
    }

    async fn list_documents(
        &self,
        doc_type: Option<&str>,
        group_id: Option<Uuid>,
        tag: Option<&str>,
        status: Option<ProcessingStatus>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let docs = self.documents.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        let mut out: Vec<Document> = docs
            .values()
            .filter(|d| doc_type.is_none_or(|t| d.doc_type.as_deref() == Some(t)))
            .filter(|d| group_id.is_none_or(|g| d.group_id == Some(g)))
            .filter(|d| tag.is_none_or(|t| d.tags.iter().any(|existing| existing == t)))
            .filter(|d| status.is_none_or(|s| d.processing_status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn upsert_section_summary(&self, summary: &SectionSummary) -> Result<()> {
        let mut store = self.section_summaries.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        store.insert((summary.doc_id, summary.section_path.clone()), summary.clone());
        Ok(())
    }

    async fn get_section_summary(&self, doc_id: Uuid, section_path: &str) -> Result<Option<SectionSummary>> {
        let store = self.section_summaries.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        Ok(store.get(&(doc_id, section_path.to_string())).cloned())
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut store = self.chunks.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        for chunk in chunks {
            store.entry(chunk.doc_id).or_default().push(chunk.clone());
        }
        Ok(())
    }

    async fn get_chunks(&self, doc_id: Uuid) -> Result<Vec<Chunk>> {
        let store = self.chunks.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        let mut chunks = store.get(&doc_id).cloned().unwrap_or_default();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn get_chunk_ids(&self, doc_id: Uuid) -> Result<Vec<Uuid>> {
        let chunks = self.get_chunks(doc_id).await?;
        Ok(chunks.into_iter().map(|c| c.chunk_id).collect())
    }

    async fn set_chunks_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()> {
        let mut store = self.chunks.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        if let Some(chunks) = store.get_mut(&doc_id) {
            for chunk in chunks.iter_mut() {
                chunk.is_latest = is_latest;
            }
        }
        Ok(())
    }

    async fn delete_document(&self, doc_id: Uuid) -> Result<()> {
        self.documents.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?.remove(&doc_id);
        self.chunks.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?.remove(&doc_id);
        self.section_summaries
            .lock()
            .map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?
            .retain(|(d, _), _| *d != doc_id);
        Ok(())
    }

    async fn get_version_diff(&self, old_version_id: Uuid, new_version_id: Uuid) -> Result<Option<VersionDiff>> {
        let store = self.version_diffs.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        Ok(store.get(&(old_version_id, new_version_id)).cloned())
    }

    async fn put_version_diff(&self, diff: &VersionDiff) -> Result<()> {
        let mut store = self.version_diffs.lock().map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        store.insert((diff.old_version_id, diff.new_version_id), diff.clone());
        Ok(())
    }
}

/// In-memory [`ObjectStore`].
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(Uuid, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, doc_id: Uuid, filename: &str, bytes: Vec<u8>) -> Result<()> {
        let mut store = self.objects.lock().map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        store.insert((doc_id, filename.to_string()), bytes);
        Ok(())
    }

    async fn get(&self, doc_id: Uuid, filename: &str) -> Result<Vec<u8>> {
        let store = self.objects.lock().map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        store
            .get(&(doc_id, filename.to_string()))
            .cloned()
            .ok_or_else(|| Error::Store(StoreError::NotFound(format!("{doc_id}/{filename}"))))
    }

    async fn delete(&self, doc_id: Uuid, filename: &str) -> Result<()> {
        let mut store = self.objects.lock().map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        store.remove(&(doc_id, filename.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkType;

    fn sample_point(doc_id: Uuid, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            chunk_id: Uuid::new_v4(),
            vector,
            doc_id,
            doc_type: "policy".to_string(),
            doc_title: "Policy".to_string(),
            section_path: "Ch. 1".to_string(),
            page_numbers: vec![1],
            chunk_index: 0,
            chunk_type: ChunkType::Text,
            content: "refund policy details".to_string(),
            token_count: 10,
            group_id: None,
            department: None,
            is_latest: true,
        }
    }

    #[tokio::test]
    async fn in_memory_vector_store_ranks_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        let doc_id = Uuid::new_v4();
        store.upsert_batch(&[sample_point(doc_id, vec![1.0, 0.0]), sample_point(doc_id, vec![0.0, 1.0])]).await.unwrap();
        let hits = store.search(&[1.0, 0.0], &VectorFilter::default(), 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn in_memory_vector_store_empty_accessible_set_returns_nothing() {
        let store = InMemoryVectorStore::new();
        let doc_id = Uuid::new_v4();
        store.upsert_batch(&[sample_point(doc_id, vec![1.0, 0.0])]).await.unwrap();
        let filter = VectorFilter { doc_id_in: Some(vec![]), ..Default::default() };
        let hits = store.search(&[1.0, 0.0], &filter, 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn in_memory_lexical_store_scores_content_matches_over_no_match() {
        let store = InMemoryLexicalStore::new();
        let doc_id = Uuid::new_v4();
        let chunk_id = Uuid::new_v4();
        store
            .index_and_refresh(&[LexicalDoc {
                chunk_id,
                doc_id,
                doc_type: "policy".to_string(),
                doc_title: "Refund Policy".to_string(),
                section_path: "Ch. 1".to_string(),
                page_numbers: vec![1],
                chunk_index: 0,
                chunk_type: ChunkType::Text,
                content: "customers may request a refund within 30 days".to_string(),
                group_id: None,
                department: None,
                is_latest: true,
                created_at: 0,
            }])
            .await
            .unwrap();
        let hits = store.search("refund", &LexicalFilter::default(), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, chunk_id);

        let empty = store.search("unrelated term not present", &LexicalFilter::default(), 10).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn in_memory_object_store_round_trips() {
        let store = InMemoryObjectStore::new();
        let doc_id = Uuid::new_v4();
        store.put(doc_id, "f.txt", b"abc".to_vec()).await.unwrap();
        assert_eq!(store.get(doc_id, "f.txt").await.unwrap(), b"abc");
        store.delete(doc_id, "f.txt").await.unwrap();
        assert!(store.get(doc_id, "f.txt").await.is_err());
    }
}
