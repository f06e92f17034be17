//! Vector store: dense cosine-similarity search over chunk embeddings.
//!
//! Grounded on `qdrant-client`, matching the RAG-engine corpus's preference
//! for a dedicated vector database over a bolted-on ANN library. Collection
//! geometry per spec §6: cosine distance, HNSW `m=16`, `ef_construct=100`,
//! payload indexes on `doc_id`, `doc_type`, `chunk_type`, `is_latest`,
//! `group_id`.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, HnswConfigDiffBuilder,
    PointStruct, ScalarQuantizationBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use uuid::Uuid;

use crate::core::ChunkType;
use crate::error::{Error, Result, StoreError};

/// Batch size the index writer upserts at, per spec §4.3.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Everything stored alongside a chunk's embedding, mirrored into the
/// lexical store's schema and the metadata store's chunk row.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    /// Shared primary key across all three stores.
    pub chunk_id: Uuid,
    /// L2-normalized embedding.
    pub vector: Vec<f32>,
    /// Owning document.
    pub doc_id: Uuid,
    /// Document type tag, filterable.
    pub doc_type: String,
    /// Denormalized document title.
    pub doc_title: String,
    /// Hierarchical section path.
    pub section_path: String,
    /// Pages spanned.
    pub page_numbers: Vec<i64>,
    /// Sequence index within the document.
    pub chunk_index: i64,
    /// Chunk type, filterable.
    pub chunk_type: ChunkType,
    /// Chunk content (contextual-description-prefixed, if applicable).
    pub content: String,
    /// Token count under the system tokenizer.
    pub token_count: i64,
    /// Owning document's group, filterable.
    pub group_id: Option<Uuid>,
    /// Owning document's department.
    pub department: Option<String>,
    /// Mirrors the owning document's `is_latest`, filterable.
    pub is_latest: bool,
}

/// Exact-match filter applied to a search, combining caller metadata
/// filters, version-mode scoping, and the accessible-document-set
/// permission constraint.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    /// Restrict to one document.
    pub doc_id: Option<Uuid>,
    /// Restrict to one document type.
    pub doc_type: Option<String>,
    /// Restrict to one chunk type.
    pub chunk_type: Option<ChunkType>,
    /// Restrict to latest-only or not, `None` means no constraint.
    pub is_latest: Option<bool>,
    /// Restrict to one document group.
    pub group_id: Option<Uuid>,
    /// Membership constraint: `Some(empty)` forces zero results (spec's
    /// "accessible-document set is an empty list" case); `None` means
    /// unrestricted (admin / disabled-auth case).
    pub doc_id_in: Option<Vec<Uuid>>,
}

/// A hit returned from dense search: identifier plus cosine score.
#[derive(Debug, Clone)]
pub struct VectorSearchHit {
    /// The matched chunk.
    pub chunk_id: Uuid,
    /// Owning document, surfaced so callers distinguishing by document
    /// (version detector dedup, cross-doc spread checks) don't need a
    /// second lookup.
    pub doc_id: Uuid,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Vector store surface the index writer and hybrid retriever depend on.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent collection setup: cosine distance, HNSW tuning, payload
    /// indexes. Safe to call repeatedly.
    async fn ensure_collection(&self, dimension: usize) -> Result<()>;

    /// Upserts points in batches of [`UPSERT_BATCH_SIZE`].
    async fn upsert_batch(&self, points: &[VectorPoint]) -> Result<()>;

    /// Dense similarity search, optionally filtered.
    async fn search(&self, query_vector: &[f32], filter: &VectorFilter, top_k: usize) -> Result<Vec<VectorSearchHit>>;

    /// Searches only `doc_summary`-typed, latest chunks for version-detector
    /// candidate lookup (spec §4.5 step 2), returning distinct documents
    /// above `similarity_threshold`.
    async fn search_doc_summaries(
        &self,
        query_vector: &[f32],
        similarity_threshold: f32,
        top_k: usize,
    ) -> Result<Vec<VectorSearchHit>>;

    /// Bulk-flips `is_latest` on every point belonging to `doc_id`, used
    /// when a version link supersedes a predecessor.
    async fn set_is_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()>;

    /// Deletes points by explicit id list.
    async fn delete_by_ids(&self, chunk_ids: &[Uuid]) -> Result<()>;

    /// Deletes every point belonging to a document (used by ingestion delete).
    async fn delete_by_doc_id(&self, doc_id: Uuid) -> Result<()>;
}

/// `qdrant-client`-backed production implementation.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    /// Connects to Qdrant at `url` and targets `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Vector`] if the connection cannot be established.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        Ok(Self { client, collection: collection.into() })
    }

    fn build_filter(filter: &VectorFilter) -> Option<Filter> {
        let mut must = Vec::new();
        if let Some(doc_id) = filter.doc_id {
            must.push(Condition::matches("doc_id", doc_id.to_string()));
        }
        if let Some(doc_type) = &filter.doc_type {
            must.push(Condition::matches("doc_type", doc_type.clone()));
        }
        if let Some(chunk_type) = filter.chunk_type {
            must.push(Condition::matches("chunk_type", chunk_type.as_str().to_string()));
        }
        if let Some(is_latest) = filter.is_latest {
            must.push(Condition::matches("is_latest", is_latest));
        }
        if let Some(group_id) = filter.group_id {
            must.push(Condition::matches("group_id", group_id.to_string()));
        }
        if let Some(ids) = &filter.doc_id_in {
            if ids.is_empty() {
                // Forced empty result: an impossible match.
                must.push(Condition::matches("doc_id", Uuid::nil().to_string()));
                must.push(Condition::matches("doc_id", "__never_matches__".to_string()));
            } else {
                let values: Vec<String> = ids.iter().map(ToString::to_string).collect();
                must.push(Condition::matches("doc_id", values));
            }
        }
        if must.is_empty() { None } else { Some(Filter::must(must)) }
    }

    fn point_to_struct(point: &VectorPoint) -> PointStruct {
        use qdrant_client::qdrant::Value;
        use std::collections::HashMap;

        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert("doc_id".into(), point.doc_id.to_string().into());
        payload.insert("doc_type".into(), point.doc_type.clone().into());
        payload.insert("doc_title".into(), point.doc_title.clone().into());
        payload.insert("section_path".into(), point.section_path.clone().into());
        payload.insert(
            "page_numbers".into(),
            Value::from(point.page_numbers.clone()),
        );
        payload.insert("chunk_index".into(), point.chunk_index.into());
        payload.insert("chunk_type".into(), point.chunk_type.as_str().to_string().into());
        payload.insert("content".into(), point.content.clone().into());
        payload.insert("token_count".into(), point.token_count.into());
        payload.insert(
            "group_id".into(),
            point.group_id.map(|g| g.to_string()).unwrap_or_default().into(),
        );
        payload.insert("department".into(), point.department.clone().unwrap_or_default().into());
        payload.insert("is_latest".into(), point.is_latest.into());

        PointStruct::new(point.chunk_id.to_string(), point.vector.clone(), payload)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        if exists {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine))
                    .hnsw_config(HnswConfigDiffBuilder::default().m(16).ef_construct(100))
                    .quantization_config(ScalarQuantizationBuilder::default()),
            )
            .await
            .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;

        for field in ["doc_id", "doc_type", "chunk_type", "is_latest", "group_id"] {
            let _ = self
                .client
                .create_field_index(
                    qdrant_client::qdrant::CreateFieldIndexCollectionBuilder::new(
                        &self.collection,
                        field,
                        qdrant_client::qdrant::FieldType::Keyword,
                    ),
                )
                .await;
        }
        Ok(())
    }

    async fn upsert_batch(&self, points: &[VectorPoint]) -> Result<()> {
        for chunk in points.chunks(UPSERT_BATCH_SIZE) {
            let structs: Vec<PointStruct> = chunk.iter().map(Self::point_to_struct).collect();
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, structs))
                .await
                .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        }
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], filter: &VectorFilter, top_k: usize) -> Result<Vec<VectorSearchHit>> {
        let mut builder = SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(f) = Self::build_filter(filter) {
            builder = builder.filter(f);
        }
        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|p| {
                let chunk_id = match p.id?.point_id_options? {
                    qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s) => Uuid::parse_str(&s).ok()?,
                    qdrant_client::qdrant::point_id::PointIdOptions::Num(_) => return None,
                };
                let doc_id = p
                    .payload
                    .get("doc_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())?;
                Some(VectorSearchHit { chunk_id, doc_id, score: p.score })
            })
            .collect())
    }

    async fn search_doc_summaries(
        &self,
        query_vector: &[f32],
        similarity_threshold: f32,
        top_k: usize,
    ) -> Result<Vec<VectorSearchHit>> {
        let filter = VectorFilter {
            chunk_type: Some(ChunkType::DocSummary),
            is_latest: Some(true),
            ..Default::default()
        };
        let hits = self.search(query_vector, &filter, top_k).await?;
        Ok(hits.into_iter().filter(|h| h.score >= similarity_threshold).collect())
    }

    async fn set_is_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()> {
        use qdrant_client::qdrant::SetPayloadPointsBuilder;
        let mut payload = std::collections::HashMap::new();
        payload.insert("is_latest".to_string(), is_latest.into());
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.collection, payload)
                    .points_filter(Filter::must([Condition::matches("doc_id", doc_id.to_string())])),
            )
            .await
            .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        Ok(())
    }

    async fn delete_by_ids(&self, chunk_ids: &[Uuid]) -> Result<()> {
        use qdrant_client::qdrant::{DeletePointsBuilder, PointsIdsList};
        let ids = chunk_ids
            .iter()
            .map(|id| qdrant_client::qdrant::PointId::from(id.to_string()))
            .collect::<Vec<_>>();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(qdrant_client::qdrant::PointsSelector::from(PointsIdsList { ids })),
            )
            .await
            .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        Ok(())
    }

    async fn delete_by_doc_id(&self, doc_id: Uuid) -> Result<()> {
        use qdrant_client::qdrant::DeletePointsBuilder;
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Filter::must([Condition::matches("doc_id", doc_id.to_string())])),
            )
            .await
            .map_err(|e| Error::Store(StoreError::Vector(e.to_string())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_with_empty_accessible_set_is_unsatisfiable() {
        let filter = VectorFilter { doc_id_in: Some(vec![]), ..Default::default() };
        let built = QdrantVectorStore::build_filter(&filter);
        assert!(built.is_some());
    }

    #[test]
    fn filter_with_none_accessible_set_applies_no_membership_constraint() {
        let filter = VectorFilter::default();
        assert!(QdrantVectorStore::build_filter(&filter).is_none());
    }
}
