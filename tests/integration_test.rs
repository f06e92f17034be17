//! End-to-end integration tests for the ingestion pipeline, wired entirely
//! against in-memory fakes so no live Qdrant/Tantivy/SQLite/object-store
//! service is required.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use uuid::Uuid;

use ragcore::core::document::ProcessingStatus;
use ragcore::error::{Error, IngestionError};
use ragcore::llm::{LlmClient, Message, ModelTier};
use ragcore::storage::{InMemoryLexicalStore, InMemoryMetadataStore, InMemoryObjectStore, InMemoryVectorStore, MetadataStore};
use ragcore::{ChunkingConfig, DiffEngine, FallbackEmbedder, IngestionPipeline, VersionDetector};

/// Scripted LLM double: always returns the same canned response,
/// regardless of which of the summarizer's/version-detector's/diff
/// engine's distinct JSON schemas the caller expects. Works because none
/// of those response structs deny unknown fields, so one superset object
/// satisfies every schema in play during ingestion.
struct FakeLlm {
    response: String,
    calls: AtomicUsize,
}

impl FakeLlm {
    fn new() -> Self {
        Self {
            response: serde_json::json!({
                "summary": "a short summary",
                "key_points": ["point one", "point two"],
                "entities": {"organizations": ["Acme Corp"]},
                "doc_type": "policy",
                "description": "This chunk describes refund timing.",
                "is_new_version": false,
                "matched_doc_id": null,
                "confidence": 0.0,
                "reason": "no match",
                "new_is_newer": false,
                "change_summary": "",
                "change_details": [],
                "impact_analysis": "",
            })
            .to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn generate(&self, _tier: ModelTier, _system_prompt: &str, _messages: &[Message], _max_tokens: u32) -> ragcore::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    async fn generate_stream(
        &self,
        _tier: ModelTier,
        _system_prompt: &str,
        _messages: &[Message],
        _max_tokens: u32,
    ) -> ragcore::Result<Pin<Box<dyn Stream<Item = ragcore::Result<String>> + Send>>> {
        unimplemented!("not exercised by ingestion tests")
    }
}

/// Builds a fully in-memory `IngestionPipeline` plus the metadata store
/// handle tests assert against directly.
fn build_pipeline() -> (IngestionPipeline, Arc<InMemoryMetadataStore>) {
    let vector_store = Arc::new(InMemoryVectorStore::new());
    let lexical_store = Arc::new(InMemoryLexicalStore::new());
    let metadata_store = Arc::new(InMemoryMetadataStore::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let embedder = Arc::new(FallbackEmbedder::new(32));
    let llm: Arc<dyn LlmClient> = Arc::new(FakeLlm::new());

    let summarizer = Arc::new(ragcore::summarization::Summarizer::new(Arc::clone(&llm), 4));
    let version_detector = Arc::new(VersionDetector::new(
        Arc::clone(&metadata_store) as _,
        Arc::clone(&vector_store) as _,
        Arc::clone(&lexical_store) as _,
        Arc::clone(&embedder) as _,
        Arc::clone(&llm),
        0.85,
        0.80,
        0.75,
    ));
    let diff_engine = Arc::new(DiffEngine::new(Arc::clone(&metadata_store) as _, Arc::clone(&llm)));

    let pipeline = IngestionPipeline::new(
        Arc::clone(&vector_store) as _,
        Arc::clone(&lexical_store) as _,
        Arc::clone(&metadata_store) as _,
        Arc::clone(&object_store) as _,
        Arc::clone(&embedder) as _,
        summarizer,
        version_detector,
        diff_engine,
        ChunkingConfig::default(),
        25,
        0.75,
    );

    (pipeline, metadata_store)
}

const REFUND_POLICY_MD: &str = "# Refund Policy\n\n\
    ## Overview\n\n\
    Refunds are processed within 30 days of the original purchase date, \
    provided the item is returned in its original condition with proof of \
    purchase attached.\n\n\
    ## Exceptions\n\n\
    Final sale items and gift cards are not eligible for a refund under \
    any circumstances.\n";

#[tokio::test]
async fn fresh_document_ingests_to_ready_with_dense_chunk_sequence() {
    let (pipeline, metadata_store) = build_pipeline();

    let doc_id = pipeline
        .ingest(REFUND_POLICY_MD.as_bytes().to_vec(), "refund-policy.md", ragcore::ingestion::IngestOptions::default())
        .await
        .expect("ingestion should succeed");

    let document = metadata_store.get_document(doc_id).await.expect("get_document").expect("document should exist");
    assert_eq!(document.processing_status, ProcessingStatus::Ready);
    assert!(document.is_latest);
    assert!(document.doc_summary.is_some());

    let chunks = metadata_store.get_chunks(doc_id).await.expect("get_chunks");
    assert!(!chunks.is_empty());
    let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..chunks.len()).collect::<Vec<_>>(), "chunk_index must be a dense 0..n sequence");
    assert!(chunks.iter().all(|c| c.doc_id == doc_id));
}

#[tokio::test]
async fn duplicate_content_is_rejected() {
    let (pipeline, _metadata_store) = build_pipeline();

    pipeline
        .ingest(REFUND_POLICY_MD.as_bytes().to_vec(), "refund-policy.md", ragcore::ingestion::IngestOptions::default())
        .await
        .expect("first ingestion should succeed");

    let second = pipeline.ingest(REFUND_POLICY_MD.as_bytes().to_vec(), "refund-policy-copy.md", ragcore::ingestion::IngestOptions::default()).await;

    assert!(matches!(second, Err(Error::Ingestion(IngestionError::Duplicate { .. }))));
}

#[tokio::test]
async fn delete_removes_chunks_and_metadata() {
    let (pipeline, metadata_store) = build_pipeline();

    let doc_id = pipeline
        .ingest(REFUND_POLICY_MD.as_bytes().to_vec(), "refund-policy.md", ragcore::ingestion::IngestOptions::default())
        .await
        .expect("ingestion should succeed");

    assert!(!metadata_store.get_chunks(doc_id).await.expect("get_chunks").is_empty());

    pipeline.delete(doc_id).await.expect("delete should succeed");

    assert!(metadata_store.get_document(doc_id).await.expect("get_document").is_none());
    assert!(metadata_store.get_chunks(doc_id).await.expect("get_chunks").is_empty());
}

#[tokio::test]
async fn delete_of_unknown_document_fails() {
    let (pipeline, _metadata_store) = build_pipeline();
    let result = pipeline.delete(Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::Ingestion(IngestionError::DocumentNotFound { .. }))));
}

#[tokio::test]
async fn tagged_options_are_applied_to_the_stored_document() {
    let (pipeline, metadata_store) = build_pipeline();

    let options = ragcore::ingestion::IngestOptions { doc_type: Some("policy".to_string()), tags: vec!["refunds".to_string(), "customer-facing".to_string()], ..Default::default() };

    let doc_id = pipeline.ingest(REFUND_POLICY_MD.as_bytes().to_vec(), "refund-policy.md", options).await.expect("ingestion should succeed");

    let document = metadata_store.get_document(doc_id).await.expect("get_document").expect("document should exist");
    assert_eq!(document.doc_type.as_deref(), Some("policy"));
    assert_eq!(document.tags, vec!["refunds".to_string(), "customer-facing".to_string()]);
}
