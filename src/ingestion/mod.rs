//! Ingestion pipeline: the document lifecycle state machine. Drives a raw
//! upload through dedup, parsing, chunking, summarization, version
//! detection, embedding, and indexing across all three stores, updating
//! [`ProcessingStatus`] at each stage.
//!
//! A failed stage marks the document `error` and returns; there is no
//! rollback of whatever already landed in the stores; [`IngestionPipeline::delete`]
//! is the recovery tool for a document stuck in a bad state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunking::{chunk_document, ChunkingConfig};
use crate::core::document::{Document, ProcessingStatus, Visibility};
use crate::core::{Chunk, ChunkBuilder, ChunkType};
use crate::diffing::DiffEngine;
use crate::embedding::Embedder;
use crate::error::{Error, IngestionError, Result};
use crate::parsing::{parse_document, title_from_filename};
use crate::storage::lexical::LexicalDoc;
use crate::storage::metadata::{MetadataStore, SectionSummary};
use crate::storage::object::ObjectStore;
use crate::storage::vector::VectorPoint;
use crate::storage::VectorStore;
use crate::summarization::{ContextInput, Summarizer};
use crate::tokenizer::count_tokens;
use crate::version_detect::VersionDetector;

/// Caller-supplied metadata applied at registration time.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Document type, if the uploader already knows it (skips auto-detection).
    pub doc_type: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Document group.
    pub group_id: Option<Uuid>,
    /// Owning user/system identifier.
    pub owner_id: Option<String>,
    /// Department, used for department-scoped retrieval filters.
    pub department: Option<String>,
    /// Access level. Defaults to [`Visibility::Public`].
    pub visibility: Visibility,
}

/// Orchestrates the full ingest-to-ready lifecycle.
pub struct IngestionPipeline {
    vector_store: Arc<dyn VectorStore>,
    lexical_store: Arc<dyn crate::storage::LexicalStore>,
    metadata_store: Arc<dyn MetadataStore>,
    object_store: Arc<dyn ObjectStore>,
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<Summarizer>,
    version_detector: Arc<VersionDetector>,
    diff_engine: Arc<DiffEngine>,
    chunking_config: ChunkingConfig,
    max_file_size_mb: u64,
    version_auto_link_threshold: f32,
    diff_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl IngestionPipeline {
    /// Builds the pipeline from its collaborators and tuning config.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        lexical_store: Arc<dyn crate::storage::LexicalStore>,
        metadata_store: Arc<dyn MetadataStore>,
        object_store: Arc<dyn ObjectStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<Summarizer>,
        version_detector: Arc<VersionDetector>,
        diff_engine: Arc<DiffEngine>,
        chunking_config: ChunkingConfig,
        max_file_size_mb: u64,
        version_auto_link_threshold: f32,
    ) -> Self {
        Self {
            vector_store,
            lexical_store,
            metadata_store,
            object_store,
            embedder,
            summarizer,
            version_detector,
            diff_engine,
            chunking_config,
            max_file_size_mb,
            version_auto_link_threshold,
            diff_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Ingests one file end to end. On success the document is `ready`;
    /// on failure it is marked `error` and the error is returned. Stages
    /// that have already written to a store are not rolled back.
    pub async fn ingest(&self, bytes: Vec<u8>, filename: &str, options: IngestOptions) -> Result<Uuid> {
        let content_hash = hash_bytes(&bytes);

        if let Some(existing) = self.metadata_store.find_by_hash(&content_hash).await? {
            return Err(Error::Ingestion(IngestionError::Duplicate { existing_doc_id: existing.doc_id.to_string() }));
        }

        let mut document = Document::new(title_from_filename(filename), filename.to_string(), content_hash, bytes.len() as u64);
        document.doc_type = options.doc_type.clone();
        document.tags = options.tags;
        document.group_id = options.group_id;
        document.owner_id = options.owner_id;
        document.department = options.department;
        document.visibility = options.visibility;
        let doc_id = document.doc_id;

        self.metadata_store.insert_document(&document).await?;

        if let Err(e) = self.object_store.put(doc_id, filename, bytes.clone()).await {
            return self.fail(document, "upload", &e).await;
        }

        document.processing_status = ProcessingStatus::Parsing;
        self.metadata_store.update_document(&document).await?;
        let parsed = match parse_document(&bytes, filename, self.max_file_size_mb) {
            Ok(parsed) => parsed,
            Err(e) => return self.fail(document, "parse", &e).await,
        };
        if !parsed.title.is_empty() {
            document.title = parsed.title.clone();
        }
        document.page_count = parsed.page_count;

        document.processing_status = ProcessingStatus::Chunking;
        self.metadata_store.update_document(&document).await?;
        let mut chunks = match chunk_document(&parsed, doc_id, &document.title, &self.chunking_config) {
            Ok(chunks) => chunks,
            Err(e) => return self.fail(document, "chunk", &e).await,
        };

        document.processing_status = ProcessingStatus::Summarizing;
        self.metadata_store.update_document(&document).await?;
        self.summarize(&mut document, &mut chunks).await;

        self.detect_and_link_version(&mut document).await;

        // Chunks were built before version detection ran; `is_latest` (and
        // the group/department mirrors) must reflect whatever the document
        // ended up with, not the default assigned at chunk-creation time.
        for chunk in &mut chunks {
            chunk.is_latest = document.is_latest;
            chunk.group_id = document.group_id;
            chunk.department.clone_from(&document.department);
        }

        document.processing_status = ProcessingStatus::Embedding;
        self.metadata_store.update_document(&document).await?;
        if let Err(e) = self.embed_and_index(&document, &chunks).await {
            return self.fail(document, "index", &e).await;
        }

        document.processing_status = ProcessingStatus::Ready;
        self.metadata_store.update_document(&document).await?;
        info!(doc_id = %doc_id, title = %document.title, "document ingestion complete");
        Ok(doc_id)
    }

    async fn fail(&self, mut document: Document, stage: &str, error: &Error) -> Result<Uuid> {
        document.processing_status = ProcessingStatus::Error;
        if let Err(e) = self.metadata_store.update_document(&document).await {
            warn!(error = %e, "failed to persist error status after stage failure");
        }
        Err(Error::Ingestion(IngestionError::StageFailed { stage: stage.to_string(), reason: error.to_string() }))
    }

    async fn summarize(&self, document: &mut Document, chunks: &mut Vec<Chunk>) {
        let mut by_section: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.chunk_type == ChunkType::Text {
                by_section.entry(chunk.section_path.clone()).or_default().push(i);
            }
        }

        let mut section_summaries = Vec::with_capacity(by_section.len());
        let mut summary_chunks = Vec::new();
        for (section_path, indices) in &by_section {
            let content = indices.iter().map(|&i| chunks[i].content.as_str()).collect::<Vec<_>>().join("\n\n");
            let result = self.summarizer.summarize_section(&content).await;
            if !result.summary_text.is_empty() {
                let summary = SectionSummary { doc_id: document.doc_id, section_path: section_path.clone(), summary_text: result.summary_text.clone(), key_points: result.key_points.clone() };
                if let Err(e) = self.metadata_store.upsert_section_summary(&summary).await {
                    warn!(error = %e, section = %section_path, "failed to persist section summary");
                }

                let mut text = result.summary_text.clone();
                if !result.key_points.is_empty() {
                    text.push_str("\n\nKey points:\n");
                    for point in &result.key_points {
                        text.push_str("- ");
                        text.push_str(point);
                        text.push('\n');
                    }
                }
                let mut builder = ChunkBuilder::new()
                    .doc_id(document.doc_id)
                    .doc_title(document.title.clone())
                    .section_path(section_path.clone())
                    .chunk_type(ChunkType::SectionSummary)
                    .token_count(count_tokens(&text))
                    .content(text)
                    .is_latest(document.is_latest);
                if let Some(group_id) = document.group_id {
                    builder = builder.group_id(group_id);
                }
                if let Some(department) = document.department.clone() {
                    builder = builder.department(department);
                }
                summary_chunks.push(builder.build());
            }
            section_summaries.push(result.summary_text);
        }

        let doc_summary = self.summarizer.summarize_document(&document.title, &section_summaries, document.doc_type.as_deref()).await;
        document.doc_summary = Some(doc_summary.summary.clone());
        document.key_entities = doc_summary.key_entities;
        if let Some(detected_type) = doc_summary.doc_type {
            document.doc_type = Some(detected_type);
        }

        let inputs: Vec<ContextInput<'_>> = chunks
            .iter()
            .map(|c| ContextInput { doc_title: &document.title, doc_summary: document.doc_summary.as_deref().unwrap_or(""), section_path: &c.section_path, chunk_content: &c.content })
            .collect();
        let descriptions = self.summarizer.contextual_descriptions_batch(inputs).await;
        for (chunk, description) in chunks.iter_mut().zip(descriptions) {
            if !description.is_empty() && matches!(chunk.chunk_type, ChunkType::Text | ChunkType::Table) {
                chunk.content = format!("{description}\n\n{}", chunk.content);
            }
        }

        // Section-summary and doc-summary chunks are appended after
        // contextual enrichment of the text/table chunks above — they are
        // already the summarized form and carry no further enrichment of
        // their own. Sequence indices continue densely from the last
        // text/table chunk.
        let mut next_index = chunks.len();
        for mut summary_chunk in summary_chunks {
            summary_chunk.chunk_index = next_index;
            next_index += 1;
            chunks.push(summary_chunk);
        }

        if !doc_summary.summary.is_empty() {
            let mut builder = ChunkBuilder::new()
                .doc_id(document.doc_id)
                .doc_title(document.title.clone())
                .section_path(String::new())
                .chunk_type(ChunkType::DocSummary)
                .token_count(count_tokens(&doc_summary.summary))
                .content(doc_summary.summary.clone())
                .is_latest(document.is_latest)
                .chunk_index(next_index);
            if let Some(group_id) = document.group_id {
                builder = builder.group_id(group_id);
            }
            if let Some(department) = document.department.clone() {
                builder = builder.department(department);
            }
            chunks.push(builder.build());
        }
    }

    async fn detect_and_link_version(&self, document: &mut Document) {
        let summary = document.doc_summary.clone().unwrap_or_default();
        let verdict = match self.version_detector.detect(&document.title, &summary).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "version detection failed, leaving document unlinked");
                return;
            }
        };

        if !verdict.is_new_version || verdict.confidence < self.version_auto_link_threshold {
            return;
        }

        let matched_id = verdict.matched_doc_id;
        match self.version_detector.establish_link(document.clone(), &verdict).await {
            Ok(linked) => *document = linked,
            Err(e) => {
                warn!(error = %e, "failed to establish version link");
                return;
            }
        }

        if let Some(matched_id) = matched_id {
            self.schedule_diff(document.doc_id, matched_id, verdict.new_is_newer);
        }
    }

    /// Schedules an async diff computation between the uploaded document
    /// and the document it was linked to. Failure is non-fatal and only
    /// logged; the task handle is retained so it is not dropped (and
    /// cancelled) before completion.
    fn schedule_diff(&self, uploaded_id: Uuid, matched_id: Uuid, uploaded_is_newer: bool) {
        let (old_id, new_id) = if uploaded_is_newer { (matched_id, uploaded_id) } else { (uploaded_id, matched_id) };
        let metadata_store = Arc::clone(&self.metadata_store);
        let diff_engine = Arc::clone(&self.diff_engine);

        let handle = tokio::spawn(async move {
            let old = match metadata_store.get_document(old_id).await {
                Ok(Some(doc)) => doc,
                _ => {
                    warn!(doc_id = %old_id, "diff scheduling: old document vanished before diff could run");
                    return;
                }
            };
            let new = match metadata_store.get_document(new_id).await {
                Ok(Some(doc)) => doc,
                _ => {
                    warn!(doc_id = %new_id, "diff scheduling: new document vanished before diff could run");
                    return;
                }
            };
            if let Err(e) = diff_engine.compute(&old, &new).await {
                warn!(error = %e, old = %old_id, new = %new_id, "background version diff computation failed");
            }
        });

        let mut tasks = self.diff_tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    async fn embed_and_index(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&contents)?;

        let doc_type = document.doc_type.clone().unwrap_or_else(|| "other".to_string());
        let mut points = Vec::with_capacity(chunks.len());
        let mut lexical_docs = Vec::with_capacity(chunks.len());

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            points.push(VectorPoint {
                chunk_id: chunk.chunk_id,
                vector: embedding,
                doc_id: chunk.doc_id,
                doc_type: doc_type.clone(),
                doc_title: chunk.doc_title.clone(),
                section_path: chunk.section_path.clone(),
                page_numbers: chunk.page_numbers.iter().map(|&p| i64::from(p)).collect(),
                chunk_index: chunk.chunk_index as i64,
                chunk_type: chunk.chunk_type,
                content: chunk.content.clone(),
                token_count: chunk.token_count as i64,
                group_id: chunk.group_id,
                department: chunk.department.clone(),
                is_latest: chunk.is_latest,
            });

            lexical_docs.push(LexicalDoc {
                chunk_id: chunk.chunk_id,
                doc_id: chunk.doc_id,
                doc_type: doc_type.clone(),
                doc_title: chunk.doc_title.clone(),
                section_path: chunk.section_path.clone(),
                page_numbers: chunk.page_numbers.iter().map(|&p| i64::from(p)).collect(),
                chunk_index: chunk.chunk_index as i64,
                chunk_type: chunk.chunk_type,
                content: chunk.content.clone(),
                group_id: chunk.group_id,
                department: chunk.department.clone(),
                is_latest: chunk.is_latest,
                created_at: chunk.created_at.timestamp(),
            });
        }

        self.vector_store.ensure_collection(self.embedder.dimensions()).await?;
        self.vector_store.upsert_batch(&points).await?;
        self.lexical_store.index_and_refresh(&lexical_docs).await?;
        self.metadata_store.insert_chunks(chunks).await?;
        Ok(())
    }

    /// Deletes a document and everything derived from it: vector points
    /// by id, lexical rows by doc id, the object-store original, and the
    /// metadata row (which cascades chunks and section summaries). The
    /// recovery path for a document stuck in `error`.
    pub async fn delete(&self, doc_id: Uuid) -> Result<()> {
        let document = self.metadata_store.get_document(doc_id).await?.ok_or_else(|| Error::Ingestion(IngestionError::DocumentNotFound { doc_id: doc_id.to_string() }))?;

        let chunk_ids = self.metadata_store.get_chunk_ids(doc_id).await?;
        if !chunk_ids.is_empty() {
            self.vector_store.delete_by_ids(&chunk_ids).await?;
        }
        self.lexical_store.delete_by_doc_id(doc_id).await?;
        self.object_store.delete(doc_id, &document.original_filename).await?;
        self.metadata_store.delete_document(doc_id).await?;
        info!(doc_id = %doc_id, "document and all derived data deleted");
        Ok(())
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_is_deterministic_and_distinguishes_content() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }
}
