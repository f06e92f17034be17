//! Version detection: decides whether a newly-ingested document is a new
//! version of something already indexed, and if so links the two.
//!
//! Candidate generation is cheap and approximate (title similarity, then
//! doc-summary cosine similarity); the expensive LLM verification call only
//! ever runs over the small, deduplicated candidate set the two searches
//! produce.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::document::{Document, VersionStatus};
use crate::core::VersionMatchResult;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::{generate_json, LlmClient, Message, ModelTier};
use crate::storage::metadata::MetadataStore;
use crate::storage::vector::VectorStore;
use crate::storage::LexicalStore;

const TITLE_CANDIDATE_LIMIT: usize = 5;
const CONTENT_CANDIDATE_LIMIT: usize = 5;
const SUMMARY_PREFIX_CHARS: usize = 2000;
const VERIFICATION_MAX_TOKENS: u32 = 300;

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    is_new_version: bool,
    matched_doc_id: Option<String>,
    confidence: f32,
    reason: String,
    #[serde(default)]
    new_is_newer: bool,
    #[serde(default)]
    detected_version: Option<String>,
}

/// Detects and links version relationships between a newly-ingested
/// document and previously-indexed ones.
pub struct VersionDetector {
    metadata_store: Arc<dyn MetadataStore>,
    vector_store: Arc<dyn VectorStore>,
    lexical_store: Arc<dyn LexicalStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmClient>,
    title_similarity_threshold: f32,
    content_similarity_threshold: f32,
    auto_link_threshold: f32,
}

impl VersionDetector {
    /// Builds a detector from its collaborators and the three spec
    /// thresholds (title similarity, doc-summary cosine similarity, and
    /// the LLM confidence floor for auto-linking).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata_store: Arc<dyn MetadataStore>,
        vector_store: Arc<dyn VectorStore>,
        lexical_store: Arc<dyn LexicalStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmClient>,
        title_similarity_threshold: f32,
        content_similarity_threshold: f32,
        auto_link_threshold: f32,
    ) -> Self {
        Self { metadata_store, vector_store, lexical_store, embedder, llm, title_similarity_threshold, content_similarity_threshold, auto_link_threshold }
    }

    /// Finds candidate predecessor/successor documents for `title` and
    /// `doc_summary`, verifies the best one with an LLM call, and returns
    /// the verdict. Does not itself perform any linking.
    pub async fn detect(&self, title: &str, doc_summary: &str) -> Result<VersionMatchResult> {
        let mut candidates: HashMap<Uuid, Document> = HashMap::new();

        for doc in self.metadata_store.find_title_similar(title, self.title_similarity_threshold, TITLE_CANDIDATE_LIMIT).await? {
            candidates.insert(doc.doc_id, doc);
        }

        if !doc_summary.is_empty() {
            if let Ok(query_vector) = self.embedder.embed(&truncate_chars(doc_summary, SUMMARY_PREFIX_CHARS)) {
                let hits = self.vector_store.search_doc_summaries(&query_vector, self.content_similarity_threshold, CONTENT_CANDIDATE_LIMIT).await?;
                for hit in hits {
                    if let std::collections::hash_map::Entry::Vacant(entry) = candidates.entry(hit.doc_id) {
                        if let Some(doc) = self.metadata_store.get_document(hit.doc_id).await? {
                            entry.insert(doc);
                        }
                    }
                }
            }
        }

        if candidates.is_empty() {
            return Ok(VersionMatchResult { is_new_version: false, matched_doc_id: None, matched_title: None, confidence: 0.0, reason: "no candidates".to_string(), new_is_newer: false, detected_version: None });
        }

        self.verify(title, doc_summary, candidates.into_values().collect()).await
    }

    async fn verify(&self, new_title: &str, new_summary: &str, candidates: Vec<Document>) -> Result<VersionMatchResult> {
        let candidate_list = candidates
            .iter()
            .map(|d| format!("- doc_id: {}, title: \"{}\", version: {}, summary: {}", d.doc_id, d.title, d.version_number, d.doc_summary.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join("\n");

        let system = "You determine whether a newly-uploaded document is a new version of one of the \
            candidate documents listed, or an unrelated document. Consider title and summary similarity. \
            If it is a new version, decide whether the upload is newer or older than the matched candidate.";
        let messages = [Message::user(format!(
            "Respond as JSON: {{\"is_new_version\": bool, \"matched_doc_id\": string|null, \"confidence\": number (0-1), \
             \"reason\": string, \"new_is_newer\": bool, \"detected_version\": string|null}}.\n\n\
             New document title: {new_title}\nNew document summary: {new_summary}\n\nCandidates:\n{candidate_list}"
        ))];

        let resp: VerificationResponse = match generate_json(self.llm.as_ref(), ModelTier::Main, system, &messages, VERIFICATION_MAX_TOKENS).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "version verification call failed, treating as no match");
                return Ok(VersionMatchResult {
                    is_new_version: false,
                    matched_doc_id: None,
                    matched_title: None,
                    confidence: 0.0,
                    reason: format!("verification failed: {e}"),
                    new_is_newer: false,
                    detected_version: None,
                });
            }
        };

        let matched_doc_id = resp.matched_doc_id.as_deref().and_then(|s| Uuid::parse_str(s).ok());
        let matched_title = matched_doc_id.and_then(|id| candidates.iter().find(|d| d.doc_id == id)).map(|d| d.title.clone());

        Ok(VersionMatchResult {
            is_new_version: resp.is_new_version,
            matched_doc_id,
            matched_title,
            confidence: resp.confidence.clamp(0.0, 1.0),
            reason: resp.reason,
            new_is_newer: resp.new_is_newer,
            detected_version: resp.detected_version,
        })
    }

    /// Establishes the version link described by `verdict` for
    /// `uploaded`, flipping `is_latest` flags and version metadata as
    /// appropriate, then persists both documents. Returns the (possibly
    /// mutated) uploaded document.
    ///
    /// # Errors
    ///
    /// Propagates store errors. Does not call the LLM.
    pub async fn establish_link(&self, mut uploaded: Document, verdict: &VersionMatchResult) -> Result<Document> {
        let Some(matched_id) = verdict.matched_doc_id else {
            return Ok(uploaded);
        };
        let Some(mut matched) = self.metadata_store.get_document(matched_id).await? else {
            return Ok(uploaded);
        };

        if verdict.new_is_newer {
            let bumped = bump_major_version(&matched.version_number);
            uploaded.version_number = verdict.detected_version.clone().unwrap_or(bumped);
            uploaded.parent_version_id = Some(matched.doc_id);
            uploaded.is_latest = true;

            matched.version_status = VersionStatus::Superseded;
            matched.is_latest = false;
            matched.superseded_at = Some(chrono::Utc::now());

            self.vector_store.set_is_latest(matched.doc_id, false).await.ok();
            self.lexical_store.set_is_latest(matched.doc_id, false).await.ok();
            self.metadata_store.set_chunks_latest(matched.doc_id, false).await.ok();
        } else {
            uploaded.parent_version_id = matched.parent_version_id;
            uploaded.version_status = VersionStatus::Superseded;
            uploaded.is_latest = false;
            uploaded.superseded_at = Some(chrono::Utc::now());
            uploaded.version_number = verdict.detected_version.clone().unwrap_or_else(|| decrement_floor_v1(&matched.version_number));

            matched.parent_version_id = Some(uploaded.doc_id);
        }

        self.metadata_store.update_document(&matched).await?;
        self.metadata_store.update_document(&uploaded).await?;
        info!(uploaded = %uploaded.doc_id, matched = %matched.doc_id, newer = verdict.new_is_newer, "linked document versions");
        Ok(uploaded)
    }
}

fn bump_major_version(version: &str) -> String {
    let major = version.trim_start_matches('v').split('.').next().and_then(|s| s.parse::<u32>().ok()).unwrap_or(1);
    format!("v{}.0", major + 1)
}

fn decrement_floor_v1(version: &str) -> String {
    let major = version.trim_start_matches('v').split('.').next().and_then(|s| s.parse::<u32>().ok()).unwrap_or(1);
    format!("v{}.0", major.saturating_sub(1).max(1))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars { text.to_string() } else { text.chars().take(max_chars).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_major_version_increments_and_resets_minor() {
        assert_eq!(bump_major_version("v2.0"), "v3.0");
        assert_eq!(bump_major_version("v1.3"), "v2.0");
    }

    #[test]
    fn decrement_floor_v1_never_goes_below_v1() {
        assert_eq!(decrement_floor_v1("v1.0"), "v1.0");
        assert_eq!(decrement_floor_v1("v3.0"), "v2.0");
    }
}
