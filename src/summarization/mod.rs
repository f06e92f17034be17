//! Summarizer: section summaries, document summary/entities/type, and
//! contextual chunk descriptions, all produced by light-model LLM calls.
//!
//! Every output here is best-effort per spec: a failed call is logged via
//! `tracing::warn!` with the structured reason and the corresponding field
//! comes back empty rather than failing the ingestion pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::llm::{generate_json, LlmClient, Message, ModelTier};

/// Closed set of document-type tags the document summarizer may assign.
pub const DOC_TYPES: &[&str] =
    &["contract", "report", "policy", "manual", "standard", "regulation", "proposal", "minutes", "financial", "technical", "other"];

const SECTION_INPUT_CHAR_CAP: usize = 8000;
const SECTION_SUMMARY_MAX_TOKENS: u32 = 300;
const DOCUMENT_SUMMARY_MAX_TOKENS: u32 = 500;
const CONTEXTUAL_DESCRIPTION_MAX_TOKENS: u32 = 100;

/// Result of summarizing one section: a short summary plus key points.
/// Empty fields mean the LLM call failed; ingestion proceeds regardless.
#[derive(Debug, Clone, Default)]
pub struct SectionSummaryResult {
    /// 100-200 token summary of the section.
    pub summary_text: String,
    /// 3-5 short bullet-style key points.
    pub key_points: Vec<String>,
}

/// Result of summarizing the whole document.
#[derive(Debug, Clone, Default)]
pub struct DocumentSummaryResult {
    /// ~300-token document summary.
    pub summary: String,
    /// Entity mapping, e.g. `"organizations" -> [...]`.
    pub key_entities: HashMap<String, Vec<String>>,
    /// One tag from [`DOC_TYPES`], only set when the uploader did not
    /// already provide a type.
    pub doc_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionSummaryResponse {
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentSummaryResponse {
    summary: String,
    #[serde(default)]
    entities: HashMap<String, Vec<String>>,
    #[serde(default)]
    doc_type: String,
}

#[derive(Debug, Deserialize)]
struct ContextualDescriptionResponse {
    description: String,
}

/// Input for one contextual-description call, batched with bounded
/// concurrency.
pub struct ContextInput<'a> {
    /// Owning document's title.
    pub doc_title: &'a str,
    /// Document-level summary, if available.
    pub doc_summary: &'a str,
    /// This chunk's section path.
    pub section_path: &'a str,
    /// The chunk's own content.
    pub chunk_content: &'a str,
}

/// Summarizer component: wraps an [`LlmClient`] and a concurrency cap for
/// contextual-description fan-out.
pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
    concurrency: usize,
}

impl Summarizer {
    /// Builds a summarizer calling `llm`, capping in-flight contextual
    /// description calls at `concurrency` (spec reference cap: 10).
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, concurrency: usize) -> Self {
        Self { llm, concurrency: concurrency.max(1) }
    }

    /// Summarizes one section's concatenated content.
    pub async fn summarize_section(&self, section_content: &str) -> SectionSummaryResult {
        let truncated = truncate_chars(section_content, SECTION_INPUT_CHAR_CAP);
        let system = "You summarize a document section for a retrieval system. \
            Produce a 100-200 word summary and 3-5 short key points.";
        let messages = [Message::user(format!(
            "Respond as JSON: {{\"summary\": string, \"key_points\": string[]}}.\n\nSection content:\n{truncated}"
        ))];

        match generate_json::<SectionSummaryResponse>(self.llm.as_ref(), ModelTier::Light, system, &messages, SECTION_SUMMARY_MAX_TOKENS).await {
            Ok(resp) => SectionSummaryResult { summary_text: resp.summary, key_points: resp.key_points },
            Err(e) => {
                warn!(error = %e, "section summarization failed, leaving summary empty");
                SectionSummaryResult::default()
            }
        }
    }

    /// Summarizes the whole document from its concatenated section
    /// summaries. `existing_doc_type` is the uploader-provided type, if
    /// any; when set, the detected tag is not surfaced (the caller should
    /// keep the uploader's choice).
    pub async fn summarize_document(&self, doc_title: &str, section_summaries: &[String], existing_doc_type: Option<&str>) -> DocumentSummaryResult {
        let concatenated = truncate_chars(&section_summaries.join("\n\n"), SECTION_INPUT_CHAR_CAP);
        let system = format!(
            "You summarize a whole document titled \"{doc_title}\" for a retrieval system, \
             given its section summaries. Produce a ~300-word summary, an entity map keyed by \
             category (organizations, people, dates, amounts), and classify the document into \
             exactly one of: {}.",
            DOC_TYPES.join(", ")
        );
        let messages = [Message::user(format!(
            "Respond as JSON: {{\"summary\": string, \"entities\": object, \"doc_type\": string}}.\n\nSection summaries:\n{concatenated}"
        ))];

        match generate_json::<DocumentSummaryResponse>(self.llm.as_ref(), ModelTier::Light, &system, &messages, DOCUMENT_SUMMARY_MAX_TOKENS).await {
            Ok(resp) => {
                let doc_type = if existing_doc_type.is_some() {
                    None
                } else {
                    Some(resp.doc_type).filter(|t| DOC_TYPES.contains(&t.as_str())).or(Some("other".to_string()))
                };
                DocumentSummaryResult { summary: resp.summary, key_entities: resp.entities, doc_type }
            }
            Err(e) => {
                warn!(error = %e, "document summarization failed, leaving summary empty");
                DocumentSummaryResult::default()
            }
        }
    }

    /// Generates a 1-3 sentence contextual description prepended to a
    /// chunk's content before embedding/lexical indexing ("contextual
    /// retrieval").
    pub async fn contextual_description(&self, input: &ContextInput<'_>) -> String {
        let system = "Describe, in 1-3 short sentences, this chunk's role within its document. \
            Use the document title, document summary, and section path as context. This \
            description is prepended to the chunk before indexing, so it should help a reader \
            understand what the fragment is about standalone.";
        let messages = [Message::user(format!(
            "Respond as JSON: {{\"description\": string}}.\n\nDocument title: {}\nDocument summary: {}\nSection path: {}\nChunk content:\n{}",
            input.doc_title,
            input.doc_summary,
            input.section_path,
            truncate_chars(input.chunk_content, SECTION_INPUT_CHAR_CAP),
        ))];

        match generate_json::<ContextualDescriptionResponse>(self.llm.as_ref(), ModelTier::Light, system, &messages, CONTEXTUAL_DESCRIPTION_MAX_TOKENS)
            .await
        {
            Ok(resp) => resp.description,
            Err(e) => {
                warn!(error = %e, "contextual description generation failed, leaving empty");
                String::new()
            }
        }
    }

    /// Generates contextual descriptions for every input, with in-flight
    /// calls capped at `self.concurrency`. Order of the returned vector
    /// matches `inputs`.
    pub async fn contextual_descriptions_batch(&self, inputs: Vec<ContextInput<'_>>) -> Vec<String> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let futures = inputs.into_iter().map(|input| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                self.contextual_description(&input).await
            }
        });
        futures_util::future::join_all(futures).await
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::Stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeLlm {
        response: Mutex<String>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn generate(&self, _tier: ModelTier, _system_prompt: &str, _messages: &[Message], _max_tokens: u32) -> crate::error::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(crate::error::Error::Llm(crate::error::LlmError::RequestFailed { attempts: 1, reason: "boom".to_string() }));
            }
            Ok(self.response.lock().expect("lock").clone())
        }

        async fn generate_stream(
            &self,
            _tier: ModelTier,
            _system_prompt: &str,
            _messages: &[Message],
            _max_tokens: u32,
        ) -> crate::error::Result<std::pin::Pin<Box<dyn Stream<Item = crate::error::Result<String>> + Send>>> {
            unimplemented!("not used in summarizer tests")
        }
    }

    #[tokio::test]
    async fn section_summary_failure_is_swallowed_as_empty() {
        let llm = Arc::new(FakeLlm { response: Mutex::new(String::new()), calls: AtomicUsize::new(0), fail: true });
        let summarizer = Summarizer::new(llm, 10);
        let result = summarizer.summarize_section("some content").await;
        assert!(result.summary_text.is_empty());
        assert!(result.key_points.is_empty());
    }

    #[tokio::test]
    async fn section_summary_parses_successful_response() {
        let body = r#"{"summary": "a summary", "key_points": ["a", "b"]}"#.to_string();
        let llm = Arc::new(FakeLlm { response: Mutex::new(body), calls: AtomicUsize::new(0), fail: false });
        let summarizer = Summarizer::new(llm, 10);
        let result = summarizer.summarize_section("some content").await;
        assert_eq!(result.summary_text, "a summary");
        assert_eq!(result.key_points, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn document_summary_falls_back_to_other_on_invalid_doc_type() {
        let body = r#"{"summary": "doc summary", "entities": {"organizations": ["Acme"]}, "doc_type": "not_a_real_type"}"#.to_string();
        let llm = Arc::new(FakeLlm { response: Mutex::new(body), calls: AtomicUsize::new(0), fail: false });
        let summarizer = Summarizer::new(llm, 10);
        let result = summarizer.summarize_document("Title", &["s1".to_string()], None).await;
        assert_eq!(result.doc_type.as_deref(), Some("other"));
        assert_eq!(result.key_entities.get("organizations"), Some(&vec!["Acme".to_string()]));
    }

    #[tokio::test]
    async fn document_summary_does_not_surface_a_tag_when_uploader_already_set_one() {
        let body = r#"{"summary": "doc summary", "entities": {}, "doc_type": "contract"}"#.to_string();
        let llm = Arc::new(FakeLlm { response: Mutex::new(body), calls: AtomicUsize::new(0), fail: false });
        let summarizer = Summarizer::new(llm, 10);
        let result = summarizer.summarize_document("Title", &["s1".to_string()], Some("policy")).await;
        assert_eq!(result.doc_type, None);
    }

    #[tokio::test]
    async fn contextual_descriptions_batch_preserves_order() {
        let body = r#"{"description": "a chunk description"}"#.to_string();
        let llm = Arc::new(FakeLlm { response: Mutex::new(body), calls: AtomicUsize::new(0), fail: false });
        let summarizer = Summarizer::new(llm, 2);
        let inputs = vec![
            ContextInput { doc_title: "Doc", doc_summary: "", section_path: "A", chunk_content: "one" },
            ContextInput { doc_title: "Doc", doc_summary: "", section_path: "B", chunk_content: "two" },
        ];
        let results = summarizer.contextual_descriptions_batch(inputs).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], "a chunk description");
        assert_eq!(results[1], "a chunk description");
    }

    #[test]
    fn truncate_chars_caps_at_char_boundary() {
        let text = "a".repeat(10);
        assert_eq!(truncate_chars(&text, 5).len(), 5);
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
