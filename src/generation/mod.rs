//! Answer generation: single-pass RAG over a retrieved chunk set, and
//! map-reduce synthesis across several documents for broader questions.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use uuid::Uuid;

use crate::core::{Citation, RetrievedChunk};
use crate::error::Result;
use crate::llm::{LlmClient, Message, ModelTier};
use crate::tokenizer::{count_tokens, truncate_to_tokens};

const UNCERTAINTY_PHRASES: &[&str] = &["i don't know", "i do not know", "not enough information", "cannot find", "insufficient information", "unable to determine"];

/// A generated answer together with its supporting citations and a
/// heuristic confidence score.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GeneratedAnswer {
    /// Answer text, with inline `[source: ...]` citations.
    pub answer: String,
    /// Deduplicated citations extracted from the answer.
    pub citations: Vec<Citation>,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f32,
}

/// System prompt shared by single-pass and per-document map-reduce calls:
/// mandates inline citations in a fixed format and refusal when the
/// context doesn't support an answer.
const CITATION_SYSTEM_PROMPT: &str = "Answer the user's question using only the provided context chunks. \
    Cite every factual claim inline in the format [source: <document title>, <section>, <page>]. \
    If the context does not contain enough information to answer, say so plainly instead of guessing.";

/// Generates answers from retrieved context, single-pass or map-reduce.
pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
    max_context_tokens: usize,
}

impl AnswerGenerator {
    /// Builds a generator bounding context to `max_context_tokens` (spec
    /// default 12000).
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, max_context_tokens: usize) -> Self {
        Self { llm, max_context_tokens }
    }

    /// Single-pass RAG: builds a token-budgeted context block from
    /// `chunks`, asks the LLM for an answer, and extracts citations
    /// post-hoc.
    pub async fn generate(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<GeneratedAnswer> {
        let context = self.build_context_block(chunks);
        let messages = [Message::user(format!("Context:\n{context}\n\nQuestion: {question}"))];
        let answer = self.llm.generate(ModelTier::Main, CITATION_SYSTEM_PROMPT, &messages, 1000).await?;
        let citations = extract_citations(&answer, chunks);
        let confidence = compute_confidence(&answer, chunks);
        Ok(GeneratedAnswer { answer, citations, confidence })
    }

    /// Streams a single-pass answer: the citation list is yielded first as
    /// a single chunk (so a caller can render "sources" before any answer
    /// text arrives), followed by the answer's token stream.
    pub async fn generate_stream(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let context = self.build_context_block(chunks);
        let messages = [Message::user(format!("Context:\n{context}\n\nQuestion: {question}"))];
        let citations = extract_citations_from_context(chunks);
        let inner = self.llm.generate_stream(ModelTier::Main, CITATION_SYSTEM_PROMPT, &messages, 1000).await?;

        let sources_event = futures_util::stream::once(async move { Ok(StreamEvent::Sources(citations)) });
        let token_events = inner.map(|item| item.map(StreamEvent::Token));
        Ok(Box::pin(sources_event.chain(token_events)))
    }

    /// Map-reduce synthesis across multiple documents: generates a
    /// restricted partial answer per document, then asks the LLM to merge
    /// them, concatenating citations from every partial.
    pub async fn generate_cross_document(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<GeneratedAnswer> {
        let mut by_doc: Vec<(Uuid, String, Vec<RetrievedChunk>)> = Vec::new();
        for chunk in chunks {
            if let Some(entry) = by_doc.iter_mut().find(|(doc_id, _, _)| *doc_id == chunk.doc_id) {
                entry.2.push(chunk.clone());
            } else {
                by_doc.push((chunk.doc_id, chunk.doc_title.clone(), vec![chunk.clone()]));
            }
        }

        let mut partials = Vec::with_capacity(by_doc.len());
        let mut all_citations: Vec<Citation> = Vec::new();

        for (_, doc_title, doc_chunks) in &by_doc {
            let context = self.build_context_block(doc_chunks);
            let system = format!("{CITATION_SYSTEM_PROMPT} You are answering using only material from \"{doc_title}\".");
            let messages = [Message::user(format!("Context:\n{context}\n\nQuestion: {question}"))];
            let partial = self.llm.generate(ModelTier::Main, &system, &messages, 600).await?;
            all_citations.extend(extract_citations(&partial, doc_chunks));
            partials.push(format!("From \"{doc_title}\":\n{partial}"));
        }

        let reduce_system = "Merge the following per-document partial answers into one coherent answer to the \
            original question. Preserve every inline [source: ...] citation from the partials verbatim.";
        let reduce_messages = [Message::user(format!("Question: {question}\n\nPartial answers:\n\n{}", partials.join("\n\n")))];
        let answer = self.llm.generate(ModelTier::Main, reduce_system, &reduce_messages, 1200).await?;

        let mut seen = HashSet::new();
        all_citations.retain(|c| seen.insert(c.chunk_id));

        let confidence = compute_confidence(&answer, chunks);
        Ok(GeneratedAnswer { answer, citations: all_citations, confidence })
    }

    /// Builds the context block passed to the LLM: one annotated section
    /// per chunk, accumulated until `max_context_tokens` would be
    /// exceeded. If even the first chunk alone exceeds the budget, it is
    /// truncated to fit rather than being dropped entirely.
    fn build_context_block(&self, chunks: &[RetrievedChunk]) -> String {
        let mut budget_remaining = self.max_context_tokens;
        let mut blocks = Vec::with_capacity(chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            let pages = if chunk.page_numbers.is_empty() { String::new() } else { format!(", page {:?}", chunk.page_numbers) };
            let annotated = format!("[{}] {} — {}{}\n{}", i + 1, chunk.doc_title, chunk.section_path, pages, chunk.content);
            let tokens = count_tokens(&annotated);

            if tokens > budget_remaining {
                if blocks.is_empty() {
                    if let Ok(truncated) = truncate_to_tokens(&annotated, budget_remaining) {
                        blocks.push(truncated);
                    }
                }
                break;
            }

            budget_remaining -= tokens;
            blocks.push(annotated);
        }

        blocks.join("\n\n---\n\n")
    }
}

/// An event in an answer's token stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The citation list, emitted once before any answer tokens.
    Sources(Vec<Citation>),
    /// One token (or token fragment) of the answer.
    Token(String),
}

/// A chunk is cited if its document title, section path, or a page number
/// literally appears in the answer text, or it was among the top 3
/// retrieved chunks (a chunk that strongly influenced the answer even
/// without a textual match).
fn extract_citations(answer: &str, chunks: &[RetrievedChunk]) -> Vec<Citation> {
    let lower = answer.to_lowercase();
    let mut citations = Vec::new();
    let mut seen = HashSet::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let mentioned = lower.contains(&chunk.doc_title.to_lowercase())
            || lower.contains(&chunk.section_path.to_lowercase())
            || chunk.page_numbers.iter().any(|p| lower.contains(&p.to_string()));
        if (mentioned || i < 3) && seen.insert(chunk.chunk_id) {
            citations.push(Citation::from_chunk(chunk));
        }
    }
    citations
}

fn extract_citations_from_context(chunks: &[RetrievedChunk]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    chunks.iter().filter(|c| seen.insert(c.chunk_id)).map(Citation::from_chunk).collect()
}

/// `zero chunks -> 0.0`; an explicit uncertainty phrase in the answer ->
/// `0.3 * coverage`; otherwise `0.5 + score_component + 0.2 * coverage`,
/// clamped to `[0, 1]` and rounded to 2 decimals. `coverage` is
/// `min(chunk_count / 3, 1)`; `score_component` is the mean retrieval
/// score of the chunks actually used, scaled to `[0, 0.3]`.
fn compute_confidence(answer: &str, chunks: &[RetrievedChunk]) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }

    let coverage = (chunks.len() as f32 / 3.0).min(1.0);
    let lower = answer.to_lowercase();
    let uncertain = UNCERTAINTY_PHRASES.iter().any(|p| lower.contains(p));

    let raw = if uncertain {
        0.3 * coverage
    } else {
        let mean_score = chunks.iter().map(|c| c.score).sum::<f32>() / chunks.len() as f32;
        let score_component = mean_score.clamp(0.0, 1.0) * 0.3;
        0.5 + score_component + 0.2 * coverage
    };

    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkType;

    fn chunk(score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            doc_id: Uuid::new_v4(),
            doc_title: "Refund Policy".to_string(),
            section_path: "Ch. 1".to_string(),
            page_numbers: vec![3],
            chunk_index: 0,
            chunk_type: ChunkType::Text,
            content: "refunds are processed within 30 days".to_string(),
            group_id: None,
            department: None,
            score,
        }
    }

    #[test]
    fn zero_chunks_yields_zero_confidence() {
        assert_eq!(compute_confidence("whatever", &[]), 0.0);
    }

    #[test]
    fn uncertainty_phrase_caps_confidence_low() {
        let chunks = vec![chunk(0.9), chunk(0.9), chunk(0.9)];
        let conf = compute_confidence("I don't know based on this context.", &chunks);
        assert!((conf - 0.3).abs() < 1e-6);
    }

    #[test]
    fn confident_answer_with_full_coverage_scores_above_half() {
        let chunks = vec![chunk(0.9), chunk(0.9), chunk(0.9)];
        let conf = compute_confidence("refunds take 30 days, per Refund Policy Ch. 1", &chunks);
        assert!(conf > 0.5);
        assert!(conf <= 1.0);
    }

    #[test]
    fn extract_citations_always_includes_top_three() {
        let chunks = vec![chunk(0.9), chunk(0.8), chunk(0.7), chunk(0.1)];
        let citations = extract_citations("an answer mentioning nothing specific", &chunks);
        assert_eq!(citations.len(), 3);
    }
}
