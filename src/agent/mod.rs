//! Agent loop: a bounded reason/act/observe executor over a fixed tool
//! catalogue, used for comparisons, version history, and other
//! multi-step questions the router escalates to [`Route::Agent`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::core::agent::Route;
use crate::core::{AgentResponse, AgentStep, Citation};
use crate::diffing::DiffEngine;
use crate::error::{Error, QueryError, Result};
use crate::generation::AnswerGenerator;
use crate::llm::{extract_balanced_json, LlmClient, Message, ModelTier};
use crate::retriever::{RetrievalFilters, RetrievalRequest, VersionMode};
use crate::retriever::HybridRetriever;
use crate::storage::metadata::MetadataStore;
use crate::storage::LexicalStore;

const MAX_OBSERVATION_CHARS: usize = 3000;
const MAX_CITATIONS: usize = 10;
const STEP_MAX_TOKENS: u32 = 800;

const TOOL_CATALOGUE: &str = r#"Available tools:
- search_documents(query, doc_id?, doc_type?, group_id?, top_k?, version_mode?: "latest_only" | "all_versions" | "specific") -> ranked chunks matching the query.
- read_document_summary(doc_id, section_path?) -> the document's summary/entities, or one section's summary/key points.
- read_document_detail(doc_id, section_path?, page_start?, page_end?) -> raw chunk content in document order.
- list_documents(doc_type?, group_id?, tag?, status?, limit?) -> up to 50 matching documents.
- compare_versions(doc_id, other_doc_id) -> the three-layer diff between two document versions.
- get_version_history(doc_id) -> the chain of versions this document belongs to.
- cross_document_analysis(doc_ids, analysis_topic, analysis_type?) -> a synthesized answer drawing on several documents.

Respond with JSON only, either:
{"thought": string, "action": string, "action_input": object}
or, when you have enough information:
{"thought": string, "final_answer": string}"#;

#[derive(Debug, Deserialize)]
struct AgentLlmResponse {
    #[serde(default)]
    thought: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    action_input: Option<Value>,
    #[serde(default)]
    final_answer: Option<String>,
}

/// Executes the bounded tool-using agent loop.
pub struct AgentExecutor {
    retriever: Arc<HybridRetriever>,
    metadata_store: Arc<dyn MetadataStore>,
    lexical_store: Arc<dyn LexicalStore>,
    diff_engine: Arc<DiffEngine>,
    generator: Arc<AnswerGenerator>,
    llm: Arc<dyn LlmClient>,
    max_steps: u32,
}

impl AgentExecutor {
    /// Builds an executor over its tool collaborators, capping the
    /// reason/act/observe loop at `max_steps` (spec default 8).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        retriever: Arc<HybridRetriever>,
        metadata_store: Arc<dyn MetadataStore>,
        lexical_store: Arc<dyn LexicalStore>,
        diff_engine: Arc<DiffEngine>,
        generator: Arc<AnswerGenerator>,
        llm: Arc<dyn LlmClient>,
        max_steps: u32,
    ) -> Self {
        Self { retriever, metadata_store, lexical_store, diff_engine, generator, llm, max_steps: max_steps.max(1) }
    }

    /// Runs the loop to completion, producing an [`AgentResponse`].
    /// `accessible_doc_ids` constrains every `search_documents` call the
    /// same way direct retrieval would.
    pub async fn run(&self, question: &str, accessible_doc_ids: Option<Vec<Uuid>>) -> Result<AgentResponse> {
        let started = std::time::Instant::now();
        let system = format!("You are answering a user's question by reasoning step by step and calling tools as needed.\n\n{TOOL_CATALOGUE}");
        let mut history = vec![Message::user(question.to_string())];
        let mut steps = Vec::new();
        let mut observations_log = String::new();

        for step_number in 1..=self.max_steps {
            let step_started = std::time::Instant::now();
            let raw = self.llm.generate(ModelTier::Main, &system, &history, STEP_MAX_TOKENS).await?;
            let parsed = parse_agent_response(&raw);

            match parsed {
                Some(resp) if resp.final_answer.is_some() => {
                    let answer = resp.final_answer.unwrap_or_default();
                    steps.push(AgentStep {
                        step_number,
                        thought: resp.thought,
                        action: None,
                        action_input: None,
                        observation: None,
                        duration_ms: u64::try_from(step_started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    });
                    let citations = extract_citations_from_log(&observations_log);
                    let total_steps = steps.len() as u32;
                    return Ok(AgentResponse { answer, citations, confidence: confidence_from_steps(total_steps, self.max_steps), latency_ms: elapsed_ms(started), steps, total_steps, route: Route::Agent });
                }
                Some(resp) => {
                    let action = resp.action.clone().unwrap_or_default();
                    let observation = self.dispatch(&action, resp.action_input.clone()).await;
                    let truncated = truncate_chars(&observation, MAX_OBSERVATION_CHARS);
                    observations_log.push_str(&truncated);
                    observations_log.push('\n');

                    history.push(Message::assistant(raw));
                    history.push(Message::user(format!("Observation: {truncated}")));
                    steps.push(AgentStep {
                        step_number,
                        thought: resp.thought,
                        action: Some(action),
                        action_input: resp.action_input,
                        observation: Some(truncated),
                        duration_ms: u64::try_from(step_started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    });
                }
                None => {
                    warn!(raw = %raw, "agent step produced unparsable response, treating as a dead-end observation");
                    history.push(Message::assistant(raw));
                    history.push(Message::user("Observation: your previous response could not be parsed. Respond with valid JSON.".to_string()));
                    steps.push(AgentStep { step_number, thought: String::new(), action: None, action_input: None, observation: None, duration_ms: u64::try_from(step_started.elapsed().as_millis()).unwrap_or(u64::MAX) });
                }
            }
        }

        // Step cap exceeded: force a final answer from whatever has been gathered.
        history.push(Message::user(
            "You have used all available steps. Answer the original question now, using only what you have already observed. Do not call any more tools.".to_string(),
        ));
        let final_raw = self.llm.generate(ModelTier::Main, &system, &history, STEP_MAX_TOKENS).await?;
        let answer = parse_agent_response(&final_raw).and_then(|r| r.final_answer).unwrap_or(final_raw);

        let citations = extract_citations_from_log(&observations_log);
        let total_steps = steps.len() as u32;
        Ok(AgentResponse { answer, citations, confidence: confidence_from_steps(total_steps, self.max_steps), latency_ms: elapsed_ms(started), steps, total_steps, route: Route::Agent })
    }

    async fn dispatch(&self, action: &str, input: Option<Value>) -> String {
        let input = input.unwrap_or(Value::Null);
        let result = match action {
            "search_documents" => self.tool_search_documents(&input).await,
            "read_document_summary" => self.tool_read_document_summary(&input).await,
            "read_document_detail" => self.tool_read_document_detail(&input).await,
            "list_documents" => self.tool_list_documents(&input).await,
            "compare_versions" => self.tool_compare_versions(&input).await,
            "get_version_history" => self.tool_get_version_history(&input).await,
            "cross_document_analysis" => self.tool_cross_document_analysis(&input).await,
            other => Ok(format!("unknown tool: {other}")),
        };
        result.unwrap_or_else(|e| format!("tool error: {e}"))
    }

    async fn tool_search_documents(&self, input: &Value) -> Result<String> {
        let query = field_str(input, "query").ok_or_else(|| missing_param("search_documents", "query"))?;
        let top_k = field_usize(input, "top_k").unwrap_or(5);
        let version_mode = match field_str(input, "version_mode").as_deref() {
            Some("all_versions" | "all") => VersionMode::AllVersions,
            Some("specific") => VersionMode::Specific,
            _ => VersionMode::LatestOnly,
        };

        let filters = RetrievalFilters {
            doc_id: field_str(input, "doc_id").and_then(|s| Uuid::parse_str(&s).ok()),
            doc_type: field_str(input, "doc_type"),
            group_id: field_str(input, "group_id").and_then(|s| Uuid::parse_str(&s).ok()),
            accessible_doc_ids: None,
        };
        let request = RetrievalRequest { query: &query, version_mode, filters, top_k };
        let chunks = self.retriever.retrieve(&request).await?;

        if chunks.is_empty() {
            return Ok("no matching chunks found".to_string());
        }

        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            out.push_str(&format!("[{}] 《{}》[{}] ({:?})\n{}\n\n", i + 1, chunk.doc_title, chunk.section_path, chunk.page_numbers, chunk.snippet(300)));
        }
        Ok(out)
    }

    async fn tool_read_document_summary(&self, input: &Value) -> Result<String> {
        let doc_id = field_uuid(input, "doc_id")?;
        if let Some(section_path) = field_str(input, "section_path") {
            let summary = self.metadata_store.get_section_summary(doc_id, &section_path).await?;
            return Ok(match summary {
                Some(s) => format!("Section \"{}\" summary: {}\nKey points: {}", section_path, s.summary_text, s.key_points.join("; ")),
                None => format!("no summary for section \"{section_path}\""),
            });
        }
        let doc = self.metadata_store.get_document(doc_id).await?.ok_or_else(|| Error::Ingestion(crate::error::IngestionError::DocumentNotFound { doc_id: doc_id.to_string() }))?;
        Ok(format!(
            "Title: {}\nType: {}\nSummary: {}\nEntities: {:?}",
            doc.title,
            doc.doc_type.as_deref().unwrap_or("unknown"),
            doc.doc_summary.as_deref().unwrap_or(""),
            doc.key_entities
        ))
    }

    async fn tool_read_document_detail(&self, input: &Value) -> Result<String> {
        let doc_id = field_uuid(input, "doc_id")?;
        let page_range = match (field_i64(input, "page_start"), field_i64(input, "page_end")) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        };
        let section_path = field_str(input, "section_path");

        let mut chunks = self.lexical_store.fetch_document_chunks(doc_id, page_range).await?;
        if let Some(path) = &section_path {
            chunks.retain(|c| &c.section_path == path);
        }
        if chunks.is_empty() {
            return Ok("no matching chunks".to_string());
        }
        Ok(chunks.into_iter().map(|c| format!("[{}] {}", c.section_path, c.content)).collect::<Vec<_>>().join("\n\n"))
    }

    async fn tool_list_documents(&self, input: &Value) -> Result<String> {
        let doc_type = field_str(input, "doc_type");
        let group_id = field_str(input, "group_id").and_then(|s| Uuid::parse_str(&s).ok());
        let tag = field_str(input, "tag");
        let limit = field_usize(input, "limit").unwrap_or(50).min(50);
        let docs = self.metadata_store.list_documents(doc_type.as_deref(), group_id, tag.as_deref(), Some(crate::core::ProcessingStatus::Ready), limit).await?;
        if docs.is_empty() {
            return Ok("no documents match".to_string());
        }
        Ok(docs.into_iter().map(|d| format!("{} - \"{}\" ({})", d.doc_id, d.title, d.version_number)).collect::<Vec<_>>().join("\n"))
    }

    async fn tool_compare_versions(&self, input: &Value) -> Result<String> {
        let doc_id = field_uuid(input, "doc_id")?;
        let other_id = field_uuid(input, "other_doc_id")?;
        let first = self.metadata_store.get_document(doc_id).await?.ok_or_else(|| Error::Ingestion(crate::error::IngestionError::DocumentNotFound { doc_id: doc_id.to_string() }))?;
        let second = self.metadata_store.get_document(other_id).await?.ok_or_else(|| Error::Ingestion(crate::error::IngestionError::DocumentNotFound { doc_id: other_id.to_string() }))?;
        let (old, new) = if first.created_at <= second.created_at { (first, second) } else { (second, first) };

        if let Some(cached) = self.diff_engine.cached(old.doc_id, new.doc_id).await? {
            return Ok(format_diff_summary(&cached));
        }
        let diff = self.diff_engine.compute(&old, &new).await?;
        Ok(format_diff_summary(&diff))
    }

    async fn tool_get_version_history(&self, input: &Value) -> Result<String> {
        let doc_id = field_uuid(input, "doc_id")?;
        let mut chain = Vec::new();
        let mut current = self.metadata_store.get_document(doc_id).await?;
        while let Some(doc) = current {
            let parent = doc.parent_version_id;
            chain.push(format!("{} \"{}\" {} (latest: {})", doc.doc_id, doc.title, doc.version_number, doc.is_latest));
            current = match parent {
                Some(parent_id) => self.metadata_store.get_document(parent_id).await?,
                None => None,
            };
        }
        chain.reverse();
        Ok(chain.join(" -> "))
    }

    async fn tool_cross_document_analysis(&self, input: &Value) -> Result<String> {
        let doc_ids: Vec<Uuid> = input
            .get("doc_ids")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).filter_map(|s| Uuid::parse_str(s).ok()).collect())
            .unwrap_or_default();
        if doc_ids.len() < 2 {
            return Ok("cross_document_analysis requires at least two doc_ids".to_string());
        }
        let topic = field_str(input, "analysis_topic").unwrap_or_default();

        let mut all_chunks = Vec::new();
        for doc_id in &doc_ids {
            let filters = RetrievalFilters { doc_id: Some(*doc_id), doc_type: None, group_id: None, accessible_doc_ids: None };
            let request = RetrievalRequest { query: &topic, version_mode: VersionMode::LatestOnly, filters, top_k: 5 };
            all_chunks.extend(self.retriever.retrieve(&request).await?);
        }

        let generated = self.generator.generate_cross_document(&topic, &all_chunks).await?;
        Ok(generated.answer)
    }
}

fn format_diff_summary(diff: &crate::core::VersionDiff) -> String {
    format!(
        "{} -> {}: {}\nAdded sections: {:?}\nDeleted sections: {:?}\nImpact: {}",
        diff.old_title, diff.new_title, diff.semantic_diff.change_summary, diff.structural_diff.added_sections, diff.structural_diff.deleted_sections, diff.semantic_diff.impact_analysis
    )
}

fn parse_agent_response(raw: &str) -> Option<AgentLlmResponse> {
    let candidate = extract_balanced_json(raw)?;
    serde_json::from_str(&candidate).ok()
}

/// Scans `search_documents` observations for `[N] 《title》[section] (...)`
/// lines, deduping by `(title, section)` and capping at
/// [`MAX_CITATIONS`].
fn extract_citations_from_log(log: &str) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut seen = HashSet::new();

    for line in log.lines() {
        let Some(after_bracket) = line.split_once("》") else { continue };
        let Some(title_start) = line.find('《') else { continue };
        let title = &line[title_start + '《'.len_utf8()..line.find('》').unwrap_or(line.len())];
        let Some(section_start) = after_bracket.1.find('[') else { continue };
        let Some(section_end) = after_bracket.1.find(']') else { continue };
        let section = &after_bracket.1[section_start + 1..section_end];

        let key = (title.to_string(), section.to_string());
        if seen.insert(key) {
            citations.push(Citation { chunk_id: Uuid::new_v4(), doc_id: Uuid::nil(), doc_title: title.to_string(), section_path: section.to_string(), page_numbers: Vec::new(), snippet: String::new() });
            if citations.len() >= MAX_CITATIONS {
                break;
            }
        }
    }
    citations
}

fn confidence_from_steps(total_steps: u32, max_steps: u32) -> f32 {
    // Terminated early with a final answer: higher confidence than a
    // run that was forced to stop at the step cap.
    if total_steps < max_steps { 0.75 } else { 0.5 }
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars { text.to_string() } else { text.chars().take(max_chars).collect() }
}

fn field_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn field_usize(value: &Value, key: &str) -> Option<usize> {
    value.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

fn field_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

fn field_uuid(value: &Value, key: &str) -> Result<Uuid> {
    field_str(value, key).and_then(|s| Uuid::parse_str(&s).ok()).ok_or_else(|| missing_param("tool", key))
}

fn missing_param(tool: &str, param: &str) -> Error {
    Error::Query(QueryError::MissingToolParameter { tool: tool.to_string(), param: param.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_agent_response_reads_final_answer() {
        let raw = r#"{"thought": "I know enough", "final_answer": "the answer"}"#;
        let parsed = parse_agent_response(raw).unwrap();
        assert_eq!(parsed.final_answer.as_deref(), Some("the answer"));
    }

    #[test]
    fn parse_agent_response_reads_action() {
        let raw = r#"{"thought": "let me search", "action": "search_documents", "action_input": {"query": "refund"}}"#;
        let parsed = parse_agent_response(raw).unwrap();
        assert_eq!(parsed.action.as_deref(), Some("search_documents"));
    }

    #[test]
    fn parse_agent_response_tolerates_markdown_fences() {
        let raw = "```json\n{\"thought\": \"x\", \"final_answer\": \"y\"}\n```";
        let parsed = parse_agent_response(raw).unwrap();
        assert_eq!(parsed.final_answer.as_deref(), Some("y"));
    }

    #[test]
    fn extract_citations_from_log_dedupes_by_title_and_section() {
        let log = "[1] 《Refund Policy》[Ch. 1] ([1])\ncontent\n\n[2] 《Refund Policy》[Ch. 1] ([1])\ncontent again\n\n[3] 《Other Doc》[Ch. 2] ([4])\nmore\n\n";
        let citations = extract_citations_from_log(log);
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn confidence_is_lower_when_step_cap_is_hit() {
        assert!(confidence_from_steps(8, 8) < confidence_from_steps(3, 8));
    }
}
