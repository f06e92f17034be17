//! Output formatting for CLI commands.
//!
//! Supports text and JSON/NDJSON output formats, mirroring the `Settings`/
//! core types directly rather than re-deriving a parallel view model.

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::agent::{AgentResponse, QueryPlan};
use crate::core::document::Document;
use crate::core::retrieval::RetrievedChunk;
use crate::core::version::VersionDiff;
use crate::generation::GeneratedAnswer;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Pretty-printed JSON output.
    Json,
    /// Newline-delimited JSON, one record per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name, defaulting to [`Self::Text`] on anything
    /// unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" | "stream" => Self::Ndjson,
            _ => Self::Text,
        }
    }
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a single document's metadata.
#[must_use]
pub fn format_document(doc: &Document, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_document_text(doc),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(doc),
    }
}

fn format_document_text(doc: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Document {}", doc.doc_id);
    let _ = writeln!(out, "  title:       {}", doc.title);
    let _ = writeln!(out, "  status:      {}", doc.processing_status);
    let _ = writeln!(out, "  version:     {} ({})", doc.version_number, doc.version_status);
    let _ = writeln!(out, "  is_latest:   {}", doc.is_latest);
    let _ = writeln!(out, "  doc_type:    {}", doc.doc_type.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "  pages:       {}", doc.page_count);
    let _ = writeln!(out, "  hash:        {}", doc.content_hash);
    if let Some(parent) = doc.parent_version_id {
        let _ = writeln!(out, "  parent:      {parent}");
    }
    if let Some(summary) = &doc.doc_summary {
        let _ = writeln!(out, "  summary:     {}", truncate(summary, 200));
    }
    out
}

/// Formats a list of documents as a table.
#[must_use]
pub fn format_document_list(docs: &[Document], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_document_list_text(docs),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&docs),
    }
}

fn format_document_list_text(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No documents found.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<38} {:<30} {:<10} {:<8} {:<8}", "ID", "Title", "Status", "Version", "Latest");
    out.push_str(&"-".repeat(96));
    out.push('\n');
    for doc in docs {
        let _ = writeln!(
            out,
            "{:<38} {:<30} {:<10} {:<8} {:<8}",
            doc.doc_id,
            truncate(&doc.title, 30),
            doc.processing_status.to_string(),
            doc.version_number,
            doc.is_latest
        );
    }
    out
}

/// Formats retrieved chunks (the `search` command's raw output).
#[must_use]
pub fn format_retrieved_chunks(chunks: &[RetrievedChunk], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_retrieved_chunks_text(chunks),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&chunks),
    }
}

fn format_retrieved_chunks_text(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "No chunks matched.\n".to_string();
    }
    let mut out = String::new();
    for (rank, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{}] score={:.4} {} :: {} (pages {:?})",
            rank + 1,
            chunk.score,
            chunk.doc_title,
            chunk.section_path,
            chunk.page_numbers
        );
        let _ = writeln!(out, "    {}", truncate(&chunk.content, 160));
    }
    out
}

/// Formats a generated answer with its citations and confidence.
#[must_use]
pub fn format_generated_answer(answer: &GeneratedAnswer, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_generated_answer_text(answer),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(answer),
    }
}

fn format_generated_answer_text(answer: &GeneratedAnswer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.answer);
    let _ = writeln!(out, "\nconfidence: {:.2}", answer.confidence);
    if !answer.citations.is_empty() {
        out.push_str("\ncitations:\n");
        for citation in &answer.citations {
            let _ = writeln!(out, "  - {} :: {} (pages {:?})", citation.doc_title, citation.section_path, citation.page_numbers);
        }
    }
    out
}

/// Formats a query plan (debug view for `query --route` decisions).
#[must_use]
pub fn format_query_plan(plan: &QueryPlan, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "route: {:?}\nquery_type: {}\nneeds_multi_doc: {}\nsearch_queries: {:?}\n",
            plan.route, plan.query_type, plan.needs_multi_doc, plan.search_queries
        ),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(plan),
    }
}

/// Formats an agent loop response, including its step trace.
#[must_use]
pub fn format_agent_response(response: &AgentResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_agent_response_text(response),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(response),
    }
}

fn format_agent_response_text(response: &AgentResponse) -> String {
    let mut out = String::new();
    for step in &response.steps {
        let _ = writeln!(out, "step {}: {}", step.step_number, truncate(&step.thought, 120));
        if let Some(action) = &step.action {
            let _ = writeln!(out, "  action: {action} {}", step.action_input.as_ref().map_or_else(String::new, ToString::to_string));
        }
        if let Some(observation) = &step.observation {
            let _ = writeln!(out, "  observation: {}", truncate(observation, 160));
        }
    }
    let _ = writeln!(out, "\n{}", response.answer);
    let _ = writeln!(out, "\nconfidence: {:.2}  steps: {}  route: {:?}", response.confidence, response.total_steps, response.route);
    out
}

/// Formats a version diff.
#[must_use]
pub fn format_version_diff(diff: &VersionDiff, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_version_diff_text(diff),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(diff),
    }
}

fn format_version_diff_text(diff: &VersionDiff) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} -> {}", diff.old_title, diff.new_title);
    let _ = writeln!(
        out,
        "sections: +{} -{} ~{} ={}",
        diff.text_diff.stats.added, diff.text_diff.stats.deleted, diff.text_diff.stats.modified, diff.text_diff.stats.unchanged
    );
    if !diff.structural_diff.renamed_sections.is_empty() {
        let _ = writeln!(out, "renamed: {}", diff.structural_diff.renamed_sections.len());
    }
    if !diff.semantic_diff.change_summary.is_empty() {
        let _ = writeln!(out, "\nsummary: {}", diff.semantic_diff.change_summary);
    }
    for detail in &diff.semantic_diff.change_details {
        let _ = writeln!(out, "  - [{}] {} ({})", detail.category, detail.description, detail.location);
    }
    if !diff.semantic_diff.impact_analysis.is_empty() {
        let _ = writeln!(out, "\nimpact: {}", diff.semantic_diff.impact_analysis);
    }
    out
}

/// Formats a version chain, oldest first.
#[must_use]
pub fn format_version_history(chain: &[Document], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for doc in chain {
                let _ = writeln!(out, "{} {} \"{}\" (latest: {})", doc.version_number, doc.doc_id, doc.title, doc.is_latest);
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&chain),
    }
}

/// Formats a top-level error for CLI output.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "success": false,
                "error": {
                    "message": error.to_string(),
                }
            });
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max_chars).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_defaults_to_text() {
        assert_eq!(OutputFormat::parse("bogus"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
    }

    #[test]
    fn test_truncate_keeps_short_strings_whole() {
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn test_truncate_clips_long_strings() {
        let long = "a".repeat(150);
        let result = truncate(&long, 100);
        assert_eq!(result.chars().count(), 101);
        assert!(result.ends_with('\u{2026}'));
    }

    #[test]
    fn test_format_document_list_empty() {
        assert_eq!(format_document_list(&[], OutputFormat::Text), "No documents found.\n");
    }
}
