//! Three-layer version diff: textual (per-section LCS diff), structural
//! (section-path set comparison plus rename detection), and semantic (an
//! LLM summary of the first two layers).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use similar::{ChangeTag, TextDiff};
use uuid::Uuid;

use crate::core::{
    Chunk, ChunkType, ChangeDetail, Document, DiffStats, SectionRename, SectionTextDiff, SemanticDiff, StructuralDiff, TextChange, TextDiff as TextDiffResult,
    VersionDiff,
};
use crate::error::Result;
use crate::llm::{generate_json, LlmClient, Message, ModelTier};
use crate::storage::metadata::MetadataStore;

const MAX_CHANGES_PER_SECTION: usize = 30;
const MAX_SNIPPET_CHARS: usize = 500;
const MAX_PREVIEW_LINES: usize = 50;
const RENAME_SIMILARITY_THRESHOLD: f64 = 0.6;
const MAX_CHANGE_DETAILS: usize = 10;
const MAX_MODIFIED_SECTIONS_FOR_LLM: usize = 10;
const SEMANTIC_DIFF_MAX_TOKENS: u32 = 700;

#[derive(Debug, Deserialize)]
struct SemanticDiffResponse {
    change_summary: String,
    #[serde(default)]
    change_details: Vec<ChangeDetailResponse>,
    impact_analysis: String,
}

#[derive(Debug, Deserialize)]
struct ChangeDetailResponse {
    category: String,
    description: String,
    location: String,
    #[serde(default)]
    business_impact: String,
}

/// Computes and caches three-layer diffs between document versions.
pub struct DiffEngine {
    metadata_store: Arc<dyn MetadataStore>,
    llm: Arc<dyn LlmClient>,
}

impl DiffEngine {
    /// Builds a diff engine over the metadata store (for chunk retrieval
    /// and persistence) and an LLM client (for the semantic layer).
    #[must_use]
    pub fn new(metadata_store: Arc<dyn MetadataStore>, llm: Arc<dyn LlmClient>) -> Self {
        Self { metadata_store, llm }
    }

    /// Returns the cached diff between `old` and `new`, if one has already
    /// been computed and persisted.
    pub async fn cached(&self, old_version_id: Uuid, new_version_id: Uuid) -> Result<Option<VersionDiff>> {
        self.metadata_store.get_version_diff(old_version_id, new_version_id).await
    }

    /// Computes a full three-layer diff between `old` and `new`, persists
    /// it, and returns it. Idempotent: recomputing overwrites the cached
    /// entry with the same content.
    pub async fn compute(&self, old: &Document, new: &Document) -> Result<VersionDiff> {
        if let Some(cached) = self.cached(old.doc_id, new.doc_id).await? {
            return Ok(cached);
        }

        let old_chunks = self.metadata_store.get_chunks(old.doc_id).await?;
        let new_chunks = self.metadata_store.get_chunks(new.doc_id).await?;

        let text_diff = textual_diff(&old_chunks, &new_chunks);
        let structural_diff = structural_diff(&old_chunks, &new_chunks);
        let semantic_diff = self.semantic_diff(old, new, &text_diff, &structural_diff).await;

        let diff = VersionDiff {
            diff_id: Uuid::new_v4(),
            old_version_id: old.doc_id,
            new_version_id: new.doc_id,
            old_title: old.title.clone(),
            new_title: new.title.clone(),
            text_diff,
            structural_diff,
            semantic_diff,
            created_at: chrono::Utc::now(),
        };

        self.metadata_store.put_version_diff(&diff).await?;
        Ok(diff)
    }

    async fn semantic_diff(&self, old: &Document, new: &Document, text_diff: &TextDiffResult, structural_diff: &StructuralDiff) -> SemanticDiff {
        let mut modified_sections: Vec<&SectionTextDiff> = text_diff.sections.iter().filter(|s| s.status == "modified").collect();
        modified_sections.truncate(MAX_MODIFIED_SECTIONS_FOR_LLM);

        let sections_summary = modified_sections
            .iter()
            .map(|s| format!("- {} ({} changes): {}", s.section_path, s.changes.len(), s.unified_diff_preview.lines().take(10).collect::<Vec<_>>().join(" / ")))
            .collect::<Vec<_>>()
            .join("\n");

        let system = "You summarize the difference between two versions of a document for a reviewer, \
            given the modified sections and the structural changes. Be concise and factual.";
        let messages = [Message::user(format!(
            "Respond as JSON: {{\"change_summary\": string (100-200 chars), \"change_details\": \
             [{{\"category\": \"substantive\"|\"wording\"|\"format\"|\"added_content\"|\"deleted_content\", \
             \"description\": string, \"location\": string, \"business_impact\": string}}] (at most 10), \
             \"impact_analysis\": string (50-100 chars)}}.\n\n\
             Old version: \"{}\" ({})\nNew version: \"{}\" ({})\n\n\
             Added sections: {:?}\nDeleted sections: {:?}\nRenamed sections: {:?}\n\nModified sections:\n{sections_summary}",
            old.title, old.version_number, new.title, new.version_number,
            structural_diff.added_sections, structural_diff.deleted_sections,
            structural_diff.renamed_sections.iter().map(|r| format!("{} -> {}", r.old_path, r.new_path)).collect::<Vec<_>>(),
        ))];

        match generate_json::<SemanticDiffResponse>(self.llm.as_ref(), ModelTier::Main, system, &messages, SEMANTIC_DIFF_MAX_TOKENS).await {
            Ok(resp) => SemanticDiff {
                change_summary: resp.change_summary,
                change_details: resp
                    .change_details
                    .into_iter()
                    .take(MAX_CHANGE_DETAILS)
                    .map(|d| ChangeDetail { category: d.category, description: d.description, location: d.location, business_impact: d.business_impact })
                    .collect(),
                impact_analysis: resp.impact_analysis,
            },
            Err(e) => {
                tracing::warn!(error = %e, "semantic diff generation failed, leaving summary empty");
                SemanticDiff { change_summary: String::new(), change_details: Vec::new(), impact_analysis: String::new() }
            }
        }
    }
}

fn sections_by_path(chunks: &[Chunk]) -> BTreeMap<String, String> {
    let mut grouped: BTreeMap<String, Vec<&Chunk>> = BTreeMap::new();
    for chunk in chunks.iter().filter(|c| c.chunk_type == ChunkType::Text) {
        grouped.entry(chunk.section_path.clone()).or_default().push(chunk);
    }
    grouped
        .into_iter()
        .map(|(path, mut chunks)| {
            chunks.sort_by_key(|c| c.chunk_index);
            (path, chunks.into_iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n"))
        })
        .collect()
}

fn textual_diff(old_chunks: &[Chunk], new_chunks: &[Chunk]) -> TextDiffResult {
    let old_sections = sections_by_path(old_chunks);
    let new_sections = sections_by_path(new_chunks);

    let mut all_paths: BTreeSet<String> = old_sections.keys().cloned().collect();
    all_paths.extend(new_sections.keys().cloned());

    let mut stats = DiffStats::default();
    let mut sections = Vec::with_capacity(all_paths.len());

    for path in all_paths {
        let old_text = old_sections.get(&path);
        let new_text = new_sections.get(&path);

        let entry = match (old_text, new_text) {
            (None, Some(new_text)) => {
                stats.added += 1;
                SectionTextDiff { section_path: path, status: "added".to_string(), changes: Vec::new(), unified_diff_preview: preview_of(new_text) }
            }
            (Some(_), None) => {
                stats.deleted += 1;
                SectionTextDiff { section_path: path, status: "deleted".to_string(), changes: Vec::new(), unified_diff_preview: String::new() }
            }
            (Some(old_text), Some(new_text)) if old_text == new_text => {
                stats.unchanged += 1;
                SectionTextDiff { section_path: path, status: "unchanged".to_string(), changes: Vec::new(), unified_diff_preview: String::new() }
            }
            (Some(old_text), Some(new_text)) => {
                stats.modified += 1;
                let diff = TextDiff::from_lines(old_text, new_text);
                let changes = opcode_changes(&diff);
                let preview = diff.unified_diff().context_radius(3).to_string();
                SectionTextDiff {
                    section_path: path,
                    status: "modified".to_string(),
                    changes,
                    unified_diff_preview: preview.lines().take(MAX_PREVIEW_LINES).collect::<Vec<_>>().join("\n"),
                }
            }
            (None, None) => unreachable!("path came from one of the two section maps"),
        };
        sections.push(entry);
    }

    TextDiffResult { sections, stats }
}

fn opcode_changes(diff: &TextDiff<'_, '_, '_, str>) -> Vec<TextChange> {
    let mut changes = Vec::new();
    let mut pending_delete: Option<String> = None;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => {
                if let Some(old) = pending_delete.take() {
                    changes.push(TextChange { op: "delete".to_string(), old_snippet: truncate(&old), new_snippet: String::new() });
                }
            }
            ChangeTag::Delete => {
                pending_delete.get_or_insert_with(String::new).push_str(change.value());
            }
            ChangeTag::Insert => {
                if let Some(old) = pending_delete.take() {
                    changes.push(TextChange { op: "replace".to_string(), old_snippet: truncate(&old), new_snippet: truncate(change.value()) });
                } else {
                    changes.push(TextChange { op: "insert".to_string(), old_snippet: String::new(), new_snippet: truncate(change.value()) });
                }
            }
        }
        if changes.len() >= MAX_CHANGES_PER_SECTION {
            break;
        }
    }
    if let Some(old) = pending_delete {
        if changes.len() < MAX_CHANGES_PER_SECTION {
            changes.push(TextChange { op: "delete".to_string(), old_snippet: truncate(&old), new_snippet: String::new() });
        }
    }
    changes.truncate(MAX_CHANGES_PER_SECTION);
    changes
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_SNIPPET_CHARS { text.to_string() } else { text.chars().take(MAX_SNIPPET_CHARS).collect() }
}

fn preview_of(text: &str) -> String {
    text.lines().take(MAX_PREVIEW_LINES).collect::<Vec<_>>().join("\n")
}

fn structural_diff(old_chunks: &[Chunk], new_chunks: &[Chunk]) -> StructuralDiff {
    let old_paths: BTreeSet<String> = old_chunks.iter().filter(|c| c.chunk_type == ChunkType::Text).map(|c| c.section_path.clone()).collect();
    let new_paths: BTreeSet<String> = new_chunks.iter().filter(|c| c.chunk_type == ChunkType::Text).map(|c| c.section_path.clone()).collect();

    let mut added: Vec<String> = new_paths.difference(&old_paths).cloned().collect();
    let mut deleted: Vec<String> = old_paths.difference(&new_paths).cloned().collect();
    let common: Vec<String> = old_paths.intersection(&new_paths).cloned().collect();

    let renames = detect_renames(&mut added, &mut deleted);

    StructuralDiff { added_sections: added, deleted_sections: deleted, common_sections: common, renamed_sections: renames }
}

/// Greedily pairs each deleted path with its best-matching added path
/// (similarity strictly above [`RENAME_SIMILARITY_THRESHOLD`]), removing
/// matched paths from both input vectors.
fn detect_renames(added: &mut Vec<String>, deleted: &mut Vec<String>) -> Vec<SectionRename> {
    let mut renames = Vec::new();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for (di, old_path) in deleted.iter().enumerate() {
            for (ai, new_path) in added.iter().enumerate() {
                let sim = strsim::sorensen_dice(old_path, new_path);
                if sim > RENAME_SIMILARITY_THRESHOLD && best.is_none_or(|(_, _, best_sim)| sim > best_sim) {
                    best = Some((di, ai, sim));
                }
            }
        }

        let Some((di, ai, sim)) = best else { break };
        let old_path = deleted.remove(di);
        let new_path = added.remove(ai);
        renames.push(SectionRename { old_path, new_path, similarity: sim as f32 });
    }

    renames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkBuilder;

    fn text_chunk(doc_id: Uuid, section: &str, content: &str, index: usize) -> Chunk {
        ChunkBuilder::new()
            .doc_id(doc_id)
            .doc_title("Doc")
            .content(content)
            .chunk_index(index)
            .section_path(section)
            .chunk_type(ChunkType::Text)
            .build()
    }

    #[test]
    fn unchanged_sections_produce_no_change_entries() {
        let doc_id = Uuid::new_v4();
        let old = vec![text_chunk(doc_id, "Ch. 1", "same text", 0)];
        let new = vec![text_chunk(doc_id, "Ch. 1", "same text", 0)];
        let diff = textual_diff(&old, &new);
        assert_eq!(diff.stats.unchanged, 1);
        assert_eq!(diff.stats.modified, 0);
    }

    #[test]
    fn added_and_deleted_sections_are_classified_correctly() {
        let doc_id = Uuid::new_v4();
        let old = vec![text_chunk(doc_id, "Ch. 1", "old content", 0)];
        let new = vec![text_chunk(doc_id, "Ch. 2", "new content", 0)];
        let diff = textual_diff(&old, &new);
        assert_eq!(diff.stats.added, 1);
        assert_eq!(diff.stats.deleted, 1);
    }

    #[test]
    fn structural_diff_detects_renamed_sections() {
        let doc_id = Uuid::new_v4();
        let old = vec![text_chunk(doc_id, "Refund Policy Overview", "x", 0)];
        let new = vec![text_chunk(doc_id, "Refund Policy Summary", "x", 0)];
        let diff = structural_diff(&old, &new);
        assert_eq!(diff.renamed_sections.len(), 1);
        assert!(diff.added_sections.is_empty());
        assert!(diff.deleted_sections.is_empty());
    }

    #[test]
    fn modified_section_produces_bounded_change_list() {
        let doc_id = Uuid::new_v4();
        let old = vec![text_chunk(doc_id, "Ch. 1", "line one\nline two\nline three", 0)];
        let new = vec![text_chunk(doc_id, "Ch. 1", "line one\nline TWO changed\nline three", 0)];
        let diff = textual_diff(&old, &new);
        assert_eq!(diff.stats.modified, 1);
        let section = &diff.sections[0];
        assert!(!section.changes.is_empty());
        assert!(section.changes.len() <= MAX_CHANGES_PER_SECTION);
    }
}
