//! Token-bounded semantic chunking.
//!
//! Sections are chunked whole when they already fit under `chunk_max_size`
//! tokens; oversized sections are split at paragraph boundaries and merged
//! back up to `chunk_target_size`, with the tail of one chunk carried
//! forward as the next chunk's overlap prefix. Tables always become their
//! own chunk. A document with neither sections nor tables falls back to
//! chunking its raw text the same way, as one untitled section.

use uuid::Uuid;

use crate::core::document::{ParsedDocument, Section, TableData};
use crate::core::{Chunk, ChunkBuilder, ChunkType};
use crate::error::Result;
use crate::tokenizer::{count_tokens, truncate_to_tokens};

/// Chunking parameters, mirroring [`crate::config::Settings`]'s
/// `chunk_target_size`/`chunk_max_size`/`chunk_overlap` fields.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens; paragraph-merged chunks are packed up
    /// to roughly this size.
    pub target_size: usize,
    /// Hard ceiling in tokens; a section under this is kept as a single
    /// chunk regardless of target size.
    pub max_size: usize,
    /// Token budget carried forward from one chunk's tail into the next
    /// chunk's prefix.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_size: 500, max_size: 800, overlap: 50 }
    }
}

/// Chunks a parsed document: sections first (each whole or paragraph-split),
/// then tables as standalone chunks, falling back to raw text chunking if
/// neither produced anything.
///
/// # Errors
///
/// Returns an error only if the tokenizer fails to decode a truncated
/// overlap tail (see [`truncate_to_tokens`]); this is rare and indicates a
/// pathological input rather than a configuration problem.
pub fn chunk_document(parsed: &ParsedDocument, doc_id: Uuid, doc_title: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut next_index = 0usize;

    for section in &parsed.sections {
        let section_path = section.section_path("");
        let section_chunks = chunk_section(section, doc_id, doc_title, &section_path, config, next_index)?;
        next_index += section_chunks.len();
        chunks.extend(section_chunks);
    }

    for table in &parsed.tables {
        chunks.push(make_table_chunk(table, doc_id, doc_title, next_index));
        next_index += 1;
    }

    if chunks.is_empty() && !parsed.raw_text.trim().is_empty() {
        let fallback = Section { title: String::new(), level: 0, content: parsed.raw_text.clone(), page_numbers: Vec::new() };
        chunks = chunk_section(&fallback, doc_id, doc_title, "", config, 0)?;
    }

    Ok(chunks)
}

fn chunk_section(
    section: &Section,
    doc_id: Uuid,
    doc_title: &str,
    section_path: &str,
    config: &ChunkingConfig,
    start_index: usize,
) -> Result<Vec<Chunk>> {
    let full_text = section.full_content();
    let token_count = count_tokens(&full_text);

    if token_count == 0 {
        return Ok(Vec::new());
    }

    if token_count <= config.max_size {
        let chunk = ChunkBuilder::new()
            .doc_id(doc_id)
            .doc_title(doc_title)
            .section_path(section_path)
            .page_numbers(section.page_numbers.clone())
            .chunk_index(start_index)
            .chunk_type(ChunkType::Text)
            .content(full_text)
            .token_count(token_count)
            .build();
        return Ok(vec![chunk]);
    }

    let paragraphs = split_into_paragraphs(&full_text, config.max_size, config.target_size);
    merge_paragraphs_into_chunks(&paragraphs, doc_id, doc_title, section_path, &section.page_numbers, config, start_index)
}

/// Splits on blank-line boundaries; any paragraph still over `max_size`
/// tokens is greedily re-grouped by line up to `target_size` tokens, with a
/// lone oversized line kept whole rather than split mid-line.
fn split_into_paragraphs(text: &str, max_size: usize, target_size: usize) -> Vec<String> {
    let mut paragraphs = Vec::new();

    for part in split_on_blank_lines(text) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if count_tokens(part) <= max_size {
            paragraphs.push(part.to_string());
            continue;
        }

        let mut current_group: Vec<&str> = Vec::new();
        for line in part.lines() {
            current_group.push(line);
            if count_tokens(&current_group.join("\n")) > target_size {
                if current_group.len() > 1 {
                    if let Some(last) = current_group.pop() {
                        paragraphs.push(current_group.join("\n"));
                        current_group = vec![last];
                    }
                } else {
                    paragraphs.push(line.to_string());
                    current_group.clear();
                }
            }
        }
        if !current_group.is_empty() {
            paragraphs.push(current_group.join("\n"));
        }
    }

    paragraphs
}

/// Splits `text` on runs of whitespace that contain at least two newlines
/// (a blank line), the way the reference chunker treats `\n\s*\n` as a
/// paragraph boundary.
fn split_on_blank_lines(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let mut j = i + 1;
            let mut newline_count = 1;
            while j < bytes.len() && matches!(bytes[j], b'\n' | b' ' | b'\t' | b'\r') {
                if bytes[j] == b'\n' {
                    newline_count += 1;
                }
                j += 1;
            }
            if newline_count >= 2 {
                parts.push(&text[start..i]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

#[allow(clippy::too_many_arguments)]
fn merge_paragraphs_into_chunks(
    paragraphs: &[String],
    doc_id: Uuid,
    doc_title: &str,
    section_path: &str,
    page_numbers: &[u32],
    config: &ChunkingConfig,
    start_index: usize,
) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut current_parts: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;
    let mut chunk_index = start_index;
    let mut overlap_text = String::new();

    for para in paragraphs {
        let para_tokens = count_tokens(para);

        if current_tokens + para_tokens > config.max_size && !current_parts.is_empty() {
            chunks.push(finalize_chunk(
                &current_parts,
                &overlap_text,
                chunk_index > start_index,
                doc_id,
                doc_title,
                section_path,
                page_numbers,
                chunk_index,
            )?);
            chunk_index += 1;
            overlap_text = extract_overlap(&current_parts, config.overlap)?;
            current_parts = vec![para.clone()];
            current_tokens = para_tokens;
        } else {
            current_parts.push(para.clone());
            current_tokens += para_tokens;
        }
    }

    if !current_parts.is_empty() {
        chunks.push(finalize_chunk(
            &current_parts,
            &overlap_text,
            chunk_index > start_index,
            doc_id,
            doc_title,
            section_path,
            page_numbers,
            chunk_index,
        )?);
    }

    Ok(chunks)
}

#[allow(clippy::too_many_arguments)]
fn finalize_chunk(
    parts: &[String],
    overlap_text: &str,
    apply_overlap: bool,
    doc_id: Uuid,
    doc_title: &str,
    section_path: &str,
    page_numbers: &[u32],
    chunk_index: usize,
) -> Result<Chunk> {
    let mut content = parts.join("\n\n");
    if apply_overlap && !overlap_text.is_empty() {
        content = format!("{overlap_text}\n\n{content}");
    }
    let token_count = count_tokens(&content);
    Ok(ChunkBuilder::new()
        .doc_id(doc_id)
        .doc_title(doc_title)
        .section_path(section_path)
        .page_numbers(page_numbers.to_vec())
        .chunk_index(chunk_index)
        .chunk_type(ChunkType::Text)
        .content(content)
        .token_count(token_count)
        .build())
}

/// Pulls the tail of `parts` up to `target_overlap_tokens`, collapsing to a
/// token-level suffix truncation if even the last paragraph alone overruns
/// twice the budget.
fn extract_overlap(parts: &[String], target_overlap_tokens: usize) -> Result<String> {
    if parts.is_empty() || target_overlap_tokens == 0 {
        return Ok(String::new());
    }

    let mut overlap_parts: Vec<&str> = Vec::new();
    let mut total_tokens = 0usize;

    for part in parts.iter().rev() {
        let part_tokens = count_tokens(part);
        if total_tokens + part_tokens > target_overlap_tokens && !overlap_parts.is_empty() {
            break;
        }
        overlap_parts.insert(0, part.as_str());
        total_tokens += part_tokens;
    }

    let result = overlap_parts.join("\n\n");
    if count_tokens(&result) > target_overlap_tokens * 2 {
        return truncate_to_tokens(&result, target_overlap_tokens);
    }
    Ok(result)
}

fn make_table_chunk(table: &TableData, doc_id: Uuid, doc_title: &str, chunk_index: usize) -> Chunk {
    let content = if table.caption.is_empty() {
        table.content.clone()
    } else {
        format!("[Table: {}]\n{}", table.caption, table.content)
    };
    let page_numbers = table.page_number.map(|p| vec![p]).unwrap_or_default();
    let token_count = count_tokens(&content);

    ChunkBuilder::new()
        .doc_id(doc_id)
        .doc_title(doc_title)
        .section_path(table.section_path.clone())
        .page_numbers(page_numbers)
        .chunk_index(chunk_index)
        .chunk_type(ChunkType::Table)
        .content(content)
        .token_count(token_count)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed_with_section(title: &str, content: &str) -> ParsedDocument {
        ParsedDocument {
            title: "Doc".to_string(),
            filename: "doc.pdf".to_string(),
            page_count: 1,
            sections: vec![Section { title: title.to_string(), level: 1, content: content.to_string(), page_numbers: vec![1] }],
            tables: Vec::new(),
            raw_text: String::new(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn small_section_becomes_a_single_chunk() {
        let parsed = parsed_with_section("Intro", "A short section.");
        let chunks = chunk_document(&parsed, Uuid::new_v4(), "Doc", &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Text);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn oversized_section_splits_into_multiple_chunks() {
        let paragraph = "Sentence one. Sentence two. Sentence three. Sentence four. Sentence five.\n\n".repeat(80);
        let parsed = parsed_with_section("Long Section", &paragraph);
        let config = ChunkingConfig { target_size: 100, max_size: 150, overlap: 20 };
        let chunks = chunk_document(&parsed, Uuid::new_v4(), "Doc", &config).unwrap();
        assert!(chunks.len() > 1, "expected multiple chunks, got {}", chunks.len());
        for chunk in &chunks {
            assert!(chunk.token_count <= config.max_size * 2, "chunk exceeded max size with overlap: {}", chunk.token_count);
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap_text() {
        let paragraph = "Alpha beta gamma delta epsilon zeta eta theta iota kappa.\n\n".repeat(60);
        let parsed = parsed_with_section("Section", &paragraph);
        let config = ChunkingConfig { target_size: 80, max_size: 120, overlap: 30 };
        let chunks = chunk_document(&parsed, Uuid::new_v4(), "Doc", &config).unwrap();
        assert!(chunks.len() >= 2);
        let first_tail_words: Vec<&str> = chunks[0].content.split_whitespace().rev().take(3).collect();
        assert!(first_tail_words.iter().any(|w| chunks[1].content.contains(w)));
    }

    #[test]
    fn tables_become_standalone_chunks_after_sections() {
        let mut parsed = parsed_with_section("Intro", "Short intro text.");
        parsed.tables.push(TableData {
            content: "| a | b |\n| 1 | 2 |".to_string(),
            page_number: Some(3),
            section_path: "Appendix".to_string(),
            caption: "Pricing".to_string(),
        });
        let chunks = chunk_document(&parsed, Uuid::new_v4(), "Doc", &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chunk_type, ChunkType::Table);
        assert!(chunks[1].content.contains("Pricing"));
        assert_eq!(chunks[1].page_numbers, vec![3]);
    }

    #[test]
    fn empty_document_falls_back_to_raw_text() {
        let parsed = ParsedDocument {
            title: "Doc".to_string(),
            filename: "doc.txt".to_string(),
            page_count: 0,
            sections: Vec::new(),
            tables: Vec::new(),
            raw_text: "Just some plain unstructured text.".to_string(),
            metadata: Default::default(),
        };
        let chunks = chunk_document(&parsed, Uuid::new_v4(), "Doc", &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("plain unstructured text"));
    }

    #[test]
    fn document_with_nothing_produces_no_chunks() {
        let parsed = ParsedDocument {
            title: "Empty".to_string(),
            filename: "empty.txt".to_string(),
            page_count: 0,
            sections: Vec::new(),
            tables: Vec::new(),
            raw_text: String::new(),
            metadata: Default::default(),
        };
        let chunks = chunk_document(&parsed, Uuid::new_v4(), "Empty", &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }
}
