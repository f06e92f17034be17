//! DOCX parsing via `docx-rs`.
//!
//! Headings are recovered from paragraph style names (`HeadingN`) where the
//! document carries them; documents with no styled headings fall back to a
//! pattern heuristic (numbered headings like `1.2`, or short ALL-CAPS
//! lines) so structure still comes through for plainly-formatted files.

use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};

use crate::core::document::{ParsedDocument, Section};
use crate::error::{Error, ParseError, Result};

use super::title_from_filename;

/// Parses a DOCX file into hierarchical sections.
///
/// # Errors
///
/// Returns [`ParseError::DecodeFailed`] if `docx-rs` cannot read the bytes.
pub fn parse(bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
    let docx = read_docx(bytes).map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: format!("{e:?}") }))?;

    let paragraphs = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some((paragraph_text(p), heading_level_from_style(p))),
            _ => None,
        })
        .filter(|(text, _)| !text.trim().is_empty())
        .collect::<Vec<_>>();

    let has_styled_headings = paragraphs.iter().any(|(_, level)| level.is_some());

    let mut sections: Vec<Section> = Vec::new();
    let mut raw_text = String::new();
    let mut current_title = String::new();
    let mut current_level = 0u8;
    let mut current_body = String::new();

    for (text, styled_level) in &paragraphs {
        raw_text.push_str(text);
        raw_text.push('\n');

        let level = styled_level.or_else(|| if has_styled_headings { None } else { heuristic_heading_level(text) });

        if let Some(level) = level {
            if !current_title.is_empty() || !current_body.trim().is_empty() {
                sections.push(Section { title: current_title.clone(), level: current_level, content: current_body.trim().to_string(), page_numbers: Vec::new() });
            }
            current_title = text.trim().to_string();
            current_level = level;
            current_body = String::new();
        } else {
            current_body.push_str(text);
            current_body.push('\n');
        }
    }
    if !current_title.is_empty() || !current_body.trim().is_empty() {
        sections.push(Section { title: current_title, level: current_level, content: current_body.trim().to_string(), page_numbers: Vec::new() });
    }

    let title = sections.first().filter(|s| s.level == 1).map(|s| s.title.clone()).unwrap_or_else(|| title_from_filename(filename));

    Ok(ParsedDocument {
        title,
        filename: filename.to_string(),
        page_count: 0,
        sections,
        tables: Vec::new(),
        raw_text,
        metadata: std::collections::HashMap::new(),
    })
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

fn heading_level_from_style(paragraph: &docx_rs::Paragraph) -> Option<u8> {
    let style_id = paragraph.property.style.as_ref()?.style_id.as_str();
    let lower = style_id.to_lowercase();
    let digits: String = lower.chars().filter(char::is_ascii_digit).collect();
    if lower.starts_with("heading") || lower.starts_with("title") {
        digits.parse::<u8>().ok().or(Some(1)).map(|n| n.clamp(1, 6))
    } else {
        None
    }
}

/// Numbered headings (`"1."`, `"1.2"`, `"1.2.3"`) or short ALL-CAPS lines
/// are treated as headings when the document carries no style information.
fn heuristic_heading_level(text: &str) -> Option<u8> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.len() > 120 {
        return None;
    }

    let first_word = trimmed.split_whitespace().next()?;
    if first_word.chars().all(|c| c.is_ascii_digit() || c == '.') && first_word.contains(char::is_numeric) {
        let depth = first_word.trim_end_matches('.').split('.').count();
        return Some(u8::try_from(depth).unwrap_or(6).clamp(1, 6));
    }

    let letters: String = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if !letters.is_empty() && letters.chars().all(char::is_uppercase) && trimmed.split_whitespace().count() <= 12 {
        return Some(1);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_detects_numbered_headings() {
        assert_eq!(heuristic_heading_level("1. Scope"), Some(1));
        assert_eq!(heuristic_heading_level("1.2 Definitions"), Some(2));
        assert_eq!(heuristic_heading_level("just a normal sentence."), None);
    }

    #[test]
    fn heuristic_detects_all_caps_short_lines() {
        assert_eq!(heuristic_heading_level("TERMS AND CONDITIONS"), Some(1));
        assert_eq!(heuristic_heading_level("This Is Not All Caps"), None);
    }
}
