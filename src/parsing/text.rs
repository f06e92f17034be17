//! Plain text and Markdown parsing.
//!
//! Plain `.txt` has no structure to recover: it becomes raw text only, with
//! the chunker's raw-text fallback path doing the segmenting. Markdown's
//! heading levels are recovered from the `pulldown-cmark` event stream and
//! turned into [`Section`]s.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

use crate::core::document::{ParsedDocument, Section};
use crate::error::Result;

use super::title_from_filename;

/// Parses a plain-text file: no sections, just raw text.
///
/// # Errors
///
/// Returns an error if `bytes` is not valid UTF-8.
pub fn parse_plain(bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
    let raw_text = decode(bytes, filename)?;
    Ok(ParsedDocument { title: title_from_filename(filename), filename: filename.to_string(), page_count: 0, raw_text, ..Default::default() })
}

/// Parses a Markdown file, recovering heading levels as sections.
///
/// # Errors
///
/// Returns an error if `bytes` is not valid UTF-8.
pub fn parse_markdown(bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
    let raw_text = decode(bytes, filename)?;
    let sections = markdown_sections(&raw_text);
    let title = sections.first().filter(|s| s.level == 1).map(|s| s.title.clone()).unwrap_or_else(|| title_from_filename(filename));

    Ok(ParsedDocument { title, filename: filename.to_string(), page_count: 0, sections, raw_text, ..Default::default() })
}

fn decode(bytes: &[u8], filename: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| crate::error::Error::Parse(crate::error::ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))
}

fn markdown_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_title = String::new();
    let mut current_level = 0u8;
    let mut current_body = String::new();
    let mut in_heading = false;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                if !current_title.is_empty() || !current_body.trim().is_empty() {
                    sections.push(Section { title: current_title.clone(), level: current_level, content: current_body.trim().to_string(), page_numbers: Vec::new() });
                }
                current_title = String::new();
                current_body = String::new();
                current_level = heading_level_to_u8(level);
                in_heading = true;
            }
            Event::End(TagEnd::Heading(_)) => {
                in_heading = false;
            }
            Event::Text(t) | Event::Code(t) => {
                if in_heading {
                    current_title.push_str(&t);
                } else {
                    current_body.push_str(&t);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if !in_heading {
                    current_body.push('\n');
                }
            }
            Event::End(TagEnd::Paragraph | TagEnd::CodeBlock | TagEnd::Item) => {
                current_body.push('\n');
            }
            _ => {}
        }
    }

    if !current_title.is_empty() || !current_body.trim().is_empty() {
        sections.push(Section { title: current_title, level: current_level, content: current_body.trim().to_string(), page_numbers: Vec::new() });
    }

    sections
}

const fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_has_no_sections() {
        let parsed = parse_plain(b"just some text\nwith lines", "notes.txt").unwrap();
        assert!(parsed.sections.is_empty());
        assert_eq!(parsed.raw_text, "just some text\nwith lines");
    }

    #[test]
    fn markdown_headings_become_sections() {
        let md = "# Title\n\nIntro text.\n\n## Sub\n\nBody text.\n";
        let parsed = parse_markdown(md.as_bytes(), "doc.md").unwrap();
        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[0].title, "Title");
        assert_eq!(parsed.sections[0].level, 1);
        assert_eq!(parsed.sections[1].title, "Sub");
        assert_eq!(parsed.sections[1].level, 2);
        assert_eq!(parsed.title, "Title");
    }

    #[test]
    fn markdown_without_headings_is_a_single_untitled_section() {
        let md = "No headings here, just text.";
        let parsed = parse_markdown(md.as_bytes(), "doc.md").unwrap();
        assert_eq!(parsed.sections.len(), 1);
        assert!(parsed.sections[0].title.is_empty());
    }
}
