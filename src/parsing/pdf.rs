//! PDF parsing via `pdf-extract`.
//!
//! No pure-Rust PDF outline/table-of-contents reader is available, so PDFs
//! always fall back to page-grouped sections, which the parser contract
//! explicitly allows when no table of contents can be recovered.

use crate::core::document::{ParsedDocument, Section};
use crate::error::{Error, ParseError, Result};

use super::title_from_filename;

/// Parses a PDF, one section per page.
///
/// # Errors
///
/// Returns [`ParseError::DecodeFailed`] if `pdf-extract` cannot decode the
/// bytes.
pub fn parse(bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?;

    let page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);
    let mut sections = Vec::with_capacity(pages.len());
    let mut raw_text = String::new();

    for (idx, page_text) in pages.iter().enumerate() {
        let trimmed = page_text.trim();
        if trimmed.is_empty() {
            continue;
        }
        let page_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        sections.push(Section { title: format!("Page {page_number}"), level: 1, content: trimmed.to_string(), page_numbers: vec![page_number] });
        raw_text.push_str(trimmed);
        raw_text.push('\n');
    }

    Ok(ParsedDocument {
        title: title_from_filename(filename),
        filename: filename.to_string(),
        page_count,
        sections,
        tables: Vec::new(),
        raw_text,
        metadata: std::collections::HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_pdf_bytes_decode_to_an_error() {
        let err = parse(b"not a pdf at all", "fake.pdf");
        assert!(matches!(err, Err(Error::Parse(ParseError::DecodeFailed { .. }))));
    }
}
