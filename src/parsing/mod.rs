//! Document parser collaborator: turns raw file bytes into a
//! [`ParsedDocument`] — hierarchical sections, tables, raw text, and
//! free-form metadata — dispatched by filename extension.
//!
//! Each format module owns its own extraction logic; this module only
//! routes by extension and enforces the configured size cap before handing
//! bytes to a format-specific parser.

pub mod csv_table;
pub mod docx;
pub mod pdf;
pub mod pptx;
pub mod spreadsheet;
pub mod text;

use crate::core::document::ParsedDocument;
use crate::error::{Error, ParseError, Result};

/// Parses `bytes` (the contents of `filename`) into a [`ParsedDocument`],
/// dispatching on the file extension.
///
/// # Errors
///
/// Returns [`ParseError::FileTooLarge`] if `bytes` exceeds `max_file_size_mb`,
/// [`ParseError::UnsupportedFormat`] for an unrecognized extension, and
/// [`ParseError::DecodeFailed`] if the underlying format crate rejects the
/// bytes.
pub fn parse_document(bytes: &[u8], filename: &str, max_file_size_mb: u64) -> Result<ParsedDocument> {
    let size_mb = (bytes.len() as u64) / (1024 * 1024);
    if size_mb > max_file_size_mb {
        return Err(Error::Parse(ParseError::FileTooLarge { path: filename.to_string(), size_mb, max_mb: max_file_size_mb }));
    }

    let ext = extension_of(filename);
    let mut parsed = match ext.as_str() {
        "pdf" => pdf::parse(bytes, filename)?,
        "docx" => docx::parse(bytes, filename)?,
        "xlsx" | "xls" | "ods" => spreadsheet::parse(bytes, filename)?,
        "csv" => csv_table::parse(bytes, filename)?,
        "md" | "markdown" => text::parse_markdown(bytes, filename)?,
        "txt" => text::parse_plain(bytes, filename)?,
        "pptx" => pptx::parse(bytes, filename)?,
        other => return Err(Error::Parse(ParseError::UnsupportedFormat { ext: other.to_string() })),
    };
    parsed.filename = filename.to_string();
    Ok(parsed)
}

fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename).extension().and_then(std::ffi::OsStr::to_str).unwrap_or_default().to_lowercase()
}

/// Derives a title from a filename when a format has no embedded title:
/// the stem, with underscores/hyphens turned into spaces.
pub(crate) fn title_from_filename(filename: &str) -> String {
    let stem = std::path::Path::new(filename).file_stem().and_then(std::ffi::OsStr::to_str).unwrap_or(filename);
    stem.replace(['_', '-'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_is_a_distinguished_error() {
        let err = parse_document(b"whatever", "memo.wpd", 100);
        assert!(matches!(err, Err(Error::Parse(ParseError::UnsupportedFormat { ext })) if ext == "wpd"));
    }

    #[test]
    fn oversized_file_is_rejected_before_dispatch() {
        let bytes = vec![0u8; 2 * 1024 * 1024];
        let err = parse_document(&bytes, "big.txt", 1);
        assert!(matches!(err, Err(Error::Parse(ParseError::FileTooLarge { .. }))));
    }

    #[test]
    fn title_from_filename_replaces_separators() {
        assert_eq!(title_from_filename("annual_report-2024.pdf"), "annual report 2024");
    }
}
