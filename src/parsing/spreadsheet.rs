//! Spreadsheet parsing (XLSX/XLS/ODS) via `calamine`: one section per sheet,
//! body rendered as a markdown table.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::core::document::{ParsedDocument, Section, TableData};
use crate::error::{Error, ParseError, Result};

use super::title_from_filename;

/// Parses a spreadsheet workbook, one section and one table per sheet.
///
/// # Errors
///
/// Returns [`ParseError::DecodeFailed`] if the workbook cannot be opened.
pub fn parse(bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
    let cursor = Cursor::new(bytes);
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?;

    let mut sections = Vec::new();
    let mut tables = Vec::new();
    let mut raw_text = String::new();

    for sheet_name in workbook.sheet_names().to_owned() {
        let Ok(range) = workbook.worksheet_range(&sheet_name) else { continue };
        let markdown = render_sheet_markdown(&range);
        if markdown.is_empty() {
            continue;
        }

        raw_text.push_str(&markdown);
        raw_text.push('\n');

        sections.push(Section { title: sheet_name.clone(), level: 1, content: markdown.clone(), page_numbers: Vec::new() });
        tables.push(TableData { content: markdown, page_number: None, section_path: sheet_name.clone(), caption: sheet_name });
    }

    Ok(ParsedDocument {
        title: title_from_filename(filename),
        filename: filename.to_string(),
        page_count: 0,
        sections,
        tables,
        raw_text,
        metadata: std::collections::HashMap::new(),
    })
}

fn render_sheet_markdown(range: &calamine::Range<Data>) -> String {
    let mut rows = range.rows();
    let Some(header) = rows.next() else { return String::new() };

    let mut out = String::new();
    out.push_str("| ");
    out.push_str(&header.iter().map(cell_to_string).collect::<Vec<_>>().join(" | "));
    out.push_str(" |\n|");
    out.push_str(&" --- |".repeat(header.len()));
    out.push('\n');

    for row in rows {
        out.push_str("| ");
        out.push_str(&row.iter().map(cell_to_string).collect::<Vec<_>>().join(" | "));
        out.push_str(" |\n");
    }

    out
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{e:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_to_string_renders_empty_as_blank() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
    }
}
