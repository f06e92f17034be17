//! CSV parsing: the whole file becomes a single markdown-table section.

use crate::core::document::{ParsedDocument, Section, TableData};
use crate::error::{Error, ParseError, Result};

use super::title_from_filename;

/// Parses a CSV file into one table and one section wrapping it.
///
/// # Errors
///
/// Returns [`ParseError::DecodeFailed`] if the file is not valid CSV.
pub fn parse(bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let markdown = render_markdown_table(&headers, &rows);
    let title = title_from_filename(filename);

    let table = TableData { content: markdown.clone(), page_number: None, section_path: title.clone(), caption: String::new() };
    let section = Section { title: title.clone(), level: 1, content: markdown.clone(), page_numbers: Vec::new() };

    Ok(ParsedDocument {
        title,
        filename: filename.to_string(),
        page_count: 0,
        sections: vec![section],
        tables: vec![table],
        raw_text: markdown,
        metadata: std::collections::HashMap::new(),
    })
}

fn render_markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    out.push_str("| ");
    out.push_str(&headers.join(" | "));
    out.push_str(" |\n|");
    out.push_str(&" --- |".repeat(headers.len()));
    out.push('\n');
    for row in rows {
        out.push_str("| ");
        out.push_str(&row.join(" | "));
        out.push_str(" |\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_becomes_one_markdown_table_section() {
        let csv = "name,price\nWidget,9.99\nGadget,19.99\n";
        let parsed = parse(csv.as_bytes(), "catalog.csv").unwrap();
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.tables.len(), 1);
        assert!(parsed.tables[0].content.contains("Widget"));
        assert!(parsed.tables[0].content.contains("| name | price |"));
    }
}
