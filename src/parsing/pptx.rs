//! PPTX parsing: a minimal OOXML slide-XML scan (no pure-Rust pptx crate is
//! available in the pack). One section per slide; the slide's first text
//! run becomes the title, the rest become the section body.

use std::io::{Cursor, Read};

use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader as XmlReader;

use crate::core::document::{ParsedDocument, Section};
use crate::error::{Error, ParseError, Result};

use super::title_from_filename;

/// Parses a PPTX file, one section per slide.
///
/// # Errors
///
/// Returns [`ParseError::DecodeFailed`] if the file is not a valid OOXML zip
/// or a slide's XML cannot be parsed.
pub fn parse(bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?;

    let mut slide_names = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .collect::<Vec<_>>();
    slide_names.sort_by_key(|name| slide_number(name));

    let mut sections = Vec::with_capacity(slide_names.len());
    let mut raw_text = String::new();

    for (idx, name) in slide_names.iter().enumerate() {
        let mut file = archive
            .by_name(name)
            .map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?;
        let mut xml = String::new();
        file.read_to_string(&mut xml).map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?;

        let runs = extract_text_runs(&xml, filename)?;
        if runs.is_empty() {
            continue;
        }

        let title = runs[0].clone();
        let body = runs[1..].join("\n");
        let page_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);

        raw_text.push_str(&title);
        raw_text.push('\n');
        raw_text.push_str(&body);
        raw_text.push('\n');

        sections.push(Section { title, level: 1, content: body, page_numbers: vec![page_number] });
    }

    let page_count = u32::try_from(slide_names.len()).unwrap_or(u32::MAX);

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

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide").trim_end_matches(".xml").parse().unwrap_or(0)
}

fn extract_text_runs(xml: &str, filename: &str) -> Result<Vec<String>> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut runs = Vec::new();
    let mut in_text_element = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) if e.local_name().as_ref() == b"t" => in_text_element = true,
            Ok(XmlEvent::End(e)) if e.local_name().as_ref() == b"t" => in_text_element = false,
            Ok(XmlEvent::Text(t)) if in_text_element => {
                let text = t.unescape().map_err(|e| Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() }))?;
                if !text.trim().is_empty() {
                    runs.push(text.trim().to_string());
                }
            }
            Ok(XmlEvent::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Parse(ParseError::DecodeFailed { path: filename.to_string(), reason: e.to_string() })),
        }
        buf.clear();
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_runs_from_slide_xml() {
        let xml = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>Title Slide</a:t></a:r></a:p><a:p><a:r><a:t>First bullet</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;
        let runs = extract_text_runs(xml, "deck.pptx").unwrap();
        assert_eq!(runs, vec!["Title Slide".to_string(), "First bullet".to_string()]);
    }

    #[test]
    fn slide_number_parses_index_from_filename() {
        assert_eq!(slide_number("ppt/slides/slide12.xml"), 12);
    }
}
