//! Text extraction
//!
//! Reconstructs showable text from each page's content streams in stream
//! order. Layout is best-effort: show operators concatenate, positioning
//! operators become line breaks, and nothing tries to infer columns or
//! tables.

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::PdfValue;
use crate::parser::content::extract_text_from_content;

/// Extract text page by page, in reading order
pub fn extract_text(document: &mut Document) -> Result<Vec<String>> {
    let mut pages = Vec::with_capacity(document.page_count());
    for index in 0..document.page_count() {
        pages.push(extract_page_text(document, index)?);
    }
    Ok(pages)
}

/// Extract the text of one page
pub fn extract_page_text(document: &mut Document, index: usize) -> Result<String> {
    let content = page_content_bytes(document, index)?;
    extract_text_from_content(&content)
}

/// Decode and concatenate a page's content streams, order preserved
fn page_content_bytes(document: &mut Document, index: usize) -> Result<Vec<u8>> {
    let page_ref = document.page_at(index)?.obj_ref();
    let page = document.resolve(page_ref)?;
    let dict = page
        .as_dict()
        .ok_or_else(|| PdfError::InvalidStructure("page is not a dictionary".to_string()))?;

    let contents = match dict.get("Contents") {
        None => return Ok(Vec::new()),
        Some(value) => value.clone(),
    };

    let mut stream_refs = Vec::new();
    match contents {
        PdfValue::Reference(num, gen) => {
            let resolved = document.resolve((num, gen))?;
            match resolved {
                PdfValue::Array(array) => {
                    for element in &array.0 {
                        stream_refs.push(element.clone());
                    }
                }
                PdfValue::Stream(_) => stream_refs.push(PdfValue::Reference(num, gen)),
                _ => {
                    return Err(PdfError::InvalidStructure(
                        "Contents is neither a stream nor an array".to_string(),
                    ))
                }
            }
        }
        PdfValue::Array(array) => {
            for element in &array.0 {
                stream_refs.push(element.clone());
            }
        }
        _ => {
            return Err(PdfError::InvalidStructure(
                "Contents is neither a stream nor an array".to_string(),
            ))
        }
    }

    let mut bytes = Vec::new();
    for value in stream_refs {
        let resolved = document.table_mut().resolve_value(&value)?;
        let stream = resolved.as_stream().ok_or_else(|| {
            PdfError::InvalidStructure("Contents entry is not a stream".to_string())
        })?;
        let decoded = stream.decode()?;
        if !bytes.is_empty() {
            // Streams concatenate with a token boundary between them
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(&decoded);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::create::create_sample;

    #[test]
    fn test_extract_from_created_document() {
        let mut doc = create_sample("My Title", "hello world").unwrap();
        let pages = extract_text(&mut doc).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("My Title"));
        assert!(pages[0].contains("hello world"));
    }

    #[test]
    fn test_extract_keeps_page_order() {
        let body = (0..80)
            .map(|i| format!("unique-{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut doc = create_sample("Ordered", &body).unwrap();
        assert!(doc.page_count() >= 2);

        let pages = extract_text(&mut doc).unwrap();
        assert!(pages[0].contains("unique-0"));
        assert!(pages[1].contains("unique-79") || pages.last().unwrap().contains("unique-79"));
        // A line from the first page never shows on the second
        assert!(!pages[1].contains("unique-0\n"));
    }

    #[test]
    fn test_pages_without_content_are_empty() {
        let mut doc = crate::document::Document::create();
        let mut page = crate::objects::PdfDictionary::new();
        page.insert(
            "Type",
            PdfValue::Name(crate::objects::PdfName::new("Page")),
        );
        page.insert(
            "MediaBox",
            PdfValue::Array(crate::objects::PdfArray(vec![
                PdfValue::Integer(0),
                PdfValue::Integer(0),
                PdfValue::Integer(612),
                PdfValue::Integer(792),
            ])),
        );
        doc.add_page(page);

        let pages = extract_text(&mut doc).unwrap();
        assert_eq!(pages, vec![String::new()]);
    }
}
