//! Document splitting
//!
//! Cuts a document into contiguous chunks of a fixed page count; the last
//! chunk may be shorter.

use crate::document::Document;
use crate::error::{PdfError, Result};

/// Split into new documents of `pages_per_chunk` pages each, boundaries at
/// `[0,k), [k,2k), ...`
pub fn split_document(
    source: &mut Document,
    pages_per_chunk: usize,
) -> Result<Vec<Document>> {
    if pages_per_chunk == 0 {
        return Err(PdfError::InvalidPageRange(
            "pages per chunk must be at least 1".to_string(),
        ));
    }

    let total = source.page_count();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + pages_per_chunk).min(total);
        let indices: Vec<usize> = (start..end).collect();

        let mut chunk = Document::create();
        chunk.insert_pages(0, &indices, source)?;
        chunks.push(chunk);

        start = end;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::create::create_sample;
    use crate::operations::merge::merge_documents;

    fn five_page_doc() -> Document {
        // The title page fits 30 body lines and later pages 35, so 150
        // lines land on five pages
        let body = (0..150)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let doc = create_sample("Report", &body).unwrap();
        assert_eq!(doc.page_count(), 5);
        doc
    }

    #[test]
    fn test_split_chunk_sizes() {
        let mut doc = five_page_doc();
        let chunks = split_document(&mut doc, 2).unwrap();
        let counts: Vec<usize> = chunks.iter().map(|c| c.page_count()).collect();
        assert_eq!(counts, vec![2, 2, 1]);
    }

    #[test]
    fn test_split_single_pages() {
        let mut doc = five_page_doc();
        let chunks = split_document(&mut doc, 1).unwrap();
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.page_count() == 1));
    }

    #[test]
    fn test_split_chunk_larger_than_document() {
        let mut doc = five_page_doc();
        let chunks = split_document(&mut doc, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_count(), 5);
    }

    #[test]
    fn test_split_zero_rejected() {
        let mut doc = five_page_doc();
        assert!(matches!(
            split_document(&mut doc, 0),
            Err(PdfError::InvalidPageRange(_))
        ));
    }

    #[test]
    fn test_split_then_merge_recovers_sequence() {
        let mut doc = five_page_doc();
        let original_text = crate::operations::extract_text(&mut doc).unwrap();

        let mut chunks = split_document(&mut doc, 2).unwrap();
        let mut merged = merge_documents(&mut chunks).unwrap();

        assert_eq!(merged.page_count(), 5);
        let merged_text = crate::operations::extract_text(&mut merged).unwrap();
        assert_eq!(merged_text, original_text);
    }
}
