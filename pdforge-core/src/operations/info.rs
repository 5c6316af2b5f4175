//! Document inspection
//!
//! Collects the page count, caller-supplied file size, decoded Info
//! metadata, and the first page's dimensions.

use crate::document::Document;
use crate::error::Result;

/// Summary of a document
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Size of the source file in bytes, supplied by the caller since the
    /// engine only ever sees byte buffers
    pub file_size: u64,
    /// Info dictionary entries with string values decoded for display
    pub metadata: Vec<(String, String)>,
    pub first_page_dimensions: Option<(f64, f64)>,
}

/// Inspect a document
pub fn document_info(document: &mut Document, file_size: u64) -> Result<DocumentInfo> {
    let info = document.metadata()?;
    let mut metadata: Vec<(String, String)> = info
        .0
        .iter()
        .map(|(key, value)| {
            let rendered = match value.as_string() {
                Some(s) => s.to_text(),
                None => match value {
                    crate::objects::PdfValue::Name(n) => n.as_str().to_string(),
                    other => format!("{other:?}"),
                },
            };
            (key.as_str().to_string(), rendered)
        })
        .collect();
    metadata.sort();

    let first_page_dimensions = if document.page_count() > 0 {
        Some(document.page_dimensions(0)?)
    } else {
        None
    };

    Ok(DocumentInfo {
        page_count: document.page_count(),
        file_size,
        metadata,
        first_page_dimensions,
    })
}
