//! # pdforge
//!
//! A pure Rust PDF document engine: parse the binary object model, operate
//! on pages, and serialize valid PDF bytes back out.
//!
//! ## Features
//!
//! - **Parsing**: lexer, object parser, classic and stream cross-reference
//!   tables, incremental updates, object streams
//! - **Document model**: lazy reference resolution with cycle detection,
//!   flattened page list, attribute inheritance
//! - **Page operations**: merge, split, rotate, watermark, overlay, text
//!   extraction, inspection, sample generation
//! - **Writing**: reachability-based serialization with fresh object
//!   numbering and a rebuilt cross-reference table
//!
//! ## Reading and inspecting
//!
//! ```rust,no_run
//! use pdforge::Document;
//!
//! # fn main() -> pdforge::Result<()> {
//! let bytes = std::fs::read("document.pdf")?;
//! let mut doc = Document::load(bytes)?;
//!
//! println!("Pages: {}", doc.page_count());
//! for i in 0..doc.page_count() {
//!     let (width, height) = doc.page_dimensions(i)?;
//!     println!("Page {}: {width}x{height} pts", i + 1);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transforming
//!
//! ```rust
//! use pdforge::operations::{create_sample, split_document, watermark_document, WatermarkOptions};
//!
//! # fn main() -> pdforge::Result<()> {
//! let mut doc = create_sample("Title", "Body text")?;
//! watermark_document(&mut doc, &WatermarkOptions::new("DRAFT"))?;
//! let bytes = doc.to_bytes()?;
//! # Ok(())
//! # }
//! ```

pub mod content;
pub mod document;
pub mod error;
pub mod objects;
pub mod operations;
pub mod parser;
pub mod writer;

pub use content::{ContentStreamBuilder, Font};
pub use document::{Document, ObjectTable, PageNode, PageOverlay};
pub use error::{PdfError, Result};
pub use objects::{
    ObjRef, PdfArray, PdfDictionary, PdfName, PdfStream, PdfString, PdfValue,
};
pub use operations::{
    create_sample, document_info, extract_text, merge_documents, overlay_document,
    rotate_document, split_document, watermark_document, DocumentInfo, WatermarkOptions,
};
pub use writer::PdfWriter;

/// Current version of pdforge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_create_empty_document() {
        let doc = Document::create();
        assert_eq!(doc.page_count(), 0);
    }
}
