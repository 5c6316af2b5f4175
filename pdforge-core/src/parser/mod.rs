//! PDF parsing
//!
//! Byte-level machinery for reading PDF files: the lexer, the object
//! parser, stream filters, the cross-reference index, and the content
//! stream tokenizer used by text extraction.

pub mod content;
pub mod filters;
pub mod lexer;
pub mod objects;
pub mod xref;

pub use self::content::{ContentOperation, ContentTokenizer, extract_text_from_content};
pub use self::lexer::{Lexer, Token};
pub use self::objects::ObjectParser;
pub use self::xref::{XRefEntry, XRefTable};

use crate::error::{PdfError, Result};

/// Parse and validate the `%PDF-x.y` header, returning the version string
pub fn parse_header(data: &[u8]) -> Result<String> {
    if !data.starts_with(b"%PDF-") {
        return Err(PdfError::InvalidStructure(
            "missing %PDF header".to_string(),
        ));
    }
    let rest = &data[5..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    let version = String::from_utf8_lossy(&rest[..end]).trim().to_string();
    if version.is_empty() {
        return Err(PdfError::InvalidStructure(
            "empty PDF version in header".to_string(),
        ));
    }
    Ok(version)
}
