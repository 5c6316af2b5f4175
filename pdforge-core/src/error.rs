use thiserror::Error;

/// Errors produced by the document engine.
///
/// Parse failures carry the byte offset they were detected at; page
/// operation failures carry the offending index or angle. Parsing never
/// recovers: a malformed document fails the whole load.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed token at byte {offset}: {message}")]
    MalformedToken { offset: usize, message: String },

    #[error("truncated object at byte {offset}: {message}")]
    TruncatedObject { offset: usize, message: String },

    #[error("invalid stream length at byte {offset}: declared {declared}, only {remaining} bytes remain")]
    InvalidLength {
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    #[error("no cross-reference table found")]
    MissingXref,

    #[error("dangling reference: {0} {1} R")]
    DanglingReference(u32, u16),

    #[error("cyclic reference: {0} {1} R")]
    CyclicReference(u32, u16),

    #[error("cycle in page tree at object {0} {1} R")]
    CyclicPageTree(u32, u16),

    #[error("page index {index} out of range (document has {count} pages)")]
    PageIndexOutOfBounds { index: usize, count: usize },

    #[error("invalid rotation angle {0}: must be a multiple of 90")]
    InvalidAngle(i32),

    #[error("invalid page range: {0}")]
    InvalidPageRange(String),

    #[error("resource unavailable: {0}")]
    IoUnavailable(String),

    #[error("invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("stream decode error: {0}")]
    CompressionError(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;
