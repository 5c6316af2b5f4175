//! Page rotation
//!
//! Viewer-level rotation: the Rotate attribute changes, content-stream
//! coordinates do not.

use crate::document::{normalize_rotation, Document};
use crate::error::Result;

/// Rotate every page by the given angle. The angle is validated once,
/// before any page is touched; anything that is not a multiple of 90 is
/// rejected, and multiples normalize modulo 360 (450 becomes 90).
pub fn rotate_document(document: &mut Document, degrees: i32) -> Result<()> {
    normalize_rotation(degrees)?;

    for index in 0..document.page_count() {
        document.rotate_page(index, degrees)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::operations::create::create_sample;
    use crate::operations::extract_text::extract_text;

    #[test]
    fn test_rotate_all_pages() {
        let mut doc = create_sample("Title", "body").unwrap();
        rotate_document(&mut doc, 90).unwrap();

        for index in 0..doc.page_count() {
            let page_ref = doc.page_at(index).unwrap().obj_ref();
            let page = doc.resolve(page_ref).unwrap();
            assert_eq!(
                page.as_dict().unwrap().get("Rotate").unwrap().as_integer(),
                Some(90)
            );
        }
    }

    #[test]
    fn test_rotate_450_normalizes_to_90() {
        let mut doc = create_sample("Title", "body").unwrap();
        rotate_document(&mut doc, 450).unwrap();

        let page_ref = doc.page_at(0).unwrap().obj_ref();
        let page = doc.resolve(page_ref).unwrap();
        assert_eq!(
            page.as_dict().unwrap().get("Rotate").unwrap().as_integer(),
            Some(90)
        );
    }

    #[test]
    fn test_rotate_91_rejected_without_mutation() {
        let mut doc = create_sample("Title", "body").unwrap();
        assert!(matches!(
            rotate_document(&mut doc, 91),
            Err(PdfError::InvalidAngle(91))
        ));

        let page_ref = doc.page_at(0).unwrap().obj_ref();
        let page = doc.resolve(page_ref).unwrap();
        assert!(page.as_dict().unwrap().get("Rotate").is_none());
    }

    #[test]
    fn test_rotate_touches_nothing_but_rotate() {
        let mut doc = create_sample("Title", "line one\nline two").unwrap();
        let pages_before = doc.page_count();
        let dims_before = doc.page_dimensions(0).unwrap();
        let text_before = extract_text(&mut doc).unwrap();

        rotate_document(&mut doc, 180).unwrap();

        assert_eq!(doc.page_count(), pages_before);
        assert_eq!(doc.page_dimensions(0).unwrap(), dims_before);
        assert_eq!(extract_text(&mut doc).unwrap(), text_before);
    }

    #[test]
    fn test_four_quarter_turns_restore() {
        let mut doc = create_sample("Title", "body").unwrap();
        for _ in 0..4 {
            rotate_document(&mut doc, 90).unwrap();
        }
        let page_ref = doc.page_at(0).unwrap().obj_ref();
        let page = doc.resolve(page_ref).unwrap();
        assert_eq!(
            page.as_dict().unwrap().get("Rotate").unwrap().as_integer(),
            Some(0)
        );
    }
}
