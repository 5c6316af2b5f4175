//! Document merging
//!
//! Concatenates the pages of multiple documents into a new one, cloning
//! every page subtree under fresh object numbers.

use crate::document::Document;
use crate::error::Result;

/// Merge documents in input order into a new document.
///
/// Each source's pages are appended at the running end of the output's
/// page list. The first error stops the merge with nothing committed.
pub fn merge_documents(sources: &mut [Document]) -> Result<Document> {
    let mut output = Document::create();

    for source in sources.iter_mut() {
        let indices: Vec<usize> = (0..source.page_count()).collect();
        let at_end = output.page_count();
        output.insert_pages(at_end, &indices, source)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::create::create_sample;

    #[test]
    fn test_merge_preserves_order_and_count() {
        let a = create_sample("A", "alpha").unwrap();
        let b = create_sample("B", "beta").unwrap();
        let total = a.page_count() + b.page_count();

        let mut sources = [a, b];
        let merged = merge_documents(&mut sources).unwrap();
        assert_eq!(merged.page_count(), total);
    }

    #[test]
    fn test_merge_is_associative_on_page_sequences() {
        let texts = ["first", "second", "third"];
        let make =
            |i: usize| create_sample(&format!("Doc {i}"), texts[i]).unwrap();

        // merge([A, B]) then merge with C
        let mut ab = [make(0), make(1)];
        let ab_merged = merge_documents(&mut ab).unwrap();
        let mut ab_c = [ab_merged, make(2)];
        let left = merge_documents(&mut ab_c).unwrap();

        // merge([A, B, C]) directly
        let mut abc = [make(0), make(1), make(2)];
        let right = merge_documents(&mut abc).unwrap();

        assert_eq!(left.page_count(), right.page_count());

        let mut left = left;
        let mut right = right;
        let left_text = crate::operations::extract_text(&mut left).unwrap();
        let right_text = crate::operations::extract_text(&mut right).unwrap();
        assert_eq!(left_text, right_text);
    }

    #[test]
    fn test_merge_of_nothing_is_empty() {
        let merged = merge_documents(&mut []).unwrap();
        assert_eq!(merged.page_count(), 0);
    }
}
