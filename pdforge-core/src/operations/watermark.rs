//! Text watermarking
//!
//! Builds one overlay content stream and stamps it onto every page. The
//! overlay object is shared by reference across pages, so output size does
//! not grow with the page count. Placement is fixed in page space (alpha,
//! rotation about the origin, text at a fixed position) rather than scaled
//! to each page's MediaBox, matching the tool this engine descends from.

use crate::content::{ContentStreamBuilder, Font};
use crate::document::Document;
use crate::error::Result;

/// Watermark appearance
#[derive(Debug, Clone)]
pub struct WatermarkOptions {
    pub text: String,
    pub font: Font,
    pub size: f64,
    pub opacity: f64,
    pub angle: f64,
}

impl WatermarkOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            font: Font::Helvetica,
            size: 50.0,
            opacity: 0.3,
            angle: 45.0,
        }
    }
}

/// Stamp the watermark text over every page
pub fn watermark_document(document: &mut Document, options: &WatermarkOptions) -> Result<()> {
    let mut builder = ContentStreamBuilder::new(612.0, 792.0).with_resource_prefix("Wm");
    builder
        .save_state()
        .set_fill_alpha(options.opacity)
        .rotate(options.angle)
        .set_font(options.font, options.size)
        .draw_text(200.0, 200.0, &options.text)
        .restore_state();

    let resources = builder.resources();
    let ops = builder.finish_single();

    let overlay = document.build_overlay(ops, resources);
    for index in 0..document.page_count() {
        document.overlay_page(index, &overlay)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PdfValue;
    use crate::operations::create::create_sample;
    use crate::operations::extract_text::extract_text;

    fn content_length(doc: &mut Document, index: usize) -> usize {
        let page_ref = doc.page_at(index).unwrap().obj_ref();
        let page = doc.resolve(page_ref).unwrap();
        let contents = page.as_dict().unwrap().get("Contents").unwrap().clone();
        let mut total = 0;
        let refs: Vec<_> = match contents {
            PdfValue::Array(array) => array.0.clone(),
            other => vec![other],
        };
        for value in refs {
            let resolved = doc.table_mut().resolve_value(&value).unwrap();
            total += resolved.as_stream().unwrap().data.len();
        }
        total
    }

    #[test]
    fn test_watermark_preserves_pages_and_grows_content() {
        let body = (0..60)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut doc = create_sample("Title", &body).unwrap();
        let count_before = doc.page_count();
        let lengths_before: Vec<usize> =
            (0..count_before).map(|i| content_length(&mut doc, i)).collect();

        watermark_document(&mut doc, &WatermarkOptions::new("CONFIDENTIAL")).unwrap();

        assert_eq!(doc.page_count(), count_before);
        for (i, &before) in lengths_before.iter().enumerate() {
            assert!(content_length(&mut doc, i) >= before);
        }
    }

    #[test]
    fn test_watermark_shares_one_stream() {
        let body = (0..60)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut doc = create_sample("Title", &body).unwrap();
        assert!(doc.page_count() >= 2);

        watermark_document(&mut doc, &WatermarkOptions::new("DRAFT")).unwrap();

        let mut overlay_refs = Vec::new();
        for index in 0..doc.page_count() {
            let page_ref = doc.page_at(index).unwrap().obj_ref();
            let page = doc.resolve(page_ref).unwrap();
            let contents = page.as_dict().unwrap().get("Contents").unwrap().clone();
            let array = contents.as_array().unwrap().clone();
            overlay_refs.push(array.0.last().unwrap().as_reference().unwrap());
        }
        assert!(overlay_refs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_watermark_text_shows_in_extraction() {
        let mut doc = create_sample("Title", "body").unwrap();
        watermark_document(&mut doc, &WatermarkOptions::new("DRAFT")).unwrap();
        let pages = extract_text(&mut doc).unwrap();
        assert!(pages[0].contains("DRAFT"));
        // Original text survives
        assert!(pages[0].contains("body"));
    }

    #[test]
    fn test_watermark_operators_bracketed() {
        let mut doc = create_sample("Title", "body").unwrap();
        watermark_document(&mut doc, &WatermarkOptions::new("DRAFT")).unwrap();

        let page_ref = doc.page_at(0).unwrap().obj_ref();
        let page = doc.resolve(page_ref).unwrap();
        let contents = page.as_dict().unwrap().get("Contents").unwrap().clone();
        let array = contents.as_array().unwrap().clone();
        let overlay_ref = array.0.last().unwrap().as_reference().unwrap();
        let stream = doc.resolve(overlay_ref).unwrap();
        let ops = String::from_utf8(stream.as_stream().unwrap().data.clone()).unwrap();

        assert!(ops.starts_with("q\n"));
        assert!(ops.trim_end().ends_with("Q"));
        assert!(ops.contains("/WmGS1 gs"));
        assert!(ops.contains(" cm"));
    }
}
