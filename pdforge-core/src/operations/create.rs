//! Sample document generation
//!
//! Builds a letter-size document with a bold title, body text paginated by
//! the content builder's cursor, and a page-number label on every page
//! drawn from that page's own index once the total is known.

use crate::content::{ContentStreamBuilder, Font};
use crate::document::Document;
use crate::error::Result;
use crate::objects::{PdfArray, PdfDictionary, PdfName, PdfString, PdfValue};
use crate::writer::format_pdf_date;
use chrono::Utc;

const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;

/// Create a sample document with a title and body text
pub fn create_sample(title: &str, body: &str) -> Result<Document> {
    let mut doc = Document::create();

    let mut builder = ContentStreamBuilder::new(PAGE_WIDTH, PAGE_HEIGHT);

    builder.set_font(Font::HelveticaBold, 24.0);
    builder.draw_text(100.0, PAGE_HEIGHT - 100.0, title);

    builder.set_font(Font::Helvetica, 12.0);
    builder.set_cursor(PAGE_HEIGHT - 150.0);
    for line in body.split('\n') {
        builder.write_line(100.0, line);
    }

    // Label each page with its own number; the running cursor position at
    // the end would only be right for the final page
    let total = builder.page_count();
    for index in 0..total {
        builder.draw_text_on_page(
            index,
            Font::Helvetica,
            10.0,
            PAGE_WIDTH - 100.0,
            30.0,
            &format!("Page {}", index + 1),
        );
    }

    let resources = builder.resources();
    for ops in builder.finish_pages() {
        let contents = doc.add_stream(PdfDictionary::new(), ops);

        let mut page = PdfDictionary::new();
        page.insert("Type", PdfValue::Name(PdfName::new("Page")));
        page.insert(
            "MediaBox",
            PdfValue::Array(PdfArray(vec![
                PdfValue::Integer(0),
                PdfValue::Integer(0),
                PdfValue::Integer(PAGE_WIDTH as i64),
                PdfValue::Integer(PAGE_HEIGHT as i64),
            ])),
        );
        page.insert("Resources", PdfValue::Dictionary(resources.clone()));
        page.insert("Contents", PdfValue::Reference(contents.0, contents.1));
        doc.add_page(page);
    }

    let mut info = PdfDictionary::new();
    info.insert(
        "Title",
        PdfValue::String(PdfString::new(title.as_bytes().to_vec())),
    );
    info.insert(
        "Producer",
        PdfValue::String(PdfString::new(
            format!("pdforge {}", crate::VERSION).into_bytes(),
        )),
    );
    info.insert(
        "CreationDate",
        PdfValue::String(PdfString::new(
            format_pdf_date(Utc::now()).into_bytes(),
        )),
    );
    doc.set_info(info);

    Ok(doc)
}
