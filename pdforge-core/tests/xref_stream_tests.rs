//! Loading files indexed by cross-reference streams (PDF 1.5+), including
//! objects packed into object streams and hybrid-reference files that
//! carry both a classic table and a stream.

#![cfg(feature = "compression")]

use pdforge::{Document, PdfValue};

fn flate(data: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One xref stream row: 1-byte type, 4-byte field2, 2-byte field3
fn xref_row(kind: u8, f2: u64, f3: u16) -> Vec<u8> {
    let mut row = vec![kind];
    row.extend_from_slice(&(f2 as u32).to_be_bytes());
    row.extend_from_slice(&f3.to_be_bytes());
    row
}

fn push_object(body: &mut Vec<u8>, offsets: &mut Vec<(u32, usize)>, num: u32, payload: &str) {
    offsets.push((num, body.len()));
    body.extend_from_slice(format!("{num} 0 obj\n{payload}\nendobj\n").as_bytes());
}

fn push_stream_object(
    body: &mut Vec<u8>,
    offsets: &mut Vec<(u32, usize)>,
    num: u32,
    dict: &str,
    data: &[u8],
) {
    offsets.push((num, body.len()));
    body.extend_from_slice(format!("{num} 0 obj\n{dict}\nstream\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream\nendobj\n");
}

/// A file whose whole index is one cross-reference stream, with the Info
/// dictionary packed into a flate-compressed object stream
fn xref_stream_pdf() -> Vec<u8> {
    let mut body = b"%PDF-1.5\n".to_vec();
    let mut offsets = Vec::new();

    push_object(
        &mut body,
        &mut offsets,
        1,
        "<< /Type /Catalog /Pages 2 0 R >>",
    );
    push_object(
        &mut body,
        &mut offsets,
        2,
        "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    push_object(&mut body, &mut offsets, 3, "<< /Type /Page /Parent 2 0 R >>");

    // Object 5 lives inside this object stream
    let header = "5 0 ";
    let embedded = "<< /Title (Hidden Inside) >>";
    let payload = format!("{header}{embedded}");
    let compressed = flate(payload.as_bytes());
    push_stream_object(
        &mut body,
        &mut offsets,
        4,
        &format!(
            "<< /Type /ObjStm /N 1 /First {} /Filter /FlateDecode /Length {} >>",
            header.len(),
            compressed.len()
        ),
        &compressed,
    );

    // The cross-reference stream itself, object 6
    let xref_offset = body.len();
    let mut rows = Vec::new();
    rows.extend(xref_row(0, 0, 65535)); // 0: free
    for num in 1..=4u32 {
        let off = offsets.iter().find(|(n, _)| *n == num).unwrap().1;
        rows.extend(xref_row(1, off as u64, 0));
    }
    rows.extend(xref_row(2, 4, 0)); // 5: in object stream 4, index 0
    rows.extend(xref_row(1, xref_offset as u64, 0)); // 6: this stream

    let dict = format!(
        "<< /Type /XRef /Size 7 /Root 1 0 R /Info 5 0 R /W [1 4 2] /Length {} >>",
        rows.len()
    );
    body.extend_from_slice(format!("6 0 obj\n{dict}\nstream\n").as_bytes());
    body.extend_from_slice(&rows);
    body.extend_from_slice(b"\nendstream\nendobj\n");

    body.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    body
}

#[test]
fn loads_xref_stream_file() {
    let mut doc = Document::load(xref_stream_pdf()).unwrap();
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.page_dimensions(0).unwrap(), (612.0, 792.0));
}

#[test]
fn resolves_object_inside_object_stream() {
    let mut doc = Document::load(xref_stream_pdf()).unwrap();
    let metadata = doc.metadata().unwrap();
    assert_eq!(
        metadata
            .get("Title")
            .unwrap()
            .as_string()
            .unwrap()
            .to_text(),
        "Hidden Inside"
    );
}

#[test]
fn xref_stream_file_roundtrips() {
    let mut doc = Document::load(xref_stream_pdf()).unwrap();
    let rewritten = doc.to_bytes().unwrap();

    // The writer emits a classic table; everything still loads
    let mut reloaded = Document::load(rewritten).unwrap();
    assert_eq!(reloaded.page_count(), 1);
    assert_eq!(
        reloaded
            .metadata()
            .unwrap()
            .get("Title")
            .unwrap()
            .as_string()
            .unwrap()
            .to_text(),
        "Hidden Inside"
    );
}

/// A hybrid-reference file: classic table for the document skeleton plus
/// an /XRefStm stream covering the compressed objects
#[test]
fn loads_hybrid_reference_file() {
    let mut body = b"%PDF-1.5\n".to_vec();
    let mut offsets = Vec::new();

    push_object(
        &mut body,
        &mut offsets,
        1,
        "<< /Type /Catalog /Pages 2 0 R >>",
    );
    push_object(
        &mut body,
        &mut offsets,
        2,
        "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    push_object(&mut body, &mut offsets, 3, "<< /Type /Page /Parent 2 0 R >>");

    let header = "5 0 ";
    let embedded = "<< /Author (Stream Dweller) >>";
    let payload = format!("{header}{embedded}");
    let compressed = flate(payload.as_bytes());
    push_stream_object(
        &mut body,
        &mut offsets,
        4,
        &format!(
            "<< /Type /ObjStm /N 1 /First {} /Filter /FlateDecode /Length {} >>",
            header.len(),
            compressed.len()
        ),
        &compressed,
    );

    // XRefStm stream indexes objects 4 and 5 only
    let stm_offset = body.len();
    let mut rows = Vec::new();
    let obj4_off = offsets.iter().find(|(n, _)| *n == 4).unwrap().1;
    rows.extend(xref_row(1, obj4_off as u64, 0)); // 4
    rows.extend(xref_row(2, 4, 0)); // 5: inside object stream 4
    let dict = format!(
        "<< /Type /XRef /Size 7 /Root 1 0 R /Index [4 2] /W [1 4 2] /Length {} >>",
        rows.len()
    );
    body.extend_from_slice(format!("6 0 obj\n{dict}\nstream\n").as_bytes());
    body.extend_from_slice(&rows);
    body.extend_from_slice(b"\nendstream\nendobj\n");

    // Classic table for objects 0..3
    let table_offset = body.len();
    body.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
    for num in 1..=3u32 {
        let off = offsets.iter().find(|(n, _)| *n == num).unwrap().1;
        body.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    body.extend_from_slice(
        format!("trailer\n<< /Size 7 /Root 1 0 R /Info 5 0 R /XRefStm {stm_offset} >>\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("startxref\n{table_offset}\n%%EOF\n").as_bytes());

    let mut doc = Document::load(body).unwrap();
    assert_eq!(doc.page_count(), 1);
    let metadata = doc.metadata().unwrap();
    assert_eq!(
        metadata
            .get("Author")
            .unwrap()
            .as_string()
            .unwrap()
            .to_text(),
        "Stream Dweller"
    );

    // The Author value survives the metadata mapping as a PdfValue too
    assert!(matches!(
        metadata.get("Author"),
        Some(PdfValue::String(_))
    ));
}
