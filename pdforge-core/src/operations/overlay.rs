//! Page stamping
//!
//! Overlays the first page of one document onto every page of another:
//! the stamp's content is imported (with its resources deep-cloned into
//! the target) and appended to each page's Contents chain, so it draws on
//! top.

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::PdfValue;

/// Stamp `overlay_source`'s first page over every page of `target`
pub fn overlay_document(target: &mut Document, overlay_source: &mut Document) -> Result<()> {
    if overlay_source.page_count() == 0 {
        return Err(PdfError::InvalidPageRange(
            "overlay document has no pages".to_string(),
        ));
    }

    let ops = stamp_content_bytes(overlay_source)?;
    let resources = stamp_resources(target, overlay_source)?;

    // Bracket the stamp so its graphics state cannot leak into whatever a
    // viewer draws after the page content
    let mut wrapped = Vec::with_capacity(ops.len() + 4);
    wrapped.extend_from_slice(b"q\n");
    wrapped.extend_from_slice(&ops);
    wrapped.extend_from_slice(b"\nQ\n");

    let overlay = target.build_overlay(wrapped, resources);
    for index in 0..target.page_count() {
        target.overlay_page(index, &overlay)?;
    }
    Ok(())
}

/// Decoded, concatenated content of the overlay's first page
fn stamp_content_bytes(overlay_source: &mut Document) -> Result<Vec<u8>> {
    let page_ref = overlay_source.page_at(0)?.obj_ref();
    let page = overlay_source.resolve(page_ref)?;
    let dict = page
        .as_dict()
        .ok_or_else(|| PdfError::InvalidStructure("page is not a dictionary".to_string()))?;

    let contents = match dict.get("Contents") {
        None => return Ok(Vec::new()),
        Some(value) => value.clone(),
    };

    let mut values = Vec::new();
    match contents {
        PdfValue::Reference(num, gen) => {
            let resolved = overlay_source.resolve((num, gen))?;
            match resolved {
                PdfValue::Array(array) => values.extend(array.0),
                PdfValue::Stream(_) => values.push(PdfValue::Reference(num, gen)),
                _ => {
                    return Err(PdfError::InvalidStructure(
                        "Contents is neither a stream nor an array".to_string(),
                    ))
                }
            }
        }
        PdfValue::Array(array) => values.extend(array.0),
        _ => {
            return Err(PdfError::InvalidStructure(
                "Contents is neither a stream nor an array".to_string(),
            ))
        }
    }

    let mut bytes = Vec::new();
    for value in values {
        let resolved = overlay_source.table_mut().resolve_value(&value)?;
        let stream = resolved.as_stream().ok_or_else(|| {
            PdfError::InvalidStructure("Contents entry is not a stream".to_string())
        })?;
        let decoded = stream.decode()?;
        if !bytes.is_empty() {
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(&decoded);
    }
    Ok(bytes)
}

/// The overlay page's effective resources, cloned into the target table
fn stamp_resources(
    target: &mut Document,
    overlay_source: &mut Document,
) -> Result<crate::objects::PdfDictionary> {
    let node = overlay_source.page_at(0)?.clone();
    let page = overlay_source.resolve(node.obj_ref())?;
    let dict = page
        .as_dict()
        .ok_or_else(|| PdfError::InvalidStructure("page is not a dictionary".to_string()))?;

    let resources_value = match dict.get("Resources") {
        Some(value) => overlay_source.table_mut().resolve_value(value)?,
        None => match node.inherited().get("Resources") {
            Some(value) => overlay_source.table_mut().resolve_value(value)?,
            None => return Ok(crate::objects::PdfDictionary::new()),
        },
    };

    let resources = resources_value.as_dict().cloned().ok_or_else(|| {
        PdfError::InvalidStructure("Resources is not a dictionary".to_string())
    })?;
    target.import_dictionary(overlay_source, &resources)
}
