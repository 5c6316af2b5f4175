//! PDF serialization
//!
//! Walks the live object graph from the page list and the Info dictionary,
//! assigns fresh object numbers densely, and emits a complete file: header,
//! body, cross-reference table, and trailer. Only reachable objects are
//! written, which is what prunes everything orphaned by page removal.

use crate::document::Document;
use crate::error::Result;
use crate::objects::{ObjRef, PdfDictionary, PdfValue};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::io::Write;

const CATALOG_ID: u32 = 1;
const PAGES_ROOT_ID: u32 = 2;

pub struct PdfWriter<W: Write> {
    writer: W,
    xref_positions: HashMap<u32, u64>,
    current_position: u64,
    id_map: HashMap<ObjRef, u32>,
    pending: VecDeque<(u32, ObjRef)>,
    next_id: u32,
}

impl<W: Write> PdfWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            xref_positions: HashMap::new(),
            current_position: 0,
            id_map: HashMap::new(),
            pending: VecDeque::new(),
            next_id: PAGES_ROOT_ID + 1,
        }
    }

    /// Serialize a whole document
    pub fn write_document(&mut self, document: &mut Document) -> Result<()> {
        self.write_header(document.version())?;

        // Fixed ids for the rebuilt roots, then the Info dictionary, then
        // one id per page, in page-list order
        let info_id = document.info_ref().map(|old| self.map_ref(old));

        let page_count = document.page_count();
        let mut page_ids = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let old_ref = document.page_at(index)?.obj_ref();
            let id = self.alloc_id();
            self.id_map.insert(old_ref, id);
            page_ids.push(id);
        }

        // Catalog
        let mut catalog = PdfDictionary::new();
        catalog.insert("Type", name("Catalog"));
        catalog.insert("Pages", PdfValue::Reference(PAGES_ROOT_ID, 0));
        self.write_object(CATALOG_ID, &PdfValue::Dictionary(catalog))?;

        // Pages root with a flat Kids list
        let mut pages_root = PdfDictionary::new();
        pages_root.insert("Type", name("Pages"));
        pages_root.insert("Count", PdfValue::Integer(page_count as i64));
        pages_root.insert(
            "Kids",
            PdfValue::Array(crate::objects::PdfArray(
                page_ids.iter().map(|&id| PdfValue::Reference(id, 0)).collect(),
            )),
        );
        self.write_object(PAGES_ROOT_ID, &PdfValue::Dictionary(pages_root))?;

        // Page dictionaries: inherited attributes flattened, references
        // remapped, Parent re-pointed at the rebuilt root
        for (index, &page_id) in page_ids.iter().enumerate() {
            let dict = document.effective_page_dict(index)?;
            let mut remapped = self.remap_dict(&dict);
            remapped.insert("Parent", PdfValue::Reference(PAGES_ROOT_ID, 0));
            self.write_object(page_id, &PdfValue::Dictionary(remapped))?;
        }

        // Everything reachable from the pages and Info
        while let Some((new_id, old_ref)) = self.pending.pop_front() {
            let value = document.table_mut().resolve(old_ref)?;
            let mut remapped = self.remap_value(&value);
            if let PdfValue::Stream(ref mut stream) = remapped {
                stream
                    .dict
                    .insert("Length", PdfValue::Integer(stream.data.len() as i64));
            }
            self.write_object(new_id, &remapped)?;
        }

        let xref_position = self.current_position;
        self.write_xref()?;
        self.write_trailer(info_id, xref_position)?;
        self.writer.flush()?;
        Ok(())
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Translate a source reference into the output numbering, scheduling
    /// the object for writing the first time it is seen
    fn map_ref(&mut self, old_ref: ObjRef) -> u32 {
        if let Some(&id) = self.id_map.get(&old_ref) {
            return id;
        }
        let id = self.alloc_id();
        self.id_map.insert(old_ref, id);
        self.pending.push_back((id, old_ref));
        id
    }

    /// Rewrite every reference in a value into the output numbering
    fn remap_value(&mut self, value: &PdfValue) -> PdfValue {
        match value {
            PdfValue::Reference(num, gen) => {
                let id = self.map_ref((*num, *gen));
                PdfValue::Reference(id, 0)
            }
            PdfValue::Array(array) => PdfValue::Array(crate::objects::PdfArray(
                array.0.iter().map(|v| self.remap_value(v)).collect(),
            )),
            PdfValue::Dictionary(dict) => PdfValue::Dictionary(self.remap_dict(dict)),
            PdfValue::Stream(stream) => PdfValue::Stream(crate::objects::PdfStream {
                dict: self.remap_dict(&stream.dict),
                data: stream.data.clone(),
            }),
            primitive => primitive.clone(),
        }
    }

    fn remap_dict(&mut self, dict: &PdfDictionary) -> PdfDictionary {
        let mut out = PdfDictionary::new();
        for (key, entry) in &dict.0 {
            out.insert(key.as_str(), self.remap_value(entry));
        }
        out
    }

    fn write_header(&mut self, version: &str) -> Result<()> {
        self.write_bytes(format!("%PDF-{version}\n").as_bytes())?;
        // Binary comment so transports treat the file as binary
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])?;
        Ok(())
    }

    fn write_object(&mut self, id: u32, value: &PdfValue) -> Result<()> {
        self.xref_positions.insert(id, self.current_position);
        self.write_bytes(format!("{id} 0 obj\n").as_bytes())?;
        self.write_value(value)?;
        self.write_bytes(b"\nendobj\n")?;
        Ok(())
    }

    fn write_value(&mut self, value: &PdfValue) -> Result<()> {
        match value {
            PdfValue::Null => self.write_bytes(b"null")?,
            PdfValue::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            PdfValue::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            PdfValue::Real(f) => {
                let formatted = format!("{f:.6}");
                let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
                self.write_bytes(trimmed.as_bytes())?;
            }
            PdfValue::String(s) => {
                self.write_bytes(b"(")?;
                let mut escaped = Vec::with_capacity(s.0.len());
                for &byte in &s.0 {
                    match byte {
                        b'(' => escaped.extend_from_slice(b"\\("),
                        b')' => escaped.extend_from_slice(b"\\)"),
                        b'\\' => escaped.extend_from_slice(b"\\\\"),
                        b'\n' => escaped.extend_from_slice(b"\\n"),
                        b'\r' => escaped.extend_from_slice(b"\\r"),
                        b'\t' => escaped.extend_from_slice(b"\\t"),
                        0x20..=0x7E => escaped.push(byte),
                        _ => escaped.extend_from_slice(format!("\\{byte:03o}").as_bytes()),
                    }
                }
                self.write_bytes(&escaped)?;
                self.write_bytes(b")")?;
            }
            PdfValue::Name(n) => {
                self.write_bytes(b"/")?;
                let mut escaped = Vec::with_capacity(n.0.len());
                for &byte in n.0.as_bytes() {
                    let needs_escape = byte < 0x21
                        || byte > 0x7E
                        || matches!(
                            byte,
                            b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
                                | b'/' | b'%'
                        );
                    if needs_escape {
                        escaped.extend_from_slice(format!("#{byte:02X}").as_bytes());
                    } else {
                        escaped.push(byte);
                    }
                }
                self.write_bytes(&escaped)?;
            }
            PdfValue::Array(array) => {
                self.write_bytes(b"[")?;
                for (i, element) in array.0.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_value(element)?;
                }
                self.write_bytes(b"]")?;
            }
            PdfValue::Dictionary(dict) => self.write_dictionary(dict)?,
            PdfValue::Stream(stream) => {
                self.write_dictionary(&stream.dict)?;
                self.write_bytes(b"\nstream\n")?;
                self.write_bytes(&stream.data)?;
                self.write_bytes(b"\nendstream")?;
            }
            PdfValue::Reference(num, gen) => {
                self.write_bytes(format!("{num} {gen} R").as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_dictionary(&mut self, dict: &PdfDictionary) -> Result<()> {
        // Sorted keys keep the output stable across runs
        let mut keys: Vec<&crate::objects::PdfName> = dict.0.keys().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        self.write_bytes(b"<<")?;
        for key in keys {
            self.write_bytes(b"\n")?;
            self.write_value(&PdfValue::Name(key.clone()))?;
            self.write_bytes(b" ")?;
            // Key came from the dictionary, so the entry exists
            if let Some(entry) = dict.0.get(key) {
                self.write_value(entry)?;
            }
        }
        self.write_bytes(b"\n>>")?;
        Ok(())
    }

    fn write_xref(&mut self) -> Result<()> {
        let max_id = self.xref_positions.keys().copied().max().unwrap_or(0);

        self.write_bytes(b"xref\n")?;
        self.write_bytes(format!("0 {}\n", max_id + 1).as_bytes())?;
        self.write_bytes(b"0000000000 65535 f \n")?;
        for id in 1..=max_id {
            match self.xref_positions.get(&id) {
                Some(&position) => {
                    let entry = format!("{position:010} {:05} n \n", 0);
                    self.write_bytes(entry.as_bytes())?;
                }
                None => self.write_bytes(b"0000000000 00000 f \n")?,
            }
        }
        Ok(())
    }

    fn write_trailer(&mut self, info_id: Option<u32>, xref_position: u64) -> Result<()> {
        let max_id = self.xref_positions.keys().copied().max().unwrap_or(0);

        let mut trailer = PdfDictionary::new();
        trailer.insert("Size", PdfValue::Integer((max_id + 1) as i64));
        trailer.insert("Root", PdfValue::Reference(CATALOG_ID, 0));
        if let Some(id) = info_id {
            trailer.insert("Info", PdfValue::Reference(id, 0));
        }

        self.write_bytes(b"trailer\n")?;
        self.write_dictionary(&trailer)?;
        self.write_bytes(b"\nstartxref\n")?;
        self.write_bytes(xref_position.to_string().as_bytes())?;
        self.write_bytes(b"\n%%EOF\n")?;
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len() as u64;
        Ok(())
    }
}

fn name(value: &str) -> PdfValue {
    PdfValue::Name(crate::objects::PdfName::new(value))
}

/// Format a date as a PDF date string (D:YYYYMMDDHHmmSS+00'00)
pub fn format_pdf_date(date: DateTime<Utc>) -> String {
    format!("{}+00'00", date.format("D:%Y%m%d%H%M%S"))
}
