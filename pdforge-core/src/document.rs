//! Document model
//!
//! The in-memory object graph: an [`ObjectTable`] that resolves indirect
//! objects lazily against the cross-reference index, and a [`Document`]
//! exposing the flattened page list and the page-level mutations the
//! operations are built from.

use crate::error::{PdfError, Result};
use crate::objects::{ObjRef, PdfArray, PdfDictionary, PdfStream, PdfValue};
use crate::parser::objects::ObjectParser;
use crate::parser::xref::{XRefEntry, XRefTable};
use crate::parser::{parse_header, Lexer, Token};
use std::collections::HashMap;

/// Page attributes a leaf inherits from ancestor tree nodes
const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Resolution state of one table entry
#[derive(Debug, Clone)]
enum Slot {
    /// Known byte offset, not parsed yet
    Unread(u64),
    /// Stored inside an object stream, not parsed yet
    InStream { stream_num: u32, index: u32 },
    /// Resolution in flight; hitting this again means a reference cycle
    InProgress,
    Resolved(PdfValue),
}

/// Mapping from (object number, generation) to object values, resolving
/// lazily from the raw file bytes. The table only grows: mutation
/// allocates fresh object numbers, never reuses them.
#[derive(Debug)]
pub struct ObjectTable {
    data: Vec<u8>,
    slots: HashMap<ObjRef, Slot>,
    next_number: u32,
}

impl ObjectTable {
    /// Empty table for a document built from scratch
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            slots: HashMap::new(),
            next_number: 1,
        }
    }

    /// Table over raw file bytes, seeded from the cross-reference index
    pub fn from_xref(data: Vec<u8>, xref: &XRefTable) -> Self {
        let mut slots = HashMap::new();
        for (&num, entry) in xref.iter() {
            match entry {
                XRefEntry::Free => {}
                XRefEntry::Offset { offset, generation } => {
                    slots.insert((num, *generation), Slot::Unread(*offset));
                }
                XRefEntry::InStream { stream_num, index } => {
                    slots.insert(
                        (num, 0),
                        Slot::InStream {
                            stream_num: *stream_num,
                            index: *index,
                        },
                    );
                }
            }
        }
        Self {
            data,
            slots,
            next_number: xref.max_object_number() + 1,
        }
    }

    /// Allocate a fresh object number for a new value
    pub fn insert(&mut self, value: PdfValue) -> ObjRef {
        let obj_ref = (self.next_number, 0);
        self.next_number += 1;
        self.slots.insert(obj_ref, Slot::Resolved(value));
        obj_ref
    }

    /// Overwrite an existing entry in place
    pub fn replace(&mut self, obj_ref: ObjRef, value: PdfValue) {
        self.slots.insert(obj_ref, Slot::Resolved(value));
    }

    pub fn contains(&self, obj_ref: ObjRef) -> bool {
        self.slots.contains_key(&obj_ref)
    }

    /// Resolve a reference to its value, parsing and caching on first use.
    /// Re-entering an in-flight resolution is a reference cycle.
    pub fn resolve(&mut self, obj_ref: ObjRef) -> Result<PdfValue> {
        match self.slots.get(&obj_ref) {
            None => Err(PdfError::DanglingReference(obj_ref.0, obj_ref.1)),
            Some(Slot::Resolved(value)) => Ok(value.clone()),
            Some(Slot::InProgress) => Err(PdfError::CyclicReference(obj_ref.0, obj_ref.1)),
            Some(Slot::Unread(offset)) => {
                let offset = *offset;
                self.slots.insert(obj_ref, Slot::InProgress);
                match self.parse_at(obj_ref, offset) {
                    Ok(value) => {
                        self.slots.insert(obj_ref, Slot::Resolved(value.clone()));
                        Ok(value)
                    }
                    Err(e) => {
                        self.slots.insert(obj_ref, Slot::Unread(offset));
                        Err(e)
                    }
                }
            }
            Some(Slot::InStream { stream_num, index }) => {
                let (stream_num, index) = (*stream_num, *index);
                self.slots.insert(obj_ref, Slot::InProgress);
                match self.parse_from_object_stream(obj_ref, stream_num, index) {
                    Ok(value) => {
                        self.slots.insert(obj_ref, Slot::Resolved(value.clone()));
                        Ok(value)
                    }
                    Err(e) => {
                        self.slots
                            .insert(obj_ref, Slot::InStream { stream_num, index });
                        Err(e)
                    }
                }
            }
        }
    }

    /// Resolve when the value is a reference; pass other values through
    pub fn resolve_value(&mut self, value: &PdfValue) -> Result<PdfValue> {
        match value {
            PdfValue::Reference(num, gen) => self.resolve((*num, *gen)),
            other => Ok(other.clone()),
        }
    }

    /// Mutable access to an already-resolved entry
    pub fn get_resolved_mut(&mut self, obj_ref: ObjRef) -> Option<&mut PdfValue> {
        match self.slots.get_mut(&obj_ref) {
            Some(Slot::Resolved(value)) => Some(value),
            _ => None,
        }
    }

    fn parse_at(&self, obj_ref: ObjRef, offset: u64) -> Result<PdfValue> {
        let mut parser = ObjectParser::new(&self.data, offset as usize);
        let (found_ref, value) = parser.parse_indirect_object()?;
        if found_ref != obj_ref {
            return Err(PdfError::InvalidStructure(format!(
                "object at offset {offset} is {} {} R, expected {} {} R",
                found_ref.0, found_ref.1, obj_ref.0, obj_ref.1
            )));
        }
        Ok(value)
    }

    /// Objects with a type-2 xref entry live inside an object stream:
    /// a header of (number, offset) pairs, then the bodies after /First
    fn parse_from_object_stream(
        &mut self,
        obj_ref: ObjRef,
        stream_num: u32,
        index: u32,
    ) -> Result<PdfValue> {
        let container = self.resolve((stream_num, 0))?;
        let stream = container.as_stream().ok_or_else(|| {
            PdfError::InvalidStructure(format!("object {stream_num} 0 R is not an object stream"))
        })?;

        let count = stream
            .dict
            .get("N")
            .and_then(|v| v.as_integer())
            .ok_or_else(|| {
                PdfError::InvalidStructure("object stream missing /N".to_string())
            })? as u32;
        let first = stream
            .dict
            .get("First")
            .and_then(|v| v.as_integer())
            .ok_or_else(|| {
                PdfError::InvalidStructure("object stream missing /First".to_string())
            })? as usize;

        if index >= count {
            return Err(PdfError::DanglingReference(obj_ref.0, obj_ref.1));
        }

        let decoded = stream.decode()?;
        let mut lexer = Lexer::new(&decoded);
        let mut entry = None;
        for i in 0..count {
            let num = match lexer.next_token()? {
                Token::Integer(n) if n >= 0 => n as u32,
                _ => {
                    return Err(PdfError::InvalidStructure(
                        "malformed object stream header".to_string(),
                    ))
                }
            };
            let off = match lexer.next_token()? {
                Token::Integer(o) if o >= 0 => o as usize,
                _ => {
                    return Err(PdfError::InvalidStructure(
                        "malformed object stream header".to_string(),
                    ))
                }
            };
            if i == index {
                entry = Some((num, off));
            }
        }

        let (num, off) = entry.ok_or(PdfError::DanglingReference(obj_ref.0, obj_ref.1))?;
        if num != obj_ref.0 {
            return Err(PdfError::InvalidStructure(format!(
                "object stream entry {index} is object {num}, expected {}",
                obj_ref.0
            )));
        }

        ObjectParser::new(&decoded, first + off).parse_value()
    }
}

/// One leaf of the page tree, with the attribute values it inherits from
/// ancestor nodes (nearest ancestor wins)
#[derive(Debug, Clone)]
pub struct PageNode {
    obj_ref: ObjRef,
    inherited: PdfDictionary,
}

impl PageNode {
    pub fn obj_ref(&self) -> ObjRef {
        self.obj_ref
    }

    pub fn inherited(&self) -> &PdfDictionary {
        &self.inherited
    }
}

/// Overlay content prepared for stamping onto pages: the shared stream
/// object plus the operator bytes and resources needed to re-materialise
/// it when a resource-name collision forces a per-page copy
pub struct PageOverlay {
    stream_ref: ObjRef,
    ops: Vec<u8>,
    resources: PdfDictionary,
}

/// A PDF document: the object table, the catalog, and the flattened page
/// list in reading order
#[derive(Debug)]
pub struct Document {
    table: ObjectTable,
    version: String,
    catalog_ref: ObjRef,
    info_ref: Option<ObjRef>,
    pages: Vec<PageNode>,
}

impl Document {
    /// Parse a document from raw bytes
    pub fn load(bytes: Vec<u8>) -> Result<Self> {
        let version = parse_header(&bytes)?;
        let xref = XRefTable::parse(&bytes)?;

        let catalog_ref = xref
            .trailer()
            .get("Root")
            .and_then(|v| v.as_reference())
            .ok_or_else(|| {
                PdfError::InvalidStructure("trailer /Root is not a reference".to_string())
            })?;
        let info_ref = xref.trailer().get("Info").and_then(|v| v.as_reference());

        let mut table = ObjectTable::from_xref(bytes, &xref);

        let catalog = table.resolve(catalog_ref)?;
        let catalog_dict = catalog.as_dict().ok_or_else(|| {
            PdfError::InvalidStructure("catalog is not a dictionary".to_string())
        })?;
        let pages_ref = catalog_dict
            .get("Pages")
            .and_then(|v| v.as_reference())
            .ok_or_else(|| {
                PdfError::InvalidStructure("catalog /Pages is not a reference".to_string())
            })?;

        let mut pages = Vec::new();
        let mut path = Vec::new();
        collect_pages(
            &mut table,
            pages_ref,
            PdfDictionary::new(),
            &mut path,
            &mut pages,
        )?;

        Ok(Document {
            table,
            version,
            catalog_ref,
            info_ref,
            pages,
        })
    }

    /// Build an empty document: catalog, pages root, letter-size MediaBox
    pub fn create() -> Self {
        let mut table = ObjectTable::empty();

        let mut pages_dict = PdfDictionary::new();
        pages_dict.insert("Type", PdfValue::Name(crate::objects::PdfName::new("Pages")));
        pages_dict.insert("Kids", PdfValue::Array(PdfArray::new()));
        pages_dict.insert("Count", PdfValue::Integer(0));
        pages_dict.insert(
            "MediaBox",
            PdfValue::Array(PdfArray(vec![
                PdfValue::Integer(0),
                PdfValue::Integer(0),
                PdfValue::Integer(612),
                PdfValue::Integer(792),
            ])),
        );
        let pages_ref = table.insert(PdfValue::Dictionary(pages_dict));

        let mut catalog = PdfDictionary::new();
        catalog.insert("Type", PdfValue::Name(crate::objects::PdfName::new("Catalog")));
        catalog.insert("Pages", PdfValue::Reference(pages_ref.0, pages_ref.1));
        let catalog_ref = table.insert(PdfValue::Dictionary(catalog));

        Document {
            table,
            version: "1.7".to_string(),
            catalog_ref,
            info_ref: None,
            pages: Vec::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn catalog_ref(&self) -> ObjRef {
        self.catalog_ref
    }

    pub fn info_ref(&self) -> Option<ObjRef> {
        self.info_ref
    }

    /// Read-only view of the flattened page list, in reading order
    pub fn pages(&self) -> &[PageNode] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_at(&self, index: usize) -> Result<&PageNode> {
        self.pages.get(index).ok_or(PdfError::PageIndexOutOfBounds {
            index,
            count: self.pages.len(),
        })
    }

    pub(crate) fn table_mut(&mut self) -> &mut ObjectTable {
        &mut self.table
    }

    /// Resolve a reference from this document's table
    pub fn resolve(&mut self, obj_ref: ObjRef) -> Result<PdfValue> {
        self.table.resolve(obj_ref)
    }

    /// The page dictionary with inherited attributes filled in and the
    /// Parent link dropped; this is what gets serialized
    pub(crate) fn effective_page_dict(&mut self, index: usize) -> Result<PdfDictionary> {
        let node = self.page_at(index)?.clone();
        let value = self.table.resolve(node.obj_ref)?;
        let mut dict = value
            .as_dict()
            .cloned()
            .ok_or_else(|| PdfError::InvalidStructure("page is not a dictionary".to_string()))?;
        dict.remove("Parent");
        for key in INHERITABLE_KEYS {
            if !dict.contains_key(key) {
                if let Some(v) = node.inherited.get(key) {
                    dict.insert(key, v.clone());
                }
            }
        }
        Ok(dict)
    }

    /// Width and height in points from the resolved MediaBox, applying the
    /// inheritance rule
    pub fn page_dimensions(&mut self, index: usize) -> Result<(f64, f64)> {
        let node = self.page_at(index)?.clone();
        let value = self.table.resolve(node.obj_ref)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| PdfError::InvalidStructure("page is not a dictionary".to_string()))?;

        let media_box = match dict.get("MediaBox") {
            Some(v) => self.table.resolve_value(v)?,
            None => match node.inherited.get("MediaBox") {
                Some(v) => self.table.resolve_value(v)?,
                None => {
                    return Err(PdfError::InvalidStructure(format!(
                        "page {index} has no MediaBox"
                    )))
                }
            },
        };

        let array = media_box.as_array().ok_or_else(|| {
            PdfError::InvalidStructure("MediaBox is not an array".to_string())
        })?;
        if array.len() != 4 {
            return Err(PdfError::InvalidStructure(
                "MediaBox must have four numbers".to_string(),
            ));
        }

        let mut corners = [0.0f64; 4];
        for (i, value) in array.0.iter().enumerate() {
            let resolved = self.table.resolve_value(value)?;
            corners[i] = resolved.as_real().ok_or_else(|| {
                PdfError::InvalidStructure("MediaBox entry is not a number".to_string())
            })?;
        }

        Ok(((corners[2] - corners[0]).abs(), (corners[3] - corners[1]).abs()))
    }

    /// The Info dictionary, empty when the document has none
    pub fn metadata(&mut self) -> Result<PdfDictionary> {
        match self.info_ref {
            None => Ok(PdfDictionary::new()),
            Some(info_ref) => {
                let value = self.table.resolve(info_ref)?;
                value.as_dict().cloned().ok_or_else(|| {
                    PdfError::InvalidStructure("Info is not a dictionary".to_string())
                })
            }
        }
    }

    /// Install a fresh Info dictionary
    pub fn set_info(&mut self, info: PdfDictionary) {
        let info_ref = self.table.insert(PdfValue::Dictionary(info));
        self.info_ref = Some(info_ref);
    }

    /// Append a page dictionary as a new leaf at the end of the page list
    pub fn add_page(&mut self, dict: PdfDictionary) -> ObjRef {
        let obj_ref = self.table.insert(PdfValue::Dictionary(dict));
        self.pages.push(PageNode {
            obj_ref,
            inherited: PdfDictionary::new(),
        });
        obj_ref
    }

    /// Register a content stream object
    pub fn add_stream(&mut self, mut dict: PdfDictionary, data: Vec<u8>) -> ObjRef {
        dict.insert("Length", PdfValue::Integer(data.len() as i64));
        self.table.insert(PdfValue::Stream(PdfStream { dict, data }))
    }

    /// Deep-clone pages from another document into this one at `at_index`.
    ///
    /// Each source page subtree is copied under fresh object numbers with
    /// references remapped; inherited attributes are flattened onto the
    /// clone since it leaves its original tree. This is the primitive merge
    /// and split reduce to.
    pub fn insert_pages(
        &mut self,
        at_index: usize,
        page_indices: &[usize],
        source: &mut Document,
    ) -> Result<()> {
        if at_index > self.pages.len() {
            return Err(PdfError::PageIndexOutOfBounds {
                index: at_index,
                count: self.pages.len(),
            });
        }
        for &idx in page_indices {
            if idx >= source.page_count() {
                return Err(PdfError::PageIndexOutOfBounds {
                    index: idx,
                    count: source.page_count(),
                });
            }
        }

        let mut ref_map: HashMap<ObjRef, ObjRef> = HashMap::new();
        let mut new_nodes = Vec::with_capacity(page_indices.len());

        for &idx in page_indices {
            let node = source.pages[idx].clone();
            let value = source.table.resolve(node.obj_ref)?;
            let mut dict = value.as_dict().cloned().ok_or_else(|| {
                PdfError::InvalidStructure("page is not a dictionary".to_string())
            })?;

            // The clone leaves its tree: drop the Parent link and flatten
            // what the page used to inherit
            dict.remove("Parent");
            for key in INHERITABLE_KEYS {
                if !dict.contains_key(key) {
                    if let Some(v) = node.inherited.get(key) {
                        dict.insert(key, v.clone());
                    }
                }
            }

            // Reserve the clone's number first so references back to the
            // page (annotations' /P and the like) land on the clone
            let new_ref = self.table.insert(PdfValue::Null);
            ref_map.insert(node.obj_ref, new_ref);
            let cloned = deep_clone_value(
                &mut self.table,
                &mut source.table,
                &PdfValue::Dictionary(dict),
                &mut ref_map,
            )?;
            self.table.replace(new_ref, cloned);

            new_nodes.push(PageNode {
                obj_ref: new_ref,
                inherited: PdfDictionary::new(),
            });
        }

        self.pages.splice(at_index..at_index, new_nodes);
        Ok(())
    }

    /// Remove pages from the list. Orphaned objects stay in the table;
    /// serialization prunes everything unreachable.
    pub fn remove_pages(&mut self, range: std::ops::Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.pages.len() {
            return Err(PdfError::PageIndexOutOfBounds {
                index: range.end,
                count: self.pages.len(),
            });
        }
        self.pages.drain(range);
        Ok(())
    }

    /// Add a viewer-level rotation to one page. The angle must be a
    /// multiple of 90 and combines with the page's existing rotation
    /// modulo 360; content-stream coordinates are untouched.
    pub fn rotate_page(&mut self, index: usize, degrees: i32) -> Result<()> {
        let normalized = normalize_rotation(degrees)?;
        let node = self.page_at(index)?.clone();

        let value = self.table.resolve(node.obj_ref)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| PdfError::InvalidStructure("page is not a dictionary".to_string()))?;

        let current = match dict.get("Rotate") {
            Some(v) => self.table.resolve_value(v)?.as_integer().unwrap_or(0),
            None => match node.inherited.get("Rotate") {
                Some(v) => self.table.resolve_value(v)?.as_integer().unwrap_or(0),
                None => 0,
            },
        } as i32;

        let updated = (current + normalized).rem_euclid(360);

        match self.table.get_resolved_mut(node.obj_ref) {
            Some(PdfValue::Dictionary(dict)) => {
                dict.insert("Rotate", PdfValue::Integer(updated as i64));
                Ok(())
            }
            _ => Err(PdfError::InvalidStructure(
                "page is not a dictionary".to_string(),
            )),
        }
    }

    /// Register overlay content once so every page can share the stream
    /// object by reference
    pub fn build_overlay(&mut self, ops: Vec<u8>, resources: PdfDictionary) -> PageOverlay {
        let stream_ref = self.add_stream(PdfDictionary::new(), ops.clone());
        PageOverlay {
            stream_ref,
            ops,
            resources,
        }
    }

    /// Append overlay content to a page: the overlay stream joins the end
    /// of the Contents chain (drawn last, so on top) and the overlay's
    /// resources merge into the page's, renaming on collision. Pages with
    /// a collision get their own copy of the stream with the operator
    /// names rewritten; all others share one object.
    pub fn overlay_page(&mut self, index: usize, overlay: &PageOverlay) -> Result<()> {
        let node = self.page_at(index)?.clone();
        let value = self.table.resolve(node.obj_ref)?;
        let mut dict = value
            .as_dict()
            .cloned()
            .ok_or_else(|| PdfError::InvalidStructure("page is not a dictionary".to_string()))?;

        // Materialise the page's resources (explicit or inherited)
        let mut resources = match dict.get("Resources") {
            Some(v) => {
                let resolved = self.table.resolve_value(v)?;
                resolved.as_dict().cloned().ok_or_else(|| {
                    PdfError::InvalidStructure("Resources is not a dictionary".to_string())
                })?
            }
            None => match node.inherited.get("Resources") {
                Some(v) => {
                    let resolved = self.table.resolve_value(v)?;
                    resolved.as_dict().cloned().ok_or_else(|| {
                        PdfError::InvalidStructure("Resources is not a dictionary".to_string())
                    })?
                }
                None => PdfDictionary::new(),
            },
        };

        let mut renames: Vec<(String, String)> = Vec::new();
        for (category, incoming) in &overlay.resources.0 {
            let incoming_dict = incoming.as_dict().ok_or_else(|| {
                PdfError::InvalidStructure("overlay resource category is not a dictionary".to_string())
            })?;

            let mut target = match resources.get(category.as_str()) {
                Some(v) => {
                    let resolved = self.table.resolve_value(v)?;
                    resolved.as_dict().cloned().ok_or_else(|| {
                        PdfError::InvalidStructure(
                            "resource category is not a dictionary".to_string(),
                        )
                    })?
                }
                None => PdfDictionary::new(),
            };

            for (name, value) in &incoming_dict.0 {
                match target.get(name.as_str()) {
                    Some(existing) if existing != value => {
                        let fresh = fresh_resource_name(name.as_str(), &target, incoming_dict);
                        renames.push((name.as_str().to_string(), fresh.clone()));
                        target.insert(fresh, value.clone());
                    }
                    _ => target.insert(name.as_str(), value.clone()),
                }
            }

            resources.insert(category.as_str(), PdfValue::Dictionary(target));
        }

        // A collision means the shared stream's operator names no longer
        // match this page's resources, so it gets a rewritten private copy
        let stream_ref = if renames.is_empty() {
            overlay.stream_ref
        } else {
            let rewritten = rename_in_ops(&overlay.ops, &renames);
            self.add_stream(PdfDictionary::new(), rewritten)
        };

        let mut contents: Vec<PdfValue> = match dict.get("Contents") {
            None => Vec::new(),
            Some(PdfValue::Array(array)) => array.0.clone(),
            Some(PdfValue::Reference(num, gen)) => {
                let resolved = self.table.resolve((*num, *gen))?;
                match resolved {
                    PdfValue::Array(array) => array.0,
                    PdfValue::Stream(_) => vec![PdfValue::Reference(*num, *gen)],
                    _ => {
                        return Err(PdfError::InvalidStructure(
                            "Contents is neither a stream nor an array".to_string(),
                        ))
                    }
                }
            }
            Some(_) => {
                return Err(PdfError::InvalidStructure(
                    "Contents is neither a stream nor an array".to_string(),
                ))
            }
        };
        contents.push(PdfValue::Reference(stream_ref.0, stream_ref.1));

        dict.insert("Contents", PdfValue::Array(PdfArray(contents)));
        dict.insert("Resources", PdfValue::Dictionary(resources));
        self.table.replace(node.obj_ref, PdfValue::Dictionary(dict));
        Ok(())
    }

    /// Import a dictionary (typically resources) from another document,
    /// deep-cloning everything it references into this table
    pub fn import_dictionary(
        &mut self,
        source: &mut Document,
        dict: &PdfDictionary,
    ) -> Result<PdfDictionary> {
        let mut ref_map = HashMap::new();
        let cloned = deep_clone_value(
            &mut self.table,
            &mut source.table,
            &PdfValue::Dictionary(dict.clone()),
            &mut ref_map,
        )?;
        match cloned {
            PdfValue::Dictionary(d) => Ok(d),
            _ => Err(PdfError::InvalidStructure(
                "imported resources are not a dictionary".to_string(),
            )),
        }
    }

    /// Serialize the live object graph to PDF bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        crate::writer::PdfWriter::new(&mut buffer).write_document(self)?;
        Ok(buffer)
    }
}

/// Normalize a rotation to {0, 90, 180, 270}; anything that is not a
/// multiple of 90 is rejected before any mutation happens
pub fn normalize_rotation(degrees: i32) -> Result<i32> {
    if degrees % 90 != 0 {
        return Err(PdfError::InvalidAngle(degrees));
    }
    Ok(degrees.rem_euclid(360))
}

/// Depth-first page tree traversal in Kids order, carrying inherited
/// attributes (nearest ancestor wins) and detecting cycles via the path
fn collect_pages(
    table: &mut ObjectTable,
    node_ref: ObjRef,
    inherited: PdfDictionary,
    path: &mut Vec<ObjRef>,
    out: &mut Vec<PageNode>,
) -> Result<()> {
    if path.contains(&node_ref) {
        return Err(PdfError::CyclicPageTree(node_ref.0, node_ref.1));
    }

    let value = table.resolve(node_ref)?;
    let dict = value
        .as_dict()
        .ok_or_else(|| {
            PdfError::InvalidStructure("page tree node is not a dictionary".to_string())
        })?
        .clone();

    let node_type = dict.get_type().map(str::to_string).unwrap_or_else(|| {
        if dict.contains_key("Kids") {
            "Pages".to_string()
        } else {
            "Page".to_string()
        }
    });

    match node_type.as_str() {
        "Pages" => {
            let mut merged = inherited;
            for key in INHERITABLE_KEYS {
                if let Some(v) = dict.get(key) {
                    merged.insert(key, v.clone());
                }
            }

            let kids = dict
                .get("Kids")
                .and_then(|v| v.as_array())
                .ok_or_else(|| {
                    PdfError::InvalidStructure("Pages node missing /Kids array".to_string())
                })?
                .clone();

            path.push(node_ref);
            for kid in &kids.0 {
                let kid_ref = kid.as_reference().ok_or_else(|| {
                    PdfError::InvalidStructure("Kids entries must be references".to_string())
                })?;
                collect_pages(table, kid_ref, merged.clone(), path, out)?;
            }
            path.pop();
            Ok(())
        }
        "Page" => {
            if !dict.contains_key("MediaBox") && !inherited.contains_key("MediaBox") {
                return Err(PdfError::InvalidStructure(format!(
                    "page {} {} R has no MediaBox, explicit or inherited",
                    node_ref.0, node_ref.1
                )));
            }
            out.push(PageNode {
                obj_ref: node_ref,
                inherited,
            });
            Ok(())
        }
        other => Err(PdfError::InvalidStructure(format!(
            "unexpected page tree node type: {other}"
        ))),
    }
}

/// Clone a value from one table into another, remapping references under
/// fresh object numbers. The memo map both deduplicates shared objects and
/// terminates cycles: a number is reserved before its body is cloned.
fn deep_clone_value(
    dest: &mut ObjectTable,
    source: &mut ObjectTable,
    value: &PdfValue,
    ref_map: &mut HashMap<ObjRef, ObjRef>,
) -> Result<PdfValue> {
    match value {
        PdfValue::Reference(num, gen) => {
            let old_ref = (*num, *gen);
            if let Some(&new_ref) = ref_map.get(&old_ref) {
                return Ok(PdfValue::Reference(new_ref.0, new_ref.1));
            }
            let resolved = source.resolve(old_ref)?;
            let new_ref = dest.insert(PdfValue::Null);
            ref_map.insert(old_ref, new_ref);
            let cloned = deep_clone_value(dest, source, &resolved, ref_map)?;
            dest.replace(new_ref, cloned);
            Ok(PdfValue::Reference(new_ref.0, new_ref.1))
        }
        PdfValue::Array(array) => {
            let mut elements = Vec::with_capacity(array.len());
            for element in &array.0 {
                elements.push(deep_clone_value(dest, source, element, ref_map)?);
            }
            Ok(PdfValue::Array(PdfArray(elements)))
        }
        PdfValue::Dictionary(dict) => {
            let mut cloned = PdfDictionary::new();
            for (key, entry) in &dict.0 {
                cloned.insert(
                    key.as_str(),
                    deep_clone_value(dest, source, entry, ref_map)?,
                );
            }
            Ok(PdfValue::Dictionary(cloned))
        }
        PdfValue::Stream(stream) => {
            let mut cloned_dict = PdfDictionary::new();
            for (key, entry) in &stream.dict.0 {
                cloned_dict.insert(
                    key.as_str(),
                    deep_clone_value(dest, source, entry, ref_map)?,
                );
            }
            Ok(PdfValue::Stream(PdfStream {
                dict: cloned_dict,
                data: stream.data.clone(),
            }))
        }
        primitive => Ok(primitive.clone()),
    }
}

/// Pick a key that collides with neither the page's resources nor the
/// overlay's own
fn fresh_resource_name(
    base: &str,
    target: &PdfDictionary,
    incoming: &PdfDictionary,
) -> String {
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}x{n}");
        if !target.contains_key(&candidate) && !incoming.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Rewrite `/Name` tokens in operator bytes according to the rename list
fn rename_in_ops(ops: &[u8], renames: &[(String, String)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        if ops[i] == b'/' {
            let start = i + 1;
            let mut end = start;
            while end < ops.len()
                && !ops[end].is_ascii_whitespace()
                && !matches!(ops[end], b'/' | b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%')
            {
                end += 1;
            }
            let name = &ops[start..end];
            let replacement = renames
                .iter()
                .find(|(from, _)| from.as_bytes() == name)
                .map(|(_, to)| to.as_str());
            out.push(b'/');
            match replacement {
                Some(to) => out.extend_from_slice(to.as_bytes()),
                None => out.extend_from_slice(name),
            }
            i = end;
        } else {
            out.push(ops[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PdfName;

    /// Assemble a classic-xref file from object bodies, computing offsets
    pub(crate) fn build_pdf(objects: &[(u32, &str)], trailer_extra: &str) -> Vec<u8> {
        let mut body = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (num, obj) in objects {
            offsets.push((*num, body.len()));
            body.extend_from_slice(format!("{num} 0 obj\n{obj}\nendobj\n").as_bytes());
        }

        let xref_offset = body.len();
        let max = objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
        body.extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
        body.extend_from_slice(b"0000000000 65535 f \n");
        for num in 1..=max {
            match offsets.iter().find(|(n, _)| *n == num) {
                Some((_, off)) => {
                    body.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes())
                }
                None => body.extend_from_slice(b"0000000000 00000 f \n"),
            }
        }
        body.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\n",
                max + 1,
                trailer_extra
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
        body
    }

    fn two_page_pdf() -> Vec<u8> {
        build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (
                    2,
                    "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>",
                ),
                (3, "<< /Type /Page /Parent 2 0 R /Contents 5 0 R >>"),
                (
                    4,
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 400] >>",
                ),
                (5, "<< /Length 28 >>\nstream\nBT 10 10 Td (page one) Tj ET\nendstream"),
            ],
            "",
        )
    }

    #[test]
    fn test_load_flattens_pages_in_order() {
        let mut doc = Document::load(two_page_pdf()).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_at(0).unwrap().obj_ref(), (3, 0));
        assert_eq!(doc.page_at(1).unwrap().obj_ref(), (4, 0));
        assert!(matches!(
            doc.page_at(2),
            Err(PdfError::PageIndexOutOfBounds { index: 2, count: 2 })
        ));
        assert_eq!(doc.version(), "1.7");
    }

    #[test]
    fn test_page_dimensions_inheritance() {
        let mut doc = Document::load(two_page_pdf()).unwrap();
        // Page 0 inherits the tree-level MediaBox
        assert_eq!(doc.page_dimensions(0).unwrap(), (612.0, 792.0));
        // Page 1 overrides it
        assert_eq!(doc.page_dimensions(1).unwrap(), (200.0, 400.0));
    }

    #[test]
    fn test_nested_tree_traversal_order() {
        let data = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (
                    2,
                    "<< /Type /Pages /Kids [3 0 R 6 0 R] /Count 3 /MediaBox [0 0 612 792] >>",
                ),
                (3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 5 0 R] /Count 2 >>"),
                (4, "<< /Type /Page /Parent 3 0 R >>"),
                (5, "<< /Type /Page /Parent 3 0 R >>"),
                (6, "<< /Type /Page /Parent 2 0 R >>"),
            ],
            "",
        );
        let doc = Document::load(data).unwrap();
        let order: Vec<u32> = doc.pages().iter().map(|p| p.obj_ref().0).collect();
        assert_eq!(order, vec![4, 5, 6]);
    }

    #[test]
    fn test_cyclic_page_tree_detected() {
        let data = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (
                    2,
                    "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
                ),
                (3, "<< /Type /Pages /Parent 2 0 R /Kids [2 0 R] /Count 1 >>"),
            ],
            "",
        );
        assert!(matches!(
            Document::load(data),
            Err(PdfError::CyclicPageTree(2, 0))
        ));
    }

    #[test]
    fn test_dangling_reference() {
        let data = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (
                    2,
                    "<< /Type /Pages /Kids [9 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
                ),
            ],
            "",
        );
        assert!(matches!(
            Document::load(data),
            Err(PdfError::DanglingReference(9, 0))
        ));
    }

    #[test]
    fn test_page_without_mediabox_rejected() {
        let data = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
                (3, "<< /Type /Page /Parent 2 0 R >>"),
            ],
            "",
        );
        assert!(matches!(
            Document::load(data),
            Err(PdfError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_rotate_page_accumulates() {
        let mut doc = Document::load(two_page_pdf()).unwrap();
        doc.rotate_page(0, 90).unwrap();
        doc.rotate_page(0, 90).unwrap();

        let value = doc.resolve((3, 0)).unwrap();
        assert_eq!(
            value.as_dict().unwrap().get("Rotate").unwrap().as_integer(),
            Some(180)
        );
    }

    #[test]
    fn test_rotate_full_circle_restores() {
        let mut doc = Document::load(two_page_pdf()).unwrap();
        for _ in 0..4 {
            doc.rotate_page(0, 90).unwrap();
        }
        let value = doc.resolve((3, 0)).unwrap();
        assert_eq!(
            value.as_dict().unwrap().get("Rotate").unwrap().as_integer(),
            Some(0)
        );
    }

    #[test]
    fn test_rotate_rejects_non_multiple_of_90() {
        let mut doc = Document::load(two_page_pdf()).unwrap();
        assert!(matches!(
            doc.rotate_page(0, 91),
            Err(PdfError::InvalidAngle(91))
        ));
        // 450 normalizes to 90 and is accepted
        doc.rotate_page(0, 450).unwrap();
        let value = doc.resolve((3, 0)).unwrap();
        assert_eq!(
            value.as_dict().unwrap().get("Rotate").unwrap().as_integer(),
            Some(90)
        );
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0).unwrap(), 0);
        assert_eq!(normalize_rotation(450).unwrap(), 90);
        assert_eq!(normalize_rotation(-90).unwrap(), 270);
        assert!(normalize_rotation(45).is_err());
    }

    #[test]
    fn test_insert_pages_clones_subtree() {
        let mut source = Document::load(two_page_pdf()).unwrap();
        let mut dest = Document::create();

        dest.insert_pages(0, &[0, 1], &mut source).unwrap();
        assert_eq!(dest.page_count(), 2);

        // The clone carries the flattened MediaBox
        assert_eq!(dest.page_dimensions(0).unwrap(), (612.0, 792.0));
        assert_eq!(dest.page_dimensions(1).unwrap(), (200.0, 400.0));

        // Contents of page 0 was cloned under a fresh number in dest
        let page_ref = dest.page_at(0).unwrap().obj_ref();
        let page = dest.resolve(page_ref).unwrap();
        let contents_ref = page
            .as_dict()
            .unwrap()
            .get("Contents")
            .unwrap()
            .as_reference()
            .unwrap();
        let contents = dest.resolve(contents_ref).unwrap();
        assert!(contents.as_stream().unwrap().data.starts_with(b"BT"));

        // Source untouched
        assert_eq!(source.page_count(), 2);
    }

    #[test]
    fn test_insert_pages_splice_position() {
        let mut a = Document::load(two_page_pdf()).unwrap();
        let mut b = Document::load(two_page_pdf()).unwrap();
        // Insert b's second page between a's two pages
        let mut dest = Document::create();
        dest.insert_pages(0, &[0, 1], &mut a).unwrap();
        dest.insert_pages(1, &[1], &mut b).unwrap();

        assert_eq!(dest.page_count(), 3);
        assert_eq!(dest.page_dimensions(0).unwrap(), (612.0, 792.0));
        assert_eq!(dest.page_dimensions(1).unwrap(), (200.0, 400.0));
        assert_eq!(dest.page_dimensions(2).unwrap(), (200.0, 400.0));
    }

    #[test]
    fn test_remove_pages() {
        let mut doc = Document::load(two_page_pdf()).unwrap();
        doc.remove_pages(0..1).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_at(0).unwrap().obj_ref(), (4, 0));
        assert!(doc.remove_pages(0..5).is_err());
    }

    #[test]
    fn test_overlay_page_appends_contents_and_merges_resources() {
        let mut doc = Document::load(two_page_pdf()).unwrap();

        let mut font_dict = PdfDictionary::new();
        font_dict.insert("Fwm1", PdfValue::Name(PdfName::new("Helvetica")));
        let mut resources = PdfDictionary::new();
        resources.insert("Font", PdfValue::Dictionary(font_dict));

        let overlay = doc.build_overlay(b"BT /Fwm1 50 Tf (DRAFT) Tj ET".to_vec(), resources);
        doc.overlay_page(0, &overlay).unwrap();
        doc.overlay_page(1, &overlay).unwrap();

        // Page 0 had a stream reference: now an array of two
        let page = doc.resolve((3, 0)).unwrap();
        let contents = page.as_dict().unwrap().get("Contents").unwrap().clone();
        let array = contents.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(0).unwrap().as_reference(), Some((5, 0)));
        // Both pages share the overlay stream object
        let page2 = doc.resolve((4, 0)).unwrap();
        let contents2 = page2.as_dict().unwrap().get("Contents").unwrap().clone();
        assert_eq!(
            array.get(1).unwrap().as_reference(),
            contents2.as_array().unwrap().get(0).unwrap().as_reference()
        );

        // Resources got the font entry
        let fonts = page
            .as_dict()
            .unwrap()
            .get("Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get("Font")
            .unwrap()
            .clone();
        assert!(fonts.as_dict().unwrap().contains_key("Fwm1"));
    }

    #[test]
    fn test_overlay_collision_renames_and_copies() {
        let data = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (
                    2,
                    "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
                ),
                (
                    3,
                    "<< /Type /Page /Parent 2 0 R /Resources << /Font << /Fwm1 /Courier >> >> >>",
                ),
            ],
            "",
        );
        let mut doc = Document::load(data).unwrap();

        let mut font_dict = PdfDictionary::new();
        font_dict.insert("Fwm1", PdfValue::Name(PdfName::new("Helvetica")));
        let mut resources = PdfDictionary::new();
        resources.insert("Font", PdfValue::Dictionary(font_dict));

        let overlay = doc.build_overlay(b"BT /Fwm1 50 Tf (DRAFT) Tj ET".to_vec(), resources);
        doc.overlay_page(0, &overlay).unwrap();

        let page = doc.resolve((3, 0)).unwrap();
        let page_dict = page.as_dict().unwrap();
        let fonts = page_dict
            .get("Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get("Font")
            .unwrap()
            .clone();
        let fonts = fonts.as_dict().unwrap();

        // Original entry kept, incoming renamed
        assert_eq!(
            fonts.get("Fwm1").unwrap().as_name().unwrap().as_str(),
            "Courier"
        );
        assert!(fonts.contains_key("Fwm1x1"));

        // The page's overlay stream was rewritten to use the new name
        let contents = page_dict.get("Contents").unwrap().as_array().unwrap().clone();
        let overlay_ref = contents.0.last().unwrap().as_reference().unwrap();
        let stream = doc.resolve(overlay_ref).unwrap();
        let ops = stream.as_stream().unwrap().data.clone();
        assert!(ops.windows(7).any(|w| w == b"/Fwm1x1"));
    }

    #[test]
    fn test_metadata_from_info() {
        let data = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (
                    2,
                    "<< /Type /Pages /Kids [] /Count 0 /MediaBox [0 0 612 792] >>",
                ),
                (3, "<< /Title (Test Doc) /Author (Someone) >>"),
            ],
            "/Info 3 0 R",
        );
        let mut doc = Document::load(data).unwrap();
        let metadata = doc.metadata().unwrap();
        assert_eq!(
            metadata.get("Title").unwrap().as_string().unwrap().to_text(),
            "Test Doc"
        );
    }

    #[test]
    fn test_create_skeleton() {
        let mut doc = Document::create();
        assert_eq!(doc.page_count(), 0);
        let catalog = doc.resolve(doc.catalog_ref()).unwrap();
        assert_eq!(catalog.as_dict().unwrap().get_type(), Some("Catalog"));
    }

    #[test]
    fn test_object_table_growth_only() {
        let mut doc = Document::create();
        let first = doc.table_mut().insert(PdfValue::Integer(1));
        let second = doc.table_mut().insert(PdfValue::Integer(2));
        assert!(second.0 > first.0);
    }

    #[test]
    fn test_rename_in_ops() {
        let ops = b"BT /F1 12 Tf (x) Tj /F12 9 Tf ET";
        let renamed = rename_in_ops(ops, &[("F1".to_string(), "F9".to_string())]);
        // /F1 replaced, /F12 untouched (token-aware, not substring)
        assert_eq!(&renamed, b"BT /F9 12 Tf (x) Tj /F12 9 Tf ET");
    }
}
