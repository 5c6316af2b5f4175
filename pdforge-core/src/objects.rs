//! PDF object model
//!
//! One tagged value type covers every object the engine handles, whether it
//! came out of the parser or was built for serialization.

use crate::error::Result;
use std::collections::HashMap;

/// PDF Name object (written `/Foo`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

/// PDF String object; raw bytes, not assumed to be UTF-8
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

/// PDF Array object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfArray(pub Vec<PdfValue>);

/// PDF Dictionary object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub HashMap<PdfName, PdfValue>);

/// PDF Stream object: a dictionary plus its raw (possibly filtered) payload
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

/// Reference to an indirect object: (object number, generation number)
pub type ObjRef = (u32, u16);

/// PDF object values
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(u32, u16),
}

impl PdfValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PdfValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as real number; integers coerce
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfValue::Real(r) => Some(*r),
            PdfValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfValue::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as dictionary; a stream exposes its dictionary
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfValue::Dictionary(d) => Some(d),
            PdfValue::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfValue::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjRef> {
        match self {
            PdfValue::Reference(num, gen) => Some((*num, *gen)),
            _ => None,
        }
    }
}

impl PdfDictionary {
    pub fn new() -> Self {
        PdfDictionary(HashMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&PdfValue> {
        self.0.get(&PdfName(key.to_string()))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PdfValue> {
        self.0.get_mut(&PdfName(key.to_string()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PdfValue) {
        self.0.insert(PdfName(key.into()), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfValue> {
        self.0.remove(&PdfName(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&PdfName(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the /Type key, if it is a name
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type")
            .and_then(|obj| obj.as_name())
            .map(|n| n.0.as_str())
    }
}

impl PdfArray {
    pub fn new() -> Self {
        PdfArray(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfValue> {
        self.0.get(index)
    }

    pub fn push(&mut self, value: PdfValue) {
        self.0.push(value);
    }
}

impl Default for PdfArray {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfStream {
    pub fn new(dict: PdfDictionary, data: Vec<u8>) -> Self {
        PdfStream { dict, data }
    }

    /// Decode the payload through the /Filter chain
    pub fn decode(&self) -> Result<Vec<u8>> {
        crate::parser::filters::decode_stream(&self.data, &self.dict)
    }

    /// Raw (possibly compressed) payload
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

impl PdfString {
    pub fn new(data: Vec<u8>) -> Self {
        PdfString(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Best-effort text decoding: UTF-16BE when the BOM is present,
    /// Latin-1 otherwise. Used for Info dictionary values.
    pub fn to_text(&self) -> String {
        let bytes = &self.0;
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let units: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        PdfName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
