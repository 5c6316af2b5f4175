//! PDF cross-reference parsing
//!
//! Builds the object-number to byte-offset index from classic xref tables,
//! cross-reference streams, or both (hybrid-reference files). Incremental
//! updates are merged by following the /Prev chain, with later tables taking
//! precedence for duplicate object numbers.

use super::lexer::{Lexer, Token};
use super::objects::ObjectParser;
use crate::error::{PdfError, Result};
use crate::objects::{PdfDictionary, PdfValue};
use std::collections::{HashMap, HashSet};

/// One entry in the cross-reference index
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XRefEntry {
    /// Free object
    Free,
    /// Uncompressed object at a byte offset
    Offset { offset: u64, generation: u16 },
    /// Object stored inside an object stream
    InStream { stream_num: u32, index: u32 },
}

/// Merged cross-reference index plus the (merged) trailer dictionary
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: PdfDictionary,
}

impl XRefTable {
    /// Parse the cross-reference index of a whole file
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut table = XRefTable {
            entries: HashMap::new(),
            trailer: PdfDictionary::new(),
        };

        let start = find_startxref(data)?;
        let mut next_offset = Some(start);
        let mut visited: HashSet<u64> = HashSet::new();
        let mut first_section = true;

        while let Some(offset) = next_offset {
            // A /Prev loop would otherwise never terminate
            if !visited.insert(offset) {
                break;
            }

            let section = match parse_section(data, offset) {
                Ok(section) => section,
                Err(_) if first_section => return Err(PdfError::MissingXref),
                Err(e) => return Err(e),
            };
            first_section = false;

            for (num, entry) in section.entries {
                table.entries.entry(num).or_insert(entry);
            }
            for (key, value) in section.trailer.0 {
                if !table.trailer.0.contains_key(&key) {
                    table.trailer.0.insert(key, value);
                }
            }

            // Hybrid-reference files point at a parallel xref stream
            if let Some(stm_offset) = section.xref_stm {
                if visited.insert(stm_offset) {
                    let stm = parse_stream_section(data, stm_offset)?;
                    for (num, entry) in stm.entries {
                        table.entries.entry(num).or_insert(entry);
                    }
                }
            }

            next_offset = section.prev;
        }

        if table.trailer.get("Root").is_none() {
            return Err(PdfError::MissingXref);
        }

        Ok(table)
    }

    pub fn get(&self, obj_num: u32) -> Option<&XRefEntry> {
        self.entries.get(&obj_num)
    }

    pub fn trailer(&self) -> &PdfDictionary {
        &self.trailer
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XRefEntry)> {
        self.entries.iter()
    }

    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }
}

/// Parsed form of one xref section (classic or stream)
struct Section {
    entries: Vec<(u32, XRefEntry)>,
    trailer: PdfDictionary,
    prev: Option<u64>,
    xref_stm: Option<u64>,
}

/// Locate the byte offset recorded after the final `startxref`
fn find_startxref(data: &[u8]) -> Result<u64> {
    const TAIL: usize = 1024;
    let tail_start = data.len().saturating_sub(TAIL);
    let tail = &data[tail_start..];

    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(PdfError::MissingXref)?;

    let mut lexer = Lexer::at(data, tail_start + pos + keyword.len());
    match lexer.next_token() {
        Ok(Token::Integer(offset)) if offset >= 0 && (offset as usize) < data.len() => {
            Ok(offset as u64)
        }
        _ => Err(PdfError::MissingXref),
    }
}

fn parse_section(data: &[u8], offset: u64) -> Result<Section> {
    let mut lexer = Lexer::at(data, offset as usize);
    let save = lexer.position();
    match lexer.next_token() {
        Ok(Token::Xref) => parse_classic_section(data, lexer.position()),
        _ => {
            lexer.seek(save);
            parse_stream_section(data, offset)
        }
    }
}

/// Classic `xref` table: subsections of fixed-format entries, then `trailer`
fn parse_classic_section(data: &[u8], after_keyword: usize) -> Result<Section> {
    let mut lexer = Lexer::at(data, after_keyword);
    let mut entries = Vec::new();

    loop {
        let save = lexer.position();
        match lexer.next_token()? {
            Token::Trailer => {
                lexer.seek(save);
                break;
            }
            Token::Integer(first) if first >= 0 => {
                let count = match lexer.next_token()? {
                    Token::Integer(c) if c >= 0 => c as u32,
                    other => {
                        return Err(PdfError::MalformedToken {
                            offset: lexer.position(),
                            message: format!("expected subsection count, found {other:?}"),
                        })
                    }
                };
                let mut pos = lexer.position();
                for i in 0..count {
                    let (entry, next) = parse_table_entry(data, pos)?;
                    entries.push((first as u32 + i, entry));
                    pos = next;
                }
                lexer.seek(pos);
            }
            other => {
                return Err(PdfError::MalformedToken {
                    offset: lexer.position(),
                    message: format!("expected xref subsection or trailer, found {other:?}"),
                })
            }
        }
    }

    // Consume `trailer` and parse the dictionary after it
    let pos = parser_skip_trailer_keyword(data, lexer.position())?;
    let mut parser = ObjectParser::new(data, pos);
    let trailer = match parser.parse_value()? {
        PdfValue::Dictionary(d) => d,
        _ => {
            return Err(PdfError::InvalidStructure(
                "trailer is not a dictionary".to_string(),
            ))
        }
    };

    let prev = trailer
        .get("Prev")
        .and_then(|v| v.as_integer())
        .map(|v| v as u64);
    let xref_stm = trailer
        .get("XRefStm")
        .and_then(|v| v.as_integer())
        .map(|v| v as u64);

    Ok(Section {
        entries,
        trailer,
        prev,
        xref_stm,
    })
}

fn parser_skip_trailer_keyword(data: &[u8], position: usize) -> Result<usize> {
    let mut lexer = Lexer::at(data, position);
    match lexer.next_token()? {
        Token::Trailer => Ok(lexer.position()),
        other => Err(PdfError::MalformedToken {
            offset: position,
            message: format!("expected 'trailer', found {other:?}"),
        }),
    }
}

/// Parse one `nnnnnnnnnn ggggg n|f` entry; returns the entry and the
/// position after it
fn parse_table_entry(data: &[u8], position: usize) -> Result<(XRefEntry, usize)> {
    let (offset_field, pos) = read_field(data, position)?;
    let (gen_field, pos) = read_field(data, pos)?;
    let (flag_field, pos) = read_field(data, pos)?;

    let invalid = |what: &str| PdfError::MalformedToken {
        offset: position,
        message: format!("invalid xref entry {what}"),
    };

    let offset = offset_field.parse::<u64>().map_err(|_| invalid("offset"))?;
    let generation = gen_field.parse::<u16>().map_err(|_| invalid("generation"))?;

    let entry = match flag_field.as_str() {
        "n" => XRefEntry::Offset { offset, generation },
        "f" => XRefEntry::Free,
        _ => return Err(invalid("flag")),
    };

    Ok((entry, pos))
}

/// Read one whitespace-delimited field
fn read_field(data: &[u8], mut position: usize) -> Result<(String, usize)> {
    while position < data.len() && data[position].is_ascii_whitespace() {
        position += 1;
    }
    let start = position;
    while position < data.len() && !data[position].is_ascii_whitespace() {
        position += 1;
    }
    if start == position {
        return Err(PdfError::TruncatedObject {
            offset: position,
            message: "unexpected end of xref table".to_string(),
        });
    }
    Ok((
        String::from_utf8_lossy(&data[start..position]).into_owned(),
        position,
    ))
}

/// Cross-reference stream (PDF 1.5+): `/Type /XRef` stream object whose
/// decoded payload holds fixed-width binary entries
fn parse_stream_section(data: &[u8], offset: u64) -> Result<Section> {
    let mut parser = ObjectParser::new(data, offset as usize);
    let (_, value) = parser.parse_indirect_object()?;

    let stream = value.as_stream().ok_or_else(|| {
        PdfError::InvalidStructure("cross-reference stream expected".to_string())
    })?;
    if stream.dict.get_type() != Some("XRef") {
        return Err(PdfError::InvalidStructure(
            "object at startxref is not a cross-reference stream".to_string(),
        ));
    }

    let dict = &stream.dict;
    let size = dict
        .get("Size")
        .and_then(|v| v.as_integer())
        .ok_or_else(|| PdfError::InvalidStructure("xref stream missing /Size".to_string()))?;

    let index_pairs: Vec<(u32, u32)> = match dict.get("Index") {
        None => vec![(0, size as u32)],
        Some(PdfValue::Array(array)) => {
            if array.len() % 2 != 0 {
                return Err(PdfError::InvalidStructure(
                    "xref stream /Index has odd length".to_string(),
                ));
            }
            array
                .0
                .chunks(2)
                .map(|pair| {
                    let first = pair[0].as_integer().unwrap_or(0) as u32;
                    let count = pair[1].as_integer().unwrap_or(0) as u32;
                    (first, count)
                })
                .collect()
        }
        Some(_) => {
            return Err(PdfError::InvalidStructure(
                "xref stream /Index is not an array".to_string(),
            ))
        }
    };

    let w: Vec<usize> = dict
        .get("W")
        .and_then(|v| v.as_array())
        .filter(|a| a.len() == 3)
        .map(|a| {
            a.0.iter()
                .map(|v| v.as_integer().unwrap_or(0) as usize)
                .collect()
        })
        .ok_or_else(|| PdfError::InvalidStructure("xref stream /W malformed".to_string()))?;

    let decoded = stream.decode()?;
    let entry_width = w[0] + w[1] + w[2];
    let mut entries = Vec::new();
    let mut cursor = 0usize;

    for (first, count) in index_pairs {
        for i in 0..count {
            if cursor + entry_width > decoded.len() {
                return Err(PdfError::TruncatedObject {
                    offset: offset as usize,
                    message: "cross-reference stream data truncated".to_string(),
                });
            }

            let f1 = if w[0] == 0 {
                1 // type field defaults to 1 when absent
            } else {
                read_be(&decoded[cursor..], w[0])
            };
            let f2 = read_be(&decoded[cursor + w[0]..], w[1]);
            let f3 = read_be(&decoded[cursor + w[0] + w[1]..], w[2]);
            cursor += entry_width;

            let entry = match f1 {
                0 => XRefEntry::Free,
                1 => XRefEntry::Offset {
                    offset: f2,
                    generation: f3 as u16,
                },
                2 => XRefEntry::InStream {
                    stream_num: f2 as u32,
                    index: f3 as u32,
                },
                _ => XRefEntry::Free,
            };
            entries.push((first + i, entry));
        }
    }

    let trailer = dict.clone();
    let prev = trailer
        .get("Prev")
        .and_then(|v| v.as_integer())
        .map(|v| v as u64);

    Ok(Section {
        entries,
        trailer,
        prev,
        xref_stm: None,
    })
}

fn read_be(data: &[u8], width: usize) -> u64 {
    let mut value = 0u64;
    for &byte in data.iter().take(width) {
        value = (value << 8) | byte as u64;
    }
    value
}
