//! Content stream tokenizer and text reconstruction
//!
//! Content streams hold the drawing operators for a page. Text extraction
//! only needs the show-text operators (`Tj`, `TJ`, `'`, `"`) and the text
//! positioning operators that imply line breaks; everything else is
//! tokenized and discarded.

use crate::error::{PdfError, Result};

/// Operand or operator token inside a content stream
#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken {
    Number(f64),
    String(Vec<u8>),
    Name(String),
    Operator(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
}

/// The subset of content operations text extraction cares about
#[derive(Debug, Clone, PartialEq)]
pub enum ContentOperation {
    /// Tj — show a string
    ShowText(Vec<u8>),
    /// TJ — show strings with kerning adjustments
    ShowTextArray(Vec<Vec<u8>>),
    /// ' or " — move to the next line and show a string
    NextLineShowText(Vec<u8>),
    /// Td, TD, T*, Tm — text positioning that starts a new line
    TextLineBreak,
    /// Everything else, kept as the raw operator name
    Other(String),
}

/// Tokenizer over a decoded content stream
pub struct ContentTokenizer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> ContentTokenizer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    pub fn next_token(&mut self) -> Result<Option<ContentToken>> {
        self.skip_whitespace();

        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Ok(None),
        };

        match ch {
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number().map(Some),
            b'(' => self.read_literal_string().map(Some),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    self.position += 2;
                    Ok(Some(ContentToken::DictStart))
                } else {
                    self.read_hex_string().map(Some)
                }
            }
            b'>' => {
                if self.peek_at(1) == Some(b'>') {
                    self.position += 2;
                    Ok(Some(ContentToken::DictEnd))
                } else {
                    Err(self.malformed("unexpected '>'"))
                }
            }
            b'[' => {
                self.position += 1;
                Ok(Some(ContentToken::ArrayStart))
            }
            b']' => {
                self.position += 1;
                Ok(Some(ContentToken::ArrayEnd))
            }
            b'/' => self.read_name().map(Some),
            _ => self.read_operator().map(Some),
        }
    }

    fn malformed(&self, message: impl Into<String>) -> PdfError {
        PdfError::MalformedToken {
            offset: self.position,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.position + ahead).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0' => self.position += 1,
                b'%' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' || c == b'\r' {
                            break;
                        }
                        self.position += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn read_number(&mut self) -> Result<ContentToken> {
        let start = self.position;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.position += 1;
        }
        let mut has_dot = false;
        while let Some(ch) = self.peek() {
            match ch {
                b'0'..=b'9' => self.position += 1,
                b'.' if !has_dot => {
                    has_dot = true;
                    self.position += 1;
                }
                _ => break,
            }
        }

        let text = std::str::from_utf8(&self.input[start..self.position])
            .map_err(|_| self.malformed("invalid number"))?;
        let value = text
            .parse::<f64>()
            .map_err(|_| self.malformed(format!("invalid number '{text}'")))?;
        Ok(ContentToken::Number(value))
    }

    fn read_literal_string(&mut self) -> Result<ContentToken> {
        self.position += 1; // skip '('
        let mut result = Vec::new();
        let mut paren_depth = 1;

        while paren_depth > 0 {
            let ch = match self.peek() {
                Some(ch) => ch,
                None => return Err(self.malformed("unterminated string")),
            };
            self.position += 1;

            if ch == b'\\' {
                let esc = match self.peek() {
                    Some(esc) => esc,
                    None => return Err(self.malformed("unterminated escape")),
                };
                self.position += 1;
                match esc {
                    b'n' => result.push(b'\n'),
                    b'r' => result.push(b'\r'),
                    b't' => result.push(b'\t'),
                    b'b' => result.push(b'\x08'),
                    b'f' => result.push(b'\x0C'),
                    b'(' => result.push(b'('),
                    b')' => result.push(b')'),
                    b'\\' => result.push(b'\\'),
                    b'0'..=b'7' => {
                        let mut value = (esc - b'0') as u16;
                        for _ in 0..2 {
                            match self.peek() {
                                Some(next @ b'0'..=b'7') => {
                                    self.position += 1;
                                    value = value * 8 + (next - b'0') as u16;
                                }
                                _ => break,
                            }
                        }
                        result.push(value as u8);
                    }
                    _ => result.push(esc),
                }
            } else {
                match ch {
                    b'(' => {
                        paren_depth += 1;
                        result.push(ch);
                    }
                    b')' => {
                        paren_depth -= 1;
                        if paren_depth > 0 {
                            result.push(ch);
                        }
                    }
                    _ => result.push(ch),
                }
            }
        }

        Ok(ContentToken::String(result))
    }

    fn read_hex_string(&mut self) -> Result<ContentToken> {
        self.position += 1; // skip '<'
        let mut digits = Vec::new();
        loop {
            let ch = match self.peek() {
                Some(ch) => ch,
                None => return Err(self.malformed("unterminated hex string")),
            };
            self.position += 1;
            if ch == b'>' {
                break;
            }
            if ch.is_ascii_hexdigit() {
                digits.push(ch);
            } else if !ch.is_ascii_whitespace() {
                return Err(self.malformed("invalid hex string"));
            }
        }
        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }
        let bytes = digits
            .chunks(2)
            .map(|pair| {
                let hi = hex_value(pair[0]);
                let lo = hex_value(pair[1]);
                (hi << 4) | lo
            })
            .collect();
        Ok(ContentToken::String(bytes))
    }

    fn read_name(&mut self) -> Result<ContentToken> {
        self.position += 1; // skip '/'
        let start = self.position;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace()
                || matches!(ch, b'/' | b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%')
            {
                break;
            }
            self.position += 1;
        }
        Ok(ContentToken::Name(
            String::from_utf8_lossy(&self.input[start..self.position]).into_owned(),
        ))
    }

    fn read_operator(&mut self) -> Result<ContentToken> {
        let start = self.position;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace()
                || matches!(ch, b'/' | b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%')
            {
                break;
            }
            self.position += 1;
        }
        if start == self.position {
            return Err(self.malformed("empty operator"));
        }
        let op = String::from_utf8_lossy(&self.input[start..self.position]).into_owned();

        // Inline images carry raw binary data between ID and EI; skip it so
        // the tokenizer does not trip over arbitrary bytes
        if op == "ID" {
            self.skip_inline_image_data()?;
            return Ok(ContentToken::Operator("EI".to_string()));
        }

        Ok(ContentToken::Operator(op))
    }

    fn skip_inline_image_data(&mut self) -> Result<()> {
        // Data starts after a single whitespace byte
        if self
            .peek()
            .map(|c| c.is_ascii_whitespace())
            .unwrap_or(false)
        {
            self.position += 1;
        }
        while self.position + 1 < self.input.len() {
            if self.input[self.position] == b'E'
                && self.input[self.position + 1] == b'I'
                && (self.position + 2 >= self.input.len()
                    || self.input[self.position + 2].is_ascii_whitespace())
            {
                self.position += 2;
                return Ok(());
            }
            self.position += 1;
        }
        Err(self.malformed("unterminated inline image"))
    }
}

fn hex_value(ch: u8) -> u8 {
    match ch {
        b'0'..=b'9' => ch - b'0',
        b'a'..=b'f' => ch - b'a' + 10,
        _ => ch - b'A' + 10,
    }
}

/// Walk a decoded content stream and yield the operations relevant to text
/// reconstruction, in stream order
pub fn parse_text_operations(data: &[u8]) -> Result<Vec<ContentOperation>> {
    let mut tokenizer = ContentTokenizer::new(data);
    let mut operands: Vec<ContentToken> = Vec::new();
    let mut operations = Vec::new();

    while let Some(token) = tokenizer.next_token()? {
        match token {
            ContentToken::Operator(op) => {
                let operation = match op.as_str() {
                    "Tj" => match operands.last() {
                        Some(ContentToken::String(s)) => ContentOperation::ShowText(s.clone()),
                        _ => ContentOperation::Other(op.clone()),
                    },
                    "TJ" => {
                        let strings = operands
                            .iter()
                            .filter_map(|t| match t {
                                ContentToken::String(s) => Some(s.clone()),
                                _ => None,
                            })
                            .collect();
                        ContentOperation::ShowTextArray(strings)
                    }
                    "'" => match operands.last() {
                        Some(ContentToken::String(s)) => {
                            ContentOperation::NextLineShowText(s.clone())
                        }
                        _ => ContentOperation::Other(op.clone()),
                    },
                    "\"" => match operands.last() {
                        Some(ContentToken::String(s)) => {
                            ContentOperation::NextLineShowText(s.clone())
                        }
                        _ => ContentOperation::Other(op.clone()),
                    },
                    "Td" | "TD" | "T*" | "Tm" => ContentOperation::TextLineBreak,
                    _ => ContentOperation::Other(op.clone()),
                };
                operations.push(operation);
                operands.clear();
            }
            other => operands.push(other),
        }
    }

    Ok(operations)
}

/// Reconstruct showable text from a decoded content stream.
///
/// Layout is best-effort: show operators append in stream order, and text
/// positioning operators insert line breaks. String bytes are interpreted
/// as Latin-1, which covers the standard fonts this engine writes.
pub fn extract_text_from_content(data: &[u8]) -> Result<String> {
    let mut text = String::new();

    for operation in parse_text_operations(data)? {
        match operation {
            ContentOperation::ShowText(bytes) => push_text(&mut text, &bytes),
            ContentOperation::ShowTextArray(strings) => {
                for bytes in strings {
                    push_text(&mut text, &bytes);
                }
            }
            ContentOperation::NextLineShowText(bytes) => {
                newline(&mut text);
                push_text(&mut text, &bytes);
            }
            ContentOperation::TextLineBreak => newline(&mut text),
            ContentOperation::Other(_) => {}
        }
    }

    Ok(text)
}

fn push_text(out: &mut String, bytes: &[u8]) {
    for &b in bytes {
        out.push(b as char);
    }
}

fn newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
