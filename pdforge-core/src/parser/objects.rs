//! PDF object parser
//!
//! Turns the token stream into `PdfValue`s, including indirect object
//! wrappers (`N G obj ... endobj`) and the `stream`...`endstream` construct.

use super::lexer::{Lexer, Token};
use crate::error::{PdfError, Result};
use crate::objects::{ObjRef, PdfArray, PdfDictionary, PdfName, PdfStream, PdfString, PdfValue};

/// Parser over a byte slice, positioned by the caller
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(input: &'a [u8], position: usize) -> Self {
        Self {
            lexer: Lexer::at(input, position),
        }
    }

    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    fn truncated(&self, message: impl Into<String>) -> PdfError {
        PdfError::TruncatedObject {
            offset: self.lexer.position(),
            message: message.into(),
        }
    }

    /// Parse one complete value starting at the cursor
    pub fn parse_value(&mut self) -> Result<PdfValue> {
        let token = self.lexer.next_token()?;
        self.parse_from_token(token)
    }

    fn parse_from_token(&mut self, token: Token) -> Result<PdfValue> {
        match token {
            Token::Null => Ok(PdfValue::Null),
            Token::Boolean(b) => Ok(PdfValue::Boolean(b)),
            Token::Real(r) => Ok(PdfValue::Real(r)),
            Token::String(s) => Ok(PdfValue::String(PdfString(s))),
            Token::Name(n) => Ok(PdfValue::Name(PdfName(n))),
            Token::Integer(i) => self.parse_integer_or_reference(i),
            Token::ArrayStart => self.parse_array(),
            Token::DictStart => self.parse_dictionary_or_stream(),
            Token::Eof => Err(self.truncated("unexpected end of input")),
            other => Err(PdfError::MalformedToken {
                offset: self.lexer.position(),
                message: format!("expected an object, found {other:?}"),
            }),
        }
    }

    /// `N G R` is an indirect reference; a bare integer is just an integer.
    /// Lookahead rewinds when the pattern does not complete.
    fn parse_integer_or_reference(&mut self, first: i64) -> Result<PdfValue> {
        let save = self.lexer.position();

        if first >= 0 {
            if let Ok(Token::Integer(gen)) = self.lexer.next_token() {
                if (0..=u16::MAX as i64).contains(&gen)
                    && matches!(self.lexer.next_token(), Ok(Token::RefMarker))
                {
                    return Ok(PdfValue::Reference(first as u32, gen as u16));
                }
            }
        }

        self.lexer.seek(save);
        Ok(PdfValue::Integer(first))
    }

    fn parse_array(&mut self) -> Result<PdfValue> {
        let mut elements = Vec::new();

        loop {
            let token = self.lexer.next_token()?;
            match token {
                Token::ArrayEnd => break,
                Token::Eof => return Err(self.truncated("unterminated array")),
                other => elements.push(self.parse_from_token(other)?),
            }
        }

        Ok(PdfValue::Array(PdfArray(elements)))
    }

    /// Parse a dictionary and check whether a stream body follows
    fn parse_dictionary_or_stream(&mut self) -> Result<PdfValue> {
        let dict = self.parse_dictionary_inner()?;

        let save = self.lexer.position();
        match self.lexer.next_token() {
            Ok(Token::Stream) => {
                let stream = self.parse_stream_body(dict)?;
                Ok(PdfValue::Stream(stream))
            }
            _ => {
                self.lexer.seek(save);
                Ok(PdfValue::Dictionary(dict))
            }
        }
    }

    fn parse_dictionary_inner(&mut self) -> Result<PdfDictionary> {
        let mut dict = PdfDictionary::new();

        loop {
            let token = self.lexer.next_token()?;
            match token {
                Token::DictEnd => break,
                Token::Name(key) => {
                    let value = self.parse_value()?;
                    dict.insert(key, value);
                }
                Token::Eof => return Err(self.truncated("unterminated dictionary")),
                other => {
                    return Err(PdfError::MalformedToken {
                        offset: self.lexer.position(),
                        message: format!("expected dictionary key or '>>', found {other:?}"),
                    })
                }
            }
        }

        Ok(dict)
    }

    /// Read the stream payload after the `stream` keyword.
    ///
    /// When /Length is an indirect reference it may not be resolvable yet
    /// (it lives behind the xref index being built), so fall back to
    /// scanning for `endstream` and patch the length afterwards.
    fn parse_stream_body(&mut self, mut dict: PdfDictionary) -> Result<PdfStream> {
        self.lexer.skip_stream_eol();
        let data_start = self.lexer.position();

        let data = match dict.get("Length") {
            Some(PdfValue::Integer(len)) => {
                let declared = *len as usize;
                if declared > self.lexer.remaining() {
                    return Err(PdfError::InvalidLength {
                        offset: data_start,
                        declared,
                        remaining: self.lexer.remaining(),
                    });
                }
                let data = self.lexer.read_bytes(declared)?.to_vec();
                self.lexer.skip_whitespace();
                match self.lexer.next_token() {
                    Ok(Token::EndStream) => {}
                    _ => return Err(self.truncated("missing endstream")),
                }
                data
            }
            _ => {
                // Unresolvable or absent length: scan for the terminator
                let end = self
                    .lexer
                    .find_forward(b"endstream")
                    .ok_or_else(|| self.truncated("missing endstream"))?;
                let mut data_end = end;
                // The EOL before endstream is a separator, not payload
                if data_end > data_start && self.byte_at(data_end - 1) == Some(b'\n') {
                    data_end -= 1;
                }
                if data_end > data_start && self.byte_at(data_end - 1) == Some(b'\r') {
                    data_end -= 1;
                }
                let data = self
                    .lexer
                    .read_bytes(data_end - data_start)?
                    .to_vec();
                self.lexer.skip_whitespace();
                match self.lexer.next_token() {
                    Ok(Token::EndStream) => {}
                    _ => return Err(self.truncated("missing endstream")),
                }
                dict.insert("Length", PdfValue::Integer(data.len() as i64));
                data
            }
        };

        Ok(PdfStream { dict, data })
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.lexer.input().get(pos).copied()
    }

    /// Parse an indirect object (`N G obj ... endobj`) at the cursor,
    /// returning its reference and body
    pub fn parse_indirect_object(&mut self) -> Result<(ObjRef, PdfValue)> {
        let num = match self.lexer.next_token()? {
            Token::Integer(n) if n >= 0 => n as u32,
            other => {
                return Err(PdfError::MalformedToken {
                    offset: self.lexer.position(),
                    message: format!("expected object number, found {other:?}"),
                })
            }
        };
        let gen = match self.lexer.next_token()? {
            Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
            other => {
                return Err(PdfError::MalformedToken {
                    offset: self.lexer.position(),
                    message: format!("expected generation number, found {other:?}"),
                })
            }
        };
        match self.lexer.next_token()? {
            Token::Obj => {}
            other => {
                return Err(PdfError::MalformedToken {
                    offset: self.lexer.position(),
                    message: format!("expected 'obj', found {other:?}"),
                })
            }
        }

        let value = self.parse_value()?;

        match self.lexer.next_token() {
            Ok(Token::EndObj) => {}
            _ => return Err(self.truncated("missing endobj")),
        }

        Ok(((num, gen), value))
    }
}
