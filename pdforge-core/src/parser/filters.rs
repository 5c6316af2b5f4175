//! PDF stream filters
//!
//! Decodes stream payloads through the /Filter chain. FlateDecode (with the
//! PNG predictors used by cross-reference streams) and ASCIIHexDecode are
//! supported; anything else fails rather than passing corrupt data through.

use crate::error::{PdfError, Result};
use crate::objects::{PdfDictionary, PdfValue};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

/// Decode stream data according to the dictionary's /Filter entry
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> Result<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(PdfValue::Name(name)) => vec![name.as_str()],
        Some(PdfValue::Array(array)) => {
            let mut names = Vec::new();
            for value in &array.0 {
                match value {
                    PdfValue::Name(name) => names.push(name.as_str()),
                    _ => {
                        return Err(PdfError::CompressionError(
                            "filter array entry is not a name".to_string(),
                        ))
                    }
                }
            }
            names
        }
        Some(_) => {
            return Err(PdfError::CompressionError(
                "invalid /Filter value".to_string(),
            ))
        }
    };

    let parms: Vec<Option<&PdfDictionary>> = match dict.get("DecodeParms") {
        None => vec![None; filters.len()],
        Some(PdfValue::Dictionary(d)) => vec![Some(d)],
        Some(PdfValue::Array(array)) => array
            .0
            .iter()
            .map(|v| match v {
                PdfValue::Dictionary(d) => Some(d),
                _ => None,
            })
            .collect(),
        Some(PdfValue::Null) => vec![None; filters.len()],
        Some(_) => {
            return Err(PdfError::CompressionError(
                "invalid /DecodeParms value".to_string(),
            ))
        }
    };

    let mut result = data.to_vec();
    for (i, filter_name) in filters.iter().enumerate() {
        let parm = parms.get(i).copied().flatten();
        result = match *filter_name {
            "FlateDecode" => {
                let decoded = decode_flate(&result)?;
                apply_predictor(decoded, parm)?
            }
            "ASCIIHexDecode" => decode_ascii_hex(&result)?,
            other => {
                return Err(PdfError::CompressionError(format!(
                    "unsupported filter: {other}"
                )))
            }
        };
    }

    Ok(result)
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| PdfError::CompressionError(format!("flate decode failed: {e}")))?;
    Ok(result)
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::CompressionError(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

/// Undo a PNG row predictor declared in /DecodeParms
fn apply_predictor(data: Vec<u8>, parms: Option<&PdfDictionary>) -> Result<Vec<u8>> {
    let parms = match parms {
        Some(p) => p,
        None => return Ok(data),
    };

    let predictor = parms
        .get("Predictor")
        .and_then(|v| v.as_integer())
        .unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }
    if predictor < 10 {
        return Err(PdfError::CompressionError(format!(
            "unsupported predictor: {predictor}"
        )));
    }

    let columns = parms
        .get("Columns")
        .and_then(|v| v.as_integer())
        .unwrap_or(1) as usize;
    let colors = parms
        .get("Colors")
        .and_then(|v| v.as_integer())
        .unwrap_or(1) as usize;
    let bpc = parms
        .get("BitsPerComponent")
        .and_then(|v| v.as_integer())
        .unwrap_or(8) as usize;

    let bytes_per_pixel = ((colors * bpc) + 7) / 8;
    let row_len = (columns * colors * bpc + 7) / 8;
    if row_len == 0 {
        return Ok(data);
    }

    // Each row is prefixed with one PNG filter-type byte
    let stride = row_len + 1;
    if data.len() % stride != 0 {
        return Err(PdfError::CompressionError(format!(
            "predicted data length {} is not a multiple of row size {}",
            data.len(),
            stride
        )));
    }

    let mut out = Vec::with_capacity(data.len() / stride * row_len);
    let mut prev_row = vec![0u8; row_len];

    for row in data.chunks(stride) {
        let filter_type = row[0];
        let mut current: Vec<u8> = row[1..].to_vec();

        match filter_type {
            0 => {}
            1 => {
                for i in bytes_per_pixel..row_len {
                    current[i] = current[i].wrapping_add(current[i - bytes_per_pixel]);
                }
            }
            2 => {
                for i in 0..row_len {
                    current[i] = current[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row_len {
                    let left = if i >= bytes_per_pixel {
                        current[i - bytes_per_pixel] as u16
                    } else {
                        0
                    };
                    let up = prev_row[i] as u16;
                    current[i] = current[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_len {
                    let left = if i >= bytes_per_pixel {
                        current[i - bytes_per_pixel]
                    } else {
                        0
                    };
                    let up = prev_row[i];
                    let up_left = if i >= bytes_per_pixel {
                        prev_row[i - bytes_per_pixel]
                    } else {
                        0
                    };
                    current[i] = current[i].wrapping_add(paeth(left, up, up_left));
                }
            }
            other => {
                return Err(PdfError::CompressionError(format!(
                    "unknown PNG filter type: {other}"
                )))
            }
        }

        out.extend_from_slice(&current);
        prev_row = current;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut high: Option<u8> = None;

    for &ch in data {
        if ch == b'>' {
            break;
        }
        if ch.is_ascii_whitespace() {
            continue;
        }
        let value = match ch {
            b'0'..=b'9' => ch - b'0',
            b'a'..=b'f' => ch - b'a' + 10,
            b'A'..=b'F' => ch - b'A' + 10,
            _ => {
                return Err(PdfError::CompressionError(format!(
                    "invalid hex digit: {}",
                    ch as char
                )))
            }
        };
        match high.take() {
            None => high = Some(value),
            Some(h) => result.push((h << 4) | value),
        }
    }

    // Odd digit count pads the final byte with zero
    if let Some(h) = high {
        result.push(h << 4);
    }

    Ok(result)
}

/// Flate-compress data for stream output
#[cfg(feature = "compression")]
pub fn encode_flate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfError::CompressionError(format!("flate encode failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| PdfError::CompressionError(format!("flate encode failed: {e}")))
}
