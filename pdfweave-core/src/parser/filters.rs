//! PDF Stream Filters
//!
//! Handles decompression and decoding of PDF streams according to ISO 32000-1 Section 7.4

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// LZW decode
    LZWDecode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,

    /// Run length decode
    RunLengthDecode,

    /// CCITT fax decode
    CCITTFaxDecode,

    /// JBIG2 decode
    JBIG2Decode,

    /// DCT decode (JPEG)
    DCTDecode,

    /// JPX decode (JPEG 2000)
    JPXDecode,

    /// Crypt filter
    Crypt,
}

impl Filter {
    /// Parse filter from name, accepting the abbreviated inline-image forms
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }
}

/// Predictor parameters from `/DecodeParms`
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    pub fn from_dict(dict: &PdfDictionary) -> Self {
        let defaults = Self::default();
        let positive = |key: &str, fallback: usize| {
            dict.get_integer(key)
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(fallback)
        };
        Self {
            predictor: dict.get_integer("Predictor").unwrap_or(defaults.predictor),
            columns: positive("Columns", defaults.columns),
            colors: positive("Colors", defaults.colors),
            bits_per_component: positive("BitsPerComponent", defaults.bits_per_component),
        }
    }

    /// Bytes of sample data per row, excluding any PNG tag byte
    pub fn pixel_bytes_per_row(&self) -> ParseResult<usize> {
        self.columns
            .checked_mul(self.bits_per_pixel()?)
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| {
                ParseError::StreamDecodeError(format!(
                    "predictor row of {} columns overflows",
                    self.columns
                ))
            })
    }

    /// Bytes per complete pixel, at least one
    fn bytes_per_pixel(&self) -> ParseResult<usize> {
        Ok(self.bits_per_pixel()?.div_ceil(8).max(1))
    }

    fn bits_per_pixel(&self) -> ParseResult<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .ok_or_else(|| {
                ParseError::StreamDecodeError(format!(
                    "{} colors of {} bits overflow",
                    self.colors, self.bits_per_component
                ))
            })
    }
}

/// Decode stream data according to specified filters
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(array)) => array
            .0
            .iter()
            .map(|obj| {
                obj.as_name().map(|n| n.as_str()).ok_or_else(|| {
                    ParseError::StreamDecodeError("Invalid filter in array".to_string())
                })
            })
            .collect::<ParseResult<_>>()?,
        None | Some(PdfObject::Null) => return Ok(data.to_vec()),
        Some(_) => {
            return Err(ParseError::StreamDecodeError(
                "Invalid Filter type".to_string(),
            ))
        }
    };

    // DecodeParms is either one dictionary or an array parallel to Filter
    let params: Vec<Option<&PdfDictionary>> = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(PdfObject::Dictionary(d)) => vec![Some(d)],
        Some(PdfObject::Array(array)) => array.0.iter().map(PdfObject::as_dict).collect(),
        _ => Vec::new(),
    };

    let mut result = data.to_vec();
    for (i, filter_name) in filters.iter().enumerate() {
        let filter = Filter::from_name(filter_name).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Unknown filter: {filter_name}"))
        })?;
        result = apply_filter(&result, filter)?;

        if let Some(Some(parms)) = params.get(i) {
            if matches!(filter, Filter::FlateDecode | Filter::LZWDecode) {
                result = decode_predictor(&result, &DecodeParams::from_dict(parms))?;
            }
        }
    }

    Ok(result)
}

/// Apply a single filter to data
pub fn apply_filter(data: &[u8], filter: Filter) -> ParseResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => Ok(decode_run_length(data)),
        // Decryption happens before filters run
        Filter::Crypt => Ok(data.to_vec()),
        _ => Err(ParseError::StreamDecodeError(format!(
            "Filter {filter:?} not supported"
        ))),
    }
}

/// Decode FlateDecode (zlib/deflate) compressed data
#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    match decoder.read_to_end(&mut result) {
        Ok(_) => Ok(result),
        // Truncated streams are common; keep what inflated cleanly
        Err(_) if !result.is_empty() => {
            tracing::debug!(bytes = result.len(), "flate stream ended early, keeping partial output");
            Ok(result)
        }
        Err(e) => Err(ParseError::StreamDecodeError(format!(
            "Flate decode error: {e}"
        ))),
    }
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> ParseResult<Vec<u8>> {
    Err(ParseError::StreamDecodeError(
        "FlateDecode requires 'compression' feature".to_string(),
    ))
}

/// Decode RunLengthDecode data
fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let length = data[i] as usize;
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length + 1).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&byte) = data.get(i) {
                    result.extend(std::iter::repeat(byte).take(257 - length));
                }
                i += 1;
            }
        }
    }
    result
}

/// Reverse a TIFF or PNG predictor
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> ParseResult<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(ParseError::StreamDecodeError(format!(
            "Unsupported predictor: {other}"
        ))),
    }
}

/// TIFF Predictor 2: each sample is a difference from its left neighbour.
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> ParseResult<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row()?.max(1);
    let bpp = params.bytes_per_pixel()?;
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(output)
}

/// PNG predictors; every row carries its own algorithm tag.
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> ParseResult<Vec<u8>> {
    let pixel_bytes = params.pixel_bytes_per_row()?;
    let bpp = params.bytes_per_pixel()?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    // Rows are padded, so a row wider than the whole stream would be invented data
    if pixel_bytes >= data.len() {
        return Err(ParseError::StreamDecodeError(format!(
            "predictor row of {pixel_bytes} bytes exceeds the {} bytes of data",
            data.len()
        )));
    }
    let row_len = pixel_bytes + 1;

    let mut output = Vec::with_capacity(data.len() / row_len * pixel_bytes);
    let mut previous = vec![0u8; pixel_bytes];

    for row in data.chunks(row_len) {
        let tag = row[0];
        let mut current = row[1..].to_vec();
        // A short final row is padded with zeros
        current.resize(pixel_bytes, 0);

        for i in 0..pixel_bytes {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => {
                    return Err(ParseError::StreamDecodeError(format!(
                        "Invalid PNG predictor tag: {tag}"
                    )))
                }
            };
            current[i] = current[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&current);
        previous = current;
    }

    Ok(output)
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

/// Decode ASCIIHexDecode data
fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = data.iter().filter(|&&b| !b.is_ascii_whitespace());

    loop {
        let high = match chars.next() {
            Some(&b'>') => break, // End marker
            Some(&ch) => ch,
            None => break,
        };

        let low = match chars.next() {
            Some(&b'>') => {
                // Odd number of digits, pad with 0
                b'0'
            }
            Some(&ch) => ch,
            None => b'0', // Pad with 0
        };

        let high_val = hex_digit_value(high).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex digit: {}", high as char))
        })?;
        let low_val = hex_digit_value(low).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex digit: {}", low as char))
        })?;

        result.push((high_val << 4) | low_val);

        if low == b'>' {
            break;
        }
    }

    Ok(result)
}

/// Get value of hex digit
fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Decode ASCII85Decode data
fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = data.iter().filter(|&&b| !b.is_ascii_whitespace());
    let mut group = Vec::with_capacity(5);

    // Skip optional <~ prefix
    let mut ch = match chars.next() {
        Some(&b'<') => {
            if chars.next() == Some(&b'~') {
                // Skip the prefix and get next char
                chars.next()
            } else {
                // Not a valid prefix, treat '<' as data
                Some(&b'<')
            }
        }
        other => other,
    };

    while let Some(&c) = ch {
        match c {
            b'~' => {
                // Check for end marker ~>
                if chars.next() == Some(&b'>') {
                    break;
                } else {
                    return Err(ParseError::StreamDecodeError(
                        "Invalid ASCII85 end marker".to_string(),
                    ));
                }
            }
            b'z' if group.is_empty() => {
                // Special case: 'z' represents four zero bytes
                result.extend_from_slice(&[0, 0, 0, 0]);
            }
            b'!'..=b'u' => {
                group.push(c);
                if group.len() == 5 {
                    // Decode complete group
                    let value = group
                        .iter()
                        .enumerate()
                        .map(|(i, &ch)| (ch - b'!') as u32 * 85u32.pow(4 - i as u32))
                        .sum::<u32>();

                    result.push((value >> 24) as u8);
                    result.push((value >> 16) as u8);
                    result.push((value >> 8) as u8);
                    result.push(value as u8);

                    group.clear();
                }
            }
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid ASCII85 character: {}",
                    c as char
                )));
            }
        }
        ch = chars.next();
    }

    // Handle incomplete final group
    if !group.is_empty() {
        // Save original length to know how many bytes to output
        let original_len = group.len();

        // Pad with 'u' (84)
        while group.len() < 5 {
            group.push(b'u');
        }

        let value = group
            .iter()
            .enumerate()
            .map(|(i, &ch)| (ch - b'!') as u32 * 85u32.pow(4 - i as u32))
            .sum::<u32>();

        // Only output the number of bytes that were actually encoded
        let output_bytes = original_len - 1;
        for i in 0..output_bytes {
            result.push((value >> (24 - 8 * i)) as u8);
        }
    }

    Ok(result)
}
