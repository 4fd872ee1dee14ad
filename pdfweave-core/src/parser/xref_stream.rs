//! Cross-reference stream support for PDF 1.5+
//!
//! This module implements cross-reference streams according to
//! ISO 32000-1:2008 Section 7.5.8 (Cross-Reference Streams).
//!
//! Cross-reference streams are an alternative to traditional xref tables,
//! providing more compact representation and supporting compressed object streams.

use crate::parser::objects::PdfDictionary;
use crate::parser::xref::XRefEntry;
use crate::parser::{ParseError, ParseResult};

/// Keys of the stream dictionary that do not carry over into a trailer
const STREAM_ONLY_KEYS: [&str; 4] = ["DecodeParms", "Filter", "Prev", "Length"];

/// Cross-reference stream parser
#[derive(Debug)]
pub struct XRefStream {
    /// Stream dictionary
    pub dict: PdfDictionary,
    /// Decoded stream data
    pub data: Vec<u8>,
    /// Field widths from W array
    pub widths: [usize; 3],
    /// Index array (pairs of [first_object_number, count])
    pub index: Vec<(u32, u32)>,
}

impl XRefStream {
    /// Interpret an already decoded cross-reference stream
    pub fn new(dict: PdfDictionary, data: Vec<u8>) -> ParseResult<Self> {
        if dict.get_type() != Some("XRef") {
            return Err(ParseError::InvalidXRef("stream is not /Type /XRef".to_string()));
        }

        let w = dict
            .get_array("W")
            .ok_or_else(|| ParseError::MissingKey("W array in xref stream".to_string()))?;
        if w.len() != 3 {
            return Err(ParseError::InvalidXRef(format!(
                "W array must have 3 elements, found {len}",
                len = w.len()
            )));
        }
        let mut widths = [0usize; 3];
        for (k, width) in widths.iter_mut().enumerate() {
            *width = w
                .get_integer(k)
                .filter(|n| (0..=8).contains(n))
                .ok_or_else(|| ParseError::InvalidXRef("Invalid width in W array".to_string()))?
                as usize;
        }

        let size = dict
            .get_integer("Size")
            .filter(|n| *n >= 0)
            .ok_or_else(|| ParseError::MissingKey("Size in xref stream".to_string()))?
            as u32;

        // Default: start at 0, count is Size
        let index = match dict.get_array("Index") {
            Some(index_array) => {
                let mut pairs = Vec::with_capacity(index_array.len() / 2);
                let mut i = 0;
                while i + 1 < index_array.len() {
                    let first = index_array.get_integer(i).filter(|n| *n >= 0).ok_or_else(|| {
                        ParseError::InvalidXRef("Invalid first object number in Index".to_string())
                    })?;
                    let count = index_array.get_integer(i + 1).filter(|n| *n >= 0).ok_or_else(|| {
                        ParseError::InvalidXRef("Invalid count in Index".to_string())
                    })?;
                    pairs.push((first as u32, count as u32));
                    i += 2;
                }
                pairs
            }
            None => vec![(0, size)],
        };

        Ok(Self {
            dict,
            data,
            widths,
            index,
        })
    }

    /// Convert the cross-reference stream to XRefTable entries
    pub fn to_xref_entries(&self) -> ParseResult<Vec<(u32, XRefEntry)>> {
        let entry_size = self.widths.iter().sum::<usize>();
        if entry_size == 0 {
            return Err(ParseError::InvalidXRef(
                "Invalid entry size (0) in xref stream".to_string(),
            ));
        }

        let mut entries = Vec::new();
        let mut data_offset = 0;

        for &(first_obj, count) in &self.index {
            for i in 0..count {
                let record = self
                    .data
                    .get(data_offset..data_offset + entry_size)
                    .ok_or_else(|| {
                        ParseError::InvalidXRef(format!(
                            "xref stream data truncated at byte {data_offset}"
                        ))
                    })?;

                let (type_bytes, rest) = record.split_at(self.widths[0]);
                let (field2_bytes, field3_bytes) = rest.split_at(self.widths[1]);

                // A missing type field means every entry is in use
                let entry_type = if self.widths[0] == 0 {
                    1
                } else {
                    read_field(type_bytes)
                };
                let field2 = read_field(field2_bytes);
                let field3 = read_field(field3_bytes);

                let entry = match entry_type {
                    0 => XRefEntry::Free {
                        generation: field3 as u16,
                    },
                    1 => XRefEntry::InUse {
                        offset: field2 as usize,
                        generation: field3 as u16,
                    },
                    2 => XRefEntry::Compressed {
                        stream: field2 as u32,
                        index: field3 as u32,
                    },
                    _ => {
                        return Err(ParseError::InvalidXRef(format!(
                            "Invalid xref entry type: {entry_type}"
                        )));
                    }
                };

                entries.push((first_obj.saturating_add(i), entry));
                data_offset += entry_size;
            }
        }

        Ok(entries)
    }

    /// Trailer view of the stream dictionary
    pub fn trailer_dict(&self) -> PdfDictionary {
        let mut trailer = self.dict.clone();
        for key in STREAM_ONLY_KEYS {
            trailer.remove(key);
        }
        trailer
    }

    /// Get the previous xref offset
    pub fn prev_offset(&self) -> Option<usize> {
        self.dict
            .get_integer("Prev")
            .filter(|n| *n >= 0)
            .map(|n| n as usize)
    }

    /// Declared `/Size`
    pub fn size(&self) -> usize {
        self.dict.get_integer("Size").unwrap_or(0).max(0) as usize
    }
}

/// Read a field from bytes (big-endian)
fn read_field(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for &byte in bytes {
        value = (value << 8) | (byte as u64);
    }
    value
}
