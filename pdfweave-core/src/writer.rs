//! Minimal PDF serializer
//!
//! Writes a set of numbered objects with a classic xref table, an xref
//! stream (ISO 32000-1:2008 Section 7.5.8), or both in the hybrid layout.
//! Objects may be packed into a single object stream. The returned
//! [`WrittenPdf`] records every offset so callers can check what a reader
//! reconstructs.

use crate::error::{PdfError, Result};
use crate::parser::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
use crate::parser::PdfVersion;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// How the cross-reference data is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XRefMode {
    /// A classic `xref` table
    #[default]
    Table,
    /// A `/Type /XRef` stream
    Stream,
    /// A classic table whose trailer points at an xref stream via `/XRefStm`
    Hybrid,
}

/// The serialized document plus its layout
#[derive(Debug, Clone)]
pub struct WrittenPdf {
    pub bytes: Vec<u8>,
    /// Offsets of objects written directly in the file
    pub offsets: BTreeMap<u32, usize>,
    /// Object number of the object stream, if one was written
    pub object_stream: Option<u32>,
    /// Offset recorded after `startxref`
    pub startxref: usize,
}

/// Writer for whole documents
#[derive(Debug, Clone)]
pub struct PdfWriter {
    version: PdfVersion,
    objects: BTreeMap<u32, PdfObject>,
    compressed: BTreeSet<u32>,
    mode: XRefMode,
    compress_streams: bool,
}

impl PdfWriter {
    pub fn new(version: PdfVersion) -> Self {
        Self {
            version,
            objects: BTreeMap::new(),
            compressed: BTreeSet::new(),
            mode: XRefMode::Table,
            compress_streams: false,
        }
    }

    /// Add an indirect object written directly in the file.
    pub fn add_object(&mut self, num: u32, object: PdfObject) -> &mut Self {
        self.compressed.remove(&num);
        self.objects.insert(num, object);
        self
    }

    /// Add an indirect object stored inside the object stream.
    pub fn add_compressed_object(&mut self, num: u32, object: PdfObject) -> &mut Self {
        self.objects.insert(num, object);
        self.compressed.insert(num);
        self
    }

    pub fn xref_mode(&mut self, mode: XRefMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Flate-compress the object and xref streams this writer creates.
    pub fn compress_streams(&mut self, compress: bool) -> &mut Self {
        self.compress_streams = compress;
        self
    }

    /// Serialize everything with `trailer` as the trailer dictionary.
    pub fn write(&self, trailer: &PdfDictionary) -> Result<WrittenPdf> {
        if !self.compressed.is_empty() && self.mode == XRefMode::Table {
            return Err(PdfError::InvalidStructure(
                "object streams need an xref stream".to_string(),
            ));
        }
        if self.objects.contains_key(&0) {
            return Err(PdfError::InvalidStructure(
                "object 0 is reserved for the free list".to_string(),
            ));
        }

        let mut out = Vec::new();
        write!(out, "%PDF-{}\n", self.version)?;
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets = BTreeMap::new();
        for (num, object) in &self.objects {
            if self.compressed.contains(num) {
                continue;
            }
            offsets.insert(*num, out.len());
            write_indirect(&mut out, *num, object)?;
        }

        let mut next_num = self.objects.keys().next_back().map_or(1, |n| n + 1);
        let mut compressed_entries = BTreeMap::new();
        let object_stream = if self.compressed.is_empty() {
            None
        } else {
            let stream_num = next_num;
            next_num += 1;
            let stream = self.build_object_stream(&mut compressed_entries, stream_num)?;
            offsets.insert(stream_num, out.len());
            write_indirect(&mut out, stream_num, &PdfObject::Stream(stream))?;
            Some(stream_num)
        };

        let startxref = match self.mode {
            XRefMode::Table => {
                let size = next_num as usize;
                let xref_offset = out.len();
                let listed: BTreeMap<u32, Option<usize>> =
                    (0..next_num).map(|n| (n, offsets.get(&n).copied())).collect();
                write_table(&mut out, &listed)?;
                write_trailer(&mut out, trailer, size, None)?;
                xref_offset
            }
            XRefMode::Stream => {
                let xref_num = next_num;
                let xref_offset = out.len();
                let mut entries: BTreeMap<u32, XRefRecord> = (0..xref_num)
                    .map(|n| (n, record_for(n, &offsets, &compressed_entries)))
                    .collect();
                entries.insert(xref_num, XRefRecord::InUse(xref_offset));
                let stream = self.xref_stream(&entries, trailer, xref_num as usize + 1)?;
                write_indirect(&mut out, xref_num, &PdfObject::Stream(stream))?;
                xref_offset
            }
            XRefMode::Hybrid => {
                let xref_num = next_num;
                let stm_offset = out.len();
                let entries: BTreeMap<u32, XRefRecord> = compressed_entries
                    .iter()
                    .map(|(num, (stream, index))| (*num, XRefRecord::Compressed(*stream, *index)))
                    .collect();
                let stream = self.xref_stream(&entries, &PdfDictionary::new(), xref_num as usize + 1)?;
                write_indirect(&mut out, xref_num, &PdfObject::Stream(stream))?;

                let xref_offset = out.len();
                let mut listed: BTreeMap<u32, Option<usize>> = offsets
                    .iter()
                    .map(|(num, offset)| (*num, Some(*offset)))
                    .collect();
                listed.insert(0, None);
                write_table(&mut out, &listed)?;
                write_trailer(&mut out, trailer, xref_num as usize + 1, Some(stm_offset))?;
                xref_offset
            }
        };

        write!(out, "startxref\n{startxref}\n%%EOF\n")?;

        Ok(WrittenPdf {
            bytes: out,
            offsets,
            object_stream,
            startxref,
        })
    }

    fn build_object_stream(
        &self,
        entries: &mut BTreeMap<u32, (u32, u32)>,
        stream_num: u32,
    ) -> Result<PdfStream> {
        let mut header = Vec::new();
        let mut body = Vec::new();
        for (index, num) in self.compressed.iter().enumerate() {
            let object = self.objects.get(num).ok_or_else(|| {
                PdfError::InvalidStructure(format!("compressed object {num} has no value"))
            })?;
            if matches!(object, PdfObject::Stream(_)) {
                return Err(PdfError::InvalidStructure(format!(
                    "stream object {num} cannot live in an object stream"
                )));
            }
            write!(header, "{num} {} ", body.len())?;
            write_object(&mut body, object)?;
            body.push(b'\n');
            entries.insert(*num, (stream_num, index as u32));
        }

        let mut dict = PdfDictionary::new();
        dict.insert("Type".to_string(), PdfObject::Name(PdfName::new("ObjStm")));
        dict.insert("N".to_string(), PdfObject::Integer(self.compressed.len() as i64));
        dict.insert("First".to_string(), PdfObject::Integer(header.len() as i64));
        header.extend_from_slice(&body);
        self.finish_stream(dict, header)
    }

    fn xref_stream(
        &self,
        entries: &BTreeMap<u32, XRefRecord>,
        trailer: &PdfDictionary,
        size: usize,
    ) -> Result<PdfStream> {
        let max_field = entries
            .values()
            .map(|record| match record {
                XRefRecord::Free => 0,
                XRefRecord::InUse(offset) => *offset as u64,
                XRefRecord::Compressed(stream, _) => *stream as u64,
            })
            .max()
            .unwrap_or(0);
        let widths = [1, bytes_needed(max_field), 2];

        let mut data = Vec::new();
        let mut index = Vec::new();
        let mut run_start: Option<u32> = None;
        let mut previous = None;
        for (num, record) in entries {
            if previous.map_or(true, |p: u32| p + 1 != *num) {
                if let (Some(start), Some(end)) = (run_start, previous) {
                    index.extend([start as i64, (end - start + 1) as i64]);
                }
                run_start = Some(*num);
            }
            previous = Some(*num);

            let (kind, field2, field3) = match record {
                XRefRecord::Free => (0, 0, if *num == 0 { 65535 } else { 0 }),
                XRefRecord::InUse(offset) => (1, *offset as u64, 0),
                XRefRecord::Compressed(stream, idx) => (2, *stream as u64, *idx as u64),
            };
            write_field(&mut data, kind, widths[0]);
            write_field(&mut data, field2, widths[1]);
            write_field(&mut data, field3, widths[2]);
        }
        if let (Some(start), Some(end)) = (run_start, previous) {
            index.extend([start as i64, (end - start + 1) as i64]);
        }

        let mut dict = trailer.clone();
        dict.insert("Type".to_string(), PdfObject::Name(PdfName::new("XRef")));
        dict.insert("Size".to_string(), PdfObject::Integer(size as i64));
        dict.insert(
            "W".to_string(),
            PdfObject::Array(PdfArray(
                widths.iter().map(|w| PdfObject::Integer(*w as i64)).collect(),
            )),
        );
        dict.insert(
            "Index".to_string(),
            PdfObject::Array(PdfArray(index.into_iter().map(PdfObject::Integer).collect())),
        );
        self.finish_stream(dict, data)
    }

    fn finish_stream(&self, mut dict: PdfDictionary, data: Vec<u8>) -> Result<PdfStream> {
        if !self.compress_streams {
            return Ok(PdfStream::new(dict, data));
        }
        let compressed = compress(&data)?;
        dict.insert("Filter".to_string(), PdfObject::Name(PdfName::new("FlateDecode")));
        Ok(PdfStream::new(dict, compressed))
    }
}

#[derive(Debug, Clone, Copy)]
enum XRefRecord {
    Free,
    InUse(usize),
    Compressed(u32, u32),
}

fn record_for(
    num: u32,
    offsets: &BTreeMap<u32, usize>,
    compressed: &BTreeMap<u32, (u32, u32)>,
) -> XRefRecord {
    if let Some(offset) = offsets.get(&num) {
        XRefRecord::InUse(*offset)
    } else if let Some((stream, index)) = compressed.get(&num) {
        XRefRecord::Compressed(*stream, *index)
    } else {
        XRefRecord::Free
    }
}

/// Calculate minimum bytes needed to represent a value
fn bytes_needed(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        ((value.ilog2() / 8) + 1) as usize
    }
}

/// Write a big-endian field with the specified width
fn write_field(data: &mut Vec<u8>, value: u64, width: usize) {
    for i in (0..width).rev() {
        data.push(((value >> (i * 8)) & 0xFF) as u8);
    }
}

#[cfg(feature = "compression")]
fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder
        .finish()
        .map_err(|e| PdfError::CompressionError(e.to_string()))
}

#[cfg(not(feature = "compression"))]
fn compress(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::CompressionError(
        "stream compression requires the 'compression' feature".to_string(),
    ))
}

/// Table entries; `None` marks a free entry.
fn write_table(out: &mut Vec<u8>, listed: &BTreeMap<u32, Option<usize>>) -> Result<()> {
    out.extend_from_slice(b"xref\n");
    let numbers: Vec<u32> = listed.keys().copied().collect();
    for run in numbers.chunk_by(|a, b| a + 1 == *b) {
        write!(out, "{} {}\n", run[0], run.len())?;
        for num in run {
            match listed.get(num).copied().flatten() {
                Some(offset) => write!(out, "{offset:010} 00000 n\r\n")?,
                None if *num == 0 => out.extend_from_slice(b"0000000000 65535 f\r\n"),
                None => out.extend_from_slice(b"0000000000 00000 f\r\n"),
            }
        }
    }
    Ok(())
}

fn write_trailer(out: &mut Vec<u8>, trailer: &PdfDictionary, size: usize, xref_stm: Option<usize>) -> Result<()> {
    let mut dict = trailer.clone();
    dict.insert("Size".to_string(), PdfObject::Integer(size as i64));
    if let Some(offset) = xref_stm {
        dict.insert("XRefStm".to_string(), PdfObject::Integer(offset as i64));
    }
    out.extend_from_slice(b"trailer\n");
    write_object(out, &PdfObject::Dictionary(dict))?;
    out.push(b'\n');
    Ok(())
}

fn write_indirect(out: &mut Vec<u8>, num: u32, object: &PdfObject) -> Result<()> {
    write!(out, "{num} 0 obj\n")?;
    write_object(out, object)?;
    out.extend_from_slice(b"\nendobj\n");
    Ok(())
}

/// Serialize one object in PDF syntax.
pub fn write_object(out: &mut Vec<u8>, object: &PdfObject) -> Result<()> {
    match object {
        PdfObject::Null => out.extend_from_slice(b"null"),
        PdfObject::Boolean(b) => write!(out, "{b}")?,
        PdfObject::Integer(i) => write!(out, "{i}")?,
        PdfObject::Real(f) => {
            let text = format!("{f:.6}");
            out.extend_from_slice(text.trim_end_matches('0').trim_end_matches('.').as_bytes());
        }
        PdfObject::String(s) => write_string(out, s),
        PdfObject::Name(n) => write_name(out, n),
        PdfObject::Array(arr) => {
            out.push(b'[');
            for (i, obj) in arr.0.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, obj)?;
            }
            out.push(b']');
        }
        PdfObject::Dictionary(dict) => write_dictionary(out, dict)?,
        PdfObject::Stream(stream) => {
            let data = stream.data().ok_or_else(|| {
                PdfError::InvalidStructure("stream payload is not in memory".to_string())
            })?;
            let mut dict = stream.dict.clone();
            // An indirect length is written as given
            if !matches!(dict.get("Length"), Some(PdfObject::Reference(..))) {
                dict.insert("Length".to_string(), PdfObject::Integer(data.len() as i64));
            }
            write_dictionary(out, &dict)?;
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        }
        PdfObject::Reference(num, gen) => write!(out, "{num} {gen} R")?,
    }
    Ok(())
}

fn write_dictionary(out: &mut Vec<u8>, dict: &PdfDictionary) -> Result<()> {
    out.extend_from_slice(b"<<");
    // Sorted keys keep output stable
    for key in dict.keys() {
        if let Some(value) = dict.get(key) {
            out.push(b' ');
            write_name(out, &PdfName::new(key));
            out.push(b' ');
            write_object(out, value)?;
        }
    }
    out.extend_from_slice(b" >>");
    Ok(())
}

fn write_name(out: &mut Vec<u8>, name: &PdfName) {
    out.push(b'/');
    for &b in name.as_str().as_bytes() {
        let regular = b.is_ascii_graphic()
            && !matches!(b, b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%');
        if regular {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &PdfString) {
    if s.hex {
        out.push(b'<');
        for b in &s.bytes {
            out.extend_from_slice(format!("{b:02X}").as_bytes());
        }
        out.push(b'>');
        return;
    }
    out.push(b'(');
    for &b in &s.bytes {
        match b {
            b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', b]),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}
