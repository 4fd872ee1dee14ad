//! High-level PDF Reader API
//!
//! [`PdfReader`] runs the open ladder once, when constructed:
//!
//! 1. locate the `%PDF-` header and window the source at its offset;
//! 2. read the cross-reference data at `startxref`, preferring an xref stream
//!    and falling back to a classic table with its `/Prev` chain;
//! 3. if that fails, rebuild the table by scanning the whole file;
//! 4. set up decryption when the trailer names an `/Encrypt` dictionary.
//!
//! Objects are materialised lazily and cached in the xref arena, so resolving
//! the same reference twice yields the same [`Arc`].

use super::encryption::{open_security_handler, Permissions, SecurityHandler};
use super::filters;
use super::header::{PdfHeader, PdfVersion};
use super::lexer::{Lexer, Token};
use super::object_stream::ObjectStream;
use super::objects::{PdfDictionary, PdfObject, PdfStream};
use super::trailer::PdfTrailer;
use super::xref::{XRefEntry, XRefTable};
use super::xref_stream::XRefStream;
use super::{ParseError, ParseResult, ReaderProperties};
use crate::recovery;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

/// Markers accepted right after a declared stream length
const STREAM_END_MARKERS: [&[u8]; 4] = [b"\nendstream", b"\r\nendstream", b"\rendstream", b"endstream"];

/// High-level PDF reader
pub struct PdfReader {
    lexer: Lexer,
    xref: XRefTable,
    trailer: PdfTrailer,
    version: PdfVersion,
    props: ReaderProperties,
    /// Object streams already expanded into the arena
    expanded_object_streams: HashSet<u32>,
    security: Option<Box<dyn SecurityHandler>>,
    encrypt_ref: Option<(u32, u16)>,
    encrypted: bool,
    rebuilt_xref: bool,
    hybrid_xref: bool,
    fixed_xref: bool,
    xref_stm: bool,
}

impl std::fmt::Debug for PdfReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfReader")
            .field("version", &self.version)
            .field("xref_size", &self.xref.size())
            .field("encrypted", &self.encrypted)
            .field("rebuilt_xref", &self.rebuilt_xref)
            .field("hybrid_xref", &self.hybrid_xref)
            .field("fixed_xref", &self.fixed_xref)
            .field("xref_stm", &self.xref_stm)
            .finish()
    }
}

impl PdfReader {
    /// Open a PDF file from a path
    pub fn open<P: AsRef<Path>>(path: P, props: ReaderProperties) -> ParseResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), props)
    }

    /// Read a whole document from `reader` and open it
    pub fn new<R: Read>(mut reader: R, props: ReaderProperties) -> ParseResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data, props)
    }

    /// Open a document held in memory
    pub fn from_bytes(data: Vec<u8>, props: ReaderProperties) -> ParseResult<Self> {
        let header = PdfHeader::locate(&data)?;
        let data = if header.offset == 0 {
            data
        } else {
            tracing::debug!(offset = header.offset, "header is preceded by junk, rewindowing source");
            data[header.offset..].to_vec()
        };

        let mut reader = Self {
            lexer: Lexer::new(data),
            xref: XRefTable::new(),
            trailer: PdfTrailer::new(PdfDictionary::new()),
            version: header.version,
            props,
            expanded_object_streams: HashSet::new(),
            security: None,
            encrypt_ref: None,
            encrypted: false,
            rebuilt_xref: false,
            hybrid_xref: false,
            fixed_xref: false,
            xref_stm: false,
        };
        reader.read_pdf()?;
        Ok(reader)
    }

    fn read_pdf(&mut self) -> ParseResult<()> {
        match self.read_xref() {
            Ok(()) => {}
            Err(e) if self.props.strict => return Err(e),
            Err(e) => {
                tracing::warn!(code = "XREF_ERROR", error = %e, "error reading cross-reference table, rebuilding it");
                self.rebuild_xref()?;
            }
        }
        self.read_decrypt()
    }

    /// Parse the cross-reference data starting at `startxref`.
    fn read_xref(&mut self) -> ParseResult<()> {
        let startxref = self.lexer.find_startxref()?;
        self.lexer.seek(startxref);
        self.lexer.expect_token(Token::StartXRef)?;
        let offset = match self.lexer.next_valid_token()? {
            Token::Integer(n) if n >= 0 => n as usize,
            other => {
                return Err(ParseError::InvalidXRef(format!(
                    "startxref is not followed by an offset: {other:?}"
                )))
            }
        };

        match self.read_xref_stream(offset, true) {
            Ok(()) => {
                self.xref_stm = true;
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(error = %e, offset, "no cross-reference stream at startxref, trying a table");
            }
        }

        self.xref.clear();
        self.trailer = PdfTrailer::new(PdfDictionary::new());

        self.lexer.seek(offset);
        let mut section = self.read_xref_section()?;
        self.trailer = PdfTrailer::new(section.clone());

        let mut visited = HashSet::from([offset]);
        let mut current = offset;
        while let Some(prev) = PdfTrailer::new(section).prev() {
            if prev == current {
                return Err(ParseError::InvalidXRef(format!(
                    "trailer /Prev at {prev} points to its own section"
                )));
            }
            if !visited.insert(prev) {
                return Err(ParseError::InvalidXRef(format!(
                    "trailer /Prev chain loops back to {prev}"
                )));
            }
            self.lexer.seek(prev);
            section = self.read_xref_section()?;
            current = prev;
        }
        Ok(())
    }

    /// Read one classic section plus the xref stream a hybrid file names.
    fn read_xref_section(&mut self) -> ParseResult<PdfDictionary> {
        let section = self.xref.read_table_section(&mut self.lexer)?;
        let size = section
            .get_integer("Size")
            .filter(|n| *n >= 0)
            .ok_or_else(|| ParseError::InvalidXRef("trailer is missing /Size".to_string()))?;
        self.xref.declare_size(usize::try_from(size).unwrap_or(usize::MAX));

        if let Some(stm) = PdfTrailer::new(section.clone()).xref_stm() {
            if let Err(e) = self.read_xref_stream(stm, false) {
                self.xref.clear();
                return Err(e);
            }
            self.hybrid_xref = true;
            self.xref_stm = true;
        }
        Ok(section)
    }

    /// Read the xref stream at `offset` and every stream on its `/Prev` chain.
    fn read_xref_stream(&mut self, offset: usize, adopt_trailer: bool) -> ParseResult<()> {
        let mut visited = HashSet::new();
        let mut next = Some(offset);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                return Err(ParseError::InvalidXRef(format!(
                    "xref stream /Prev chain loops back to {offset}"
                )));
            }

            self.lexer.seek(offset);
            let (num, gen) = self.read_object_header()?;
            let mut stream = match PdfObject::parse(&mut self.lexer)? {
                PdfObject::Stream(stream) => stream,
                _ => {
                    return Err(ParseError::InvalidXRef(format!(
                        "object {num} at {offset} is not a stream"
                    )))
                }
            };
            if stream.dict.get_integer("Length").is_none() {
                return Err(ParseError::InvalidXRef(
                    "xref stream needs a direct /Length".to_string(),
                ));
            }
            stream.set_reference(num, gen);

            let data = self.read_stream_bytes(&stream, true)?;
            let xref_stream = XRefStream::new(stream.dict, data)?;
            self.xref.declare_size(xref_stream.size());
            for (num, entry) in xref_stream.to_xref_entries()? {
                self.xref.set_if_absent(num, entry);
            }
            if adopt_trailer && self.trailer.dict.is_empty() {
                self.trailer = PdfTrailer::new(xref_stream.trailer_dict());
            }
            next = xref_stream.prev_offset();
        }
        Ok(())
    }

    /// Expect `num gen obj` at the cursor.
    fn read_object_header(&mut self) -> ParseResult<(u32, u16)> {
        let num = match self.lexer.next_token()? {
            Token::Integer(n) if (0..=u32::MAX as i64).contains(&n) => n as u32,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "object number".to_string(),
                    found: format!("{other:?}"),
                })
            }
        };
        let gen = match self.lexer.next_token()? {
            Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "generation number".to_string(),
                    found: format!("{other:?}"),
                })
            }
        };
        match self.lexer.next_token()? {
            Token::Obj => Ok((num, gen)),
            other => Err(ParseError::UnexpectedToken {
                expected: "obj".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn rebuild_xref(&mut self) -> ParseResult<()> {
        self.hybrid_xref = false;
        self.xref_stm = false;
        self.expanded_object_streams.clear();
        let (trailer, stats) = recovery::rebuild_xref(&mut self.lexer, &mut self.xref)?;
        tracing::debug!(?stats, "cross-reference table rebuilt");
        self.trailer = trailer;
        self.rebuilt_xref = true;
        Ok(())
    }

    fn fix_xref(&mut self) {
        self.fixed_xref = true;
        let fixed = recovery::fix_xref_offsets(&mut self.lexer, &mut self.xref);
        tracing::debug!(fixed, "fixed cross-reference offsets");
    }

    fn read_decrypt(&mut self) -> ParseResult<()> {
        let Some(encrypt) = self.trailer.encrypt().cloned() else {
            return Ok(());
        };
        self.encrypted = true;

        let dict = match encrypt {
            PdfObject::Reference(num, gen) => {
                self.encrypt_ref = Some((num, gen));
                self.read_object(num, gen)?
                    .as_dict()
                    .cloned()
                    .ok_or_else(|| ParseError::EncryptionNotSupported("/Encrypt is not a dictionary".to_string()))?
            }
            PdfObject::Dictionary(dict) => dict,
            _ => {
                return Err(ParseError::EncryptionNotSupported(
                    "/Encrypt is not a dictionary".to_string(),
                ))
            }
        };

        let id = self
            .trailer
            .id()
            .map(|(first, _)| first.as_bytes().to_vec())
            .unwrap_or_default();
        self.security = Some(open_security_handler(&dict, &id, &self.props)?);
        Ok(())
    }

    /// Resolve indirect object `(num, gen)`.
    ///
    /// Free and unknown objects resolve to null. A generation that disagrees
    /// with the xref entry is an error until offsets have been fixed once;
    /// after that it degrades to null with a warning.
    pub fn read_object(&mut self, num: u32, gen: u16) -> ParseResult<Arc<PdfObject>> {
        self.read_object_inner(num, gen, true)
    }

    fn read_object_inner(&mut self, num: u32, gen: u16, allow_fix: bool) -> ParseResult<Arc<PdfObject>> {
        let entry = match self.xref.entry(num) {
            None | Some(XRefEntry::Free { .. }) => return Ok(Arc::new(PdfObject::Null)),
            Some(entry) => entry,
        };
        if entry.generation() != gen {
            return self.broken_reference(num, gen).map(Arc::new);
        }
        if let Some(cached) = self.xref.cached(num) {
            return Ok(cached);
        }

        match entry {
            XRefEntry::Compressed { stream, .. } => {
                self.read_object_stream(stream)?;
                Ok(self.xref.cached(num).unwrap_or_else(|| {
                    tracing::warn!(num, stream, "object is missing from its object stream");
                    Arc::new(PdfObject::Null)
                }))
            }
            XRefEntry::InUse { offset, .. } => {
                self.xref.begin_reading(num)?;
                match self.parse_indirect_object(num, gen, offset, allow_fix) {
                    Ok(object) => Ok(self.xref.resolve(num, object)),
                    Err(e) => {
                        self.xref.abandon_reading(num);
                        if matches!(e, ParseError::CircularReference(_)) || !allow_fix || self.fixed_xref {
                            return Err(e);
                        }
                        tracing::debug!(num, gen, error = %e, "object not found at its offset, fixing xref");
                        self.fix_xref();
                        self.read_object_inner(num, gen, false)
                    }
                }
            }
            XRefEntry::Free { .. } => Ok(Arc::new(PdfObject::Null)),
        }
    }

    fn broken_reference(&self, num: u32, gen: u16) -> ParseResult<PdfObject> {
        if self.fixed_xref {
            tracing::warn!(code = "INVALID_INDIRECT_REFERENCE", num, gen, "invalid indirect reference, using null");
            Ok(PdfObject::Null)
        } else {
            Err(ParseError::InvalidReference(num, gen))
        }
    }

    fn parse_indirect_object(&mut self, num: u32, gen: u16, offset: usize, allow_fix: bool) -> ParseResult<PdfObject> {
        self.lexer.seek(offset);
        let header = self.read_object_header()?;
        if header != (num, gen) {
            return Err(ParseError::InvalidOffset(num, gen));
        }

        let xref = &self.xref;
        let fixed = self.fixed_xref;
        let mut object = PdfObject::parse_with(&mut self.lexer, &mut |n, g| check_reference(xref, fixed, n, g))?;

        if Some((num, gen)) != self.encrypt_ref {
            if let Some(handler) = self.security.as_deref() {
                object.for_each_string_mut(&mut |s| s.bytes = handler.decrypt_string(&s.bytes, num, gen));
            }
        }

        if let PdfObject::Stream(stream) = &mut object {
            stream.set_reference(num, gen);
            if let Some((len_num, len_gen)) = stream.dict.get("Length").and_then(PdfObject::as_reference) {
                let length = self
                    .read_object_inner(len_num, len_gen, allow_fix)
                    .ok()
                    .and_then(|obj| obj.as_integer())
                    .filter(|n| *n >= 0);
                match length {
                    Some(length) => stream.set_length(length as usize),
                    None => {
                        stream.dict.remove("Length");
                    }
                }
            }
            self.check_stream_length(stream);
        }
        Ok(object)
    }

    /// Recompute a stream length that does not land on `endstream`.
    fn check_stream_length(&mut self, stream: &mut PdfStream) {
        if matches!(stream.dict.get_type(), Some("XRef" | "ObjStm")) {
            return;
        }

        let file_len = self.lexer.len();
        let start = stream.offset;
        let suspicious = match stream.dict.get_integer("Length") {
            None => true,
            Some(declared) if declared < 0 => true,
            Some(declared) => {
                let end = start.saturating_add(declared as usize);
                if end > file_len.saturating_sub(20) {
                    true
                } else {
                    let tail = self.lexer.slice(end, 20);
                    !STREAM_END_MARKERS.iter().any(|marker| tail.starts_with(marker))
                }
            }
        };
        if !suspicious {
            return;
        }

        self.lexer.seek(start);
        let mut line = Vec::with_capacity(64);
        let mut pos;
        loop {
            pos = self.lexer.position();
            if !self.lexer.read_line(&mut line, false) {
                break;
            }
            if line.starts_with(b"endstream") {
                break;
            }
            if line.starts_with(b"endobj") {
                let back = pos.saturating_sub(16).max(start);
                let window = self.lexer.slice(back, pos - back);
                if let Some(index) = window.windows(9).position(|w| w == b"endstream") {
                    pos = back + index;
                }
                break;
            }
        }

        let mut length = pos.saturating_sub(start);
        let data = self.lexer.data();
        if length > 0 && pos >= 2 && data.get(pos - 2) == Some(&b'\r') {
            length -= 1;
        }
        if length > 0 && pos >= 1 && data.get(pos - 1) == Some(&b'\n') {
            length -= 1;
        }

        tracing::debug!(start, length, declared = ?stream.dict.get_integer("Length"), "recomputed stream length");
        stream.set_length(length);
    }

    /// Expand an object stream into the arena, once per stream.
    fn read_object_stream(&mut self, stream_num: u32) -> ParseResult<()> {
        if self.expanded_object_streams.contains(&stream_num) {
            return Ok(());
        }
        self.expanded_object_streams.insert(stream_num);

        let container = self.read_object(stream_num, 0)?;
        let stream = container.as_stream().ok_or_else(|| {
            ParseError::InvalidObjectStream(format!("object {stream_num} is not a stream"))
        })?;
        let data = self.read_stream_bytes(stream, true)?;
        let mut object_stream = ObjectStream::new(&stream.dict, data)?;

        let numbers: Vec<u32> = object_stream.object_numbers().collect();
        for (index, num) in numbers.into_iter().enumerate() {
            let belongs = matches!(
                self.xref.entry(num),
                Some(XRefEntry::Compressed { stream, .. }) if stream == stream_num
            );
            if !belongs || self.xref.cached(num).is_some() {
                continue;
            }
            let xref = &self.xref;
            let fixed = self.fixed_xref;
            let (_, object) = object_stream.parse_object(index, &mut |n, g| check_reference(xref, fixed, n, g))?;
            self.xref.resolve(num, object);
        }
        Ok(())
    }

    /// Raw or decoded payload of `stream`.
    ///
    /// Payloads are decrypted first unless the stream is a cross-reference
    /// stream, carries its own `/Crypt` filter, or is the encryption
    /// dictionary itself.
    pub fn read_stream_bytes(&self, stream: &PdfStream, decode: bool) -> ParseResult<Vec<u8>> {
        let mut bytes = match stream.data() {
            Some(data) => data.to_vec(),
            None => self.lexer.slice(stream.offset, stream.length).to_vec(),
        };

        if let (Some(handler), Some((num, gen))) = (self.security.as_deref(), stream.reference()) {
            let skip = stream.filters().iter().any(|f| f == "Crypt")
                || stream.dict.get_type() == Some("XRef")
                || Some((num, gen)) == self.encrypt_ref;
            if !skip {
                bytes = handler.decrypt_stream(&bytes, num, gen);
            }
        }

        if decode {
            filters::decode_stream(&bytes, &stream.dict)
        } else {
            Ok(bytes)
        }
    }

    /// Resolve `object` if it is a reference; other objects are returned as is.
    pub fn resolve(&mut self, object: &PdfObject) -> ParseResult<Arc<PdfObject>> {
        match object {
            PdfObject::Reference(num, gen) => self.read_object(*num, *gen),
            other => Ok(Arc::new(other.clone())),
        }
    }

    /// The document catalog named by the trailer's `/Root`
    pub fn catalog(&mut self) -> ParseResult<Arc<PdfObject>> {
        let (num, gen) = self.trailer.root()?;
        let catalog = self.read_object(num, gen)?;
        if catalog.as_dict().is_none() {
            return Err(ParseError::InvalidReference(num, gen));
        }
        Ok(catalog)
    }

    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    /// One past the highest object number in the xref table
    pub fn xref_size(&self) -> usize {
        self.xref.size()
    }

    /// Length of the source from the header onwards
    pub fn file_length(&self) -> usize {
        self.lexer.len()
    }

    pub fn has_rebuilt_xref(&self) -> bool {
        self.rebuilt_xref
    }

    pub fn has_hybrid_xref(&self) -> bool {
        self.hybrid_xref
    }

    pub fn has_fixed_xref(&self) -> bool {
        self.fixed_xref
    }

    pub fn has_xref_stm(&self) -> bool {
        self.xref_stm
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Permissions granted to the opener, `None` for unencrypted documents
    pub fn permissions(&self) -> Option<Permissions> {
        self.security.as_ref().map(|handler| handler.permissions())
    }

    pub fn is_opened_with_full_permission(&self) -> bool {
        self.security
            .as_ref()
            .map_or(!self.encrypted, |handler| handler.opened_with_full_permission())
    }
}

/// Validate a reference met while parsing an object body.
fn check_reference(xref: &XRefTable, fixed: bool, num: u32, gen: u16) -> ParseResult<PdfObject> {
    match xref.entry(num) {
        Some(XRefEntry::Free { .. }) => {
            tracing::warn!(code = "INVALID_INDIRECT_REFERENCE", num, gen, "reference to a free object, using null");
            Ok(PdfObject::Null)
        }
        Some(entry) if entry.generation() != gen => {
            if fixed {
                tracing::warn!(code = "INVALID_INDIRECT_REFERENCE", num, gen, "generation mismatch, using null");
                Ok(PdfObject::Null)
            } else {
                Err(ParseError::InvalidReference(num, gen))
            }
        }
        _ => Ok(PdfObject::Reference(num, gen)),
    }
}
