//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseResult};
use std::collections::HashMap;

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

/// PDF String object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString {
    pub bytes: Vec<u8>,
    /// Written as `<...>` in the source
    pub hex: bool,
}

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

/// PDF Dictionary object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub HashMap<PdfName, PdfObject>);

/// PDF Stream object
///
/// The payload is not read during parsing. A stream parsed from a source
/// records where its bytes start and how many there are; the reader fetches
/// (and if needed repairs) them on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    /// Offset of the first payload byte in the source
    pub offset: usize,
    /// Payload length in bytes
    pub length: usize,
    data: Option<Vec<u8>>,
    /// The indirect object that owns this stream, once read from a document
    reference: Option<(u32, u16)>,
}

impl PdfStream {
    /// A stream whose payload lives in memory rather than in a source.
    pub fn new(mut dict: PdfDictionary, data: Vec<u8>) -> Self {
        dict.insert("Length".to_string(), PdfObject::Integer(data.len() as i64));
        Self {
            dict,
            offset: 0,
            length: data.len(),
            data: Some(data),
            reference: None,
        }
    }

    pub(crate) fn from_source(dict: PdfDictionary, offset: usize) -> Self {
        let length = dict
            .get("Length")
            .and_then(PdfObject::as_integer)
            .filter(|len| *len >= 0)
            .unwrap_or(0) as usize;
        Self {
            dict,
            offset,
            length,
            data: None,
            reference: None,
        }
    }

    /// In-memory payload, if the stream is not backed by a source
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Object and generation number of the owning indirect object
    pub fn reference(&self) -> Option<(u32, u16)> {
        self.reference
    }

    pub(crate) fn set_reference(&mut self, num: u32, gen: u16) {
        self.reference = Some((num, gen));
    }

    /// Update the payload length, keeping `/Length` in step.
    pub fn set_length(&mut self, length: usize) {
        self.length = length;
        self.dict
            .insert("Length".to_string(), PdfObject::Integer(length as i64));
    }

    /// Filter names in application order
    pub fn filters(&self) -> Vec<String> {
        match self.dict.get("Filter") {
            Some(PdfObject::Name(name)) => vec![name.0.clone()],
            Some(PdfObject::Array(array)) => array
                .0
                .iter()
                .filter_map(|f| f.as_name().map(|n| n.0.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(u32, u16), // object number, generation number
}

impl PdfObject {
    /// Parse a PDF object from a lexer, keeping references unresolved
    pub fn parse(lexer: &mut Lexer) -> ParseResult<Self> {
        Self::parse_with(lexer, &mut |num, gen| Ok(PdfObject::Reference(num, gen)))
    }

    /// Parse a PDF object, passing every `num gen R` through `on_reference`.
    ///
    /// The callback decides what the reference becomes; the reader uses it to
    /// validate generations against the xref table.
    pub fn parse_with<F>(lexer: &mut Lexer, on_reference: &mut F) -> ParseResult<Self>
    where
        F: FnMut(u32, u16) -> ParseResult<PdfObject>,
    {
        let token = lexer.next_valid_token()?;
        Self::parse_from_token(lexer, token, on_reference)
    }

    /// Parse a PDF object starting from a specific token
    fn parse_from_token<F>(lexer: &mut Lexer, token: Token, on_reference: &mut F) -> ParseResult<Self>
    where
        F: FnMut(u32, u16) -> ParseResult<PdfObject>,
    {
        match token {
            Token::Null => Ok(PdfObject::Null),
            Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
            Token::Integer(i) => Ok(PdfObject::Integer(i)),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::String(s) => Ok(PdfObject::String(PdfString::new(s))),
            Token::HexString(s) => Ok(PdfObject::String(PdfString { bytes: s, hex: true })),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::Reference(num, gen) => on_reference(num, gen),
            Token::ArrayStart => Self::parse_array(lexer, on_reference),
            Token::DictStart => Self::parse_dictionary_or_stream(lexer, on_reference),
            Token::Eof => Err(ParseError::SyntaxError {
                position: lexer.position(),
                message: "Unexpected end of file".to_string(),
            }),
            _ => Err(ParseError::UnexpectedToken {
                expected: "PDF object".to_string(),
                found: format!("{token:?}"),
            }),
        }
    }

    /// Parse a PDF array
    fn parse_array<F>(lexer: &mut Lexer, on_reference: &mut F) -> ParseResult<Self>
    where
        F: FnMut(u32, u16) -> ParseResult<PdfObject>,
    {
        let mut elements = Vec::new();

        loop {
            let token = lexer.next_valid_token()?;
            match token {
                Token::ArrayEnd => break,
                _ => elements.push(Self::parse_from_token(lexer, token, on_reference)?),
            }
        }

        Ok(PdfObject::Array(PdfArray(elements)))
    }

    /// Parse a PDF dictionary and check if it's followed by a stream
    fn parse_dictionary_or_stream<F>(lexer: &mut Lexer, on_reference: &mut F) -> ParseResult<Self>
    where
        F: FnMut(u32, u16) -> ParseResult<PdfObject>,
    {
        let dict = Self::parse_dictionary_inner(lexer, on_reference)?;

        let before = lexer.position();
        match lexer.next_valid_token() {
            Ok(Token::Stream) => {
                skip_stream_eol(lexer);
                Ok(PdfObject::Stream(PdfStream::from_source(dict, lexer.position())))
            }
            _ => {
                lexer.seek(before);
                Ok(PdfObject::Dictionary(dict))
            }
        }
    }

    /// Parse the inner dictionary
    fn parse_dictionary_inner<F>(lexer: &mut Lexer, on_reference: &mut F) -> ParseResult<PdfDictionary>
    where
        F: FnMut(u32, u16) -> ParseResult<PdfObject>,
    {
        let mut dict = HashMap::new();

        loop {
            let token = lexer.next_valid_token()?;
            match token {
                Token::DictEnd => break,
                Token::Name(key) => {
                    let value = Self::parse_with(lexer, on_reference)?;
                    dict.insert(PdfName(key), value);
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "dictionary key (name) or >>".to_string(),
                        found: format!("{token:?}"),
                    });
                }
            }
        }

        Ok(PdfDictionary(dict))
    }

    /// Check if this object is null
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            PdfObject::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary view, including the dictionary of a stream
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<(u32, u16)> {
        match self {
            PdfObject::Reference(num, gen) => Some((*num, *gen)),
            _ => None,
        }
    }

    /// Apply `f` to every string nested in this object.
    pub(crate) fn for_each_string_mut(&mut self, f: &mut dyn FnMut(&mut PdfString)) {
        match self {
            PdfObject::String(s) => f(s),
            PdfObject::Array(array) => array.0.iter_mut().for_each(|o| o.for_each_string_mut(f)),
            PdfObject::Dictionary(dict) => dict.0.values_mut().for_each(|o| o.for_each_string_mut(f)),
            PdfObject::Stream(stream) => stream
                .dict
                .0
                .values_mut()
                .for_each(|o| o.for_each_string_mut(f)),
            _ => {}
        }
    }
}

/// After the `stream` keyword: skip blanks, then one optional CR and one LF.
fn skip_stream_eol(lexer: &mut Lexer) {
    loop {
        match lexer.read_byte() {
            Some(b' ' | b'\t' | 0 | 0x0C) => continue,
            Some(b'\r') => {
                match lexer.read_byte() {
                    Some(b'\n') | None => {}
                    Some(_) => lexer.back_one_position(),
                }
                return;
            }
            Some(b'\n') | None => return,
            Some(_) => {
                lexer.back_one_position();
                return;
            }
        }
    }
}

impl PdfDictionary {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(&PdfName(key.to_string()))
    }

    pub fn insert(&mut self, key: String, value: PdfObject) {
        self.0.insert(PdfName(key), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.remove(&PdfName(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&PdfName(key.to_string()))
    }

    /// Value of `/Type`
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(|t| t.as_name()).map(|n| n.0.as_str())
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PdfObject::as_integer)
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|o| o.as_name()).map(|n| n.0.as_str())
    }

    pub fn get_array(&self, key: &str) -> Option<&PdfArray> {
        self.get(key).and_then(PdfObject::as_array)
    }

    pub fn get_dict(&self, key: &str) -> Option<&PdfDictionary> {
        self.get(key).and_then(PdfObject::as_dict)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.0.keys().map(|k| k.0.as_str()).collect();
        keys.sort_unstable();
        keys
    }
}

impl PdfArray {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }

    /// Integer at `index`, if present and numeric
    pub fn get_integer(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(PdfObject::as_integer)
    }
}

impl PdfString {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, hex: false }
    }

    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> PdfObject {
        let mut lexer = Lexer::new(input.to_vec());
        PdfObject::parse(&mut lexer).unwrap()
    }

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse(b"null"), PdfObject::Null);
        assert_eq!(parse(b"true"), PdfObject::Boolean(true));
        assert_eq!(parse(b"42"), PdfObject::Integer(42));
        assert_eq!(parse(b"-1.5"), PdfObject::Real(-1.5));
        assert_eq!(parse(b"/Name"), PdfObject::Name(PdfName::new("Name")));
        assert_eq!(parse(b"3 0 R"), PdfObject::Reference(3, 0));
    }

    #[test]
    fn test_parse_nested_dictionary() {
        let obj = parse(b"<< /Type /Page /Kids [1 0 R 2 0 R] /Box [0 0 612 792] /Sub << /A (x) >> >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get_type(), Some("Page"));
        assert_eq!(dict.get_array("Kids").unwrap().len(), 2);
        assert_eq!(
            dict.get_array("Kids").unwrap().get(1),
            Some(&PdfObject::Reference(2, 0))
        );
        assert_eq!(dict.get_array("Box").unwrap().get_integer(3), Some(792));
        let sub = dict.get_dict("Sub").unwrap();
        assert_eq!(sub.get("A").unwrap().as_string().unwrap().as_bytes(), b"x");
    }

    #[test]
    fn test_stream_header_records_offset_and_length() {
        let input = b"<< /Length 5 >>\r\nstream\r\nHELLO\nendstream";
        let mut lexer = Lexer::new(input.to_vec());
        let obj = PdfObject::parse(&mut lexer).unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.length, 5);
        assert_eq!(&input[stream.offset..stream.offset + 5], b"HELLO");
        assert!(stream.data().is_none());
    }

    #[test]
    fn test_stream_keyword_with_trailing_blanks() {
        let input = b"<< /Length 2 >> stream  \nAB\nendstream";
        let mut lexer = Lexer::new(input.to_vec());
        let obj = PdfObject::parse(&mut lexer).unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(&input[stream.offset..stream.offset + 2], b"AB");
    }

    #[test]
    fn test_dictionary_not_followed_by_stream_restores_position() {
        let mut lexer = Lexer::new(b"<< /A 1 >> endobj".to_vec());
        let obj = PdfObject::parse(&mut lexer).unwrap();
        assert!(obj.as_dict().is_some());
        assert_eq!(lexer.next_token().unwrap(), Token::EndObj);
    }

    #[test]
    fn test_parse_with_rewrites_references() {
        let mut lexer = Lexer::new(b"[1 0 R 2 1 R]".to_vec());
        let obj = PdfObject::parse_with(&mut lexer, &mut |num, gen| {
            Ok(if gen == 0 {
                PdfObject::Reference(num, gen)
            } else {
                PdfObject::Null
            })
        })
        .unwrap();
        assert_eq!(
            obj,
            PdfObject::Array(PdfArray(vec![PdfObject::Reference(1, 0), PdfObject::Null]))
        );
    }

    #[test]
    fn test_invalid_dictionary_key() {
        let mut lexer = Lexer::new(b"<< 1 2 >>".to_vec());
        assert!(matches!(
            PdfObject::parse(&mut lexer),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_in_memory_stream_sets_length() {
        let stream = PdfStream::new(PdfDictionary::new(), b"abc".to_vec());
        assert_eq!(stream.dict.get_integer("Length"), Some(3));
        assert_eq!(stream.data(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_filters_list() {
        let obj = parse(b"<< /Filter [/ASCIIHexDecode /FlateDecode] /Length 0 >>");
        let stream = PdfStream::new(obj.as_dict().unwrap().clone(), Vec::new());
        assert_eq!(stream.filters(), vec!["ASCIIHexDecode", "FlateDecode"]);
    }
}
