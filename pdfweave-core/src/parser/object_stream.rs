//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+)

use super::lexer::{Lexer, Token};
use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

/// The decoded contents of one `/Type /ObjStm` stream
#[derive(Debug)]
pub struct ObjectStream {
    /// Number of objects in the stream
    n: usize,
    /// Offset of the first object in the decoded data
    first: usize,
    /// Object numbers paired with their absolute offsets
    offsets: Vec<(u32, usize)>,
    lexer: Lexer,
}

impl ObjectStream {
    /// Read the header pairs of a decoded object stream.
    pub fn new(dict: &PdfDictionary, data: Vec<u8>) -> ParseResult<Self> {
        let n = dict
            .get_integer("N")
            .filter(|n| *n >= 0)
            .ok_or_else(|| ParseError::InvalidObjectStream("missing /N".to_string()))?
            as usize;
        let first = dict
            .get_integer("First")
            .filter(|n| *n >= 0)
            .ok_or_else(|| ParseError::InvalidObjectStream("missing /First".to_string()))?
            as usize;

        // Every header pair takes at least four bytes
        let mut offsets = Vec::with_capacity(n.min(data.len() / 4));
        let mut lexer = Lexer::new(data);
        for k in 0..n {
            let num = match lexer.next_token()? {
                Token::Integer(v) if (0..=u32::MAX as i64).contains(&v) => v as u32,
                other => {
                    return Err(ParseError::InvalidObjectStream(format!(
                        "expected object number for entry {k}, found {other:?}"
                    )))
                }
            };
            let offset = match lexer.next_token()? {
                Token::Integer(v) if v >= 0 => v as usize,
                other => {
                    return Err(ParseError::InvalidObjectStream(format!(
                        "expected offset for object {num}, found {other:?}"
                    )))
                }
            };
            let absolute = first.checked_add(offset).ok_or_else(|| {
                ParseError::InvalidObjectStream(format!("offset of object {num} overflows"))
            })?;
            offsets.push((num, absolute));
        }

        Ok(Self {
            n,
            first,
            offsets,
            lexer,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn first(&self) -> usize {
        self.first
    }

    /// Object numbers in stream order
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.offsets.iter().map(|(num, _)| *num)
    }

    /// Parse the object at position `index`, routing references through
    /// `on_reference`.
    pub fn parse_object<F>(&mut self, index: usize, on_reference: &mut F) -> ParseResult<(u32, PdfObject)>
    where
        F: FnMut(u32, u16) -> ParseResult<PdfObject>,
    {
        let (num, offset) = *self.offsets.get(index).ok_or_else(|| {
            ParseError::InvalidObjectStream(format!("index {index} out of range"))
        })?;
        if offset > self.lexer.len() {
            return Err(ParseError::InvalidObjectStream(format!(
                "object {num} starts past the end of the stream"
            )));
        }
        self.lexer.seek(offset);
        let object = PdfObject::parse_with(&mut self.lexer, on_reference)?;
        Ok((num, object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(n: i64, first: i64) -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        dict.insert("N".to_string(), PdfObject::Integer(n));
        dict.insert("First".to_string(), PdfObject::Integer(first));
        dict
    }

    #[test]
    fn test_parse_objects() {
        let data = b"10 0 11 6 42    << /Kind /Leaf >>".to_vec();
        let mut stream = ObjectStream::new(&dict(2, 10), data).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream.object_numbers().collect::<Vec<_>>(), vec![10, 11]);

        let keep = &mut |num: u32, gen: u16| -> ParseResult<PdfObject> {
            Ok(PdfObject::Reference(num, gen))
        };
        assert_eq!(stream.parse_object(0, keep).unwrap(), (10, PdfObject::Integer(42)));
        let (num, obj) = stream.parse_object(1, keep).unwrap();
        assert_eq!(num, 11);
        assert_eq!(obj.as_dict().and_then(|d| d.get_name("Kind")), Some("Leaf"));
    }

    #[test]
    fn test_missing_header_keys() {
        let mut d = dict(1, 0);
        d.remove("First");
        assert!(matches!(
            ObjectStream::new(&d, b"1 0 null".to_vec()),
            Err(ParseError::InvalidObjectStream(_))
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(ObjectStream::new(&dict(3, 8), b"1 0 2".to_vec()).is_err());
    }

    #[test]
    fn test_huge_object_count_is_an_error() {
        assert!(matches!(
            ObjectStream::new(&dict(i64::MAX, 4), b"1 0 null".to_vec()),
            Err(ParseError::InvalidObjectStream(_))
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let mut stream = ObjectStream::new(&dict(1, 4), b"5 0 true".to_vec()).unwrap();
        let keep = &mut |num: u32, gen: u16| -> ParseResult<PdfObject> {
            Ok(PdfObject::Reference(num, gen))
        };
        assert!(stream.parse_object(3, keep).is_err());
    }
}
