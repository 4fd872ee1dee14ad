//! PDF Trailer Parser
//!
//! Typed access to the trailer dictionary according to ISO 32000-1 Section 7.5.5

use super::objects::{PdfDictionary, PdfObject, PdfString};
use super::{ParseError, ParseResult};

/// PDF Trailer information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfTrailer {
    /// The trailer dictionary
    pub dict: PdfDictionary,
}

impl PdfTrailer {
    pub fn new(dict: PdfDictionary) -> Self {
        Self { dict }
    }

    /// Get the size (number of entries in xref table)
    pub fn size(&self) -> ParseResult<u32> {
        self.dict
            .get_integer("Size")
            .filter(|n| *n >= 0)
            .map(|i| u32::try_from(i).unwrap_or(u32::MAX))
            .ok_or_else(|| ParseError::MissingKey("Size".to_string()))
    }

    /// Get the root object reference (document catalog)
    pub fn root(&self) -> ParseResult<(u32, u16)> {
        self.dict
            .get("Root")
            .and_then(PdfObject::as_reference)
            .ok_or_else(|| ParseError::MissingKey("Root".to_string()))
    }

    /// Get the info object reference (document information dictionary)
    pub fn info(&self) -> Option<(u32, u16)> {
        self.dict.get("Info").and_then(PdfObject::as_reference)
    }

    /// The file identifier pair, when present
    pub fn id(&self) -> Option<(&PdfString, &PdfString)> {
        let array = self.dict.get_array("ID")?;
        let first = array.get(0)?.as_string()?;
        let second = array.get(1).and_then(PdfObject::as_string).unwrap_or(first);
        Some((first, second))
    }

    /// Check if this PDF is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.dict
            .get("Encrypt")
            .is_some_and(|obj| !obj.is_null())
    }

    /// The `/Encrypt` entry: a reference or a direct dictionary
    pub fn encrypt(&self) -> Option<&PdfObject> {
        self.dict.get("Encrypt").filter(|obj| !obj.is_null())
    }

    /// Byte offset of the previous xref section
    pub fn prev(&self) -> Option<usize> {
        self.dict
            .get_integer("Prev")
            .filter(|n| *n >= 0)
            .map(|n| n as usize)
    }

    /// Byte offset of a hybrid file's cross-reference stream
    pub fn xref_stm(&self) -> Option<usize> {
        self.dict
            .get_integer("XRefStm")
            .filter(|n| *n >= 0)
            .map(|n| n as usize)
    }

    /// Validate the trailer dictionary
    pub fn validate(&self) -> ParseResult<()> {
        self.size()?;
        self.root()?;
        Ok(())
    }
}
