//! PDF Parser Module
//!
//! Reads PDF files into a lazily resolved object graph. The reader walks a
//! fallback ladder: cross-reference stream, classic table, and finally a
//! full-file rebuild when both are unusable.

pub mod encryption;
pub mod filters;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod reader;
pub mod trailer;
pub mod xref;
pub mod xref_stream;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::fmt;
use std::sync::Arc;

pub use self::encryption::{Permissions, PublicKeyMaterial, RecipientDecryptor, SecurityHandler};
pub use self::header::PdfVersion;
pub use self::lexer::{Lexer, Token};
pub use self::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
pub use self::reader::PdfReader;
pub use self::trailer::PdfTrailer;
pub use self::xref::{XRefEntry, XRefTable};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF header not found")]
    InvalidHeader,

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Invalid object reference: {0} {1} R")]
    InvalidReference(u32, u16),

    #[error("Invalid offset for object {0} {1} R")]
    InvalidOffset(u32, u16),

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid xref table: {0}")]
    InvalidXRef(String),

    #[error("Invalid trailer")]
    InvalidTrailer,

    #[error("Trailer not found")]
    TrailerNotFound,

    #[error("Invalid object stream: {0}")]
    InvalidObjectStream(String),

    #[error("Circular reference detected while reading object {0}")]
    CircularReference(u32),

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),

    #[error("Encryption not supported: {0}")]
    EncryptionNotSupported(String),

    #[error("Document is encrypted with a public key certificate; certificate and key are required")]
    CertificateRequired,

    #[error("Bad user password")]
    InvalidPassword,
}

/// Options consulted while opening a document.
#[derive(Clone, Default)]
pub struct ReaderProperties {
    pub password: Option<Vec<u8>>,
    pub certificate: Option<Vec<u8>>,
    pub certificate_key: Option<Vec<u8>>,
    pub recipient: Option<Arc<dyn RecipientDecryptor>>,
    /// Surface xref errors instead of rebuilding the table.
    pub strict: bool,
}

impl ReaderProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_certificate(
        mut self,
        certificate: impl Into<Vec<u8>>,
        key: impl Into<Vec<u8>>,
        recipient: Arc<dyn RecipientDecryptor>,
    ) -> Self {
        self.certificate = Some(certificate.into());
        self.certificate_key = Some(key.into());
        self.recipient = Some(recipient);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl fmt::Debug for ReaderProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderProperties")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("certificate", &self.certificate.as_ref().map(Vec::len))
            .field("certificate_key", &self.certificate_key.as_ref().map(|_| "***"))
            .field("recipient", &self.recipient.is_some())
            .field("strict", &self.strict)
            .finish()
    }
}
