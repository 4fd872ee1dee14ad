//! PDF Header Parser
//!
//! Locates the `%PDF-x.y` header according to ISO 32000-1 Section 7.5.2.
//! Producers sometimes prepend junk, so the header may start anywhere in the
//! first kilobyte; every file offset is relative to where it was found.

use super::{ParseError, ParseResult};

const HEADER_SEARCH_WINDOW: usize = 1024;

/// PDF Version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    /// Create a new PDF version
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Check if this version is supported
    pub fn is_supported(&self) -> bool {
        // We support PDF 1.0 through 2.0
        matches!((self.major, self.minor), (1, 0..=7) | (2, 0))
    }
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// PDF Header information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfHeader {
    pub version: PdfVersion,
    /// Offset of `%PDF-` in the raw source
    pub offset: usize,
}

impl PdfHeader {
    /// Find the header in the first kilobyte of `data`.
    pub fn locate(data: &[u8]) -> ParseResult<Self> {
        let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
        let offset = window
            .windows(5)
            .position(|w| w == b"%PDF-")
            .ok_or(ParseError::InvalidHeader)?;

        let rest = &data[offset + 5..data.len().min(offset + 5 + 8)];
        let version = parse_version(rest).ok_or(ParseError::InvalidHeader)?;
        if !version.is_supported() {
            tracing::warn!(%version, "unsupported PDF version in header, continuing");
        }

        Ok(Self { version, offset })
    }
}

fn parse_version(bytes: &[u8]) -> Option<PdfVersion> {
    let mut parts = bytes
        .split(|b| !b.is_ascii_digit())
        .filter(|part| !part.is_empty());
    let major = std::str::from_utf8(parts.next()?).ok()?.parse().ok()?;
    let dot = bytes.iter().position(|b| *b == b'.')?;
    let minor_bytes: Vec<u8> = bytes[dot + 1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    let minor = std::str::from_utf8(&minor_bytes).ok()?.parse().ok()?;
    Some(PdfVersion::new(major, minor))
}
