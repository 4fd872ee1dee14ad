//! # pdfweave
//!
//! PDF object parsing with cross-reference recovery, plus a paginating
//! block and table layout engine.
//!
//! ## Features
//!
//! - **Lenient reading**: classic xref tables, xref streams and hybrid files,
//!   object streams, and a full-file rebuild when the cross-reference data is
//!   missing or broken
//! - **Self-healing streams**: a wrong `/Length` is recomputed from the
//!   `endstream` keyword
//! - **Security hooks**: standard password and public-key handlers behind
//!   the [`parser::SecurityHandler`] trait
//! - **Layout**: renderers for blocks, tables and leaves that split across
//!   areas with keep-together, keep-with-next, floats and forced placement
//!
//! ## Quick Start
//!
//! ### Reading PDFs
//!
//! ```rust
//! use pdfweave::parser::{PdfDictionary, PdfName, PdfObject, PdfReader, PdfVersion, ReaderProperties};
//! use pdfweave::writer::PdfWriter;
//!
//! # fn main() -> pdfweave::Result<()> {
//! let mut catalog = PdfDictionary::new();
//! catalog.insert("Type".to_string(), PdfObject::Name(PdfName::new("Catalog")));
//! let mut trailer = PdfDictionary::new();
//! trailer.insert("Root".to_string(), PdfObject::Reference(1, 0));
//!
//! let mut writer = PdfWriter::new(PdfVersion::new(1, 4));
//! writer.add_object(1, PdfObject::Dictionary(catalog));
//! let written = writer.write(&trailer)?;
//!
//! let mut reader = PdfReader::from_bytes(written.bytes, ReaderProperties::default())?;
//! assert!(!reader.has_rebuilt_xref());
//! let catalog = reader.catalog()?;
//! assert_eq!(catalog.as_dict().and_then(|d| d.get_type()), Some("Catalog"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Laying out content
//!
//! ```rust
//! use pdfweave::layout::{DocumentLayout, LayoutConfig, Property, Renderer};
//! use pdfweave::page::PageSize;
//!
//! let mut doc = DocumentLayout::new(PageSize::LETTER, LayoutConfig::default());
//! doc.add(Renderer::paragraph("Heading", 18.0).with(Property::KeepWithNext, true));
//! doc.add(Renderer::paragraph("Body text", 12.0));
//! let pages = doc.close();
//! assert_eq!(pages[&1].len(), 2);
//! ```

pub mod error;
pub mod geometry;
pub mod layout;
pub mod page;
pub mod parser;
pub mod recovery;
pub mod writer;

pub use error::{PdfError, Result};
pub use geometry::{Point, Rectangle};
pub use layout::{DocumentLayout, LayoutConfig, LayoutError, Renderer};
pub use page::{Margins, PageSize};
pub use parser::{
    ParseError, PdfArray, PdfDictionary, PdfName, PdfObject, PdfReader, PdfStream, PdfString,
    PdfVersion, ReaderProperties,
};
pub use writer::{PdfWriter, WrittenPdf, XRefMode};

/// Current version of pdfweave
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported PDF versions
pub mod pdf_version {
    /// Header versions the reader accepts
    pub const SUPPORTED_VERSIONS: &[&str] =
        &["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7", "2.0"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert!(pdf_version::SUPPORTED_VERSIONS.contains(&"1.7"));
    }

    #[test]
    fn test_layout_reexports() {
        let mut doc = DocumentLayout::new(PageSize::A4, LayoutConfig::default());
        doc.add(Renderer::spacer(10.0));
        assert_eq!(doc.close().len(), 1);
    }
}
