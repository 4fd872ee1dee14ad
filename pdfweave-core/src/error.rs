use crate::layout::LayoutError;
use crate::parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("Compression error: {0}")]
    CompressionError(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::InvalidStructure("test message".to_string());
        assert_eq!(error.to_string(), "Invalid PDF structure: test message");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);
        assert!(matches!(pdf_error, PdfError::Io(_)));
        assert!(pdf_error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_parse_error() {
        let error: PdfError = ParseError::TrailerNotFound.into();
        assert_eq!(error.to_string(), "Parse error: Trailer not found");
    }

    #[test]
    fn test_from_layout_error() {
        let error: PdfError = LayoutError::UnsupportedOperation("layout on root").into();
        assert!(matches!(error, PdfError::Layout(_)));
    }

    #[test]
    fn test_result_question_mark() {
        fn open() -> Result<()> {
            Err(ParseError::InvalidHeader)?
        }
        assert!(matches!(open(), Err(PdfError::Parse(ParseError::InvalidHeader))));
    }
}
