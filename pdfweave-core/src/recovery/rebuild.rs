//! Full-file cross-reference reconstruction

use crate::parser::lexer::{check_object_start, Lexer};
use crate::parser::objects::PdfObject;
use crate::parser::trailer::PdfTrailer;
use crate::parser::xref::{XRefEntry, XRefTable};
use crate::parser::{ParseError, ParseResult};

/// Recovery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of object headers found
    pub objects_found: usize,
    /// Number of xref entries written or corrected
    pub entries_reconstructed: usize,
    /// Number of `trailer` dictionaries with a `/Root`
    pub trailers_found: usize,
}

/// Rebuild `xref` from scratch by scanning every line of the source.
///
/// An object header replaces an existing entry only when its generation is
/// greater or equal, so later revisions of an object win. The last trailer
/// carrying `/Root` becomes the document trailer.
pub fn rebuild_xref(lexer: &mut Lexer, xref: &mut XRefTable) -> ParseResult<(PdfTrailer, RecoveryStats)> {
    xref.clear();
    lexer.seek(0);

    let mut stats = RecoveryStats::default();
    let mut trailer = None;
    let mut line = Vec::with_capacity(64);

    loop {
        let pos = lexer.position();
        if !lexer.read_line(&mut line, true) {
            break;
        }

        match line.first() {
            Some(b't') => {
                if !line.starts_with(b"trailer") {
                    continue;
                }
                lexer.seek(pos);
                // Consume the `trailer` keyword itself
                lexer.next_token()?;
                let after_keyword = lexer.position();
                match PdfObject::parse(lexer) {
                    Ok(PdfObject::Dictionary(dict)) if dict.contains_key("Root") => {
                        stats.trailers_found += 1;
                        trailer = Some(dict);
                    }
                    Ok(_) => {}
                    Err(_) => lexer.seek(after_keyword),
                }
            }
            Some(b'0'..=b'9') => {
                let Some((num, gen)) = check_object_start(&line) else {
                    continue;
                };
                stats.objects_found += 1;
                let replace = xref.entry(num).map_or(true, |e| e.generation() <= gen);
                if replace
                    && xref.set(
                        num,
                        XRefEntry::InUse {
                            offset: pos,
                            generation: gen,
                        },
                    )
                {
                    stats.entries_reconstructed += 1;
                }
            }
            _ => {}
        }
    }

    let trailer = trailer.ok_or(ParseError::TrailerNotFound)?;
    tracing::debug!(
        objects = stats.objects_found,
        entries = stats.entries_reconstructed,
        "rebuilt cross-reference table"
    );
    Ok((PdfTrailer::new(trailer), stats))
}

/// Correct offsets of in-use entries whose `num gen obj` header is found at
/// a different position. Returns the number of corrected entries.
pub fn fix_xref_offsets(lexer: &mut Lexer, xref: &mut XRefTable) -> usize {
    lexer.seek(0);
    let mut line = Vec::with_capacity(64);
    let mut fixed = 0;

    loop {
        let pos = lexer.position();
        if !lexer.read_line(&mut line, true) {
            break;
        }
        if !line.first().is_some_and(u8::is_ascii_digit) {
            continue;
        }
        if let Some((num, gen)) = check_object_start(&line) {
            let stale = matches!(
                xref.entry(num),
                Some(XRefEntry::InUse { offset, generation }) if generation == gen && offset != pos
            );
            if stale && xref.fix_offset(num, gen, pos) {
                fixed += 1;
            }
        }
    }

    tracing::debug!(fixed, "corrected cross-reference offsets");
    fixed
}
