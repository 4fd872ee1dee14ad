//! Cross-reference table
//!
//! An arena of slots keyed by object number. Each slot records where its
//! object lives and, once read, caches the resolved value so repeated lookups
//! return the same instance without touching the source again. Slots are
//! stored sparsely: object numbers and `/Size` values come from the file and
//! may be arbitrarily large.

use super::lexer::{Lexer, Token};
use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Generation of the free-list head
pub const FREE_HEAD_GENERATION: u16 = 65535;

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object entry
    Free { generation: u16 },
    /// In-use object stored at a byte offset
    InUse { offset: usize, generation: u16 },
    /// Object stored inside an object stream (PDF 1.5+)
    Compressed { stream: u32, index: u32 },
}

impl XRefEntry {
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation } | XRefEntry::InUse { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }
}

#[derive(Debug, Clone)]
enum SlotState {
    Unresolved,
    Reading,
    Resolved(Arc<PdfObject>),
}

#[derive(Debug, Clone)]
struct Slot {
    entry: XRefEntry,
    state: SlotState,
}

impl Slot {
    fn new(entry: XRefEntry) -> Self {
        Self {
            entry,
            state: SlotState::Unresolved,
        }
    }
}

/// Cross-reference table
#[derive(Debug, Clone)]
pub struct XRefTable {
    slots: BTreeMap<u32, Slot>,
    /// Largest `/Size` declared by a section read so far
    declared_size: usize,
}

impl Default for XRefTable {
    fn default() -> Self {
        Self::new()
    }
}

impl XRefTable {
    /// An empty table holding only the free-list head
    pub fn new() -> Self {
        let head = Slot::new(XRefEntry::Free {
            generation: FREE_HEAD_GENERATION,
        });
        Self {
            slots: BTreeMap::from([(0, head)]),
            declared_size: 0,
        }
    }

    /// Drop every entry except the free-list head.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// One past the highest known object number, or the declared `/Size`
    /// if that is larger
    pub fn size(&self) -> usize {
        let known = self
            .slots
            .keys()
            .next_back()
            .map_or(0, |&num| num as usize + 1);
        known.max(self.declared_size)
    }

    /// Number of entries actually present
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry(&self, num: u32) -> Option<XRefEntry> {
        self.slot(num).map(|slot| slot.entry)
    }

    pub fn contains(&self, num: u32) -> bool {
        self.slot(num).is_some()
    }

    /// Record a `/Size` read from a trailer or xref stream.
    pub fn declare_size(&mut self, size: usize) {
        self.declared_size = self.declared_size.max(size);
    }

    /// Insert an entry unless the object number is already known.
    ///
    /// Sections are read newest first, so the first writer wins. Returns
    /// whether the entry was stored.
    pub fn set_if_absent(&mut self, num: u32, entry: XRefEntry) -> bool {
        if self.contains(num) {
            return false;
        }
        self.store(num, entry)
    }

    /// Insert or replace an entry. Object 0 only ever accepts free entries.
    pub fn set(&mut self, num: u32, entry: XRefEntry) -> bool {
        self.store(num, entry)
    }

    fn store(&mut self, num: u32, entry: XRefEntry) -> bool {
        if num == 0 && !entry.is_free() {
            return false;
        }
        self.slots.insert(num, Slot::new(entry));
        true
    }

    /// Correct the offset of an in-use entry whose generation matches.
    pub fn fix_offset(&mut self, num: u32, generation: u16, offset: usize) -> bool {
        match self.slot_mut(num) {
            Some(slot) => match slot.entry {
                XRefEntry::InUse { generation: g, .. } if g == generation => {
                    slot.entry = XRefEntry::InUse { offset, generation };
                    true
                }
                _ => false,
            },
            None => false,
        }
    }

    /// All entries in object-number order
    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.slots.iter().map(|(&num, slot)| (num, slot.entry))
    }

    /// Cached value of an already resolved object
    pub fn cached(&self, num: u32) -> Option<Arc<PdfObject>> {
        match self.slot(num).map(|s| &s.state) {
            Some(SlotState::Resolved(obj)) => Some(Arc::clone(obj)),
            _ => None,
        }
    }

    /// Mark a slot as being read; re-entering the same slot is a cycle.
    pub(crate) fn begin_reading(&mut self, num: u32) -> ParseResult<()> {
        let slot = self
            .slot_mut(num)
            .ok_or(ParseError::InvalidReference(num, 0))?;
        match slot.state {
            SlotState::Reading => Err(ParseError::CircularReference(num)),
            _ => {
                slot.state = SlotState::Reading;
                Ok(())
            }
        }
    }

    /// Leave the reading state without a value.
    pub(crate) fn abandon_reading(&mut self, num: u32) {
        if let Some(slot) = self.slot_mut(num) {
            if matches!(slot.state, SlotState::Reading) {
                slot.state = SlotState::Unresolved;
            }
        }
    }

    /// Cache a resolved value; a slot is resolved at most once.
    pub(crate) fn resolve(&mut self, num: u32, object: PdfObject) -> Arc<PdfObject> {
        if let Some(existing) = self.cached(num) {
            return existing;
        }
        let object = Arc::new(object);
        if let Some(slot) = self.slot_mut(num) {
            slot.state = SlotState::Resolved(Arc::clone(&object));
        }
        object
    }

    fn slot(&self, num: u32) -> Option<&Slot> {
        self.slots.get(&num)
    }

    fn slot_mut(&mut self, num: u32) -> Option<&mut Slot> {
        self.slots.get_mut(&num)
    }

    /// Read one classic `xref` section starting at the lexer cursor and
    /// return its trailer dictionary.
    pub fn read_table_section(&mut self, lexer: &mut Lexer) -> ParseResult<PdfDictionary> {
        match lexer.next_valid_token()? {
            Token::Xref => {}
            other => {
                return Err(ParseError::InvalidXRef(format!(
                    "xref subsection not found, got {other:?}"
                )))
            }
        }

        loop {
            let start = match lexer.next_valid_token()? {
                Token::Trailer => break,
                Token::Integer(n) if n >= 0 => n as u32,
                other => {
                    return Err(ParseError::InvalidXRef(format!(
                        "object number of the first object in this xref subsection not found, got {other:?}"
                    )))
                }
            };
            let count = match lexer.next_valid_token()? {
                Token::Integer(n) if n >= 0 => n as u32,
                other => {
                    return Err(ParseError::InvalidXRef(format!(
                        "number of entries in this xref subsection not found, got {other:?}"
                    )))
                }
            };

            let mut end = start.saturating_add(count);
            let mut num = start;
            while num < end {
                let offset = self.next_entry_field(lexer)?;
                let generation = self.next_entry_field(lexer)?;
                let flag = lexer.next_valid_token()?;

                // Some producers number the free-list head as object 1
                if num == 1 && num == start && offset == 0 && generation == FREE_HEAD_GENERATION as i64
                {
                    tracing::debug!("xref subsection starts its free-list head at object 1, realigning");
                    end -= 1;
                    continue;
                }

                let generation = u16::try_from(generation).map_err(|_| {
                    ParseError::InvalidXRef(format!("generation out of range for object {num}"))
                })?;
                let offset = usize::try_from(offset).map_err(|_| {
                    ParseError::InvalidXRef(format!("offset out of range for object {num}"))
                })?;

                match flag {
                    Token::Keyword(ref k) if k == "n" => {
                        if !self.contains(num) {
                            if offset == 0 {
                                return Err(ParseError::InvalidXRef(format!(
                                    "file position 0 cross-reference entry for object {num}"
                                )));
                            }
                            self.set_if_absent(num, XRefEntry::InUse { offset, generation });
                        }
                    }
                    Token::Keyword(ref k) if k == "f" => {
                        self.set_if_absent(num, XRefEntry::Free { generation });
                    }
                    other => {
                        return Err(ParseError::InvalidXRef(format!(
                            "invalid cross-reference entry for object {num}: {other:?}"
                        )))
                    }
                }
                num += 1;
            }
        }

        match PdfObject::parse(lexer)? {
            PdfObject::Dictionary(dict) => Ok(dict),
            _ => Err(ParseError::InvalidTrailer),
        }
    }

    fn next_entry_field(&self, lexer: &mut Lexer) -> ParseResult<i64> {
        match lexer.next_token()? {
            Token::Integer(n) if n >= 0 => Ok(n),
            other => Err(ParseError::InvalidXRef(format!(
                "malformed xref entry at {}: {other:?}",
                lexer.position()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(text: &str) -> (XRefTable, PdfDictionary) {
        let mut table = XRefTable::new();
        let mut lexer = Lexer::new(text.as_bytes().to_vec());
        let trailer = table.read_table_section(&mut lexer).unwrap();
        (table, trailer)
    }

    #[test]
    fn test_new_table_has_free_head() {
        let table = XRefTable::new();
        assert_eq!(table.size(), 1);
        assert_eq!(
            table.entry(0),
            Some(XRefEntry::Free {
                generation: FREE_HEAD_GENERATION
            })
        );
    }

    #[test]
    fn test_object_zero_rejects_in_use_entries() {
        let mut table = XRefTable::new();
        assert!(!table.set(
            0,
            XRefEntry::InUse {
                offset: 10,
                generation: 0
            }
        ));
        assert!(table.entry(0).unwrap().is_free());
    }

    #[test]
    fn test_set_if_absent_keeps_first_writer() {
        let mut table = XRefTable::new();
        assert!(table.set_if_absent(3, XRefEntry::InUse { offset: 100, generation: 0 }));
        assert!(!table.set_if_absent(3, XRefEntry::InUse { offset: 200, generation: 0 }));
        assert_eq!(
            table.entry(3),
            Some(XRefEntry::InUse { offset: 100, generation: 0 })
        );
        assert_eq!(table.size(), 4);
        assert!(!table.contains(2));
    }

    #[test]
    fn test_huge_object_numbers_are_stored_sparsely() {
        let mut table = XRefTable::new();
        assert!(table.set(u32::MAX - 1, XRefEntry::InUse { offset: 10, generation: 0 }));
        table.declare_size(900_000_000_000);
        assert_eq!(table.len(), 2);
        assert_eq!(table.size(), 900_000_000_000);
        assert_eq!(
            table.iter().map(|(num, _)| num).collect::<Vec<_>>(),
            vec![0, u32::MAX - 1]
        );
    }

    #[test]
    fn test_declared_size_never_shrinks() {
        let mut table = XRefTable::new();
        table.declare_size(10);
        table.declare_size(4);
        assert_eq!(table.size(), 10);
        table.clear();
        assert_eq!(table.size(), 1);
    }

    #[test]
    fn test_read_table_section() {
        let (table, trailer) = section(
            "xref\n0 3\n0000000000 65535 f \n0000000015 00000 n \n0000000074 00001 n \ntrailer\n<< /Size 3 /Root 1 0 R >>",
        );
        assert_eq!(
            table.entry(1),
            Some(XRefEntry::InUse { offset: 15, generation: 0 })
        );
        assert_eq!(
            table.entry(2),
            Some(XRefEntry::InUse { offset: 74, generation: 1 })
        );
        assert_eq!(trailer.get_integer("Size"), Some(3));
    }

    #[test]
    fn test_multiple_subsections() {
        let (table, _) = section(
            "xref\n0 1\n0000000000 65535 f\r\n4 2\n0000000100 00000 n\r\n0000000200 00000 n\r\ntrailer << /Size 6 >>",
        );
        assert!(!table.contains(1));
        assert_eq!(
            table.entry(5),
            Some(XRefEntry::InUse { offset: 200, generation: 0 })
        );
    }

    #[test]
    fn test_free_head_numbered_as_object_one_is_realigned() {
        let (table, _) = section(
            "xref\n1 3\n0000000000 65535 f \n0000000015 00000 n \n0000000074 00000 n \ntrailer\n<< /Size 3 >>",
        );
        assert!(table.entry(0).unwrap().is_free());
        assert_eq!(
            table.entry(1),
            Some(XRefEntry::InUse { offset: 15, generation: 0 })
        );
        assert_eq!(
            table.entry(2),
            Some(XRefEntry::InUse { offset: 74, generation: 0 })
        );
        assert!(!table.contains(3));
        assert_eq!(table.iter().filter(|(_, e)| e.is_free()).count(), 1);
    }

    #[test]
    fn test_in_use_entry_at_offset_zero_is_an_error() {
        let mut table = XRefTable::new();
        let mut lexer = Lexer::new(
            b"xref\n0 2\n0000000000 65535 f \n0000000000 00000 n \ntrailer\n<< >>".to_vec(),
        );
        assert!(table.read_table_section(&mut lexer).is_err());
    }

    #[test]
    fn test_missing_xref_keyword() {
        let mut table = XRefTable::new();
        let mut lexer = Lexer::new(b"1 0 obj".to_vec());
        assert!(matches!(
            table.read_table_section(&mut lexer),
            Err(ParseError::InvalidXRef(_))
        ));
    }

    #[test]
    fn test_fix_offset_requires_matching_generation() {
        let mut table = XRefTable::new();
        table.set(5, XRefEntry::InUse { offset: 10, generation: 2 });
        assert!(!table.fix_offset(5, 0, 99));
        assert!(table.fix_offset(5, 2, 99));
        assert_eq!(
            table.entry(5),
            Some(XRefEntry::InUse { offset: 99, generation: 2 })
        );
    }

    #[test]
    fn test_resolution_caches_single_instance() {
        let mut table = XRefTable::new();
        table.set(1, XRefEntry::InUse { offset: 10, generation: 0 });
        table.begin_reading(1).unwrap();
        assert!(matches!(
            table.begin_reading(1),
            Err(ParseError::CircularReference(1))
        ));
        let first = table.resolve(1, PdfObject::Integer(7));
        let second = table.cached(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
