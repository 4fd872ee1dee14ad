//! Builders for test PDFs with correct (or deliberately broken) offsets

use crate::parser::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
use crate::parser::PdfVersion;
use crate::writer::{PdfWriter, WrittenPdf, XRefMode};
use std::collections::BTreeMap;

/// A small document: catalog, info, empty page tree and one content stream.
pub(crate) struct PdfBuilder {
    objects: BTreeMap<u32, PdfObject>,
    trailer: PdfDictionary,
}

fn name(value: &str) -> PdfObject {
    PdfObject::Name(PdfName::new(value))
}

fn dict(entries: Vec<(&str, PdfObject)>) -> PdfDictionary {
    let mut dict = PdfDictionary::new();
    for (key, value) in entries {
        dict.insert(key.to_string(), value);
    }
    dict
}

impl PdfBuilder {
    pub const STREAM_PAYLOAD: &'static [u8] = b"BT /F1 12 Tf (Hello) Tj ET";

    pub fn sample() -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(
            1,
            PdfObject::Dictionary(dict(vec![
                ("Type", name("Catalog")),
                ("Pages", PdfObject::Reference(3, 0)),
            ])),
        );
        objects.insert(
            2,
            PdfObject::Dictionary(dict(vec![(
                "Producer",
                PdfObject::String(PdfString::new(b"pdfweave tests".to_vec())),
            )])),
        );
        objects.insert(
            3,
            PdfObject::Dictionary(dict(vec![
                ("Type", name("Pages")),
                ("Kids", PdfObject::Array(PdfArray::new())),
                ("Count", PdfObject::Integer(0)),
            ])),
        );
        objects.insert(
            4,
            PdfObject::Stream(PdfStream::new(PdfDictionary::new(), Self::STREAM_PAYLOAD.to_vec())),
        );

        let trailer = dict(vec![
            ("Root", PdfObject::Reference(1, 0)),
            ("Info", PdfObject::Reference(2, 0)),
        ]);
        Self { objects, trailer }
    }

    fn write(&self, version: PdfVersion, mode: XRefMode, compressed: &[u32]) -> WrittenPdf {
        let mut writer = PdfWriter::new(version);
        writer.xref_mode(mode);
        for (num, object) in &self.objects {
            if compressed.contains(num) {
                writer.add_compressed_object(*num, object.clone());
            } else {
                writer.add_object(*num, object.clone());
            }
        }
        writer.write(&self.trailer).unwrap()
    }

    pub fn build_classic(&self) -> Vec<u8> {
        self.write(PdfVersion::new(1, 4), XRefMode::Table, &[]).bytes
    }

    pub fn build_with_xref_stream(&self) -> Vec<u8> {
        self.write(PdfVersion::new(1, 5), XRefMode::Stream, &[]).bytes
    }

    /// Object 3 lives in an object stream that only the `/XRefStm` lists.
    pub fn build_hybrid(&self) -> Vec<u8> {
        self.write(PdfVersion::new(1, 5), XRefMode::Hybrid, &[3]).bytes
    }

    pub fn build_with_object_stream(&self) -> Vec<u8> {
        self.write(PdfVersion::new(1, 5), XRefMode::Stream, &[1, 2, 3]).bytes
    }

    /// Classic file whose `startxref` names `offset`.
    pub fn build_with_startxref(&self, offset: usize) -> Vec<u8> {
        let mut bytes = self.build_classic();
        let tail = rfind(&bytes, b"startxref").unwrap();
        bytes.truncate(tail);
        bytes.extend_from_slice(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
        bytes
    }

    /// Classic file whose table entry for `num` is `shift` bytes too far.
    pub fn build_with_offset_shift(&self, num: u32, shift: usize) -> Vec<u8> {
        let written = self.write(PdfVersion::new(1, 4), XRefMode::Table, &[]);
        let offset = written.offsets[&num];
        let from = format!("{offset:010} 00000 n");
        let to = format!("{:010} 00000 n", offset + shift);
        replace_same_width(written.bytes, from.as_bytes(), to.as_bytes())
    }

    /// Classic file whose content stream declares `/Length length`.
    pub fn build_with_stream_length(&self, length: usize) -> Vec<u8> {
        let bytes = self.build_classic();
        let actual = Self::STREAM_PAYLOAD.len();
        let from = format!("/Length {actual} >>");
        let mut to = format!("/Length {length}");
        assert!(to.len() + 3 <= from.len());
        while to.len() + 3 < from.len() {
            to.push(' ');
        }
        to.push_str(" >>");
        replace_same_width(bytes, from.as_bytes(), to.as_bytes())
    }

    /// Classic file whose content stream takes its length from object 5.
    pub fn build_with_indirect_length(&self) -> Vec<u8> {
        let mut builder = Self {
            objects: self.objects.clone(),
            trailer: self.trailer.clone(),
        };
        if let Some(PdfObject::Stream(stream)) = builder.objects.get_mut(&4) {
            stream
                .dict
                .insert("Length".to_string(), PdfObject::Reference(5, 0));
        }
        builder
            .objects
            .insert(5, PdfObject::Integer(Self::STREAM_PAYLOAD.len() as i64));
        builder.build_classic()
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn replace_same_width(mut bytes: Vec<u8>, from: &[u8], to: &[u8]) -> Vec<u8> {
    assert_eq!(from.len(), to.len());
    let at = bytes
        .windows(from.len())
        .position(|w| w == from)
        .unwrap();
    bytes[at..at + to.len()].copy_from_slice(to);
    bytes
}
