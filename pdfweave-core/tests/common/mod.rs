//! Shared fixtures for integration tests

#![allow(dead_code)]

use pdfweave::parser::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfVersion};
use pdfweave::writer::{PdfWriter, WrittenPdf, XRefMode};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

pub const STREAM_PAYLOAD: &[u8] = b"BT /F1 12 Tf 72 712 Td (Hello) Tj ET";

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

/// Catalog, page tree, one page and its content stream
pub fn sample_objects() -> Vec<(u32, PdfObject)> {
    vec![
        (
            1,
            PdfObject::Dictionary(dict(vec![
                ("Type", name("Catalog")),
                ("Pages", PdfObject::Reference(2, 0)),
            ])),
        ),
        (
            2,
            PdfObject::Dictionary(dict(vec![
                ("Type", name("Pages")),
                ("Kids", PdfObject::Array(PdfArray(vec![PdfObject::Reference(3, 0)]))),
                ("Count", PdfObject::Integer(1)),
            ])),
        ),
        (
            3,
            PdfObject::Dictionary(dict(vec![
                ("Type", name("Page")),
                ("Parent", PdfObject::Reference(2, 0)),
                (
                    "MediaBox",
                    PdfObject::Array(PdfArray(vec![
                        PdfObject::Integer(0),
                        PdfObject::Integer(0),
                        PdfObject::Real(612.0),
                        PdfObject::Real(792.0),
                    ])),
                ),
                ("Contents", PdfObject::Reference(4, 0)),
            ])),
        ),
        (
            4,
            PdfObject::Stream(PdfStream::new(PdfDictionary::new(), STREAM_PAYLOAD.to_vec())),
        ),
    ]
}

/// Write the sample document, packing `compressed` into an object stream.
pub fn write_sample(mode: XRefMode, compressed: &[u32]) -> WrittenPdf {
    let version = match mode {
        XRefMode::Table => PdfVersion::new(1, 4),
        _ => PdfVersion::new(1, 5),
    };
    let mut writer = PdfWriter::new(version);
    writer.xref_mode(mode);
    for (num, object) in sample_objects() {
        if compressed.contains(&num) {
            writer.add_compressed_object(num, object);
        } else {
            writer.add_object(num, object);
        }
    }
    let trailer = dict(vec![("Root", PdfObject::Reference(1, 0))]);
    writer.write(&trailer).expect("sample document")
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Replace the `startxref` offset of `bytes`.
pub fn with_startxref(mut bytes: Vec<u8>, offset: usize) -> Vec<u8> {
    let tail = rfind(&bytes, b"startxref").expect("startxref");
    bytes.truncate(tail);
    bytes.extend_from_slice(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
    bytes
}

/// Overwrite the content stream's `/Length` keeping every offset valid.
pub fn with_stream_length(mut bytes: Vec<u8>, length: usize) -> Vec<u8> {
    let from = format!("/Length {} >>", STREAM_PAYLOAD.len());
    let mut to = format!("/Length {length}");
    while to.len() + 3 < from.len() {
        to.push(' ');
    }
    to.push_str(" >>");
    assert_eq!(from.len(), to.len());
    let at = bytes
        .windows(from.len())
        .position(|w| w == from.as_bytes())
        .expect("stream length");
    bytes[at..at + to.len()].copy_from_slice(to.as_bytes());
    bytes
}

/// Classic file whose only subsection starts at 1 with the free-list head.
pub fn free_head_at_object_one() -> (Vec<u8>, [usize; 2]) {
    let mut out = b"%PDF-1.4\n".to_vec();
    let first = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let second = out.len();
    out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
    let xref = out.len();
    out.extend_from_slice(b"xref\n1 3\n0000000000 65535 f \n");
    out.extend_from_slice(format!("{first:010} 00000 n \n{second:010} 00000 n \n").as_bytes());
    out.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
    out.extend_from_slice(format!("startxref\n{xref}\n%%EOF\n").as_bytes());
    (out, [first, second])
}

/// Hand-assembled classic file, appended one revision at a time.
pub struct ClassicFile {
    bytes: Vec<u8>,
    last_xref: Option<usize>,
}

enum Prev {
    Chained,
    Own,
}

impl ClassicFile {
    pub fn new() -> Self {
        Self {
            bytes: b"%PDF-1.4\n".to_vec(),
            last_xref: None,
        }
    }

    /// Append `objects` and an xref section chained to the previous one.
    pub fn revision<B: AsRef<[u8]>>(&mut self, objects: &[(u32, B)], trailer: &str) -> usize {
        self.section(objects, trailer, Prev::Chained)
    }

    /// Append a revision whose `/Prev` names its own xref section.
    pub fn looping_revision<B: AsRef<[u8]>>(&mut self, objects: &[(u32, B)], trailer: &str) -> usize {
        self.section(objects, trailer, Prev::Own)
    }

    fn section<B: AsRef<[u8]>>(&mut self, objects: &[(u32, B)], trailer: &str, prev: Prev) -> usize {
        let mut offsets = Vec::new();
        for (num, body) in objects {
            offsets.push((*num, self.bytes.len()));
            self.bytes.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
            self.bytes.extend_from_slice(body.as_ref());
            self.bytes.extend_from_slice(b"\nendobj\n");
        }
        let xref = self.bytes.len();
        self.bytes.extend_from_slice(b"xref\n");
        if self.last_xref.is_none() {
            self.bytes.extend_from_slice(b"0 1\n0000000000 65535 f \n");
        }
        for (num, offset) in offsets {
            self.bytes
                .extend_from_slice(format!("{num} 1\n{offset:010} 00000 n \n").as_bytes());
        }
        let prev = match (prev, self.last_xref) {
            (Prev::Own, _) => format!(" /Prev {xref}"),
            (Prev::Chained, Some(offset)) => format!(" /Prev {offset}"),
            (Prev::Chained, None) => String::new(),
        };
        self.bytes
            .extend_from_slice(format!("trailer\n<< {trailer}{prev} >>\n").as_bytes());
        self.bytes
            .extend_from_slice(format!("startxref\n{xref}\n%%EOF\n").as_bytes());
        self.last_xref = Some(xref);
        xref
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Uppercase hex string literal for binary bytes
pub fn hex(bytes: &[u8]) -> String {
    let digits: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!("<{digits}>")
}

#[derive(Default)]
struct CodeVisitor(Option<String>);

impl Visit for CodeVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "code" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "code" {
            self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
        }
    }
}

struct WarningCodes(Arc<Mutex<Vec<String>>>);

impl<S: tracing::Subscriber> Layer<S> for WarningCodes {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }
        let mut visitor = CodeVisitor::default();
        event.record(&mut visitor);
        if let Some(code) = visitor.0 {
            self.0.lock().unwrap().push(code);
        }
    }
}

/// Run `f` and collect the `code` field of every warning it logs.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    let codes = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarningCodes(codes.clone()));
    let out = tracing::subscriber::with_default(subscriber, f);
    let codes = codes.lock().unwrap().clone();
    (out, codes)
}
