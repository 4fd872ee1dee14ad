//! Reader integration tests: xref round trips, rebuild and self-healing

mod common;

use common::{
    capture_warnings, free_head_at_object_one, hex, with_startxref, with_stream_length, write_sample,
    ClassicFile, STREAM_PAYLOAD,
};
use pdfweave::parser::encryption::StandardSecurityHandler;
use pdfweave::parser::{ParseError, PdfObject, PdfReader, ReaderProperties, XRefEntry};
use pdfweave::writer::XRefMode;
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::Arc;

fn open(bytes: Vec<u8>) -> PdfReader {
    PdfReader::from_bytes(bytes, ReaderProperties::default()).expect("open document")
}

#[test]
fn test_every_object_in_size_range_resolves() {
    let layouts = [
        (XRefMode::Table, vec![]),
        (XRefMode::Stream, vec![]),
        (XRefMode::Stream, vec![1, 2, 3]),
    ];
    for (mode, compressed) in layouts {
        let written = write_sample(mode, &compressed);
        let mut reader = open(written.bytes);
        let size = reader.trailer().size().unwrap();
        for num in 1..size {
            let first = reader.read_object(num, 0).unwrap();
            assert!(!first.is_null(), "object {num} in {mode:?} resolved to null");
            let second = reader.read_object(num, 0).unwrap();
            assert!(Arc::ptr_eq(&first, &second), "object {num} was parsed twice");
        }
    }
}

#[test]
fn test_hybrid_file_reads_both_sections() {
    let written = write_sample(XRefMode::Hybrid, &[2]);
    let mut reader = open(written.bytes);
    assert!(reader.has_hybrid_xref());
    assert!(reader.has_xref_stm());
    let pages = reader.read_object(2, 0).unwrap();
    assert_eq!(pages.as_dict().and_then(|d| d.get_type()), Some("Pages"));
}

#[test]
fn test_rebuild_matches_written_offsets() {
    let written = write_sample(XRefMode::Table, &[]);
    let (mut reader, warnings) =
        capture_warnings(|| open(with_startxref(written.bytes.clone(), written.bytes.len() + 500)));

    assert!(reader.has_rebuilt_xref());
    assert!(warnings.contains(&"XREF_ERROR".to_string()));

    let catalog = reader.catalog().unwrap();
    assert_eq!(catalog.as_dict().and_then(|d| d.get_type()), Some("Catalog"));
    for (num, offset) in &written.offsets {
        assert_eq!(
            reader.xref().entry(*num),
            Some(XRefEntry::InUse {
                offset: *offset,
                generation: 0
            }),
            "object {num}"
        );
    }
}

#[test]
fn test_strict_reader_does_not_rebuild() {
    let written = write_sample(XRefMode::Table, &[]);
    let bytes = with_startxref(written.bytes, 3);
    let result = PdfReader::new(Cursor::new(bytes), ReaderProperties::new().strict(true));
    assert!(result.is_err());
}

#[test]
fn test_object_stream_members_equal_direct_objects() {
    let mut direct = open(write_sample(XRefMode::Stream, &[]).bytes);
    let mut packed = open(write_sample(XRefMode::Stream, &[1, 2, 3]).bytes);

    for num in 1..=3 {
        assert!(matches!(
            packed.xref().entry(num),
            Some(XRefEntry::Compressed { .. })
        ));
        let a = direct.read_object(num, 0).unwrap();
        let b = packed.read_object(num, 0).unwrap();
        assert_eq!(*a, *b);
    }
}

#[test]
fn test_zero_stream_length_is_recomputed() {
    let bytes = with_stream_length(write_sample(XRefMode::Table, &[]).bytes, 0);
    let mut reader = open(bytes);
    let object = reader.read_object(4, 0).unwrap();
    let stream = object.as_stream().unwrap();
    assert_eq!(reader.read_stream_bytes(stream, false).unwrap(), STREAM_PAYLOAD);
    assert_eq!(reader.read_stream_bytes(stream, true).unwrap(), STREAM_PAYLOAD);
}

#[test]
fn test_free_head_at_object_one_is_realigned() {
    let (bytes, [first, second]) = free_head_at_object_one();
    let mut reader = open(bytes);

    assert!(!reader.has_rebuilt_xref());
    assert!(reader.xref().entry(0).unwrap().is_free());
    assert_eq!(
        reader.xref().entry(1),
        Some(XRefEntry::InUse { offset: first, generation: 0 })
    );
    assert_eq!(
        reader.xref().entry(2),
        Some(XRefEntry::InUse { offset: second, generation: 0 })
    );
    let free_entries = reader.xref().iter().filter(|(_, e)| e.is_free()).count();
    assert_eq!(free_entries, 1);
    assert!(reader.catalog().is_ok());
}

#[test]
fn test_open_from_file() {
    let written = write_sample(XRefMode::Table, &[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.pdf");
    std::fs::write(&path, &written.bytes).unwrap();

    let mut reader = PdfReader::open(&path, ReaderProperties::default()).unwrap();
    assert_eq!(reader.version().to_string(), "1.4");
    assert!(reader.catalog().is_ok());
}

#[test]
fn test_garbage_without_trailer_is_fatal() {
    let result = PdfReader::from_bytes(
        b"%PDF-1.4\n1 0 obj\nnull\nendobj\nstartxref\n5\n%%EOF\n".to_vec(),
        ReaderProperties::default(),
    );
    assert!(matches!(result, Err(ParseError::TrailerNotFound)));
}

const CATALOG: &str = "<< /Type /Catalog /Pages 2 0 R >>";
const PAGES: &str = "<< /Type /Pages /Kids [] /Count 0 >>";

fn string_bytes(object: &PdfObject) -> Vec<u8> {
    object.as_string().expect("string object").as_bytes().to_vec()
}

#[test]
fn test_huge_declared_size_opens_without_rebuild() {
    let mut file = ClassicFile::new();
    file.revision(
        &[(1, CATALOG), (2, PAGES)],
        "/Size 900000000000 /Root 1 0 R",
    );
    let mut reader = open(file.into_bytes());

    assert!(!reader.has_rebuilt_xref());
    assert_eq!(reader.xref_size(), 900_000_000_000);
    assert_eq!(reader.xref().len(), 3);
    let catalog = reader.catalog().unwrap();
    assert_eq!(catalog.as_dict().and_then(|d| d.get_type()), Some("Catalog"));
}

#[test]
fn test_rebuild_keeps_huge_object_numbers() {
    let mut file = ClassicFile::new();
    file.revision(
        &[(1, CATALOG), (2, PAGES), (4_000_000_000, "(far away)")],
        "/Size 3 /Root 1 0 R",
    );
    let bytes = file.into_bytes();
    let broken = with_startxref(bytes.clone(), bytes.len() + 500);
    let mut reader = open(broken);

    assert!(reader.has_rebuilt_xref());
    assert_eq!(reader.xref_size(), 4_000_000_001);
    assert_eq!(reader.xref().len(), 4);
    assert_eq!(string_bytes(&reader.read_object(4_000_000_000, 0).unwrap()), b"far away");
    assert!(reader.catalog().is_ok());
}

#[test]
fn test_incremental_update_newest_entry_wins() {
    let mut file = ClassicFile::new();
    file.revision(
        &[(1, CATALOG), (2, PAGES), (3, "(first draft)")],
        "/Size 4 /Root 1 0 R",
    );
    file.revision(&[(3, "(second draft)"), (4, "(appendix)")], "/Size 5 /Root 1 0 R");
    let mut reader = open(file.into_bytes());

    assert!(!reader.has_rebuilt_xref());
    assert_eq!(reader.trailer().size().unwrap(), 5);
    assert_eq!(string_bytes(&reader.read_object(3, 0).unwrap()), b"second draft");
    assert_eq!(string_bytes(&reader.read_object(4, 0).unwrap()), b"appendix");
    // Objects only the first revision lists are still reachable
    let pages = reader.read_object(2, 0).unwrap();
    assert_eq!(pages.as_dict().and_then(|d| d.get_type()), Some("Pages"));
}

#[test]
fn test_prev_naming_its_own_section_is_rebuilt() {
    let mut file = ClassicFile::new();
    file.revision(
        &[(1, CATALOG), (2, PAGES), (3, "(first draft)")],
        "/Size 4 /Root 1 0 R",
    );
    file.looping_revision(&[(3, "(second draft)")], "/Size 4 /Root 1 0 R");
    let bytes = file.into_bytes();

    let (mut reader, warnings) = capture_warnings(|| open(bytes.clone()));
    assert!(reader.has_rebuilt_xref());
    assert!(warnings.contains(&"XREF_ERROR".to_string()));
    assert_eq!(string_bytes(&reader.read_object(3, 0).unwrap()), b"second draft");
    assert!(reader.catalog().is_ok());

    let strict = PdfReader::from_bytes(bytes, ReaderProperties::new().strict(true));
    assert!(matches!(strict, Err(ParseError::InvalidXRef(_))));
}

#[test]
fn test_encrypted_document_is_decrypted_per_object() {
    const ID: &[u8] = b"0123456789abcdef";
    const P: i32 = -44;

    let o = StandardSecurityHandler::owner_entry(b"owner", b"", 3, 16);
    let (key, u) = StandardSecurityHandler::user_entry(b"", &o, P, ID, 3, 16);
    let title = StandardSecurityHandler::encrypt_bytes(&key, b"Quarterly report", 1, 0);
    let content = StandardSecurityHandler::encrypt_bytes(&key, STREAM_PAYLOAD, 3, 0);

    let catalog = format!("<< /Type /Catalog /Pages 2 0 R /Title {} >>", hex(&title));
    let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
    stream.extend_from_slice(&content);
    stream.extend_from_slice(b"\nendstream");
    let encrypt = format!(
        "<< /Filter /Standard /V 2 /R 3 /Length 128 /O {} /U {} /P {P} >>",
        hex(&o),
        hex(&u)
    );

    let mut file = ClassicFile::new();
    file.revision(
        &[
            (1, catalog.into_bytes()),
            (2, PAGES.as_bytes().to_vec()),
            (3, stream),
            (4, encrypt.into_bytes()),
        ],
        &format!("/Size 5 /Root 1 0 R /Encrypt 4 0 R /ID [{} {}]", hex(ID), hex(ID)),
    );
    let mut reader = open(file.into_bytes());

    assert!(reader.is_encrypted());
    assert!(reader.permissions().is_some());
    assert!(!reader.is_opened_with_full_permission());

    let catalog = reader.catalog().unwrap();
    let title = catalog.as_dict().and_then(|d| d.get("Title")).unwrap();
    assert_eq!(string_bytes(title), b"Quarterly report");

    let object = reader.read_object(3, 0).unwrap();
    let stream = object.as_stream().unwrap();
    assert_eq!(reader.read_stream_bytes(stream, true).unwrap(), STREAM_PAYLOAD);

    // The encryption dictionary itself is stored in the clear
    let encrypt = reader.read_object(4, 0).unwrap();
    let owner = encrypt.as_dict().and_then(|d| d.get("O")).unwrap();
    assert_eq!(string_bytes(owner), o);
}

#[test]
fn test_encrypted_document_rejects_wrong_password() {
    const ID: &[u8] = b"0123456789abcdef";

    let o = StandardSecurityHandler::owner_entry(b"owner", b"user", 3, 16);
    let (_, u) = StandardSecurityHandler::user_entry(b"user", &o, -44, ID, 3, 16);
    let encrypt = format!(
        "<< /Filter /Standard /V 2 /R 3 /Length 128 /O {} /U {} /P -44 >>",
        hex(&o),
        hex(&u)
    );
    let mut file = ClassicFile::new();
    file.revision(
        &[(1, CATALOG.to_string()), (2, PAGES.to_string()), (3, encrypt)],
        &format!("/Size 4 /Root 1 0 R /Encrypt 3 0 R /ID [{} {}]", hex(ID), hex(ID)),
    );
    let bytes = file.into_bytes();

    let result = PdfReader::from_bytes(bytes.clone(), ReaderProperties::default());
    assert!(matches!(result, Err(ParseError::InvalidPassword)));

    let props = ReaderProperties::new().with_password(b"user".to_vec());
    assert!(PdfReader::from_bytes(bytes, props).unwrap().is_encrypted());
}
