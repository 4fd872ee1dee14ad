//! Integration tests for the pdfweave CLI
//!
//! Runs the built binary against documents written with the library's own
//! writer and against JSON element descriptions.

use anyhow::Result;
use pdfweave::parser::{PdfDictionary, PdfName, PdfObject, PdfVersion};
use pdfweave::writer::{PdfWriter, XRefMode};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

fn get_cli_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pdfweave"))
}

fn setup_temp_dir() -> TempDir {
    tempdir().expect("Failed to create temp directory")
}

fn run_cli_command(args: &[&str]) -> Result<std::process::Output> {
    let output = Command::new(get_cli_path())
        .env_remove("RUST_LOG")
        .args(args)
        .output()?;
    Ok(output)
}

fn write_sample_pdf(dir: &Path, mode: XRefMode) -> PathBuf {
    let mut catalog = PdfDictionary::new();
    catalog.insert("Type".to_string(), PdfObject::Name(PdfName::new("Catalog")));
    catalog.insert("Pages".to_string(), PdfObject::Reference(2, 0));
    let mut pages = PdfDictionary::new();
    pages.insert("Type".to_string(), PdfObject::Name(PdfName::new("Pages")));
    pages.insert("Count".to_string(), PdfObject::Integer(0));

    let mut trailer = PdfDictionary::new();
    trailer.insert("Root".to_string(), PdfObject::Reference(1, 0));

    let mut writer = PdfWriter::new(PdfVersion::new(1, 5));
    writer
        .add_object(1, PdfObject::Dictionary(catalog))
        .add_object(2, PdfObject::Dictionary(pages))
        .xref_mode(mode);
    let written = writer.write(&trailer).expect("sample document");

    let path = dir.join("sample.pdf");
    fs::write(&path, written.bytes).expect("write sample");
    path
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_cli_inspect_classic_table() {
    let temp_dir = setup_temp_dir();
    let path = write_sample_pdf(temp_dir.path(), XRefMode::Table);

    let output = run_cli_command(&["inspect", path.to_str().unwrap()]).unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    // File path and length depend on the temp dir and writer
    let summary: Vec<&str> = stdout
        .lines()
        .filter(|line| !line.starts_with("File"))
        .collect();
    assert_eq!(
        summary,
        vec![
            "PDF Information",
            "===============",
            "Version: 1.5",
            "Xref size: 3",
            "Rebuilt xref: no",
            "Fixed xref: no",
            "Hybrid xref: no",
            "Xref stream: no",
            "Encrypted: no",
            "Trailer keys: Root, Size",
            "Catalog type: Catalog",
        ]
    );
}

#[test]
fn test_cli_inspect_xref_stream() {
    let temp_dir = setup_temp_dir();
    let path = write_sample_pdf(temp_dir.path(), XRefMode::Stream);

    let output = run_cli_command(&["inspect", path.to_str().unwrap()]).unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("Catalog type: Catalog"));
}

#[test]
fn test_cli_inspect_prints_object() {
    let temp_dir = setup_temp_dir();
    let path = write_sample_pdf(temp_dir.path(), XRefMode::Table);

    let output = run_cli_command(&["inspect", path.to_str().unwrap(), "--object", "2"]).unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Object 2 0:"));
    assert!(stdout.contains("/Type /Pages"));
}

#[test]
fn test_cli_inspect_rebuilds_broken_startxref() {
    let temp_dir = setup_temp_dir();
    let path = write_sample_pdf(temp_dir.path(), XRefMode::Table);
    let mut bytes = fs::read(&path).unwrap();
    let marker = bytes
        .windows(9)
        .rposition(|w| w == b"startxref")
        .unwrap();
    bytes.truncate(marker);
    bytes.extend_from_slice(b"startxref\n999999\n%%EOF\n");
    fs::write(&path, bytes).unwrap();

    let output = run_cli_command(&["inspect", path.to_str().unwrap()]).unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("Rebuilt xref: yes"));
}

#[test]
fn test_cli_inspect_nonexistent_file() {
    let output = run_cli_command(&["inspect", "/nonexistent/file.pdf"]).unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to open PDF"));
}

#[test]
fn test_cli_layout_text_output() {
    let temp_dir = setup_temp_dir();
    let path = temp_dir.path().join("elements.json");
    fs::write(
        &path,
        r#"[
            { "type": "paragraph", "text": "Title", "font_size": 20 },
            { "type": "div", "style": { "height": 1300 } }
        ]"#,
    )
    .unwrap();

    let output = run_cli_command(&["layout", path.to_str().unwrap()]).unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Pages: 2"));
    assert!(stdout.contains("paragraph"));
    assert!(stdout.contains("page   2  div"));
}

#[test]
fn test_cli_layout_json_output() {
    let temp_dir = setup_temp_dir();
    let path = temp_dir.path().join("elements.json");
    fs::write(
        &path,
        r#"[{ "type": "image", "width": 50, "height": 40 }]"#,
    )
    .unwrap();

    let output = run_cli_command(&["layout", path.to_str().unwrap(), "--page", "letter", "--json"]).unwrap();
    assert!(output.status.success());

    let placed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let first = &placed[0];
    assert_eq!(first["kind"], "image");
    assert_eq!(first["page"], 1);
    assert_eq!(first["bbox"]["height"], 40.0);
    // Letter is 792pt tall with 36pt margins
    assert_eq!(first["bbox"]["y"], 716.0);
}

#[test]
fn test_cli_layout_invalid_description() {
    let temp_dir = setup_temp_dir();
    let path = temp_dir.path().join("elements.json");
    fs::write(&path, r#"[{ "type": "circle" }]"#).unwrap();

    let output = run_cli_command(&["layout", path.to_str().unwrap()]).unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid element description"));
}

#[test]
fn test_cli_help_command() {
    let output = run_cli_command(&["--help"]).unwrap();
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("inspect"));
    assert!(stdout.contains("layout"));
}

#[test]
fn test_cli_version_command() {
    let output = run_cli_command(&["--version"]).unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("pdfweave"));
}

#[test]
fn test_cli_invalid_command() {
    let output = run_cli_command(&["frobnicate"]).unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_cli_generation_requires_object() {
    let output = run_cli_command(&["inspect", "x.pdf", "--generation", "1"]).unwrap();
    assert!(!output.status.success());
}
