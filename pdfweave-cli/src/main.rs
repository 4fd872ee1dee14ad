use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pdfweave::layout::description::parse_document;
use pdfweave::layout::{placements, DocumentLayout, LayoutConfig, Placement};
use pdfweave::page::PageSize;
use pdfweave::writer::write_object;
use pdfweave::{PdfReader, ReaderProperties};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pdfweave",
    about = "Inspect PDF structure and lay out element trees",
    version,
    author
)]
struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PageArg {
    A4,
    Letter,
}

impl From<PageArg> for PageSize {
    fn from(page: PageArg) -> Self {
        match page {
            PageArg::A4 => PageSize::A4,
            PageArg::Letter => PageSize::LETTER,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show header, cross-reference and trailer information
    Inspect {
        /// Input PDF file
        input: PathBuf,

        /// User or owner password
        #[arg(short, long)]
        password: Option<String>,

        /// Print one resolved object
        #[arg(short, long)]
        object: Option<u32>,

        /// Generation of the printed object
        #[arg(short, long, default_value_t = 0, requires = "object")]
        generation: u16,
    },

    /// Lay out a JSON element description and print every placement
    Layout {
        /// JSON file holding an array of elements
        input: PathBuf,

        /// Page size
        #[arg(long, value_enum, default_value = "a4")]
        page: PageArg,

        /// Print placements as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let default = if verbose > 0 { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn inspect(input: &Path, password: Option<String>, object: Option<u32>, generation: u16) -> Result<()> {
    let mut props = ReaderProperties::new();
    if let Some(password) = password {
        props = props.with_password(password);
    }
    let mut reader = PdfReader::open(input, props)
        .with_context(|| format!("Failed to open PDF {}", input.display()))?;

    println!("PDF Information");
    println!("===============");
    println!("File: {}", input.display());
    println!("Version: {}", reader.version());
    println!("File length: {} bytes", reader.file_length());
    println!("Xref size: {}", reader.xref_size());
    println!("Rebuilt xref: {}", yes_no(reader.has_rebuilt_xref()));
    println!("Fixed xref: {}", yes_no(reader.has_fixed_xref()));
    println!("Hybrid xref: {}", yes_no(reader.has_hybrid_xref()));
    println!("Xref stream: {}", yes_no(reader.has_xref_stm()));
    println!("Encrypted: {}", yes_no(reader.is_encrypted()));
    if let Some(permissions) = reader.permissions() {
        println!("Permissions: {permissions:?}");
        println!(
            "Full permission: {}",
            yes_no(reader.is_opened_with_full_permission())
        );
    }

    let keys = reader.trailer().dict.keys();
    println!("Trailer keys: {}", keys.join(", "));

    match reader.catalog() {
        Ok(catalog) => {
            if let Some(kind) = catalog.as_dict().and_then(|d| d.get_type()) {
                println!("Catalog type: {kind}");
            }
        }
        Err(e) => tracing::warn!("Could not read catalog: {e}"),
    }

    if let Some(num) = object {
        let resolved = reader
            .read_object(num, generation)
            .with_context(|| format!("Failed to read object {num} {generation}"))?;
        let mut text = Vec::new();
        write_object(&mut text, &resolved)?;
        println!("\nObject {num} {generation}:");
        println!("{}", String::from_utf8_lossy(&text));
    }
    Ok(())
}

fn layout(input: &Path, page: PageArg, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let renderers = parse_document(&text)
        .with_context(|| format!("Invalid element description in {}", input.display()))?;

    let mut doc = DocumentLayout::new(page.into(), LayoutConfig::default());
    for renderer in renderers {
        doc.add(renderer);
    }
    let pages = doc.close();
    let placed: Vec<Placement> = placements(&pages);

    if json {
        println!("{}", serde_json::to_string_pretty(&placed)?);
        return Ok(());
    }

    println!("Pages: {}", pages.len());
    for p in &placed {
        println!(
            "page {:>3}  {:<10} x={:>8.2} y={:>8.2} w={:>8.2} h={:>8.2}",
            p.page, p.kind, p.bbox.x, p.bbox.y, p.bbox.width, p.bbox.height
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Inspect {
            input,
            password,
            object,
            generation,
        } => inspect(&input, password, object, generation),
        Commands::Layout { input, page, json } => layout(&input, page, json),
    }
}
