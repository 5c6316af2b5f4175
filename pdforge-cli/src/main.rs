use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdforge::operations::{
    create_sample, document_info, extract_text, merge_documents, overlay_document,
    rotate_document, split_document, watermark_document, WatermarkOptions,
};
use pdforge::{Document, Font, PdfError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "pdforge",
    about = "A native Rust PDF processing tool",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge multiple PDFs into one
    Merge {
        /// Input PDF files (at least two)
        files: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,
    },

    /// Split a PDF into multiple files
    Split {
        /// Input PDF file
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "split_output")]
        output: PathBuf,

        /// Pages per output file
        #[arg(short, long, default_value = "1")]
        pages: usize,
    },

    /// Extract text from a PDF file
    ExtractText {
        /// Input PDF file
        input: PathBuf,

        /// Output text file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rotate all pages in a PDF
    Rotate {
        /// Input PDF file
        input: PathBuf,

        /// Rotation angle in degrees (multiple of 90)
        #[arg(short, long, default_value = "90")]
        angle: i32,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add a text watermark to every page
    Watermark {
        /// Input PDF file
        input: PathBuf,

        /// Watermark text
        #[arg(short, long)]
        watermark: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Watermark font size
        #[arg(long, default_value = "50")]
        size: f64,

        /// Watermark opacity (0.0 to 1.0)
        #[arg(long, default_value = "0.3")]
        opacity: f64,

        /// Watermark rotation in degrees
        #[arg(long, default_value = "45")]
        angle: f64,
    },

    /// Stamp the first page of one PDF onto every page of another
    Overlay {
        /// Input PDF file
        input: PathBuf,

        /// PDF whose first page is the stamp
        stamp: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show information about a PDF file
    Info {
        /// Input PDF file
        input: PathBuf,
    },

    /// Create a sample PDF
    Create {
        /// Output file path
        #[arg(short, long, default_value = "sample.pdf")]
        output: PathBuf,

        /// Body content
        #[arg(short, long, default_value = "Sample PDF Content")]
        content: String,

        /// Document title
        #[arg(short, long, default_value = "Sample PDF Document")]
        title: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Merge { files, output } => {
            if files.len() < 2 {
                bail!("merge requires at least 2 input files");
            }

            // Load everything up front so a bad input produces no output
            let mut sources = Vec::with_capacity(files.len());
            for path in &files {
                info!("Adding {} to merge", path.display());
                sources.push(load_document(path)?);
            }

            let mut merged = merge_documents(&mut sources)?;
            write_output(&output, &merged.to_bytes()?)?;
            info!(
                "Successfully merged {} files into {}",
                files.len(),
                output.display()
            );
        }

        Commands::Split {
            input,
            output,
            pages,
        } => {
            let mut doc = load_document(&input)?;
            info!("Splitting {} ({} pages)", input.display(), doc.page_count());

            std::fs::create_dir_all(&output)
                .with_context(|| format!("cannot create {}", output.display()))?;

            let base = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());

            let chunks = split_document(&mut doc, pages)?;
            for (index, mut chunk) in chunks.into_iter().enumerate() {
                let first = index * pages + 1;
                let last = first + chunk.page_count() - 1;
                let filename = if pages == 1 {
                    format!("{base}_page_{first}.pdf")
                } else {
                    format!("{base}_pages_{first}-{last}.pdf")
                };
                let path = output.join(&filename);
                write_output(&path, &chunk.to_bytes()?)?;
                info!("Created: {filename}");
            }
            info!("Successfully split into {}", output.display());
        }

        Commands::ExtractText { input, output } => {
            let mut doc = load_document(&input)?;
            info!("Extracting text from {} pages", doc.page_count());

            let pages = extract_text(&mut doc)?;
            let full_text = pages
                .iter()
                .enumerate()
                .map(|(i, text)| format!("=== Page {} ===\n{text}\n", i + 1))
                .collect::<Vec<_>>()
                .join("\n");

            match output {
                Some(path) => {
                    std::fs::write(&path, &full_text)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    info!("Text saved to: {}", path.display());
                }
                None => println!("{full_text}"),
            }
        }

        Commands::Rotate {
            input,
            angle,
            output,
        } => {
            let output = output.unwrap_or_else(|| prefixed(&input, "rotated"));
            let mut doc = load_document(&input)?;
            info!("Rotating {} pages by {} degrees", doc.page_count(), angle);

            rotate_document(&mut doc, angle)?;
            write_output(&output, &doc.to_bytes()?)?;
            info!("Rotated PDF saved as: {}", output.display());
        }

        Commands::Watermark {
            input,
            watermark,
            output,
            size,
            opacity,
            angle,
        } => {
            let output = output.unwrap_or_else(|| prefixed(&input, "watermarked"));
            let mut doc = load_document(&input)?;

            let options = WatermarkOptions {
                text: watermark,
                font: Font::Helvetica,
                size,
                opacity,
                angle,
            };
            watermark_document(&mut doc, &options)?;
            write_output(&output, &doc.to_bytes()?)?;
            info!("Watermarked PDF saved as: {}", output.display());
        }

        Commands::Overlay {
            input,
            stamp,
            output,
        } => {
            let output = output.unwrap_or_else(|| prefixed(&input, "stamped"));
            let mut doc = load_document(&input)?;
            let mut stamp_doc = load_document(&stamp)?;

            overlay_document(&mut doc, &mut stamp_doc)?;
            write_output(&output, &doc.to_bytes()?)?;
            info!("Stamped PDF saved as: {}", output.display());
        }

        Commands::Info { input } => {
            let file_size = std::fs::metadata(&input)
                .map_err(|_| PdfError::IoUnavailable(input.display().to_string()))?
                .len();
            let mut doc = load_document(&input)?;
            let info = document_info(&mut doc, file_size)?;

            println!("=== PDF Information: {} ===", input.display());
            println!("PDF version: {}", doc.version());
            println!("Number of pages: {}", info.page_count);
            println!("File size: {} bytes", info.file_size);

            if !info.metadata.is_empty() {
                println!("\nMetadata:");
                for (key, value) in &info.metadata {
                    println!("  {key}: {value}");
                }
            }

            if let Some((width, height)) = info.first_page_dimensions {
                println!("\nFirst page dimensions:");
                println!("  Width: {width} points");
                println!("  Height: {height} points");
            }
        }

        Commands::Create {
            output,
            content,
            title,
        } => {
            let mut doc = create_sample(&title, &content)?;
            write_output(&output, &doc.to_bytes()?)?;
            info!("Sample PDF created: {}", output.display());
        }
    }

    Ok(())
}

/// Read and parse an input file. A missing file surfaces as the engine's
/// resource-unavailable error rather than a raw IO error.
fn load_document(path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path)
        .map_err(|_| PdfError::IoUnavailable(path.display().to_string()))?;
    Document::load(bytes).with_context(|| format!("failed to parse {}", path.display()))
}

/// Write output atomically: everything lands in a temporary file first, so
/// a failure never leaves a partially written result behind
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir),
        None => tempfile::NamedTempFile::new_in("."),
    }
    .context("cannot create temporary output file")?;

    tmp.write_all(bytes)
        .context("cannot write output")?;
    tmp.persist(path)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// `input.pdf` -> `prefix_input.pdf` next to the input
fn prefixed(input: &Path, prefix: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.pdf".to_string());
    input.with_file_name(format!("{prefix}_{name}"))
}
