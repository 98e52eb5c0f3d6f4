//! CLI tool for analyzing and enhancing presentation accessibility.

use ally_core::{AllyConfig, Presentation, PresentationFormat};
use ally_engine::report::{render, ReportDocument};
use ally_engine::{
    analyze_presentation, enhance_presentation, CancelFlag, NullDescriber, OutputFormat,
};
use ally_pptx::{PptxParser, PptxWriter};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Analyze and improve the accessibility of PowerPoint presentations.
#[derive(Parser, Debug)]
#[command(name = "ally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a presentation without modifying it
    Analyze {
        /// Input PowerPoint file(s) (.pptx)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Report format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply accessibility fixes and write an enhanced copy
    Enhance {
        /// Input PowerPoint file (.pptx)
        input: PathBuf,

        /// Output file (default: <input>-accessible.pptx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Also apply advisory text simplifications
        #[arg(long)]
        simplify_text: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Command::Analyze { input, format } => {
            let format: OutputFormat = format
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            for input_path in &input {
                match analyze_file(input_path, format, cli.verbose) {
                    Ok(report) => print!("{}", report),
                    Err(e) => eprintln!("Error processing {}: {}", input_path.display(), e),
                }
            }
            Ok(())
        }
        Command::Enhance {
            input,
            output,
            format,
            simplify_text,
        } => {
            let format: OutputFormat = format
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(enhance_file(&input, output, format, simplify_text, cli.verbose))
        }
    }
}

/// Analyze one file and render its report.
fn analyze_file(input_path: &Path, format: OutputFormat, verbose: bool) -> Result<String> {
    let presentation = load_presentation(input_path)?;

    if verbose {
        eprintln!(
            "Loaded {} slide(s) from {}",
            presentation.slides.len(),
            input_path.display()
        );
    }

    let config = AllyConfig::default();
    let report = analyze_presentation(&presentation, &config);

    Ok(render(
        &ReportDocument {
            report: &report,
            diff: None,
            changes: None,
        },
        format,
    ))
}

/// Enhance one file, export the result, and render the report.
async fn enhance_file(
    input_path: &Path,
    output: Option<PathBuf>,
    format: OutputFormat,
    simplify_text: bool,
    verbose: bool,
) -> Result<()> {
    let mut presentation = load_presentation(input_path)?;

    let config = AllyConfig {
        complexity_auto_apply: simplify_text,
        ..AllyConfig::default()
    };

    // No external description service is wired in; images that need alt
    // text receive the documented fallback strings.
    let describer = NullDescriber;
    let cancel = CancelFlag::new();
    let session = enhance_presentation(&mut presentation, &config, &describer, &cancel).await;

    if verbose {
        eprintln!(
            "Applied {} change(s), skipped {}",
            session.outcome.changes.len(),
            session.outcome.skipped.len()
        );
    }

    // Re-serialize wholesale and persist with a single write, so the
    // output file is either complete or absent.
    let source = File::open(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    let bytes = PptxWriter::new()
        .write_to_vec(BufReader::new(source), &presentation)
        .with_context(|| format!("Failed to export {}", input_path.display()))?;

    let output_path = match output {
        Some(path) => path,
        None => default_output_path(input_path),
    };
    std::fs::write(&output_path, bytes)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    eprintln!("Written to: {}", output_path.display());

    print!(
        "{}",
        render(
            &ReportDocument {
                report: &session.after,
                diff: Some(&session.diff),
                changes: Some(&session.outcome.changes),
            },
            format,
        )
    );
    Ok(())
}

/// Load and parse a presentation, rejecting unsupported formats before
/// any analysis begins.
fn load_presentation(input_path: &Path) -> Result<Presentation> {
    let file = File::open(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    let mut reader = BufReader::new(file);

    // Read magic bytes to detect format
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .with_context(|| "Failed to read file header")?;

    let format = PresentationFormat::from_magic(&magic)
        .or_else(|| {
            input_path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(PresentationFormat::from_extension)
        })
        .ok_or_else(|| anyhow::anyhow!("Could not detect file format"))?;

    if format == PresentationFormat::Ppt {
        anyhow::bail!(
            "Legacy binary .ppt files are not supported; re-save the file as .pptx first"
        );
    }

    // Re-open for parsing so the archive reader starts at offset zero.
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let filename = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    log::debug!("Parsing {} as PPTX", filename);
    PptxParser::new()
        .parse(reader, filename)
        .map_err(|e| anyhow::anyhow!("{}", e))
}

/// Default output path: the input path with an `-accessible` suffix.
fn default_output_path(input_path: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let filename = format!("{}-accessible.pptx", stem);
    match input_path.parent() {
        Some(parent) => parent.join(filename),
        None => PathBuf::from(filename),
    }
}
