//! pdfstruct CLI - semantic structure reconstruction tool

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfstruct::hybrid::{
    create_client, HybridConfig, HybridOrchestrator, HybridResponse, ProcessingEvent, TransformerRegistry,
    TriageDecision, TriageLog, TriageThresholds,
};
use pdfstruct::{process_file, Document, DocumentInput, PageSelection, ProcessOptions};

#[derive(Parser)]
#[command(name = "pdfstruct")]
#[command(version)]
#[command(about = "Reconstruct semantic structure from PDF content primitives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the local pipeline and write the semantic JSON
    Process {
        /// Primitives JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Process pages on a single thread
        #[arg(long)]
        sequential: bool,

        /// Disable table detection from text clusters
        #[arg(long)]
        no_cluster_tables: bool,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Processing options JSON file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print the plain text of the reconstructed document
    Text {
        /// Primitives JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,
    },

    /// Show how each page would be routed in hybrid mode
    Triage {
        /// Primitives JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Directory to write triage.json into
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Backend name recorded in the triage log
        #[arg(long, default_value = "docling")]
        backend: String,
    },

    /// Route tabular pages to a document-AI backend
    Hybrid {
        /// Primitives JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Source PDF sent to the backend
        #[arg(long, value_name = "PDF")]
        pdf: PathBuf,

        /// Backend to use (default: docling)
        #[arg(long, value_enum)]
        backend: Option<Backend>,

        /// Backend base URL
        #[arg(long, env = "PDFSTRUCT_HYBRID_URL")]
        url: Option<String>,

        /// Request timeout in milliseconds (default: 30000)
        #[arg(long)]
        timeout: Option<u64>,

        /// Hybrid configuration JSON file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Fail instead of processing backend pages locally on error
        #[arg(long)]
        no_fallback: bool,

        /// Ask the backend to run OCR
        #[arg(long)]
        ocr: bool,

        /// Output directory for document.json and triage.json
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Transform a saved backend answer into semantic JSON
    Transform {
        /// Backend JSON answer
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Schema of the answer
        #[arg(long, value_enum, default_value = "docling")]
        backend: Backend,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show structure statistics
    Info {
        /// Primitives JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// docling-serve
    Docling,
    /// docling-serve fast pipeline
    DoclingFast,
    /// Hancom document AI
    Hancom,
}

impl Backend {
    fn name(self) -> &'static str {
        match self {
            Backend::Docling => "docling",
            Backend::DoclingFast => "docling-fast",
            Backend::Hancom => "hancom",
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Process {
            input,
            output,
            pages,
            sequential,
            no_cluster_tables,
            compact,
            config,
        }) => cmd_process(
            &input,
            output.as_deref(),
            pages.as_deref(),
            sequential,
            no_cluster_tables,
            compact,
            config.as_deref(),
        ),
        Some(Commands::Text { input, output, pages }) => cmd_text(&input, output.as_deref(), pages.as_deref()),
        Some(Commands::Triage { input, output, backend }) => cmd_triage(&input, output.as_deref(), &backend),
        Some(Commands::Hybrid {
            input,
            pdf,
            backend,
            url,
            timeout,
            config,
            no_fallback,
            ocr,
            output,
        }) => load_hybrid_config(config.as_deref(), backend, url, timeout, no_fallback, ocr)
            .and_then(|config| cmd_hybrid(&input, &pdf, config, output.as_deref())),
        Some(Commands::Transform { input, backend, output }) => cmd_transform(&input, backend, output.as_deref()),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!("{}", "Usage: pdfstruct <COMMAND> <FILE>".yellow());
            println!("       pdfstruct --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn parse_pages(pages: Option<&str>) -> Result<PageSelection, Box<dyn std::error::Error>> {
    match pages {
        Some(p) => Ok(PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?),
        None => Ok(PageSelection::All),
    }
}

fn load_options(config: Option<&Path>) -> Result<ProcessOptions, Box<dyn std::error::Error>> {
    match config {
        Some(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => Ok(ProcessOptions::default()),
    }
}

/// Configuration file values, overridden by explicit flags.
fn load_hybrid_config(
    path: Option<&Path>,
    backend: Option<Backend>,
    url: Option<String>,
    timeout: Option<u64>,
    no_fallback: bool,
    ocr: bool,
) -> Result<HybridConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => HybridConfig::new(Backend::Docling.name()),
    };
    if let Some(backend) = backend {
        config.backend = backend.name().to_string();
    }
    if let Some(url) = url {
        config = config.with_url(url);
    }
    if let Some(timeout) = timeout {
        config = config.with_timeout_ms(timeout);
    }
    if no_fallback {
        config = config.with_fallback(false);
    }
    if ocr {
        config = config.with_ocr(true);
    }
    Ok(config)
}

fn write_or_print(output: Option<&Path>, content: &str) -> CliResult {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn document_json(doc: &Document, compact: bool) -> Result<String, Box<dyn std::error::Error>> {
    if compact {
        Ok(serde_json::to_string(doc)?)
    } else {
        Ok(doc.to_json()?)
    }
}

fn cmd_process(
    input: &Path,
    output: Option<&Path>,
    pages: Option<&str>,
    sequential: bool,
    no_cluster_tables: bool,
    compact: bool,
    config: Option<&Path>,
) -> CliResult {
    let mut options = load_options(config)?;
    if pages.is_some() {
        options = options.with_pages(parse_pages(pages)?);
    }
    if sequential {
        options = options.sequential();
    }
    if no_cluster_tables {
        options = options.with_cluster_tables(false);
    }
    let doc = process_file(input, options)?;
    write_or_print(output, &document_json(&doc, compact)?)
}

fn cmd_text(input: &Path, output: Option<&Path>, pages: Option<&str>) -> CliResult {
    let options = ProcessOptions::new().with_pages(parse_pages(pages)?);
    let doc = process_file(input, options)?;
    write_or_print(output, &doc.plain_text())
}

fn decision_label(decision: TriageDecision) -> colored::ColoredString {
    match decision {
        TriageDecision::Java => "local".green(),
        TriageDecision::Backend => "backend".yellow(),
    }
}

fn cmd_triage(input: &Path, output: Option<&Path>, backend: &str) -> CliResult {
    let json = fs::read_to_string(input)?;
    let results = pdfstruct::triage_json(&json, &TriageThresholds::default())?;

    println!("{}", "Page Triage".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for result in &results {
        println!(
            "{} {:>4}: {:<8} ({:.2})",
            "Page".bold(),
            result.page + 1,
            decision_label(result.decision),
            result.confidence
        );
    }

    if let Some(dir) = output {
        let name = input.file_name().unwrap_or_default().to_string_lossy();
        let path = TriageLog::new(name, backend, &results).write_to_dir(dir)?;
        println!("\n{} {}", "Saved to".green(), path.display());
    }
    Ok(())
}

fn cmd_hybrid(input: &Path, pdf: &Path, config: HybridConfig, output: Option<&Path>) -> CliResult {
    let document_input = DocumentInput::from_json(&fs::read_to_string(input)?)?;
    let pdf_bytes = Arc::new(fs::read(pdf)?);
    let output_dir = output.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}_output", stem))
    });
    fs::create_dir_all(&output_dir)?;

    let config = config.with_output_dir(&output_dir);
    let client = create_client(&config)?;
    let page_count = document_input.pages.len() as u64;

    let (sender, receiver) = crossbeam_channel::unbounded();
    let orchestrator = HybridOrchestrator::new(config, client)?
        .with_events(sender)
        .with_document_name(pdf.file_name().unwrap_or_default().to_string_lossy());

    let pb = ProgressBar::new(page_count);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    let progress = pb.clone();
    let watcher = std::thread::spawn(move || {
        for event in receiver {
            match event {
                ProcessingEvent::PageProcessed { .. } => progress.inc(1),
                ProcessingEvent::BackendStarted { pages } => {
                    progress.set_message(format!("Backend converting {} pages...", pages))
                }
                ProcessingEvent::BackendFinished { pages } => {
                    progress.inc(pages as u64);
                    progress.set_message("Backend done");
                }
                ProcessingEvent::FallbackEngaged { reason } => {
                    progress.set_message(format!("Fallback: {}", reason))
                }
                ProcessingEvent::PageTriaged { .. } => {}
            }
        }
    });

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(orchestrator.process(document_input, pdf_bytes));
    // Dropping the orchestrator closes the event channel.
    drop(orchestrator);
    let _ = watcher.join();
    let output = result?;
    pb.finish_with_message("Done!");

    fs::write(output_dir.join("document.json"), output.document.to_json()?)?;

    println!("\n{}", "Summary:".green().bold());
    println!("  {} {} pages", "├─".dimmed(), output.document.page_count());
    println!("  {} {} from backend", "├─".dimmed(), output.backend_pages.len());
    if output.fallback_engaged {
        println!("  {} {}", "├─".dimmed(), "fallback engaged".yellow());
    }
    println!("  {} {}", "└─".dimmed(), output_dir.join("document.json").display());
    Ok(())
}

fn cmd_transform(input: &Path, backend: Backend, output: Option<&Path>) -> CliResult {
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(input)?)?;
    let response = HybridResponse::from_json(json);
    let transformer = TransformerRegistry::with_defaults().require(backend.name())?;
    let pages = transformer.transform(&response, &BTreeMap::new())?;
    let doc = Document::from_pages(pages);
    write_or_print(output, &doc.to_json()?)
}

fn cmd_info(input: &Path) -> CliResult {
    let doc = process_file(input, ProcessOptions::default())?;

    println!("{}", "Document Structure".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), doc.page_count());

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for node in doc.nodes() {
        *counts.entry(node.kind_name()).or_default() += 1;
    }

    println!();
    println!("{}", "Node Counts".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for (kind, count) in &counts {
        println!("{}: {}", kind.bold(), count);
    }

    let text = doc.plain_text();
    println!("{}: {}", "Words".bold(), text.split_whitespace().count());
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfstruct".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Semantic structure reconstruction for PDF content");
    println!();
    println!("License: MIT");
}
