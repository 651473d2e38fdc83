//! # pdfstruct
//!
//! Semantic structure reconstruction for PDF content primitives.
//!
//! The input is what a PDF extractor produces per page: text runs,
//! line-art, images and line segments with their boxes, plus candidate
//! table grids. The output is a tree of semantic nodes per page:
//! paragraphs, headings with levels, lists, tables, captions linked to
//! their figures, pictures, formulas and page headers/footers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfstruct::{process_file, ProcessOptions};
//!
//! fn main() -> pdfstruct::Result<()> {
//!     let doc = process_file("primitives.json", ProcessOptions::default())?;
//!     for node in doc.nodes() {
//!         println!("{}", node.kind_name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Hybrid mode
//!
//! [`hybrid::HybridOrchestrator`] triages every page and sends the tabular
//! ones to a document-AI backend (docling or Hancom) while the rest run
//! through the local pipeline concurrently. HTTP clients for both backends
//! are behind the `http` feature; any [`hybrid::HybridClient`] works.
//!
//! ## Features
//!
//! - **Local pipeline**: line assembly, paragraphs, headings, lists, tables,
//!   captions, headers and footers
//! - **Cross-page stitching**: lists and tables continuing over page breaks
//! - **Parallel processing**: pages run on a Rayon pool
//! - **Pluggable scoring**: swap the [`ProbabilityModel`] for your own

pub mod context;
pub mod error;
pub mod hybrid;
pub mod model;
pub mod probability;
pub mod processors;

// Re-export commonly used types
pub use context::{IdSource, PageScope, ProcessingContext};
pub use error::{Error, Result};
pub use model::{
    BoundingBox, ContentPrimitive, Document, DocumentInput, Page, PageSelection, SemanticNode, Slot,
    StructureId, TableBorder, TextRun,
};
pub use probability::{GeometricModel, ProbabilityModel};
pub use processors::{DocumentProcessor, ProcessOptions, Thresholds};

use std::path::Path;

/// Process already parsed input with the local pipeline.
pub fn process_input(input: DocumentInput, options: ProcessOptions) -> Result<Document> {
    DocumentProcessor::new(options).process(input)
}

/// Process a primitives JSON document with the local pipeline.
///
/// # Example
///
/// ```no_run
/// use pdfstruct::{process_json, ProcessOptions};
///
/// let json = std::fs::read_to_string("primitives.json").unwrap();
/// let doc = process_json(&json, ProcessOptions::default()).unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn process_json(json: &str, options: ProcessOptions) -> Result<Document> {
    process_input(DocumentInput::from_json(json)?, options)
}

/// Read and process a primitives JSON file.
pub fn process_file<P: AsRef<Path>>(path: P, options: ProcessOptions) -> Result<Document> {
    let json = std::fs::read_to_string(path)?;
    process_json(&json, options)
}

/// Triage every page of a primitives JSON document without processing it.
pub fn triage_json(json: &str, thresholds: &hybrid::TriageThresholds) -> Result<Vec<hybrid::TriageResult>> {
    let input = DocumentInput::from_json(json)?;
    let (mut pages, borders) = input.into_parts();
    let options = ProcessOptions::default();
    for page in &mut pages {
        processors::content_filter::filter_page(page, &options);
    }
    let mut ctx = ProcessingContext::new(options.thresholds);
    ctx.add_borders(borders);
    Ok(hybrid::triage_pages(&pages, |p| ctx.has_borders(p), thresholds))
}
