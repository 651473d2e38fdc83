//! Structural inference passes.
//!
//! Every content sequence (a page, a table cell, a furniture node) goes
//! through [`process_contents`]. [`DocumentProcessor`] drives the local
//! flow for a whole document: per-page preparation, document-wide list
//! detection, per-page finishing and the document-wide [`finalize`] passes.

pub mod caption;
pub mod cluster_table;
pub mod content_filter;
pub mod header_footer;
pub mod heading;
pub mod labels;
pub mod level;
pub mod list;
mod options;
pub mod paragraph;
pub mod reading_order;
pub mod table_border;
pub mod text_line;

pub use options::{ProcessOptions, Thresholds};

use std::sync::Arc;

use rayon::prelude::*;

use crate::context::{PageScope, ProcessingContext};
use crate::error::{Error, Result};
use crate::model::{Document, DocumentInput, Page, Slot, TableBorder};
use crate::probability::{GeometricModel, ProbabilityModel};

/// Run the full pass sequence over one content sequence.
///
/// Used for pages processed in isolation, table cells and furniture
/// contents. Nodes already present pass through unchanged.
pub fn process_contents(scope: &mut PageScope, slots: Vec<Slot>) -> Vec<Slot> {
    let slots = table_border::process_table_borders(scope, slots);
    let mut slots = text_line::assemble_lines(slots, scope.model(), scope.thresholds());
    list::process_lists(scope, std::slice::from_mut(&mut slots));
    finish_contents(scope, &mut slots);
    slots
}

/// Passes that follow list detection.
fn finish_contents(scope: &mut PageScope, slots: &mut Vec<Slot>) {
    paragraph::process_paragraphs(slots, scope.model(), scope.thresholds());
    list::process_text_node_lists(scope, slots);
    heading::process_headings(scope, slots);
    scope.commit(slots);
    caption::process_captions(scope, slots);
    list::check_neighbor_lists(scope, std::slice::from_mut(slots));
}

fn check_page(page: &Page) -> Result<()> {
    if !(page.width > 0.0 && page.height > 0.0) {
        return Err(Error::Other(format!(
            "page {} has invalid size {}x{}",
            page.number + 1,
            page.width,
            page.height
        )));
    }
    Ok(())
}

/// Cluster proposals, table assembly and line assembly for one page.
fn prepare_page(scope: &mut PageScope, page: &mut Page, cluster_tables: bool) -> Result<()> {
    check_page(page)?;
    if cluster_tables {
        for border in cluster_table::propose_tables(page, scope.borders(), scope.thresholds()) {
            scope.add_border(border);
        }
    }
    let slots = std::mem::take(&mut page.slots);
    let slots = table_border::process_table_borders(scope, slots);
    page.slots = text_line::assemble_lines(slots, scope.model(), scope.thresholds());
    Ok(())
}

/// Process one page in isolation, lists included.
///
/// On error the page keeps its filtered primitives.
pub fn process_page(scope: &mut PageScope, page: &mut Page, options: &ProcessOptions) -> Result<()> {
    let original = page.slots.clone();
    if let Err(err) = prepare_page(scope, page, options.cluster_tables) {
        page.slots = original;
        return Err(err);
    }
    list::process_lists(scope, std::slice::from_mut(&mut page.slots));
    finish_contents(scope, &mut page.slots);
    Ok(())
}

/// Document-wide passes, run once over all pages in document order:
/// headers and footers, neighbour lists, neighbour tables, heading levels.
pub fn finalize(ctx: &mut ProcessingContext, pages: &mut [Page]) {
    header_footer::process_headers_and_footers(ctx, pages);

    let mut contents: Vec<Vec<Slot>> = pages.iter_mut().map(|p| std::mem::take(&mut p.slots)).collect();
    let scope = ctx.detached_scope(pages.first().map(|p| p.number).unwrap_or(0));
    list::check_neighbor_lists(&scope, &mut contents);
    table_border::check_neighbor_tables(&scope, &mut contents, ctx.thresholds().neighbour_table_tolerance);
    for (page, slots) in pages.iter_mut().zip(contents) {
        page.slots = slots;
    }

    level::assign_levels(ctx.headings(), pages);
}

/// Local structure reconstruction of whole documents.
pub struct DocumentProcessor {
    options: ProcessOptions,
    model: Arc<dyn ProbabilityModel>,
}

impl DocumentProcessor {
    /// Create a processor using the bundled geometric model.
    pub fn new(options: ProcessOptions) -> Self {
        Self::with_model(options, Arc::new(GeometricModel::default()))
    }

    /// Create a processor using a custom probability model.
    pub fn with_model(options: ProcessOptions, model: Arc<dyn ProbabilityModel>) -> Self {
        Self { options, model }
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Process a parsed input document.
    pub fn process(&self, input: DocumentInput) -> Result<Document> {
        let (pages, borders) = input.into_parts();
        self.process_pages(pages, borders)
    }

    /// Process `pages` with the candidate table grids `borders`.
    pub fn process_pages(&self, pages: Vec<Page>, borders: Vec<TableBorder>) -> Result<Document> {
        self.options.validate()?;
        let selected = self.options.pages.resolve(pages.len() as u32)?;
        let mut pages: Vec<Page> = pages
            .into_iter()
            .filter(|p| selected.contains(&(p.number + 1)))
            .collect();

        let mut ctx = ProcessingContext::with_model(self.options.thresholds.clone(), Arc::clone(&self.model));
        ctx.add_borders(borders);
        for page in &mut pages {
            let removed = content_filter::filter_page(page, &self.options);
            if removed > 0 {
                log::debug!("Page {}: filtered {} primitives", page.number + 1, removed);
            }
        }
        let mut scopes: Vec<PageScope> = pages.iter().map(|p| ctx.scope(p.number)).collect();

        // ==== per page: tables and lines ====
        let cluster_tables = self.options.cluster_tables;
        let prepare = |(page, scope): (&mut Page, &mut PageScope)| {
            let original = page.slots.clone();
            if let Err(err) = prepare_page(scope, page, cluster_tables) {
                log::warn!("Page {}: processing failed, keeping primitives: {}", page.number + 1, err);
                page.slots = original;
                return false;
            }
            true
        };
        let prepared: Vec<bool> = if self.options.parallel {
            pages.par_iter_mut().zip(scopes.par_iter_mut()).map(prepare).collect()
        } else {
            pages.iter_mut().zip(scopes.iter_mut()).map(prepare).collect()
        };

        // ==== document-wide: text-label lists across page boundaries ====
        let mut contents: Vec<Vec<Slot>> = pages
            .iter_mut()
            .zip(&prepared)
            .map(|(p, ok)| if *ok { std::mem::take(&mut p.slots) } else { Vec::new() })
            .collect();
        let lists = list::process_lists(&ctx.detached_scope(0), &mut contents);
        log::debug!("Detected {} lists", lists);
        for ((page, slots), ok) in pages.iter_mut().zip(contents).zip(&prepared) {
            if *ok {
                page.slots = slots;
            }
        }

        // ==== per page: paragraphs, headings, captions ====
        let finish = |((page, scope), ok): ((&mut Page, &mut PageScope), &bool)| {
            if *ok {
                finish_contents(scope, &mut page.slots);
            }
        };
        if self.options.parallel {
            pages
                .par_iter_mut()
                .zip(scopes.par_iter_mut())
                .zip(prepared.par_iter())
                .for_each(finish);
        } else {
            pages.iter_mut().zip(scopes.iter_mut()).zip(prepared.iter()).for_each(finish);
        }
        for scope in scopes {
            ctx.finish_scope(scope);
        }

        finalize(&mut ctx, &mut pages);
        log::info!("Processed {} pages locally", pages.len());
        Ok(Document::from_pages(pages))
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(ProcessOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, ContentPrimitive, SemanticNode, TextRun};

    fn run(page: u32, text: &str, left: f64, top: f64, size: f64) -> ContentPrimitive {
        let right = left + text.chars().count() as f64 * size * 0.5;
        ContentPrimitive::TextRun(TextRun::new(0, BoundingBox::new(page, left, top - size, right, top), text, size))
    }

    fn kinds(page: &Page) -> Vec<&'static str> {
        page.nodes().map(SemanticNode::kind_name).collect()
    }

    // ==== Pipeline Tests ====

    #[test]
    fn test_heading_and_paragraph() {
        let page = Page::with_primitives(
            0,
            595.0,
            842.0,
            vec![
                run(0, "Introduction", 50.0, 760.0, 20.0),
                run(0, "The body of the section starts here", 50.0, 720.0, 10.0),
            ],
        );
        let doc = DocumentProcessor::new(ProcessOptions::default().sequential())
            .process_pages(vec![page], Vec::new())
            .unwrap();
        assert_eq!(kinds(&doc.pages[0]), vec!["heading", "paragraph"]);
        let Some(SemanticNode::Heading(heading)) = doc.pages[0].nodes().next() else {
            panic!("heading expected");
        };
        assert_eq!(heading.level, Some(1));
    }

    #[test]
    fn test_every_node_gets_unique_id() {
        let page = Page::with_primitives(
            0,
            595.0,
            842.0,
            vec![
                run(0, "1. First item", 50.0, 700.0, 10.0),
                run(0, "2. Second item", 50.0, 686.0, 10.0),
                run(0, "Closing remarks far below", 50.0, 400.0, 10.0),
            ],
        );
        let doc = DocumentProcessor::default().process_pages(vec![page], Vec::new()).unwrap();
        let mut ids: Vec<_> = doc.nodes().filter_map(SemanticNode::id).collect();
        let count = ids.len();
        assert_eq!(count, doc.nodes().count());
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn test_table_border_becomes_table() {
        let page = Page::with_primitives(
            0,
            595.0,
            842.0,
            vec![run(0, "Name", 60.0, 690.0, 10.0), run(0, "Age", 160.0, 690.0, 10.0)],
        );
        let border = TableBorder::new(
            BoundingBox::new(0, 50.0, 600.0, 250.0, 700.0),
            vec![700.0, 650.0, 600.0],
            vec![50.0, 150.0, 250.0],
        );
        let doc = DocumentProcessor::default().process_pages(vec![page], vec![border]).unwrap();
        assert_eq!(kinds(&doc.pages[0]), vec!["table"]);
    }

    #[test]
    fn test_page_selection_filters_pages() {
        let pages: Vec<Page> = (0..3)
            .map(|i| Page::with_primitives(i, 595.0, 842.0, vec![run(i, "text", 50.0, 700.0, 10.0)]))
            .collect();
        let options = ProcessOptions::default().with_pages(crate::model::PageSelection::Pages(vec![2]));
        let doc = DocumentProcessor::new(options).process_pages(pages, Vec::new()).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].number, 1);
    }

    #[test]
    fn test_invalid_page_keeps_primitives() {
        let page = Page::with_primitives(0, 0.0, 0.0, vec![run(0, "text", 50.0, 700.0, 10.0)]);
        let options = ProcessOptions {
            filter_out_of_page: false,
            ..ProcessOptions::default()
        };
        let doc = DocumentProcessor::new(options).process_pages(vec![page], Vec::new()).unwrap();
        assert!(matches!(doc.pages[0].slots[0], Slot::Primitive(_)));
    }
}
