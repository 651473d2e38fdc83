//! Mapping of backend answers onto the node model.
//!
//! Each backend has its own JSON schema. A [`SchemaTransformer`] turns one
//! answer into pages of semantic nodes in bottom-left coordinates, sorted
//! into reading order. Transformers assign no structure IDs; the
//! orchestrator commits the pages like any locally produced content.

mod docling;
mod hancom;

pub use docling::DoclingTransformer;
pub use hancom::HancomTransformer;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use super::client::HybridResponse;
use crate::error::{Error, Result};
use crate::model::{BoundingBox, Page, SemanticNode, Slot, TableCell, TableNode, TextNode};
use crate::processors::reading_order::sort_slots;

/// Height assumed for pages the answer gives no size for.
pub const DEFAULT_PAGE_HEIGHT: f64 = 842.0;

/// Width assumed for pages the answer gives no size for.
pub const DEFAULT_PAGE_WIDTH: f64 = 595.0;

/// Font size given to text nodes, which arrive without glyph geometry.
pub const NOMINAL_FONT_SIZE: f64 = 12.0;

/// Same-line tolerance of the reading-order sort.
pub const READING_ORDER_TOLERANCE: f64 = 5.0;

/// Largest page number an answer may refer to.
pub const MAX_ANSWER_PAGES: u32 = 100_000;

/// Largest grid, in slots, a backend table may declare.
pub const MAX_TABLE_SLOTS: usize = 1 << 20;

/// Page heights keyed by one-based page number.
pub type PageHeights = BTreeMap<u32, f64>;

/// Maps one backend's answer onto pages.
pub trait SchemaTransformer: Send + Sync {
    /// Backend this transformer understands.
    fn backend_name(&self) -> &str;

    /// Transform a whole answer. Page `i` of the result has number `i`.
    fn transform(&self, response: &HybridResponse, page_heights: &PageHeights) -> Result<Vec<Page>>;

    /// Transform the JSON of a single one-based page.
    fn transform_page(&self, page_number: u32, page_json: &Value, page_height: f64) -> Result<Page> {
        let heights: PageHeights = [(page_number, page_height)].into_iter().collect();
        let response = HybridResponse::from_json(page_json.clone());
        let mut pages = self.transform(&response, &heights)?;
        let index = page_number.saturating_sub(1) as usize;
        if index < pages.len() {
            Ok(pages.swap_remove(index))
        } else {
            Ok(Page::new(index as u32, DEFAULT_PAGE_WIDTH, page_height))
        }
    }
}

/// Transformers by backend name.
pub struct TransformerRegistry {
    transformers: HashMap<String, Arc<dyn SchemaTransformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self {
            transformers: HashMap::new(),
        }
    }

    /// Registry with the docling and Hancom transformers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let docling: Arc<dyn SchemaTransformer> = Arc::new(DoclingTransformer);
        registry.register(Arc::clone(&docling));
        registry.register_as("docling-fast", docling);
        registry.register(Arc::new(HancomTransformer));
        registry
    }

    pub fn register(&mut self, transformer: Arc<dyn SchemaTransformer>) {
        let name = transformer.backend_name().to_lowercase();
        self.transformers.insert(name, transformer);
    }

    /// Register `transformer` under an additional backend name.
    pub fn register_as(&mut self, name: &str, transformer: Arc<dyn SchemaTransformer>) {
        self.transformers.insert(name.to_lowercase(), transformer);
    }

    pub fn get(&self, backend: &str) -> Option<Arc<dyn SchemaTransformer>> {
        self.transformers.get(&backend.to_lowercase()).cloned()
    }

    /// Transformer for `backend`, or a configuration error.
    pub fn require(&self, backend: &str) -> Result<Arc<dyn SchemaTransformer>> {
        self.get(backend)
            .ok_or_else(|| Error::InvalidConfig(format!("no schema transformer for backend '{}'", backend)))
    }

    pub fn backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transformers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Empty pages `0..count` with the given heights.
fn empty_pages(count: u32, heights: &PageHeights, size: impl Fn(u32) -> Option<(f64, f64)>) -> Vec<Page> {
    (0..count)
        .map(|index| {
            let number = index + 1;
            let (width, height) = match (heights.get(&number), size(number)) {
                (Some(h), Some((w, _))) => (w, *h),
                (Some(h), None) => (DEFAULT_PAGE_WIDTH, *h),
                (None, Some((w, h))) => (w, h),
                (None, None) => (DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT),
            };
            Page::new(index, width, height)
        })
        .collect()
}

/// Zero-based index of the one-based page `number` an answer refers to.
///
/// The page must be one of `heights` when any were requested.
fn page_index(number: u64, heights: &PageHeights) -> Result<u32> {
    let valid = u32::try_from(number)
        .ok()
        .filter(|n| (1..=MAX_ANSWER_PAGES).contains(n))
        .filter(|n| heights.is_empty() || heights.contains_key(n));
    match valid {
        Some(n) => Ok(n - 1),
        None => Err(Error::InvalidResponse(format!(
            "answer refers to page {} outside the requested pages",
            number
        ))),
    }
}

/// Page `index`, growing `pages` when the answer refers past its end.
///
/// `index` comes from [`page_index`], which bounds it.
fn page_mut(pages: &mut Vec<Page>, index: u32) -> &mut Page {
    while pages.len() <= index as usize {
        let next = pages.len() as u32;
        pages.push(Page::new(next, DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT));
    }
    &mut pages[index as usize]
}

/// Sort every page into reading order.
fn finish(mut pages: Vec<Page>) -> Vec<Page> {
    for page in &mut pages {
        sort_slots(&mut page.slots, READING_ORDER_TOLERANCE);
    }
    pages
}

fn text_node(bbox: BoundingBox, text: &str) -> TextNode {
    TextNode::from_text(bbox, text, NOMINAL_FONT_SIZE)
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

fn f64_field(value: &Value, field: &str) -> f64 {
    value.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// A cell claim of a backend table, in grid slots.
struct CellClaim {
    row: usize,
    col: usize,
    rowspan: usize,
    colspan: usize,
    text: String,
}

/// Build a table whose cell boxes divide `bbox` evenly.
///
/// Claims overlapping an earlier claim or leaving the grid are dropped with
/// a warning; slots no claim covers get empty unit cells.
fn grid_table(bbox: BoundingBox, rows: usize, cols: usize, claims: Vec<CellClaim>) -> Option<TableNode> {
    if rows == 0 || cols == 0 {
        return None;
    }
    let Some(slot_count) = rows.checked_mul(cols).filter(|&n| n <= MAX_TABLE_SLOTS) else {
        log::warn!("Dropping backend table with a {}x{} grid", rows, cols);
        return None;
    };
    let row_height = bbox.height() / rows as f64;
    let col_width = bbox.width() / cols as f64;
    let cell_box = |row: usize, col: usize, rowspan: usize, colspan: usize| {
        let top = bbox.top - row as f64 * row_height;
        let left = bbox.left + col as f64 * col_width;
        BoundingBox::new(
            bbox.page,
            left,
            top - rowspan as f64 * row_height,
            left + colspan as f64 * col_width,
            top,
        )
    };

    let mut owner: Vec<Option<usize>> = vec![None; slot_count];
    let mut cells: Vec<TableCell> = Vec::new();
    for claim in claims {
        let rowspan = claim.rowspan.max(1);
        let colspan = claim.colspan.max(1);
        let row_end = claim.row.checked_add(rowspan).filter(|&end| end <= rows);
        let col_end = claim.col.checked_add(colspan).filter(|&end| end <= cols);
        let (Some(row_end), Some(col_end)) = (row_end, col_end) else {
            log::warn!("Dropping table cell ({}, {}) outside the {}x{} grid", claim.row, claim.col, rows, cols);
            continue;
        };
        let slots: Vec<usize> = (claim.row..row_end)
            .flat_map(|r| (claim.col..col_end).map(move |c| r * cols + c))
            .collect();
        if slots.iter().any(|&s| owner[s].is_some()) {
            log::warn!("Dropping overlapping table cell ({}, {})", claim.row, claim.col);
            continue;
        }
        for &slot in &slots {
            owner[slot] = Some(cells.len());
        }
        let mut cell = TableCell::new(claim.row, claim.col, rowspan, colspan, cell_box(claim.row, claim.col, rowspan, colspan));
        if !claim.text.is_empty() {
            cell.contents
                .push(Slot::Node(SemanticNode::Paragraph(text_node(cell.bbox, &claim.text))));
        }
        cells.push(cell);
    }
    for (slot, claimed) in owner.iter().enumerate() {
        if claimed.is_none() {
            let (row, col) = (slot / cols, slot % cols);
            cells.push(TableCell::new(row, col, 1, 1, cell_box(row, col, 1, 1)));
        }
    }
    cells.sort_by_key(|c| (c.row, c.col));
    let table = TableNode::new(bbox, rows, cols, cells);
    match table.check_coverage() {
        Ok(()) => Some(table),
        Err(reason) => {
            log::warn!("Dropping backend table: {}", reason);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(row: usize, col: usize, rowspan: usize, colspan: usize, text: &str) -> CellClaim {
        CellClaim {
            row,
            col,
            rowspan,
            colspan,
            text: text.to_string(),
        }
    }

    // ==== Grid Table Tests ====

    #[test]
    fn test_unclaimed_slots_filled() {
        let bbox = BoundingBox::new(0, 0.0, 0.0, 200.0, 100.0);
        let table = grid_table(bbox, 2, 2, vec![claim(0, 0, 1, 2, "header")]).unwrap();
        assert_eq!(table.cells.len(), 3);
        assert!(table.check_coverage().is_ok());
        let header = table.cell_at(0, 1).unwrap();
        assert_eq!((header.row, header.col, header.colspan), (0, 0, 2));
        assert_eq!(header.bbox, BoundingBox::new(0, 0.0, 50.0, 200.0, 100.0));
    }

    #[test]
    fn test_overlapping_claim_dropped() {
        let bbox = BoundingBox::new(0, 0.0, 0.0, 200.0, 100.0);
        let table = grid_table(
            bbox,
            2,
            2,
            vec![claim(0, 0, 2, 1, "a"), claim(1, 0, 1, 2, "b"), claim(5, 5, 1, 1, "c")],
        )
        .unwrap();
        assert!(table.check_coverage().is_ok());
        assert_eq!(table.cells.len(), 3);
    }

    #[test]
    fn test_overflowing_claim_dropped() {
        let bbox = BoundingBox::new(0, 0.0, 0.0, 200.0, 100.0);
        let table = grid_table(
            bbox,
            2,
            2,
            vec![claim(usize::MAX, 0, 1, 1, "far"), claim(0, 1, 1, usize::MAX, "wide"), claim(0, 0, 1, 1, "a")],
        )
        .unwrap();
        assert!(table.check_coverage().is_ok());
        assert_eq!(table.cells.len(), 4);
        assert_eq!(table.cell_at(0, 1).unwrap().colspan, 1);
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let bbox = BoundingBox::new(0, 0.0, 0.0, 200.0, 100.0);
        assert!(grid_table(bbox, usize::MAX, 2, Vec::new()).is_none());
        assert!(grid_table(bbox, MAX_TABLE_SLOTS, 2, Vec::new()).is_none());
    }

    #[test]
    fn test_page_index_bounds() {
        let requested: PageHeights = [(2, 842.0)].into_iter().collect();
        assert_eq!(page_index(2, &requested).unwrap(), 1);
        assert!(matches!(page_index(3, &requested), Err(Error::InvalidResponse(_))));
        assert!(matches!(page_index(0, &PageHeights::new()), Err(Error::InvalidResponse(_))));
        assert!(matches!(page_index(u64::MAX, &PageHeights::new()), Err(Error::InvalidResponse(_))));
        assert_eq!(page_index(7, &PageHeights::new()).unwrap(), 6);
    }

    #[test]
    fn test_empty_grid_rejected() {
        assert!(grid_table(BoundingBox::default(), 0, 3, Vec::new()).is_none());
    }

    #[test]
    fn test_registry_defaults() {
        let registry = TransformerRegistry::with_defaults();
        assert_eq!(registry.backends(), vec!["docling", "docling-fast", "hancom"]);
        assert!(registry.get("DOCLING").is_some());
        assert!(matches!(registry.require("azure"), Err(Error::InvalidConfig(_))));
    }
}
