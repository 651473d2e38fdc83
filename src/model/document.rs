//! Document-level types and the primitive input format.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::{ContentPrimitive, Page, SemanticNode, Slot, TableBorder};
use crate::error::{Error, Result};

/// A processed document: pages in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Pages in the document
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pages(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_num: u32) -> Option<&Page> {
        if page_num == 0 {
            return None;
        }
        self.pages.get((page_num - 1) as usize)
    }

    /// Add a page to the document.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterate over top-level nodes of all pages.
    pub fn nodes(&self) -> impl Iterator<Item = &SemanticNode> {
        self.pages.iter().flat_map(|p| p.nodes())
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| slots_text(&page.slots))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn slots_text(slots: &[Slot]) -> String {
    slots
        .iter()
        .filter_map(|slot| match slot {
            Slot::Node(node) => Some(node_text(node)),
            Slot::Line(line) => Some(line.text.clone()),
            _ => None,
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn node_text(node: &SemanticNode) -> String {
    match node {
        SemanticNode::Paragraph(_) | SemanticNode::Heading(_) | SemanticNode::Caption(_) => node
            .text_node()
            .map(|t| t.text())
            .unwrap_or_default(),
        SemanticNode::List(list) => list
            .items
            .iter()
            .map(|item| {
                let mut text = item.body.text();
                let nested = slots_text(&item.contents);
                if !nested.is_empty() {
                    text.push('\n');
                    text.push_str(&nested);
                }
                text
            })
            .collect::<Vec<_>>()
            .join("\n"),
        SemanticNode::Table(table) => table
            .cells
            .iter()
            .map(|c| slots_text(&c.contents))
            .collect::<Vec<_>>()
            .join("\t"),
        SemanticNode::Formula(f) => f.latex.clone(),
        SemanticNode::Picture(p) => p.description.clone().unwrap_or_default(),
        SemanticNode::HeaderFooter(h) => slots_text(&h.contents),
    }
}

/// Page selection (1-indexed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Process all pages
    #[default]
    All,
    /// Process a range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Process specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let invalid = || Error::InvalidPageRange(s.to_string());
        let number = |part: &str| -> Result<u32> {
            match part.trim().parse::<u32>() {
                Ok(0) | Err(_) => Err(invalid()),
                Ok(n) => Ok(n),
            }
        };

        // Simple range (e.g., "1-10")
        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let (start, end) = (number(start)?, number(end)?);
                if start > end {
                    return Err(invalid());
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            if let Some((start, end)) = part.split_once('-') {
                let (start, end) = (number(start)?, number(end)?);
                if start > end {
                    return Err(invalid());
                }
                pages.extend(start..=end);
            } else {
                pages.push(number(part)?);
            }
        }
        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }

    /// The selected pages of a `total`-page document, 1-indexed and sorted.
    ///
    /// Fails when an explicitly listed page does not exist.
    pub fn resolve(&self, total: u32) -> Result<Vec<u32>> {
        match self {
            PageSelection::All => Ok((1..=total).collect()),
            PageSelection::Range(range) => {
                if *range.end() > total {
                    return Err(Error::PageOutOfRange(*range.end(), total));
                }
                Ok(range.clone().collect())
            }
            PageSelection::Pages(pages) => {
                if let Some(&page) = pages.iter().find(|&&p| p == 0 || p > total) {
                    return Err(Error::PageOutOfRange(page, total));
                }
                Ok(pages.clone())
            }
        }
    }
}

/// One page of extracted primitives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInput {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default)]
    pub primitives: Vec<ContentPrimitive>,
}

fn default_width() -> f64 {
    595.0
}

fn default_height() -> f64 {
    842.0
}

/// Extracted primitives of a whole document plus detected table grids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInput {
    pub pages: Vec<PageInput>,
    #[serde(default)]
    pub table_borders: Vec<TableBorder>,
}

impl DocumentInput {
    /// Parse the JSON input format.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Split into pages and table borders.
    ///
    /// Primitive boxes are re-stamped with the index of the page that holds them.
    pub fn into_parts(self) -> (Vec<Page>, Vec<TableBorder>) {
        let pages = self
            .pages
            .into_iter()
            .enumerate()
            .map(|(number, input)| {
                let number = number as u32;
                let mut primitives = input.primitives;
                for primitive in &mut primitives {
                    if primitive.bbox().page != number {
                        log::warn!(
                            "primitive {} claims page {} but belongs to page {}",
                            primitive.index(),
                            primitive.bbox().page,
                            number
                        );
                        primitive.set_page(number);
                    }
                }
                Page::with_primitives(number, input.width, input.height, primitives)
            })
            .collect();
        (pages, self.table_borders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_selection() {
        let sel = PageSelection::parse("1-5").unwrap();
        assert!(sel.includes(1));
        assert!(sel.includes(5));
        assert!(!sel.includes(6));

        let sel = PageSelection::parse("1,3,5-7").unwrap();
        assert_eq!(sel, PageSelection::Pages(vec![1, 3, 5, 6, 7]));

        assert!(PageSelection::parse("").unwrap().includes(100));
        assert!(PageSelection::parse("0").is_err());
        assert!(PageSelection::parse("5-2").is_err());
        assert!(PageSelection::parse("a,b").is_err());
    }

    #[test]
    fn test_resolve_checks_bounds() {
        assert_eq!(PageSelection::All.resolve(3).unwrap(), vec![1, 2, 3]);
        let err = PageSelection::Pages(vec![2, 9]).resolve(3).unwrap_err();
        assert!(matches!(err, Error::PageOutOfRange(9, 3)));
    }

    #[test]
    fn test_input_restamps_pages() {
        let json = r#"{
            "pages": [
                {"width": 595, "height": 842, "primitives": []},
                {"width": 595, "height": 842, "primitives": [
                    {"type": "text_run", "bbox": {"page": 0, "left": 10, "bottom": 700, "right": 50, "top": 712}, "text": "Hi"}
                ]}
            ]
        }"#;
        let (pages, borders) = DocumentInput::from_json(json).unwrap().into_parts();
        assert_eq!(pages.len(), 2);
        assert!(borders.is_empty());
        let primitive = pages[1].primitives().next().unwrap();
        assert_eq!(primitive.bbox().page, 1);
    }

    #[test]
    fn test_malformed_input_is_json_error() {
        let err = DocumentInput::from_json("{\"pages\": 3}").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
