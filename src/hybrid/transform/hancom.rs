//! Hancom visual info schema.

use serde_json::Value;

use super::{
    empty_pages, f64_field, finish, grid_table, page_index, page_mut, str_field, text_node, CellClaim, PageHeights,
    SchemaTransformer, DEFAULT_PAGE_HEIGHT, MAX_ANSWER_PAGES,
};
use crate::error::{Error, Result};
use crate::hybrid::client::HybridResponse;
use crate::model::{BoundingBox, Formula, Heading, Page, Picture, SemanticNode, Slot, TableNode};

/// Transformer for Hancom `elements` answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HancomTransformer;

/// Convert a Hancom top-left `{left, top, width, height}` box.
fn bounding_box(raw: &Value, index: u32, page_height: f64) -> BoundingBox {
    let left = f64_field(raw, "left");
    let top = f64_field(raw, "top");
    let width = f64_field(raw, "width");
    let height = f64_field(raw, "height");
    BoundingBox::from_top_left(index, left, top, left + width, top + height, page_height)
}

fn page_count(json: &Value, heights: &PageHeights) -> u32 {
    if let Some(max) = heights.keys().max() {
        return *max;
    }
    if let Some(sizes) = json.get("pageSizes").and_then(Value::as_array) {
        return u32::try_from(sizes.len()).unwrap_or(u32::MAX).min(MAX_ANSWER_PAGES);
    }
    json.get("elements")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|e| e.get("pageIndex").and_then(Value::as_u64))
        .filter_map(|i| u32::try_from(i).ok()?.checked_add(1))
        .max()
        .unwrap_or(0)
        .clamp(1, MAX_ANSWER_PAGES)
}

/// Indexes listed in a span array; the first is the start slot.
fn span(cell: &Value, field: &str) -> Vec<usize> {
    cell.get(field)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_u64)
                .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
                .collect()
        })
        .unwrap_or_default()
}

fn table(element: &Value, bbox: BoundingBox) -> Option<TableNode> {
    let cells = element
        .get("content")
        .and_then(|c| c.get("table"))
        .and_then(|t| t.get("cells"))
        .and_then(Value::as_array)
        .filter(|cells| !cells.is_empty());
    let Some(cells) = cells else {
        log::debug!("Skipping Hancom table without cells");
        return None;
    };
    let mut rows = 0usize;
    let mut cols = 0usize;
    let claims: Vec<CellClaim> = cells
        .iter()
        .map(|cell| {
            let row_span = span(cell, "rowspan");
            let col_span = span(cell, "colspan");
            rows = rows.max(row_span.iter().max().map_or(0, |r| r.saturating_add(1)));
            cols = cols.max(col_span.iter().max().map_or(0, |c| c.saturating_add(1)));
            CellClaim {
                row: row_span.first().copied().unwrap_or(0),
                col: col_span.first().copied().unwrap_or(0),
                rowspan: row_span.len().max(1),
                colspan: col_span.len().max(1),
                text: str_field(cell, "text").unwrap_or_default().to_string(),
            }
        })
        .collect();
    grid_table(bbox, rows, cols, claims)
}

impl SchemaTransformer for HancomTransformer {
    fn backend_name(&self) -> &str {
        "hancom"
    }

    fn transform(&self, response: &HybridResponse, page_heights: &PageHeights) -> Result<Vec<Page>> {
        let json = response
            .json
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("Hancom response has no JSON document".to_string()))?;
        let count = page_count(json, page_heights);
        let mut pages = empty_pages(count, page_heights, |_| None);
        let mut picture_index = 0u32;

        for element in json.get("elements").and_then(Value::as_array).into_iter().flatten() {
            let Some(kind) = element.get("category").and_then(|c| str_field(c, "type")) else {
                log::debug!("Skipping Hancom element without category type");
                continue;
            };
            if matches!(kind, "PAGE_HEADER" | "PAGE_FOOTER") {
                continue;
            }
            let page_number = element
                .get("pageIndex")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .saturating_add(1);
            let index = page_index(page_number, page_heights)?;
            let Some(raw) = element.get("bbox") else {
                log::debug!("Skipping Hancom element without bbox");
                continue;
            };
            let height = page_heights.get(&(index + 1)).copied().unwrap_or(DEFAULT_PAGE_HEIGHT);
            let bbox = bounding_box(raw, index, height);
            let text = element
                .get("content")
                .and_then(|c| str_field(c, "text"))
                .unwrap_or_default();

            let node = match kind {
                "PARAGRAPH" | "LIST_ITEM" => Some(SemanticNode::Paragraph(text_node(bbox, text))),
                "HEADING" => Some(SemanticNode::Heading(Heading {
                    text: text_node(bbox, text),
                    level: Some(1),
                })),
                "TABLE" => table(element, bbox).map(SemanticNode::Table),
                "FIGURE" => {
                    picture_index += 1;
                    Some(SemanticNode::Picture(Picture {
                        id: None,
                        bbox,
                        index: picture_index,
                        description: None,
                    }))
                }
                "FORMULA" => Some(SemanticNode::Formula(Formula {
                    id: None,
                    bbox,
                    latex: text.to_string(),
                })),
                _ if !text.is_empty() => Some(SemanticNode::Paragraph(text_node(bbox, text))),
                _ => None,
            };
            if let Some(node) = node {
                page_mut(&mut pages, index).slots.push(Slot::Node(node));
            }
        }
        Ok(finish(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn element(kind: &str, page: u32, top: f64, text: &str) -> Value {
        json!({
            "category": {"type": kind},
            "pageIndex": page,
            "bbox": {"left": 50.0, "top": top, "width": 200.0, "height": 20.0},
            "content": {"text": text}
        })
    }

    // ==== Hancom Transform Tests ====

    #[test]
    fn test_box_conversion() {
        let raw = json!({"left": 100.0, "top": 92.0, "width": 100.0, "height": 50.0});
        assert_eq!(bounding_box(&raw, 0, 842.0), BoundingBox::new(0, 100.0, 700.0, 200.0, 750.0));
    }

    #[test]
    fn test_element_types() {
        let doc = json!({"elements": [
            element("PARAGRAPH", 0, 300.0, "Body"),
            element("HEADING", 0, 100.0, "Title"),
            element("PAGE_HEADER", 0, 10.0, "Running head"),
            element("LIST_ITEM", 0, 400.0, "- item"),
            element("FORMULA", 0, 500.0, "x^2"),
            element("FIGURE", 1, 100.0, ""),
            element("CHART", 1, 300.0, "Unknown with text"),
            element("SEPARATOR", 1, 400.0, ""),
        ]});
        let pages = HancomTransformer
            .transform(&HybridResponse::from_json(doc), &PageHeights::new())
            .unwrap();
        assert_eq!(pages.len(), 2);
        let kinds = |page: &Page| page.nodes().map(SemanticNode::kind_name).collect::<Vec<_>>();
        assert_eq!(kinds(&pages[0]), vec!["heading", "paragraph", "paragraph", "formula"]);
        assert_eq!(kinds(&pages[1]), vec!["picture", "paragraph"]);
        let Some(SemanticNode::Heading(heading)) = pages[0].nodes().next() else {
            panic!("heading expected");
        };
        assert_eq!(heading.level, Some(1));
    }

    #[test]
    fn test_table_spans() {
        let doc = json!({"elements": [{
            "category": {"type": "TABLE"},
            "pageIndex": 0,
            "bbox": {"left": 0.0, "top": 0.0, "width": 300.0, "height": 100.0},
            "content": {"table": {"cells": [
                {"rowspan": [0], "colspan": [0, 1, 2], "text": "Wide"},
                {"rowspan": [1], "colspan": [0], "text": "a"},
                {"rowspan": [1], "colspan": [2], "text": "c"}
            ]}}
        }]});
        let pages = HancomTransformer
            .transform(&HybridResponse::from_json(doc), &[(1, 842.0)].into_iter().collect())
            .unwrap();
        let Some(SemanticNode::Table(table)) = pages[0].nodes().next() else {
            panic!("table expected");
        };
        assert_eq!((table.rows, table.cols), (2, 3));
        assert_eq!(table.cells.len(), 4);
        assert_eq!(table.cell_at(0, 2).unwrap().colspan, 3);
        assert!(table.cell_at(1, 1).unwrap().contents.is_empty());
        assert!(table.check_coverage().is_ok());
    }

    #[test]
    fn test_malformed_indexes() {
        let doc = json!({"elements": [{
            "category": {"type": "TABLE"},
            "pageIndex": 0,
            "bbox": {"left": 0.0, "top": 0.0, "width": 300.0, "height": 100.0},
            "content": {"table": {"cells": [{"rowspan": [u64::MAX], "colspan": [0], "text": "far"}]}}
        }]});
        let pages = HancomTransformer
            .transform(&HybridResponse::from_json(doc), &PageHeights::new())
            .unwrap();
        assert!(pages[0].slots.is_empty());

        let doc = json!({"elements": [element("PARAGRAPH", u32::MAX, 100.0, "Stray")]});
        let err = HancomTransformer
            .transform(&HybridResponse::from_json(doc), &[(1, 842.0)].into_iter().collect())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_page_count_sources() {
        assert_eq!(page_count(&json!({"pageSizes": [{}, {}]}), &PageHeights::new()), 2);
        assert_eq!(page_count(&json!({"elements": [{"pageIndex": 3}]}), &PageHeights::new()), 4);
        assert_eq!(page_count(&json!({}), &PageHeights::new()), 1);
    }
}
