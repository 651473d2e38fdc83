//! docling document schema.

use serde_json::Value;

use super::{
    empty_pages, f64_field, finish, grid_table, page_index, page_mut, str_field, text_node, CellClaim, PageHeights,
    SchemaTransformer, DEFAULT_PAGE_HEIGHT, MAX_ANSWER_PAGES,
};
use crate::error::{Error, Result};
use crate::hybrid::client::HybridResponse;
use crate::model::{BoundingBox, Formula, Heading, Page, Picture, SemanticNode, Slot};

/// Transformer for docling `json_content` trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoclingTransformer;

/// First provenance entry: one-based page number and raw box.
fn provenance(item: &Value) -> Option<(u64, Option<&Value>)> {
    let prov = item.get("prov")?.as_array()?.first()?;
    let page = prov.get("page_no").and_then(Value::as_u64).unwrap_or(1).max(1);
    Some((page, prov.get("bbox")))
}

/// Convert a docling box to bottom-left coordinates on page `index`.
fn bounding_box(raw: Option<&Value>, index: u32, height: Option<f64>) -> BoundingBox {
    let Some(raw) = raw else {
        return BoundingBox::new(index, 0.0, 0.0, 0.0, 0.0);
    };
    let (l, t, r, b) = (f64_field(raw, "l"), f64_field(raw, "t"), f64_field(raw, "r"), f64_field(raw, "b"));
    match (str_field(raw, "coord_origin"), height) {
        (Some("TOPLEFT"), Some(h)) => BoundingBox::from_top_left(index, l, t, r, b, h),
        _ => BoundingBox::new(index, l, b, r, t),
    }
}

/// `(width, height)` of the one-based page `number` from `pages`.
fn page_size(json: &Value, number: u32) -> Option<(f64, f64)> {
    let size = json.get("pages")?.get(number.to_string())?.get("size")?;
    let height = size.get("height")?.as_f64()?;
    let width = size.get("width").and_then(Value::as_f64).unwrap_or(super::DEFAULT_PAGE_WIDTH);
    Some((width, height))
}

fn page_count(json: &Value, heights: &PageHeights) -> u32 {
    if let Some(max) = heights.keys().max() {
        return *max;
    }
    match json.get("pages") {
        Some(Value::Array(pages)) => return answer_pages(pages.len()),
        Some(Value::Object(pages)) => return answer_pages(pages.len()),
        _ => {}
    }
    if let Some(dimensions) = json.get("page_dimensions").and_then(Value::as_object) {
        return dimensions
            .keys()
            .filter_map(|k| k.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            .min(MAX_ANSWER_PAGES);
    }
    ["texts", "tables", "pictures"]
        .iter()
        .filter_map(|key| json.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|item| provenance(item).and_then(|(page, _)| u32::try_from(page).ok()))
        .max()
        .unwrap_or(0)
        .min(MAX_ANSWER_PAGES)
}

fn answer_pages(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX).min(MAX_ANSWER_PAGES)
}

/// A count or offset of the answer; values past `usize` leave any grid.
fn grid_field(value: &Value, field: &str, default: u64) -> usize {
    let raw = value.get(field).and_then(Value::as_u64).unwrap_or(default);
    usize::try_from(raw).unwrap_or(usize::MAX)
}

impl DoclingTransformer {
    fn height(json: &Value, heights: &PageHeights, number: u32) -> f64 {
        heights
            .get(&number)
            .copied()
            .or_else(|| page_size(json, number).map(|(_, h)| h))
            .unwrap_or(DEFAULT_PAGE_HEIGHT)
    }

    fn text(item: &Value, json: &Value, heights: &PageHeights, pages: &mut Vec<Page>) -> Result<()> {
        let label = str_field(item, "label").unwrap_or("text");
        if matches!(label, "page_header" | "page_footer") {
            return Ok(());
        }
        let Some((number, raw)) = provenance(item) else {
            log::debug!("Skipping docling text without provenance");
            return Ok(());
        };
        let index = page_index(number, heights)?;
        let bbox = bounding_box(raw, index, Some(Self::height(json, heights, index + 1)));
        let text = str_field(item, "text")
            .filter(|t| !t.is_empty())
            .or_else(|| str_field(item, "orig"))
            .unwrap_or_default();
        let node = match label {
            "section_header" | "title" => {
                let level = item
                    .get("meta")
                    .and_then(|m| m.get("level"))
                    .and_then(Value::as_u64)
                    .and_then(|level| u32::try_from(level).ok())
                    .unwrap_or(1);
                SemanticNode::Heading(Heading {
                    text: text_node(bbox, text),
                    level: Some(level),
                })
            }
            "formula" => SemanticNode::Formula(Formula {
                id: None,
                bbox,
                latex: text.to_string(),
            }),
            _ => SemanticNode::Paragraph(text_node(bbox, text)),
        };
        page_mut(pages, index).slots.push(Slot::Node(node));
        Ok(())
    }

    fn table(item: &Value, json: &Value, heights: &PageHeights, pages: &mut Vec<Page>) -> Result<()> {
        let Some((number, raw)) = provenance(item) else {
            log::debug!("Skipping docling table without provenance");
            return Ok(());
        };
        let Some(data) = item.get("data") else {
            log::debug!("Skipping docling table without data");
            return Ok(());
        };
        let (rows, cols) = match data.get("grid").and_then(Value::as_array) {
            Some(grid) => (
                grid.len(),
                grid.first().and_then(Value::as_array).map(Vec::len).unwrap_or(0),
            ),
            None => (grid_field(data, "num_rows", 0), grid_field(data, "num_cols", 0)),
        };
        let index = page_index(number, heights)?;
        let bbox = bounding_box(raw, index, Some(Self::height(json, heights, index + 1)));
        let claims: Vec<CellClaim> = data
            .get("table_cells")
            .and_then(Value::as_array)
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| CellClaim {
                        row: grid_field(cell, "start_row_offset_idx", 0),
                        col: grid_field(cell, "start_col_offset_idx", 0),
                        rowspan: grid_field(cell, "row_span", 1),
                        colspan: grid_field(cell, "col_span", 1),
                        text: str_field(cell, "text").unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if let Some(table) = grid_table(bbox, rows, cols, claims) {
            page_mut(pages, index).slots.push(Slot::Node(SemanticNode::Table(table)));
        }
        Ok(())
    }

    fn picture(
        item: &Value,
        json: &Value,
        heights: &PageHeights,
        pages: &mut Vec<Page>,
        picture_index: &mut u32,
    ) -> Result<()> {
        let Some((number, raw)) = provenance(item) else {
            log::debug!("Skipping docling picture without provenance");
            return Ok(());
        };
        let index = page_index(number, heights)?;
        let bbox = bounding_box(raw, index, Some(Self::height(json, heights, index + 1)));
        let description = item
            .get("annotations")
            .and_then(Value::as_array)
            .and_then(|annotations| {
                annotations
                    .iter()
                    .find(|a| str_field(a, "kind") == Some("description"))
                    .and_then(|a| str_field(a, "text"))
            })
            .map(str::to_string);
        *picture_index += 1;
        let picture = Picture {
            id: None,
            bbox,
            index: *picture_index,
            description,
        };
        page_mut(pages, index).slots.push(Slot::Node(SemanticNode::Picture(picture)));
        Ok(())
    }
}

impl SchemaTransformer for DoclingTransformer {
    fn backend_name(&self) -> &str {
        "docling"
    }

    fn transform(&self, response: &HybridResponse, page_heights: &PageHeights) -> Result<Vec<Page>> {
        let json = response
            .json
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("docling response has no JSON document".to_string()))?;
        let count = page_count(json, page_heights);
        let mut pages = empty_pages(count, page_heights, |n| page_size(json, n));

        let items = |key: &str| json.get(key).and_then(Value::as_array).into_iter().flatten();
        for item in items("texts") {
            Self::text(item, json, page_heights, &mut pages)?;
        }
        for item in items("tables") {
            Self::table(item, json, page_heights, &mut pages)?;
        }
        let mut picture_index = 0u32;
        for item in items("pictures") {
            Self::picture(item, json, page_heights, &mut pages, &mut picture_index)?;
        }
        Ok(finish(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heights(pairs: &[(u32, f64)]) -> PageHeights {
        pairs.iter().copied().collect()
    }

    fn kinds(page: &Page) -> Vec<&'static str> {
        page.nodes().map(SemanticNode::kind_name).collect()
    }

    // ==== Docling Transform Tests ====

    #[test]
    fn test_topleft_box_converted() {
        let raw = json!({"l": 100.0, "t": 92.0, "r": 200.0, "b": 142.0, "coord_origin": "TOPLEFT"});
        let bbox = bounding_box(Some(&raw), 0, Some(842.0));
        assert_eq!(bbox, BoundingBox::new(0, 100.0, 700.0, 200.0, 750.0));

        let raw = json!({"l": 100.0, "t": 750.0, "r": 200.0, "b": 700.0, "coord_origin": "BOTTOMLEFT"});
        assert_eq!(bounding_box(Some(&raw), 0, Some(842.0)), BoundingBox::new(0, 100.0, 700.0, 200.0, 750.0));
    }

    #[test]
    fn test_labels_mapped() {
        let doc = json!({
            "texts": [
                {"label": "text", "text": "Body", "prov": [{"page_no": 1, "bbox": {"l": 50, "t": 600, "r": 300, "b": 590}}]},
                {"label": "section_header", "text": "Intro", "meta": {"level": 2},
                 "prov": [{"page_no": 1, "bbox": {"l": 50, "t": 700, "r": 300, "b": 690}}]},
                {"label": "page_header", "text": "Running head", "prov": [{"page_no": 1, "bbox": {"l": 50, "t": 800, "r": 300, "b": 790}}]},
                {"label": "formula", "text": "E = mc^2", "prov": [{"page_no": 1, "bbox": {"l": 50, "t": 500, "r": 300, "b": 490}}]},
                {"label": "caption", "orig": "Figure 1", "prov": [{"page_no": 1, "bbox": {"l": 50, "t": 400, "r": 300, "b": 390}}]},
                {"label": "text", "text": "No provenance"}
            ]
        });
        let pages = DoclingTransformer
            .transform(&HybridResponse::from_json(doc), &heights(&[(1, 842.0)]))
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(kinds(&pages[0]), vec!["heading", "paragraph", "formula", "paragraph"]);
        let Some(SemanticNode::Heading(heading)) = pages[0].nodes().next() else {
            panic!("heading expected");
        };
        assert_eq!(heading.level, Some(2));
        assert_eq!(heading.text.font_size(), 12.0);
        let texts: Vec<String> = pages[0].nodes().filter_map(|n| n.text_node()).map(|t| t.text()).collect();
        assert_eq!(texts, vec!["Intro", "Body", "Figure 1"]);
    }

    #[test]
    fn test_table_cells() {
        let doc = json!({
            "tables": [{
                "prov": [{"page_no": 2, "bbox": {"l": 0, "t": 100, "r": 200, "b": 0}}],
                "data": {
                    "grid": [[{}, {}], [{}, {}]],
                    "table_cells": [
                        {"start_row_offset_idx": 0, "start_col_offset_idx": 0, "col_span": 2, "text": "Header"},
                        {"start_row_offset_idx": 1, "start_col_offset_idx": 1, "text": "x"}
                    ]
                }
            }]
        });
        let pages = DoclingTransformer.transform(&HybridResponse::from_json(doc), &PageHeights::new()).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].slots.is_empty());
        let Some(SemanticNode::Table(table)) = pages[1].nodes().next() else {
            panic!("table expected");
        };
        assert_eq!((table.rows, table.cols), (2, 2));
        assert_eq!(table.cells.len(), 3);
        assert!(table.check_coverage().is_ok());
        assert_eq!(table.bbox.page, 1);
    }

    #[test]
    fn test_pictures_numbered_per_transform() {
        let picture = |page: u32| {
            json!({"prov": [{"page_no": page, "bbox": {"l": 0, "t": 100, "r": 100, "b": 0}}],
                   "annotations": [{"kind": "classification", "text": "chart"}, {"kind": "description", "text": "A chart"}]})
        };
        let doc = json!({"pictures": [picture(1), picture(1)]});
        let transformer = DoclingTransformer;
        for _ in 0..2 {
            let pages = transformer.transform(&HybridResponse::from_json(doc.clone()), &PageHeights::new()).unwrap();
            let indexes: Vec<u32> = pages[0]
                .nodes()
                .filter_map(|n| match n {
                    SemanticNode::Picture(p) => Some(p.index),
                    _ => None,
                })
                .collect();
            assert_eq!(indexes, vec![1, 2]);
        }
    }

    #[test]
    fn test_page_count_sources() {
        assert_eq!(page_count(&json!({"pages": {"1": {}, "2": {}, "3": {}}}), &PageHeights::new()), 3);
        assert_eq!(page_count(&json!({"page_dimensions": {"4": {}}}), &PageHeights::new()), 4);
        assert_eq!(page_count(&json!({}), &heights(&[(2, 842.0), (5, 842.0)])), 5);
    }

    #[test]
    fn test_page_height_from_pages() {
        let doc = json!({
            "pages": {"1": {"size": {"width": 612.0, "height": 792.0}}},
            "texts": [{"label": "text", "text": "t",
                       "prov": [{"page_no": 1, "bbox": {"l": 0, "t": 10, "r": 50, "b": 20, "coord_origin": "TOPLEFT"}}]}]
        });
        let pages = DoclingTransformer.transform(&HybridResponse::from_json(doc), &PageHeights::new()).unwrap();
        assert_eq!((pages[0].width, pages[0].height), (612.0, 792.0));
        assert_eq!(pages[0].nodes().next().unwrap().bbox().top, 782.0);
    }

    #[test]
    fn test_malformed_table_offsets_dropped() {
        let doc = json!({
            "tables": [{
                "prov": [{"page_no": 1, "bbox": {"l": 0, "t": 100, "r": 200, "b": 0}}],
                "data": {
                    "num_rows": 2,
                    "num_cols": 2,
                    "table_cells": [
                        {"start_row_offset_idx": u64::MAX, "start_col_offset_idx": 0, "text": "far"},
                        {"start_row_offset_idx": 0, "start_col_offset_idx": 0, "row_span": u64::MAX, "text": "tall"},
                        {"start_row_offset_idx": 0, "start_col_offset_idx": 0, "text": "kept"}
                    ]
                }
            }, {
                "prov": [{"page_no": 1, "bbox": {"l": 0, "t": 300, "r": 200, "b": 200}}],
                "data": {"num_rows": u64::MAX, "num_cols": u64::MAX, "table_cells": []}
            }]
        });
        let pages = DoclingTransformer
            .transform(&HybridResponse::from_json(doc), &heights(&[(1, 842.0)]))
            .unwrap();
        let tables: Vec<_> = pages[0]
            .nodes()
            .filter_map(|n| match n {
                SemanticNode::Table(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].check_coverage().is_ok());
        assert_eq!(tables[0].cells.len(), 4);
    }

    #[test]
    fn test_page_outside_request_is_invalid() {
        let doc = json!({"texts": [{"label": "text", "text": "Stray",
                                    "prov": [{"page_no": 9, "bbox": {"l": 0, "t": 100, "r": 50, "b": 90}}]}]});
        let err = DoclingTransformer
            .transform(&HybridResponse::from_json(doc), &heights(&[(2, 842.0)]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));

        let doc = json!({"pictures": [{"prov": [{"page_no": u64::MAX, "bbox": {"l": 0, "t": 100, "r": 50, "b": 0}}]}]});
        let err = DoclingTransformer
            .transform(&HybridResponse::from_json(doc), &PageHeights::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_json_is_invalid() {
        let err = DoclingTransformer
            .transform(&HybridResponse::default(), &PageHeights::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_transform_page() {
        let doc = json!({"texts": [{"label": "text", "text": "Only",
                                    "prov": [{"page_no": 3, "bbox": {"l": 0, "t": 100, "r": 50, "b": 90}}]}]});
        let page = DoclingTransformer.transform_page(3, &doc, 842.0).unwrap();
        assert_eq!(page.number, 2);
        assert_eq!(page.nodes().count(), 1);
    }
}
