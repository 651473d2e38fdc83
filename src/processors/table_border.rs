//! Table assembly from candidate grids.
//!
//! Each primitive inside a border is attributed to the cell containing it.
//! Runs that straddle cells are cut at the cell edges. Once every primitive
//! is placed, each cell is processed as an independent content sequence,
//! which lets nested borders still in the registry apply inside cells.

use crate::context::{IdSource, PageScope};
use crate::model::{BoundingBox, ContentPrimitive, SemanticNode, Slot, TableBorder, TableNode, COORD_EPSILON};

use super::process_contents;

/// A border whose grid passed validation.
struct Candidate {
    border: TableBorder,
    table: TableNode,
    /// Output slot reserved for the table, once something was assigned
    anchor: Option<usize>,
}

fn validate(border: &TableBorder) -> Result<TableNode, String> {
    if border.rows.windows(2).any(|w| w[1] >= w[0]) {
        return Err("row boundaries are not strictly decreasing".to_string());
    }
    if border.cols.windows(2).any(|w| w[1] <= w[0]) {
        return Err("column boundaries are not strictly increasing".to_string());
    }
    let table = border.to_table()?;
    table.check_coverage()?;
    Ok(table)
}

/// Whether `inner` lies inside a larger border of `borders`.
fn is_nested(inner: &TableBorder, borders: &[TableBorder]) -> bool {
    borders.iter().any(|outer| {
        !std::ptr::eq(outer, inner)
            && outer.bbox.area() > inner.bbox.area()
            && outer.bbox.contains(&inner.bbox, COORD_EPSILON, COORD_EPSILON)
    })
}

/// Where a primitive inside a border ends up.
enum Placement {
    /// Consumed by the border (rules, frame, cell decoration)
    Consumed,
    /// Added to the listed cells
    Cells(Vec<(usize, ContentPrimitive)>),
    /// Left in the page flow
    Flow(ContentPrimitive),
}

fn place(candidate: &Candidate, primitive: ContentPrimitive, cell_percent: f64) -> Placement {
    let border = &candidate.border;
    let bbox = *primitive.bbox();
    match &primitive {
        ContentPrimitive::LineSegment(_) if !border.is_one_cell() => return Placement::Consumed,
        ContentPrimitive::LineArt(art) if art.bbox.same_ignoring_page(&border.bbox, COORD_EPSILON) => {
            return Placement::Consumed
        }
        _ => {}
    }

    let hits: Vec<usize> = candidate
        .table
        .cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| {
            cell.bbox.intersection_area(&bbox) > 0.0 || cell.bbox.contains(&bbox, COORD_EPSILON, COORD_EPSILON)
        })
        .map(|(i, _)| i)
        .collect();
    let hits = row_band(&candidate.table, hits, &bbox);

    match primitive {
        ContentPrimitive::TextRun(run) if hits.len() > 1 => {
            let parts = hits
                .iter()
                .filter_map(|&i| {
                    let cell = &candidate.table.cells[i].bbox;
                    run.slice_between(cell.left, cell.right)
                        .map(|part| (i, ContentPrimitive::TextRun(part)))
                })
                .collect();
            Placement::Cells(parts)
        }
        ContentPrimitive::LineArt(art) => match hits.first() {
            Some(&i) if candidate.table.cells[i].bbox.intersection_percent(&art.bbox) <= cell_percent => {
                Placement::Cells(vec![(i, ContentPrimitive::LineArt(art))])
            }
            _ => Placement::Consumed,
        },
        other => match hits.first() {
            Some(&i) => Placement::Cells(vec![(i, other)]),
            None => Placement::Flow(other),
        },
    }
}

/// Narrow `hits` to the cells sharing the largest vertical overlap with
/// `bbox`, so a primitive crossing a row line lands in a single row.
fn row_band(table: &TableNode, hits: Vec<usize>, bbox: &BoundingBox) -> Vec<usize> {
    if hits.len() < 2 {
        return hits;
    }
    let overlap = |i: usize| {
        let cell = &table.cells[i].bbox;
        cell.top.min(bbox.top) - cell.bottom.max(bbox.bottom)
    };
    let best = hits.iter().map(|&i| overlap(i)).fold(f64::NEG_INFINITY, f64::max);
    hits.into_iter().filter(|&i| overlap(i) >= best - COORD_EPSILON).collect()
}

/// Assemble the borders registered on `scope` into table nodes.
///
/// Every primitive goes to the largest border containing it. Borders that
/// fail grid validation are dropped with a warning and their content stays
/// in the flow. Borders nothing was assigned to go back to the registry.
pub fn process_table_borders(scope: &mut PageScope, slots: Vec<Slot>) -> Vec<Slot> {
    if scope.borders().is_empty() {
        return slots;
    }
    let borders = scope.take_borders_where(|_| true);
    let (nested, top): (Vec<&TableBorder>, Vec<&TableBorder>) =
        borders.iter().partition(|b| is_nested(b, &borders));
    let nested: Vec<TableBorder> = nested.into_iter().cloned().collect();

    let mut candidates = Vec::new();
    for border in top {
        match validate(border) {
            Ok(table) => candidates.push(Candidate {
                border: border.clone(),
                table,
                anchor: None,
            }),
            Err(reason) => log::warn!("Page {}: discarding table border: {}", scope.page + 1, reason),
        }
    }
    for border in nested {
        scope.add_border(border);
    }
    if candidates.is_empty() {
        return slots;
    }

    let cell_percent = scope.thresholds().line_art_cell_percent;
    let mut out = Vec::with_capacity(slots.len());
    for slot in slots {
        let Slot::Primitive(primitive) = slot else {
            out.push(slot);
            continue;
        };
        let owner = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.border.bbox.contains(primitive.bbox(), COORD_EPSILON, COORD_EPSILON))
            .max_by(|(_, a), (_, b)| a.border.bbox.area().total_cmp(&b.border.bbox.area()))
            .map(|(i, _)| i);
        let Some(owner) = owner else {
            out.push(Slot::Primitive(primitive));
            continue;
        };

        let candidate = &mut candidates[owner];
        if candidate.anchor.is_none() {
            candidate.anchor = Some(out.len());
            out.push(Slot::Removed);
        }
        match place(candidate, primitive, cell_percent) {
            Placement::Consumed => {}
            Placement::Cells(parts) => {
                for (cell, part) in parts {
                    candidate.table.cells[cell].contents.push(Slot::Primitive(part));
                }
            }
            Placement::Flow(primitive) => out.push(Slot::Primitive(primitive)),
        }
    }

    let mut assembled = 0usize;
    for candidate in candidates {
        let Some(anchor) = candidate.anchor else {
            scope.add_border(candidate.border);
            continue;
        };
        let mut table = candidate.table;
        for cell in &mut table.cells {
            let contents = std::mem::take(&mut cell.contents);
            cell.contents = process_contents(scope, contents);
        }
        out[anchor] = Slot::Node(SemanticNode::Table(table));
        assembled += 1;
    }
    log::debug!("Page {}: assembled {} tables", scope.page + 1, assembled);
    out
}

/// Whether `next` continues `prev`: same column count, and close table
/// and first-row cell widths.
fn continues(prev: &TableNode, next: &TableNode, tolerance: f64) -> bool {
    let close = |a: f64, b: f64| (a - b).abs() <= tolerance * a.abs().max(b.abs());
    if prev.cols != next.cols || !close(prev.width(), next.width()) {
        return false;
    }
    (0..prev.cols).all(|col| match (prev.cell_at(0, col), next.cell_at(0, col)) {
        (Some(a), Some(b)) => close(a.width(), b.width()),
        _ => false,
    })
}

fn table_at(contents: &mut [Vec<Slot>], (seq, index): (usize, usize)) -> Option<&mut TableNode> {
    match contents.get_mut(seq)?.get_mut(index)? {
        Slot::Node(SemanticNode::Table(table)) => Some(table),
        _ => None,
    }
}

/// Link adjacent tables that continue each other through their IDs.
///
/// Text-block tables are not candidates. Header/footer nodes and line
/// primitives are transparent to the scan; anything else separates tables.
pub fn check_neighbor_tables(ids: &dyn IdSource, contents: &mut [Vec<Slot>], tolerance: f64) -> usize {
    let mut previous: Option<(usize, usize)> = None;
    let mut linked = 0usize;
    for seq in 0..contents.len() {
        for index in 0..contents[seq].len() {
            let slot = &contents[seq][index];
            let is_candidate = matches!(slot, Slot::Node(SemanticNode::Table(t)) if !t.text_block);
            if !is_candidate {
                if !(slot.is_removed() || slot.is_furniture() || slot.is_line_decoration()) {
                    previous = None;
                }
                continue;
            }
            if let Some(prev) = previous {
                let matches = match (&contents[prev.0][prev.1], &contents[seq][index]) {
                    (Slot::Node(SemanticNode::Table(a)), Slot::Node(SemanticNode::Table(b))) => {
                        continues(a, b, tolerance)
                    }
                    _ => false,
                };
                if matches {
                    let next_id = table_at(contents, (seq, index)).map(|t| *t.id.get_or_insert_with(|| ids.next_id()));
                    if let Some(prev_table) = table_at(contents, prev) {
                        let prev_id = *prev_table.id.get_or_insert_with(|| ids.next_id());
                        prev_table.next_id = next_id;
                        if let Some(next_table) = table_at(contents, (seq, index)) {
                            next_table.prev_id = Some(prev_id);
                        }
                        linked += 1;
                    }
                }
            }
            previous = Some((seq, index));
        }
    }
    if linked > 0 {
        log::debug!("Linked {} neighbour tables", linked);
    }
    linked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcessingContext;
    use crate::model::{LineArt, LineSegment, TextNode, TextRun};

    fn run(text: &str, left: f64, right: f64, bottom: f64) -> Slot {
        Slot::Primitive(ContentPrimitive::TextRun(TextRun::new(
            0,
            BoundingBox::new(0, left, bottom, right, bottom + 10.0),
            text,
            10.0,
        )))
    }

    fn grid() -> TableBorder {
        TableBorder::new(
            BoundingBox::new(0, 0.0, 0.0, 200.0, 100.0),
            vec![100.0, 50.0, 0.0],
            vec![0.0, 100.0, 200.0],
        )
    }

    fn tables(slots: &[Slot]) -> Vec<&TableNode> {
        slots
            .iter()
            .filter_map(|s| match s {
                Slot::Node(SemanticNode::Table(t)) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn cell_text(table: &TableNode, row: usize, col: usize) -> Vec<String> {
        table
            .cell_at(row, col)
            .map(|c| {
                c.contents
                    .iter()
                    .filter_map(Slot::as_node)
                    .filter_map(SemanticNode::text_node)
                    .map(TextNode::text)
                    .collect()
            })
            .unwrap_or_default()
    }

    // ==== Assembly Tests ====

    #[test]
    fn test_runs_assigned_to_cells() {
        let mut ctx = ProcessingContext::default();
        ctx.add_borders(vec![grid()]);
        let mut scope = ctx.scope(0);
        let slots = vec![
            run("Name", 10.0, 50.0, 70.0),
            run("Age", 110.0, 140.0, 70.0),
            run("Alice", 10.0, 60.0, 20.0),
            run("30", 110.0, 130.0, 20.0),
            run("outside", 10.0, 80.0, 300.0),
        ];
        let out = process_table_borders(&mut scope, slots);
        assert_eq!(out.len(), 2);
        let table = tables(&out)[0];
        assert!(table.check_coverage().is_ok());
        assert_eq!(cell_text(table, 0, 0), vec!["Name"]);
        assert_eq!(cell_text(table, 0, 1), vec!["Age"]);
        assert_eq!(cell_text(table, 1, 0), vec!["Alice"]);
        assert_eq!(cell_text(table, 1, 1), vec!["30"]);
        assert!(scope.borders().is_empty());
    }

    #[test]
    fn test_straddling_run_is_split() {
        let mut ctx = ProcessingContext::default();
        ctx.add_borders(vec![grid()]);
        let mut scope = ctx.scope(0);
        // 20 glyphs over 0..200: the first 10 fall in column 0
        let slots = vec![run("Name      Age       ", 0.0, 200.0, 70.0)];
        let out = process_table_borders(&mut scope, slots);
        let table = tables(&out)[0];
        assert_eq!(cell_text(table, 0, 0), vec!["Name"]);
        assert_eq!(cell_text(table, 0, 1), vec!["Age"]);
    }

    #[test]
    fn test_run_crossing_row_line_placed_once() {
        let mut ctx = ProcessingContext::default();
        ctx.add_borders(vec![grid()]);
        let mut scope = ctx.scope(0);
        // 48..58 dips two units below the row line at 50
        let out = process_table_borders(&mut scope, vec![run("Alpha", 10.0, 60.0, 48.0)]);
        let table = tables(&out)[0];
        assert_eq!(cell_text(table, 0, 0), vec!["Alpha"]);
        assert!(cell_text(table, 1, 0).is_empty());
        let texts: usize = table.cells.iter().map(|c| c.contents.len()).sum();
        assert_eq!(texts, 1);
    }

    #[test]
    fn test_rules_and_decoration_consumed() {
        let mut ctx = ProcessingContext::default();
        ctx.add_borders(vec![grid()]);
        let mut scope = ctx.scope(0);
        let rule = Slot::Primitive(ContentPrimitive::LineSegment(LineSegment {
            index: 0,
            bbox: BoundingBox::new(0, 0.0, 50.0, 200.0, 50.0),
            hidden: false,
        }));
        let shading = Slot::Primitive(ContentPrimitive::LineArt(LineArt {
            index: 1,
            bbox: BoundingBox::new(0, 0.0, 50.0, 100.0, 100.0),
            hidden: false,
        }));
        let out = process_table_borders(&mut scope, vec![rule, shading, run("x", 10.0, 20.0, 70.0)]);
        assert_eq!(out.len(), 1);
        let table = tables(&out)[0];
        let primitives = table
            .cells
            .iter()
            .flat_map(|c| c.contents.iter())
            .filter(|s| matches!(s, Slot::Primitive(_)))
            .count();
        assert_eq!(primitives, 0);
    }

    #[test]
    fn test_invalid_border_keeps_content_in_flow() {
        let mut ctx = ProcessingContext::default();
        let broken = grid().with_span(0, 0, 2, 1).with_span(1, 0, 1, 2);
        ctx.add_borders(vec![broken]);
        let mut scope = ctx.scope(0);
        let out = process_table_borders(&mut scope, vec![run("Name", 10.0, 50.0, 70.0)]);
        assert!(tables(&out).is_empty());
        assert!(matches!(out[0], Slot::Primitive(ContentPrimitive::TextRun(_))));
    }

    #[test]
    fn test_unused_border_returned() {
        let mut ctx = ProcessingContext::default();
        ctx.add_borders(vec![grid()]);
        let mut scope = ctx.scope(0);
        let out = process_table_borders(&mut scope, vec![run("far", 300.0, 330.0, 500.0)]);
        assert!(tables(&out).is_empty());
        assert_eq!(scope.borders().len(), 1);
    }

    #[test]
    fn test_nested_border_applies_inside_cell() {
        let mut ctx = ProcessingContext::default();
        let inner = TableBorder::new(
            BoundingBox::new(0, 5.0, 55.0, 95.0, 95.0),
            vec![95.0, 75.0, 55.0],
            vec![5.0, 95.0],
        );
        ctx.add_borders(vec![grid(), inner]);
        let mut scope = ctx.scope(0);
        let slots = vec![run("top", 10.0, 40.0, 80.0), run("bottom", 10.0, 60.0, 60.0)];
        let out = process_table_borders(&mut scope, slots);
        let outer = tables(&out)[0];
        let inner_tables = tables(&outer.cell_at(0, 0).map(|c| c.contents.as_slice()).unwrap_or(&[]))
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(inner_tables.len(), 1);
        assert_eq!(inner_tables[0].rows, 2);
        assert_eq!(cell_text(&inner_tables[0], 0, 0), vec!["top"]);
        assert_eq!(cell_text(&inner_tables[0], 1, 0), vec!["bottom"]);
    }

    // ==== Neighbour Table Tests ====

    fn table_slot(page: u32, width: f64) -> Slot {
        let border = TableBorder::new(
            BoundingBox::new(page, 0.0, 0.0, width, 100.0),
            vec![100.0, 0.0],
            vec![0.0, width / 2.0, width],
        );
        Slot::Node(SemanticNode::Table(border.to_table().unwrap()))
    }

    #[test]
    fn test_neighbor_tables_linked_across_pages() {
        let ctx = ProcessingContext::default();
        let mut contents = vec![vec![table_slot(0, 200.0)], vec![table_slot(1, 210.0)]];
        assert_eq!(check_neighbor_tables(&ctx, &mut contents, 0.2), 1);
        let first = table_at(&mut contents, (0, 0)).map(|t| (t.id, t.next_id)).unwrap();
        let second = table_at(&mut contents, (1, 0)).map(|t| (t.id, t.prev_id)).unwrap();
        assert_eq!(first.1, second.0);
        assert_eq!(second.1, first.0);
    }

    #[test]
    fn test_paragraph_separates_tables() {
        let ctx = ProcessingContext::default();
        let paragraph = Slot::Node(SemanticNode::Paragraph(TextNode::from_text(
            BoundingBox::new(0, 0.0, 120.0, 100.0, 130.0),
            "between",
            10.0,
        )));
        let mut contents = vec![vec![table_slot(0, 200.0), paragraph, table_slot(0, 200.0)]];
        assert_eq!(check_neighbor_tables(&ctx, &mut contents, 0.2), 0);
    }

    #[test]
    fn test_different_widths_not_linked() {
        let ctx = ProcessingContext::default();
        let mut contents = vec![vec![table_slot(0, 200.0)], vec![table_slot(1, 400.0)]];
        assert_eq!(check_neighbor_tables(&ctx, &mut contents, 0.2), 0);
    }
}
