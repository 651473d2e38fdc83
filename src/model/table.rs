//! Table types.

use serde::{Deserialize, Serialize};

use super::{BoundingBox, Slot, StructureId};

/// A merged cell in a candidate grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSpan {
    pub row: usize,
    pub col: usize,
    pub rowspan: usize,
    pub colspan: usize,
}

/// A candidate table grid supplied by line detection or a cluster pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBorder {
    /// Outer box of the grid
    pub bbox: BoundingBox,
    /// Row boundaries top to bottom, outer edges included
    pub rows: Vec<f64>,
    /// Column boundaries left to right, outer edges included
    pub cols: Vec<f64>,
    /// Merged cells; any slot not covered by a span is a unit cell
    #[serde(default)]
    pub spans: Vec<CellSpan>,
}

impl TableBorder {
    /// Regular grid without merged cells.
    pub fn new(bbox: BoundingBox, rows: Vec<f64>, cols: Vec<f64>) -> Self {
        Self {
            bbox,
            rows,
            cols,
            spans: Vec::new(),
        }
    }

    /// Add a merged cell.
    pub fn with_span(mut self, row: usize, col: usize, rowspan: usize, colspan: usize) -> Self {
        self.spans.push(CellSpan {
            row,
            col,
            rowspan,
            colspan,
        });
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn col_count(&self) -> usize {
        self.cols.len().saturating_sub(1)
    }

    pub fn is_one_cell(&self) -> bool {
        self.row_count() == 1 && self.col_count() == 1
    }

    /// Box covering the grid slots `[row, row+rowspan) x [col, col+colspan)`.
    fn span_box(&self, row: usize, col: usize, rowspan: usize, colspan: usize) -> BoundingBox {
        BoundingBox::new(
            self.bbox.page,
            self.cols[col],
            self.rows[row + rowspan],
            self.cols[col + colspan],
            self.rows[row],
        )
    }

    /// Build the cell grid of this border.
    ///
    /// Fails when the grid is empty, a span leaves the grid, or two cells
    /// claim the same slot.
    pub fn to_table(&self) -> std::result::Result<TableNode, String> {
        let rows = self.row_count();
        let cols = self.col_count();
        if rows == 0 || cols == 0 {
            return Err(format!("table has {} rows and {} columns", rows, cols));
        }
        let mut owner: Vec<Option<usize>> = vec![None; rows * cols];
        let mut cells = Vec::new();
        for span in &self.spans {
            let row_end = span.row.checked_add(span.rowspan).filter(|&end| end <= rows);
            let col_end = span.col.checked_add(span.colspan).filter(|&end| end <= cols);
            let (Some(row_end), Some(col_end)) = (row_end, col_end) else {
                return Err(format!(
                    "span at ({}, {}) leaves the {}x{} grid",
                    span.row, span.col, rows, cols
                ));
            };
            if span.rowspan == 0 || span.colspan == 0 {
                return Err(format!("span at ({}, {}) is empty", span.row, span.col));
            }
            let index = cells.len();
            for r in span.row..row_end {
                for c in span.col..col_end {
                    if owner[r * cols + c].replace(index).is_some() {
                        return Err(format!("slot ({}, {}) is claimed twice", r, c));
                    }
                }
            }
            cells.push(TableCell::new(
                span.row,
                span.col,
                span.rowspan,
                span.colspan,
                self.span_box(span.row, span.col, span.rowspan, span.colspan),
            ));
        }
        for r in 0..rows {
            for c in 0..cols {
                if owner[r * cols + c].is_none() {
                    cells.push(TableCell::new(r, c, 1, 1, self.span_box(r, c, 1, 1)));
                }
            }
        }
        cells.sort_by_key(|cell| (cell.row, cell.col));
        let mut table = TableNode::new(self.bbox, rows, cols, cells);
        table.text_block = self.is_one_cell();
        Ok(table)
    }
}

/// A table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: usize,
    pub col: usize,
    pub rowspan: usize,
    pub colspan: usize,
    pub bbox: BoundingBox,
    /// Processed cell content
    #[serde(default)]
    pub contents: Vec<Slot>,
}

impl TableCell {
    pub fn new(row: usize, col: usize, rowspan: usize, colspan: usize, bbox: BoundingBox) -> Self {
        Self {
            row,
            col,
            rowspan,
            colspan,
            bbox,
            contents: Vec::new(),
        }
    }

    /// Whether the grid slot `(row, col)` belongs to this cell.
    pub fn covers(&self, row: usize, col: usize) -> bool {
        row >= self.row && row < self.row + self.rowspan && col >= self.col && col < self.col + self.colspan
    }

    pub fn width(&self) -> f64 {
        self.bbox.width()
    }
}

/// An assembled table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StructureId>,
    pub bbox: BoundingBox,
    pub rows: usize,
    pub cols: usize,
    /// Cells in row-major order of their top-left slot
    pub cells: Vec<TableCell>,
    /// One-cell table used as a framed text block
    #[serde(default)]
    pub text_block: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<StructureId>,
}

impl TableNode {
    pub fn new(bbox: BoundingBox, rows: usize, cols: usize, cells: Vec<TableCell>) -> Self {
        Self {
            id: None,
            bbox,
            rows,
            cols,
            cells,
            text_block: false,
            prev_id: None,
            next_id: None,
        }
    }

    /// Cell covering the grid slot `(row, col)`.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.cells.iter().find(|c| c.covers(row, col))
    }

    pub fn width(&self) -> f64 {
        self.bbox.width()
    }

    /// Check that every slot is covered by exactly one cell.
    pub fn check_coverage(&self) -> std::result::Result<(), String> {
        if self.rows == 0 || self.cols == 0 {
            return Err("table has no rows or columns".to_string());
        }
        let slots = self
            .rows
            .checked_mul(self.cols)
            .ok_or_else(|| format!("{}x{} grid is too large", self.rows, self.cols))?;
        let mut count = vec![0u32; slots];
        for cell in &self.cells {
            if cell.rowspan == 0 || cell.colspan == 0 {
                return Err(format!("cell ({}, {}) has an empty span", cell.row, cell.col));
            }
            let row_end = cell.row.checked_add(cell.rowspan).filter(|&end| end <= self.rows);
            let col_end = cell.col.checked_add(cell.colspan).filter(|&end| end <= self.cols);
            let (Some(row_end), Some(col_end)) = (row_end, col_end) else {
                return Err(format!("cell ({}, {}) leaves the grid", cell.row, cell.col));
            };
            for r in cell.row..row_end {
                for c in cell.col..col_end {
                    count[r * self.cols + c] += 1;
                }
            }
        }
        match count.iter().position(|&n| n != 1) {
            Some(index) => Err(format!(
                "slot ({}, {}) is covered {} times",
                index / self.cols,
                index % self.cols,
                count[index]
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn border() -> TableBorder {
        TableBorder::new(
            BoundingBox::new(0, 0.0, 0.0, 300.0, 200.0),
            vec![200.0, 100.0, 0.0],
            vec![0.0, 100.0, 200.0, 300.0],
        )
    }

    #[test]
    fn test_regular_grid_covers_every_slot() {
        let table = border().to_table().unwrap();
        assert_eq!(table.rows, 2);
        assert_eq!(table.cols, 3);
        assert_eq!(table.cells.len(), 6);
        assert!(table.check_coverage().is_ok());
        let cell = table.cell_at(1, 2).unwrap();
        assert_eq!(cell.bbox, BoundingBox::new(0, 200.0, 0.0, 300.0, 100.0));
    }

    #[test]
    fn test_span_covers_its_slots() {
        let table = border().with_span(0, 0, 1, 2).to_table().unwrap();
        assert_eq!(table.cells.len(), 5);
        assert!(table.check_coverage().is_ok());
        let merged = table.cell_at(0, 1).unwrap();
        assert_eq!((merged.row, merged.col, merged.colspan), (0, 0, 2));
        assert_eq!(merged.bbox.right, 200.0);
    }

    #[test]
    fn test_overlapping_spans_rejected() {
        let result = border().with_span(0, 0, 2, 1).with_span(1, 0, 1, 2).to_table();
        assert!(result.is_err());
    }

    #[test]
    fn test_overflowing_span_rejected() {
        assert!(border().with_span(usize::MAX, 0, 2, 1).to_table().is_err());
        assert!(border().with_span(0, 1, 1, usize::MAX).to_table().is_err());
    }

    #[test]
    fn test_coverage_rejects_overflowing_cell() {
        let mut table = border().to_table().unwrap();
        table.cells[0].rowspan = usize::MAX;
        assert!(table.check_coverage().is_err());
    }

    #[test]
    fn test_empty_grid_rejected() {
        let empty = TableBorder::new(BoundingBox::default(), vec![10.0], vec![0.0, 10.0]);
        assert!(empty.to_table().is_err());
    }

    #[test]
    fn test_one_cell_is_text_block() {
        let single = TableBorder::new(
            BoundingBox::new(0, 0.0, 0.0, 100.0, 50.0),
            vec![50.0, 0.0],
            vec![0.0, 100.0],
        );
        assert!(single.to_table().unwrap().text_block);
    }
}
