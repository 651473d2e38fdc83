//! Borderless table proposals from text position analysis.
//!
//! Pages whose text runs look tabular (runs out of vertical reading order,
//! or wide gaps on a shared baseline) are scanned for rows of runs whose
//! left edges align on common columns. Each aligned region becomes a
//! [`TableBorder`] proposal assembled like a ruled table.

use std::collections::{HashMap, HashSet};

use crate::model::{BoundingBox, ContentPrimitive, Page, TableBorder, TextRun};

use super::labels::Label;
use super::Thresholds;

/// Whether two consecutive runs suggest a table on the page.
///
/// `prev` sits above `cur` in extraction order when `prev.top < cur.bottom`
/// is false; a violation, or a gap wider than `height * gap_multiplier` on a
/// shared baseline, is suspicious.
pub fn are_suspicious_runs(prev: &TextRun, cur: &TextRun, baseline_epsilon: f64, gap_multiplier: f64) -> bool {
    if prev.bbox.top < cur.bbox.bottom {
        return true;
    }
    let height = cur.height();
    (prev.baseline() - cur.baseline()).abs() <= height * baseline_epsilon
        && cur.bbox.left - prev.bbox.right > height * gap_multiplier
}

/// Whether any two consecutive non-space runs of `runs` are suspicious.
pub fn has_suspicious_runs<'a>(
    runs: impl IntoIterator<Item = &'a TextRun>,
    baseline_epsilon: f64,
    gap_multiplier: f64,
) -> bool {
    let mut previous: Option<&TextRun> = None;
    for run in runs {
        if run.is_whitespace() {
            continue;
        }
        if let Some(prev) = previous {
            if are_suspicious_runs(prev, run, baseline_epsilon, gap_multiplier) {
                return true;
            }
        }
        previous = Some(run);
    }
    false
}

/// Detector configuration.
#[derive(Debug, Clone)]
struct ClusterConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Baseline tolerance for grouping runs into rows (fraction of font size)
    pub y_tolerance_factor: f64,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f64,
    /// Minimum gap between column edges (points)
    pub min_column_gap: f64,
    /// Width of the buckets left edges are counted in (points)
    pub bucket_size: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            bucket_size: 5.0,
        }
    }
}

/// Runs sharing a baseline.
#[derive(Debug, Clone)]
struct Row<'a> {
    runs: Vec<&'a TextRun>,
}

impl Row<'_> {
    fn top(&self) -> f64 {
        self.runs.iter().map(|r| r.bbox.top).fold(f64::MIN, f64::max)
    }

    fn bottom(&self) -> f64 {
        self.runs.iter().map(|r| r.bbox.bottom).fold(f64::MAX, f64::min)
    }
}

/// Proposes borderless table grids from text runs.
#[derive(Debug, Clone, Default)]
pub struct ClusterDetector {
    config: ClusterConfig,
}

impl ClusterDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose grids for the runs of one page.
    pub fn detect(&self, page: u32, runs: &[&TextRun]) -> Vec<TableBorder> {
        let runs: Vec<&TextRun> = runs.iter().copied().filter(|r| !r.is_whitespace()).collect();
        if runs.len() < self.config.min_rows * self.config.min_columns {
            return Vec::new();
        }

        let rows = self.group_into_rows(&runs);
        if rows.len() < self.config.min_rows {
            return Vec::new();
        }
        let columns = self.detect_columns(&rows);
        if columns.len() < self.config.min_columns {
            return Vec::new();
        }

        let mut proposals = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let region = &rows[start..=end];
            let region_columns = self.detect_columns(region);
            if region_columns.len() < self.config.min_columns {
                continue;
            }
            if region_columns.len() > self.config.max_columns {
                log::debug!(
                    "Cluster tables: skipping region with {} columns (max {})",
                    region_columns.len(),
                    self.config.max_columns
                );
                continue;
            }
            if self.is_list_pattern(region, &region_columns) {
                log::debug!("Cluster tables: skipping region detected as list");
                continue;
            }
            if let Some(border) = self.to_border(page, region, &region_columns) {
                proposals.push(border);
            }
        }
        proposals
    }

    /// Group runs into rows by baseline, top of the page first.
    fn group_into_rows<'a>(&self, runs: &[&'a TextRun]) -> Vec<Row<'a>> {
        let mut sorted = runs.to_vec();
        sorted.sort_by(|a, b| {
            b.baseline()
                .total_cmp(&a.baseline())
                .then_with(|| a.bbox.left.total_cmp(&b.bbox.left))
        });

        let mut rows: Vec<Row<'a>> = Vec::new();
        let mut current: Vec<&'a TextRun> = Vec::new();
        let mut current_y: Option<f64> = None;
        for run in sorted {
            let tolerance = run.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (run.baseline() - y).abs() <= tolerance => current.push(run),
                _ => {
                    if !current.is_empty() {
                        rows.push(Row {
                            runs: std::mem::take(&mut current),
                        });
                    }
                    current_y = Some(run.baseline());
                    current.push(run);
                }
            }
        }
        if !current.is_empty() {
            rows.push(Row { runs: current });
        }
        rows
    }

    /// Column start positions from left edges that recur across rows.
    fn detect_columns(&self, rows: &[Row<'_>]) -> Vec<f64> {
        let multi: Vec<&Row<'_>> = rows.iter().filter(|r| r.runs.len() >= 2).collect();
        let basis: Vec<&Row<'_>> = if multi.len() >= self.config.min_rows {
            multi
        } else {
            rows.iter().collect()
        };
        if basis.is_empty() {
            return Vec::new();
        }

        let mut edge_counts: HashMap<i64, usize> = HashMap::new();
        for row in &basis {
            // each bucket counts once per row
            let buckets: HashSet<i64> = row
                .runs
                .iter()
                .map(|r| (r.bbox.left / self.config.bucket_size).round() as i64)
                .collect();
            for bucket in buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences = ((basis.len() as f64 * self.config.min_alignment_ratio) as usize).max(2);
        let mut edges: Vec<f64> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f64 * self.config.bucket_size)
            .collect();
        edges.sort_by(f64::total_cmp);

        let mut merged: Vec<f64> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Contiguous row ranges whose runs align with `columns`.
    fn find_table_regions(&self, rows: &[Row<'_>], columns: &[f64]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;
        for (i, row) in rows.iter().enumerate() {
            if self.alignment_score(row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
            } else if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }
        regions
    }

    fn alignment_score(&self, row: &Row<'_>, columns: &[f64]) -> f64 {
        if row.runs.is_empty() || columns.is_empty() {
            return 0.0;
        }
        let tolerance = self.config.bucket_size;
        let aligned = row
            .runs
            .iter()
            .filter(|r| columns.iter().any(|c| (r.bbox.left - c).abs() <= tolerance))
            .count();
        aligned as f64 / row.runs.len() as f64
    }

    /// Column of a run by its left edge.
    fn find_column(&self, left: f64, columns: &[f64]) -> usize {
        let tolerance = 2.0 * self.config.bucket_size;
        for (i, start) in columns.iter().enumerate() {
            let end = columns.get(i + 1).copied().unwrap_or(f64::MAX);
            if left >= start - tolerance && left < end - tolerance {
                return i;
            }
        }
        columns
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (left - **a).abs().total_cmp(&(left - **b).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Rows whose first run is a list label are a list, not a table.
    ///
    /// Bullets reject any region; numbered labels only reject two-column
    /// regions since real tables often number their first column.
    fn is_list_pattern(&self, rows: &[Row<'_>], columns: &[f64]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }
        let mut bullets = 0usize;
        let mut numbers = 0usize;
        for row in rows {
            let Some(first) = row.runs.iter().min_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left)) else {
                continue;
            };
            let text = first.text.trim();
            match Label::parse(text) {
                Ok(Some(label)) if label.is_bullet() => bullets += 1,
                Ok(Some(_)) => numbers += 1,
                _ if text.parse::<u32>().is_ok() => numbers += 1,
                _ => {}
            }
        }
        let total = rows.len() as f64;
        if bullets as f64 / total >= 0.5 {
            return true;
        }
        columns.len() == 2 && (bullets + numbers) as f64 / total >= 0.5
    }

    /// Grid covering `rows` with boundaries between the detected columns.
    fn to_border(&self, page: u32, rows: &[Row<'_>], columns: &[f64]) -> Option<TableBorder> {
        let runs = || rows.iter().flat_map(|r| r.runs.iter());
        let left = runs().map(|r| r.bbox.left).fold(f64::MAX, f64::min);
        let right = runs().map(|r| r.bbox.right).fold(f64::MIN, f64::max);
        let top = rows.first()?.top();
        let bottom = rows.last()?.bottom();
        if !(left < right && bottom < top) {
            return None;
        }

        // column i+1 starts where its leftmost run starts
        let mut starts = vec![f64::MAX; columns.len()];
        for run in runs() {
            let column = self.find_column(run.bbox.left, columns);
            starts[column] = starts[column].min(run.bbox.left);
        }
        let mut cols = vec![left];
        for start in starts.iter().skip(1) {
            let last = cols[cols.len() - 1];
            if *start == f64::MAX || *start - 0.5 <= last {
                continue;
            }
            cols.push(start - 0.5);
        }
        cols.push(right);
        if cols.len() < self.config.min_columns + 1 {
            return None;
        }

        let mut boundaries = vec![top];
        for pair in rows.windows(2) {
            boundaries.push((pair[0].bottom() + pair[1].top()) / 2.0);
        }
        boundaries.push(bottom);
        if boundaries.windows(2).any(|w| w[1] >= w[0]) {
            return None;
        }

        Some(TableBorder::new(
            BoundingBox::new(page, left, bottom, right, top),
            boundaries,
            cols,
        ))
    }
}

/// Propose borderless tables for `page` when its runs look tabular.
///
/// Proposals intersecting an existing border by more than
/// `table_dedup_intersection` of its area are dropped.
pub fn propose_tables(page: &Page, existing: &[TableBorder], thresholds: &Thresholds) -> Vec<TableBorder> {
    let runs: Vec<&TextRun> = page
        .primitives()
        .filter_map(|p| match p {
            ContentPrimitive::TextRun(run) if !run.is_empty() => Some(run),
            _ => None,
        })
        .collect();
    if !has_suspicious_runs(
        runs.iter().copied(),
        thresholds.suspicious_baseline_epsilon,
        thresholds.suspicious_gap_multiplier,
    ) {
        return Vec::new();
    }

    let proposals = ClusterDetector::new().detect(page.number, &runs);
    let accepted: Vec<TableBorder> = proposals
        .into_iter()
        .filter(|proposal| {
            !existing
                .iter()
                .any(|b| b.bbox.intersection_percent(&proposal.bbox) > thresholds.table_dedup_intersection)
        })
        .collect();
    if !accepted.is_empty() {
        log::debug!("Page {}: {} cluster tables proposed", page.number + 1, accepted.len());
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, left: f64, baseline: f64) -> TextRun {
        let width = text.chars().count() as f64 * 6.0;
        TextRun::new(0, BoundingBox::new(0, left, baseline, left + width, baseline + 12.0), text, 12.0)
    }

    fn page(runs: Vec<TextRun>) -> Page {
        Page::with_primitives(0, 595.0, 842.0, runs.into_iter().map(ContentPrimitive::TextRun).collect())
    }

    // ==== Pre-filter Tests ====

    #[test]
    fn test_wide_gap_on_baseline_is_suspicious() {
        let a = run("Name", 10.0, 700.0);
        let b = run("Age", 200.0, 700.0);
        assert!(are_suspicious_runs(&a, &b, 0.1, 3.0));
        let c = run("word", 40.0, 700.0);
        assert!(!are_suspicious_runs(&a, &c, 0.1, 3.0));
    }

    #[test]
    fn test_out_of_order_is_suspicious() {
        let low = run("below", 10.0, 600.0);
        let high = run("above", 10.0, 700.0);
        assert!(are_suspicious_runs(&low, &high, 0.1, 3.0));
        assert!(!has_suspicious_runs([&high, &low], 0.1, 3.0));
    }

    // ==== Detector Tests ====

    #[test]
    fn test_detect_simple_table() {
        let runs = vec![
            run("Name", 10.0, 100.0),
            run("Age", 80.0, 100.0),
            run("Alice", 10.0, 85.0),
            run("30", 80.0, 85.0),
            run("Bob", 10.0, 70.0),
            run("25", 80.0, 70.0),
        ];
        let refs: Vec<&TextRun> = runs.iter().collect();
        let borders = ClusterDetector::new().detect(0, &refs);
        assert_eq!(borders.len(), 1);
        let border = &borders[0];
        assert_eq!(border.row_count(), 3);
        assert_eq!(border.col_count(), 2);
        assert!(border.to_table().is_ok());
    }

    #[test]
    fn test_single_column_is_not_a_table() {
        let runs = vec![run("Line 1", 10.0, 100.0), run("Line 2", 10.0, 85.0), run("Line 3", 10.0, 70.0)];
        let refs: Vec<&TextRun> = runs.iter().collect();
        assert!(ClusterDetector::new().detect(0, &refs).is_empty());
    }

    #[test]
    fn test_numbered_list_not_detected_as_table() {
        let runs = vec![
            run("1.", 50.0, 400.0),
            run("장비관리설정", 80.0, 400.0),
            run("2.", 50.0, 370.0),
            run("Object관리", 80.0, 370.0),
            run("3.", 50.0, 340.0),
            run("운영관리", 80.0, 340.0),
        ];
        let refs: Vec<&TextRun> = runs.iter().collect();
        assert!(ClusterDetector::new().detect(0, &refs).is_empty());
    }

    #[test]
    fn test_bullet_list_not_detected_as_table() {
        let runs = vec![
            run("-", 50.0, 400.0),
            run("Management", 80.0, 400.0),
            run("-", 50.0, 370.0),
            run("Interface", 80.0, 370.0),
            run("-", 50.0, 340.0),
            run("Firmware", 80.0, 340.0),
        ];
        let refs: Vec<&TextRun> = runs.iter().collect();
        assert!(ClusterDetector::new().detect(0, &refs).is_empty());
    }

    #[test]
    fn test_proposal_overlapping_border_dropped() {
        let page = page(vec![
            run("Name", 10.0, 100.0),
            run("Age", 80.0, 100.0),
            run("Alice", 10.0, 85.0),
            run("30", 80.0, 85.0),
        ]);
        let thresholds = Thresholds::default();
        assert_eq!(propose_tables(&page, &[], &thresholds).len(), 1);

        let existing = TableBorder::new(
            BoundingBox::new(0, 0.0, 60.0, 200.0, 120.0),
            vec![120.0, 60.0],
            vec![0.0, 200.0],
        );
        assert!(propose_tables(&page, &[existing], &thresholds).is_empty());
    }
}
