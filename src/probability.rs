//! Geometric probability capability consumed by the processing passes.
//!
//! The passes never inspect geometry directly to decide merges; they ask a
//! [`ProbabilityModel`]. [`GeometricModel`] is the bundled implementation,
//! built from line spacing, font size and alignment heuristics. Callers with
//! a trained model can plug in their own implementation through
//! [`ProcessingContext::with_model`](crate::context::ProcessingContext::with_model).

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Alignment, BoundingBox, TextBlock, TextLine, TextNode, TextRun};

/// Scores used by the structural passes. All probabilities are in `[0, 1]`.
pub trait ProbabilityModel: Send + Sync {
    /// Probability that `run` continues the open `line`.
    fn run_merge_probability(&self, line: &TextLine, run: &TextRun) -> f64;

    /// Probability that two consecutive blocks belong to one paragraph.
    ///
    /// `should_be_close` asks for the gap to match the blocks' own leading.
    fn merge_probability(&self, prev: &TextBlock, next: &TextBlock, should_be_close: bool) -> f64;

    /// Probability that `next` is the line following `prev` in one paragraph.
    fn leading_probability(&self, prev: &TextLine, next: &TextLine) -> f64;

    /// Probability that `node` is a heading given its neighbours.
    fn heading_probability(&self, node: &TextNode, prev: Option<&TextNode>, next: &TextNode) -> f64;

    /// Probability that `text` is the caption of the figure at `figure`.
    fn caption_probability(&self, text: &TextNode, figure: &BoundingBox) -> f64;

    /// Horizontal alignment of two consecutive lines.
    fn alignment(&self, prev: &TextLine, next: &TextLine) -> Alignment;
}

/// Heuristic model based on line geometry and font metrics.
#[derive(Debug, Clone)]
pub struct GeometricModel {
    /// Alignment tolerance relative to the font size
    pub alignment_tolerance: f64,
    /// Gap (relative to line height) below which lines are always adjacent
    pub close_leading: f64,
    /// Gap (relative to line height) at which adjacency drops to zero
    pub max_leading: f64,
    /// Font size ratio above which a node stands out as a heading
    pub heading_size_ratio: f64,
}

impl Default for GeometricModel {
    fn default() -> Self {
        Self {
            alignment_tolerance: 0.5,
            close_leading: 0.6,
            max_leading: 1.2,
            heading_size_ratio: 1.15,
        }
    }
}

fn caption_keyword() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(figure|fig\.|table|tab\.|chart|image|그림|표|도표|사진)\s*[\dIVXivx]*")
            .expect("caption keyword pattern is valid")
    })
}

fn size_score(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max <= 0.0 {
        return 1.0;
    }
    let min = a.min(b);
    if max - min <= 0.1 * max {
        1.0
    } else {
        min / max
    }
}

fn is_bold(weight: f64, font_name: &str) -> bool {
    weight >= 600.0 || font_name.to_ascii_lowercase().contains("bold")
}

impl GeometricModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean vertical gap between consecutive lines of a block.
    fn internal_leading(block: &TextBlock) -> Option<f64> {
        let lines = block.lines();
        if lines.len() < 2 {
            return None;
        }
        let total: f64 = lines
            .windows(2)
            .map(|pair| pair[0].bbox.bottom - pair[1].bbox.top)
            .sum();
        Some(total / (lines.len() - 1) as f64)
    }
}

impl ProbabilityModel for GeometricModel {
    fn run_merge_probability(&self, line: &TextLine, run: &TextRun) -> f64 {
        if line.page() != run.bbox.page || line.runs.is_empty() {
            return 0.0;
        }
        let height = line.bbox.height().max(run.height()).max(1e-6);
        let baseline_diff = (line.baseline() - run.baseline()).abs();
        if baseline_diff > 0.5 * height {
            return 0.0;
        }
        let gap = run.bbox.left - line.bbox.right;
        let font_size = run.font_size.max(line.font_size()).max(1e-6);
        if gap > 4.0 * font_size || gap < -0.5 * height {
            return 0.0;
        }
        (1.0 - baseline_diff / height).clamp(0.0, 1.0)
    }

    fn merge_probability(&self, prev: &TextBlock, next: &TextBlock, should_be_close: bool) -> f64 {
        let base = self.leading_probability(prev.last_line(), next.first_line());
        if base <= 0.0 {
            return 0.0;
        }
        let internal: Vec<f64> = [Self::internal_leading(prev), Self::internal_leading(next)]
            .into_iter()
            .flatten()
            .collect();
        if internal.is_empty() {
            return base;
        }
        let leading = internal.iter().sum::<f64>() / internal.len() as f64;
        let height = prev.last_line().bbox.height().max(next.first_line().bbox.height());
        let gap = prev.last_line().bbox.bottom - next.first_line().bbox.top;
        let factor = if should_be_close { 1.2 } else { 2.0 };
        if gap > leading.max(0.0) * factor + 0.1 * height {
            base * 0.5
        } else {
            base
        }
    }

    fn leading_probability(&self, prev: &TextLine, next: &TextLine) -> f64 {
        if prev.page() != next.page() || !prev.bbox.horizontal_overlap(&next.bbox) {
            return 0.0;
        }
        let height = prev.bbox.height().max(next.bbox.height()).max(1e-6);
        let gap = prev.bbox.bottom - next.bbox.top;
        // next must sit below prev
        if next.bbox.top > prev.bbox.top || gap < -0.5 * height {
            return 0.0;
        }
        let gap_score = if gap <= self.close_leading * height {
            1.0
        } else if gap >= self.max_leading * height {
            0.0
        } else {
            (self.max_leading * height - gap) / ((self.max_leading - self.close_leading) * height)
        };
        gap_score * size_score(prev.font_size(), next.font_size())
    }

    fn heading_probability(&self, node: &TextNode, prev: Option<&TextNode>, next: &TextNode) -> f64 {
        let text = node.text();
        let text = text.trim();
        if text.is_empty() || text.chars().count() > 200 || node.lines().len() > 3 {
            return 0.0;
        }
        let size = node.font_size();
        let line = node.first_line();
        let bold = is_bold(line.font_weight(), line.font_name());
        let next_line = next.first_line();
        let larger = size >= next.font_size() * self.heading_size_ratio;
        let bolder = bold && !is_bold(next_line.font_weight(), next_line.font_name());
        let above_prev = prev
            .map(|p| size >= p.font_size() * self.heading_size_ratio)
            .unwrap_or(true);
        if text.ends_with('.') && !larger {
            return 0.1;
        }
        if larger {
            if above_prev {
                0.9
            } else {
                0.8
            }
        } else if bolder && size >= next.font_size() * 0.95 {
            0.8
        } else {
            0.1
        }
    }

    fn caption_probability(&self, text: &TextNode, figure: &BoundingBox) -> f64 {
        if text.page() != figure.page || !text.bbox.horizontal_overlap(figure) {
            return 0.0;
        }
        let font_size = text.font_size().max(1.0);
        let gap = if text.bbox.top <= figure.bottom + font_size {
            figure.bottom - text.bbox.top
        } else {
            text.bbox.bottom - figure.top
        };
        let keyword = caption_keyword().is_match(&text.text());
        if gap >= -font_size && gap <= 3.0 * font_size {
            if keyword {
                0.95
            } else {
                0.5
            }
        } else if keyword && gap <= 6.0 * font_size {
            0.8
        } else {
            0.0
        }
    }

    fn alignment(&self, prev: &TextLine, next: &TextLine) -> Alignment {
        let tolerance = self.alignment_tolerance * prev.font_size().max(next.font_size());
        let left = (prev.left() - next.left()).abs() <= tolerance;
        let right = (prev.right() - next.right()).abs() <= tolerance;
        let center = (prev.bbox.center_x() - next.bbox.center_x()).abs() <= tolerance;
        match (left, right, center) {
            (true, true, _) => Alignment::Justify,
            (true, false, _) => Alignment::Left,
            (false, true, _) => Alignment::Right,
            (false, false, true) => Alignment::Center,
            _ => Alignment::None,
        }
    }
}
