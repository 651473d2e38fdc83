//! Text lines and text blocks.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{BoundingBox, TextRun};

/// Horizontal alignment of two consecutive lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Right,
    Center,
    Justify,
    /// No consistent alignment
    None,
}

/// Font family, weight and size used to group headings into levels.
///
/// Ordered by size descending, then weight descending, then family name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleKey {
    pub font_name: String,
    pub font_weight: f64,
    pub font_size: f64,
}

impl PartialEq for StyleKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StyleKey {}

impl PartialOrd for StyleKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StyleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .font_size
            .total_cmp(&self.font_size)
            .then_with(|| other.font_weight.total_cmp(&self.font_weight))
            .then_with(|| self.font_name.cmp(&other.font_name))
    }
}

/// Runs merged into one visual line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Union of the run boxes
    pub bbox: BoundingBox,
    /// Runs, left to right once the line is closed
    pub runs: Vec<TextRun>,
    /// Assembled text (spaces inserted at wide gaps)
    pub text: String,
    /// Box of a connected line-art bullet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_box: Option<BoundingBox>,
    /// Set once the line has been claimed as a list label line
    #[serde(default)]
    pub list_line: bool,
}

impl TextLine {
    /// Open a line with its first run.
    pub fn from_run(run: TextRun) -> Self {
        Self {
            bbox: run.bbox,
            text: run.text.clone(),
            runs: vec![run],
            label_box: None,
            list_line: false,
        }
    }

    /// Append a run, inserting a space when the gap exceeds
    /// `font_size * space_ratio`.
    pub fn push_run(&mut self, run: TextRun, space_ratio: f64) {
        let gap = run.bbox.left - self.bbox.right;
        if gap > run.font_size * space_ratio && !self.text.ends_with(' ') && !run.text.starts_with(' ') {
            self.text.push(' ');
        }
        self.text.push_str(&run.text);
        self.bbox = self.bbox.union(&run.bbox);
        self.runs.push(run);
    }

    /// Sort runs left to right and rebuild the text.
    pub fn close(&mut self, space_ratio: f64) {
        if self.runs.len() < 2 {
            return;
        }
        self.runs.sort_by(|a, b| {
            a.bbox
                .left
                .partial_cmp(&b.bbox.left)
                .unwrap_or(Ordering::Equal)
        });
        let runs = std::mem::take(&mut self.runs);
        let mut iter = runs.into_iter();
        if let Some(first) = iter.next() {
            let label_box = self.label_box;
            let list_line = self.list_line;
            *self = TextLine::from_run(first);
            for run in iter {
                self.push_run(run, space_ratio);
            }
            self.label_box = label_box;
            self.list_line = list_line;
        }
    }

    pub fn left(&self) -> f64 {
        self.bbox.left
    }

    pub fn right(&self) -> f64 {
        self.bbox.right
    }

    pub fn page(&self) -> u32 {
        self.bbox.page
    }

    pub fn first_run(&self) -> Option<&TextRun> {
        self.runs.first()
    }

    /// Largest font size of the line.
    pub fn font_size(&self) -> f64 {
        self.runs.iter().map(|r| r.font_size).fold(0.0, f64::max)
    }

    pub fn font_weight(&self) -> f64 {
        self.first_run().map(|r| r.font_weight).unwrap_or(400.0)
    }

    pub fn font_name(&self) -> &str {
        self.first_run().map(|r| r.font_name.as_str()).unwrap_or("")
    }

    pub fn baseline(&self) -> f64 {
        self.first_run()
            .map(|r| r.baseline())
            .unwrap_or(self.bbox.bottom)
    }

    pub fn hidden(&self) -> bool {
        self.first_run().map(|r| r.hidden).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Same font family, weight and size as `other` on their first runs.
    pub fn same_style(&self, other: &TextLine) -> bool {
        match (self.first_run(), other.first_run()) {
            (Some(a), Some(b)) => {
                a.font_name == b.font_name
                    && (a.font_weight - b.font_weight).abs() < 1e-3
                    && (a.font_size - b.font_size).abs() < 1e-3
            }
            _ => false,
        }
    }

    pub fn style_key(&self) -> StyleKey {
        StyleKey {
            font_name: self.font_name().to_string(),
            font_weight: self.font_weight(),
            font_size: self.font_size(),
        }
    }

    /// X coordinate where the character at `char_index` of the line text starts.
    pub fn symbol_start(&self, char_index: usize) -> f64 {
        if let Some(first) = self.first_run() {
            if char_index <= first.text.chars().count() {
                return first.symbol_start(char_index);
            }
        }
        let count = self.text.chars().count().max(1);
        self.bbox.left + self.bbox.width() * char_index as f64 / count as f64
    }

    /// Copy of the line with the first `chars` characters removed.
    pub fn without_prefix(&self, chars: usize) -> TextLine {
        let mut line = self.clone();
        line.bbox.left = self.symbol_start(chars);
        line.text = self.text.chars().skip(chars).collect();
        line
    }
}

/// Lines grouped into a paragraph body.
///
/// A block always holds at least one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    lines: Vec<TextLine>,
    /// Alignment established by the pass that built the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default)]
    pub has_start_line: bool,
    #[serde(default)]
    pub has_end_line: bool,
}

impl TextBlock {
    /// Block holding a single line.
    pub fn new(line: TextLine) -> Self {
        Self {
            lines: vec![line],
            alignment: None,
            has_start_line: false,
            has_end_line: false,
        }
    }

    /// Block from a list of lines; `None` when the list is empty.
    pub fn from_lines(lines: Vec<TextLine>) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }
        Some(Self {
            lines,
            alignment: None,
            has_start_line: false,
            has_end_line: false,
        })
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<TextLine> {
        self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn first_line(&self) -> &TextLine {
        &self.lines[0]
    }

    pub fn last_line(&self) -> &TextLine {
        &self.lines[self.lines.len() - 1]
    }

    /// Line at `index`, if present.
    pub fn line(&self, index: usize) -> Option<&TextLine> {
        self.lines.get(index)
    }

    pub fn push_lines(&mut self, lines: impl IntoIterator<Item = TextLine>) {
        self.lines.extend(lines);
    }

    pub fn prepend_lines(&mut self, lines: Vec<TextLine>) {
        let tail = std::mem::replace(&mut self.lines, lines);
        self.lines.extend(tail);
    }

    pub fn bbox(&self) -> BoundingBox {
        let first = self.first_line().bbox;
        self.lines.iter().skip(1).fold(first, |acc, l| acc.union(&l.bbox))
    }

    pub fn font_size(&self) -> f64 {
        self.lines.iter().map(|l| l.font_size()).fold(0.0, f64::max)
    }

    pub fn hidden(&self) -> bool {
        self.first_line().hidden()
    }

    /// Lines joined with a single space.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
