//! Geometric content primitives produced by the extraction step.

use serde::{Deserialize, Serialize};

use super::BoundingBox;

fn default_font_size() -> f64 {
    12.0
}

fn default_font_weight() -> f64 {
    400.0
}

/// A run of text sharing one font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Ordinal index within the page
    #[serde(default)]
    pub index: usize,
    /// Position on the page
    pub bbox: BoundingBox,
    /// Text content
    pub text: String,
    /// Font name (e.g., "Helvetica-Bold")
    #[serde(default)]
    pub font_name: String,
    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Font weight (400 = regular, 700 = bold)
    #[serde(default = "default_font_weight")]
    pub font_weight: f64,
    /// Baseline Y; defaults to the bottom of the box
    #[serde(default)]
    pub baseline: Option<f64>,
    /// Whether the text is invisible (e.g. OCR layer, white-on-white)
    #[serde(default)]
    pub hidden: bool,
    /// Contrast between the text and its background, when measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast_ratio: Option<f64>,
}

impl TextRun {
    /// Create a visible text run with regular weight.
    pub fn new(index: usize, bbox: BoundingBox, text: impl Into<String>, font_size: f64) -> Self {
        Self {
            index,
            bbox,
            text: text.into(),
            font_name: String::new(),
            font_size,
            font_weight: default_font_weight(),
            baseline: None,
            hidden: false,
            contrast_ratio: None,
        }
    }

    /// Set the font name.
    pub fn with_font(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.font_name = name.into();
        self.font_weight = weight;
        self
    }

    /// Mark the run as hidden text.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the measured text-to-background contrast.
    pub fn with_contrast_ratio(mut self, ratio: f64) -> Self {
        self.contrast_ratio = Some(ratio);
        self
    }

    pub fn baseline(&self) -> f64 {
        self.baseline.unwrap_or(self.bbox.bottom)
    }

    pub fn height(&self) -> f64 {
        self.bbox.height()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the run contains only whitespace.
    pub fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }

    fn glyph_advance(&self) -> f64 {
        let count = self.text.chars().count();
        if count == 0 {
            0.0
        } else {
            self.bbox.width() / count as f64
        }
    }

    /// X coordinate where the glyph at `char_index` starts.
    pub fn symbol_start(&self, char_index: usize) -> f64 {
        self.bbox.left + self.glyph_advance() * char_index as f64
    }

    /// The part of this run whose glyph centres fall inside `[left, right]`,
    /// trimmed of surrounding whitespace. Returns `None` when nothing remains.
    pub fn slice_between(&self, left: f64, right: f64) -> Option<TextRun> {
        let advance = self.glyph_advance();
        let chars: Vec<char> = self.text.chars().collect();
        if chars.is_empty() || advance <= 0.0 {
            return None;
        }
        let mut start = None;
        let mut end = 0;
        for (i, _) in chars.iter().enumerate() {
            let center = self.bbox.left + advance * (i as f64 + 0.5);
            if center >= left && center <= right {
                if start.is_none() {
                    start = Some(i);
                }
                end = i + 1;
            }
        }
        let start = start?;
        // trim whitespace at both ends
        let mut s = start;
        let mut e = end;
        while s < e && chars[s].is_whitespace() {
            s += 1;
        }
        while e > s && chars[e - 1].is_whitespace() {
            e -= 1;
        }
        if s == e {
            return None;
        }
        let mut part = self.clone();
        part.text = chars[s..e].iter().collect();
        part.bbox.left = self.bbox.left + advance * s as f64;
        part.bbox.right = self.bbox.left + advance * e as f64;
        Some(part)
    }

    /// Copy of this run with the first `chars` characters removed.
    pub fn without_prefix(&self, chars: usize) -> TextRun {
        let mut part = self.clone();
        part.bbox.left = self.symbol_start(chars);
        part.text = self.text.chars().skip(chars).collect();
        part
    }
}

/// A vector graphic (filled path, glyph-like shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineArt {
    #[serde(default)]
    pub index: usize,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub hidden: bool,
}

/// A raster image placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRun {
    #[serde(default)]
    pub index: usize,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub hidden: bool,
}

impl ImageRun {
    /// Whether the image is too thin to be a figure (rule, separator).
    pub fn is_subtle(&self, ratio_threshold: f64) -> bool {
        let width = self.bbox.width();
        let height = self.bbox.height();
        if width <= 0.0 || height <= 0.0 {
            return true;
        }
        if height > width {
            width / height < ratio_threshold
        } else {
            height / width < ratio_threshold
        }
    }
}

/// A stroked straight line (table rule, underline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    #[serde(default)]
    pub index: usize,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub hidden: bool,
}

impl LineSegment {
    pub fn is_horizontal(&self) -> bool {
        self.bbox.width() > self.bbox.height() * 3.0
    }

    pub fn is_vertical(&self) -> bool {
        self.bbox.height() > self.bbox.width() * 3.0
    }
}

/// Raw geometric content before structural grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPrimitive {
    TextRun(TextRun),
    LineArt(LineArt),
    Image(ImageRun),
    LineSegment(LineSegment),
}

impl ContentPrimitive {
    pub fn bbox(&self) -> &BoundingBox {
        match self {
            ContentPrimitive::TextRun(r) => &r.bbox,
            ContentPrimitive::LineArt(a) => &a.bbox,
            ContentPrimitive::Image(i) => &i.bbox,
            ContentPrimitive::LineSegment(l) => &l.bbox,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ContentPrimitive::TextRun(r) => r.index,
            ContentPrimitive::LineArt(a) => a.index,
            ContentPrimitive::Image(i) => i.index,
            ContentPrimitive::LineSegment(l) => l.index,
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self {
            ContentPrimitive::TextRun(r) => r.hidden,
            ContentPrimitive::LineArt(a) => a.hidden,
            ContentPrimitive::Image(i) => i.hidden,
            ContentPrimitive::LineSegment(l) => l.hidden,
        }
    }

    /// Reassign the bounding box page (used when pages are renumbered).
    pub fn set_page(&mut self, page: u32) {
        match self {
            ContentPrimitive::TextRun(r) => r.bbox.page = page,
            ContentPrimitive::LineArt(a) => a.bbox.page = page,
            ContentPrimitive::Image(i) => i.bbox.page = page,
            ContentPrimitive::LineSegment(l) => l.bbox.page = page,
        }
    }
}
