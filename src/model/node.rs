//! Semantic nodes: the structural units produced by the processing passes.

use serde::{Deserialize, Serialize};

use super::{BoundingBox, Slot, StyleKey, TableNode, TextBlock, TextLine};

/// Globally unique, monotonically assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureId(pub u64);

impl std::fmt::Display for StructureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A run of text lines classified as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StructureId>,
    pub bbox: BoundingBox,
    pub block: TextBlock,
}

impl TextNode {
    pub fn new(block: TextBlock) -> Self {
        Self {
            id: None,
            bbox: block.bbox(),
            block,
        }
    }

    /// Single-line node holding `text` with a nominal font size.
    ///
    /// Used for nodes that arrive without glyph geometry.
    pub fn from_text(bbox: BoundingBox, text: impl Into<String>, font_size: f64) -> Self {
        let run = super::TextRun::new(0, bbox, text, font_size);
        Self::new(TextBlock::new(TextLine::from_run(run)))
    }

    pub fn text(&self) -> String {
        self.block.text()
    }

    pub fn first_line(&self) -> &TextLine {
        self.block.first_line()
    }

    pub fn lines(&self) -> &[TextLine] {
        self.block.lines()
    }

    pub fn font_size(&self) -> f64 {
        self.block.font_size()
    }

    pub fn hidden(&self) -> bool {
        self.block.hidden()
    }

    pub fn style_key(&self) -> StyleKey {
        self.first_line().style_key()
    }

    pub fn page(&self) -> u32 {
        self.bbox.page
    }

    /// Whether the node holds only whitespace.
    pub fn is_space(&self) -> bool {
        self.block.lines().iter().all(|l| l.is_empty())
    }

    /// Append lines and grow the box.
    pub fn push_lines(&mut self, lines: impl IntoIterator<Item = TextLine>) {
        self.block.push_lines(lines);
        self.bbox = self.bbox.union(&self.block.bbox());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub text: TextNode,
    /// Assigned by the level pass, or reported by a backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: TextNode,
    /// Figure or table this caption describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_id: Option<StructureId>,
}

/// Label numbering scheme of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingStyle {
    Arabic,
    UpperRoman,
    LowerRoman,
    UpperLatin,
    LowerLatin,
    Korean,
    Circled,
    Unordered,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StructureId>,
    pub bbox: BoundingBox,
    /// Number of label characters at the start of the first line
    pub label_len: usize,
    /// Label line plus its continuation lines
    pub body: TextBlock,
    /// Other content between this label and the next one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<Slot>,
}

impl ListItem {
    pub fn new(first_line: TextLine) -> Self {
        Self {
            id: None,
            bbox: first_line.bbox,
            label_len: 0,
            body: TextBlock::new(first_line),
            contents: Vec::new(),
        }
    }

    pub fn first_line(&self) -> &TextLine {
        self.body.first_line()
    }

    pub fn last_line(&self) -> &TextLine {
        self.body.last_line()
    }

    pub fn line_count(&self) -> usize {
        self.body.line_count()
    }

    pub fn font_size(&self) -> f64 {
        self.body.font_size()
    }

    pub fn page(&self) -> u32 {
        self.bbox.page
    }

    pub fn push_line(&mut self, line: TextLine) {
        self.bbox = self.bbox.union(&line.bbox);
        self.body.push_lines(Some(line));
    }

    pub fn push_lines(&mut self, lines: impl IntoIterator<Item = TextLine>) {
        for line in lines {
            self.push_line(line);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StructureId>,
    pub bbox: BoundingBox,
    pub numbering_style: NumberingStyle,
    #[serde(default)]
    pub common_prefix: String,
    pub items: Vec<ListItem>,
    /// Continuation links across page or column breaks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_id: Option<StructureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<StructureId>,
}

impl ListNode {
    pub fn new(numbering_style: NumberingStyle, common_prefix: impl Into<String>) -> Self {
        Self {
            id: None,
            bbox: BoundingBox::default(),
            numbering_style,
            common_prefix: common_prefix.into(),
            items: Vec::new(),
            prev_id: None,
            next_id: None,
        }
    }

    pub fn push_item(&mut self, item: ListItem) {
        self.bbox = if self.items.is_empty() {
            item.bbox
        } else {
            self.bbox.union(&item.bbox)
        };
        self.items.push(item);
    }

    pub fn insert_first(&mut self, item: ListItem) {
        self.bbox = if self.items.is_empty() {
            item.bbox
        } else {
            item.bbox.union(&self.bbox)
        };
        self.items.insert(0, item);
    }

    /// Move every item of `other` to the end of this list.
    pub fn append(&mut self, other: ListNode) {
        for item in other.items {
            self.push_item(item);
        }
        if self.next_id.is_none() {
            self.next_id = other.next_id;
        }
    }

    pub fn left(&self) -> f64 {
        self.bbox.left
    }

    pub fn page(&self) -> u32 {
        self.bbox.page
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Recompute the box from the items.
    pub fn update_bbox(&mut self) {
        if let Some(bbox) = BoundingBox::union_all(self.items.iter().map(|i| &i.bbox)) {
            self.bbox = bbox;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StructureId>,
    pub bbox: BoundingBox,
    /// Document-wide picture number starting at 1
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StructureId>,
    pub bbox: BoundingBox,
    pub latex: String,
}

/// Which edge of the page a furniture node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FurnitureKind {
    Header,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderFooter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StructureId>,
    pub bbox: BoundingBox,
    pub kind: FurnitureKind,
    pub contents: Vec<Slot>,
}

/// A structurally classified unit of page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SemanticNode {
    Paragraph(TextNode),
    Heading(Heading),
    Caption(Caption),
    List(ListNode),
    Table(TableNode),
    Picture(Picture),
    Formula(Formula),
    HeaderFooter(HeaderFooter),
}

impl SemanticNode {
    pub fn bbox(&self) -> &BoundingBox {
        match self {
            SemanticNode::Paragraph(n) => &n.bbox,
            SemanticNode::Heading(h) => &h.text.bbox,
            SemanticNode::Caption(c) => &c.text.bbox,
            SemanticNode::List(l) => &l.bbox,
            SemanticNode::Table(t) => &t.bbox,
            SemanticNode::Picture(p) => &p.bbox,
            SemanticNode::Formula(f) => &f.bbox,
            SemanticNode::HeaderFooter(h) => &h.bbox,
        }
    }

    pub fn id(&self) -> Option<StructureId> {
        match self {
            SemanticNode::Paragraph(n) => n.id,
            SemanticNode::Heading(h) => h.text.id,
            SemanticNode::Caption(c) => c.text.id,
            SemanticNode::List(l) => l.id,
            SemanticNode::Table(t) => t.id,
            SemanticNode::Picture(p) => p.id,
            SemanticNode::Formula(f) => f.id,
            SemanticNode::HeaderFooter(h) => h.id,
        }
    }

    /// Mutable access to the id slot.
    pub fn id_mut(&mut self) -> &mut Option<StructureId> {
        match self {
            SemanticNode::Paragraph(n) => &mut n.id,
            SemanticNode::Heading(h) => &mut h.text.id,
            SemanticNode::Caption(c) => &mut c.text.id,
            SemanticNode::List(l) => &mut l.id,
            SemanticNode::Table(t) => &mut t.id,
            SemanticNode::Picture(p) => &mut p.id,
            SemanticNode::Formula(f) => &mut f.id,
            SemanticNode::HeaderFooter(h) => &mut h.id,
        }
    }

    /// Text body of paragraphs, headings and captions.
    pub fn text_node(&self) -> Option<&TextNode> {
        match self {
            SemanticNode::Paragraph(n) => Some(n),
            SemanticNode::Heading(h) => Some(&h.text),
            SemanticNode::Caption(c) => Some(&c.text),
            _ => None,
        }
    }

    pub fn text_node_mut(&mut self) -> Option<&mut TextNode> {
        match self {
            SemanticNode::Paragraph(n) => Some(n),
            SemanticNode::Heading(h) => Some(&mut h.text),
            SemanticNode::Caption(c) => Some(&mut c.text),
            _ => None,
        }
    }

    /// Short lowercase name of the node type.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SemanticNode::Paragraph(_) => "paragraph",
            SemanticNode::Heading(_) => "heading",
            SemanticNode::Caption(_) => "caption",
            SemanticNode::List(_) => "list",
            SemanticNode::Table(_) => "table",
            SemanticNode::Picture(_) => "picture",
            SemanticNode::Formula(_) => "formula",
            SemanticNode::HeaderFooter(_) => "header_footer",
        }
    }
}
