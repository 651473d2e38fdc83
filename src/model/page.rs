//! Page-level types.

use serde::{Deserialize, Serialize};

use super::{BoundingBox, ContentPrimitive, SemanticNode, TextLine};

/// One position in a page's content sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "value", rename_all = "snake_case")]
pub enum Slot {
    Primitive(ContentPrimitive),
    Line(TextLine),
    Node(SemanticNode),
    /// Tombstone left by a pass; dropped by [`compact`]
    Removed,
}

impl Slot {
    /// Box of the slot content (`None` for tombstones).
    pub fn bbox(&self) -> Option<&BoundingBox> {
        match self {
            Slot::Primitive(p) => Some(p.bbox()),
            Slot::Line(l) => Some(&l.bbox),
            Slot::Node(n) => Some(n.bbox()),
            Slot::Removed => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Slot::Removed)
    }

    /// Replace the slot with a tombstone and return the old content.
    pub fn take(&mut self) -> Slot {
        std::mem::replace(self, Slot::Removed)
    }

    pub fn as_node(&self) -> Option<&SemanticNode> {
        match self {
            Slot::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut SemanticNode> {
        match self {
            Slot::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&TextLine> {
        match self {
            Slot::Line(l) => Some(l),
            _ => None,
        }
    }

    /// Whether the slot is a line segment or line art primitive.
    pub fn is_line_decoration(&self) -> bool {
        matches!(
            self,
            Slot::Primitive(ContentPrimitive::LineSegment(_))
                | Slot::Primitive(ContentPrimitive::LineArt(_))
        )
    }

    /// Whether the slot is a header or footer node.
    pub fn is_furniture(&self) -> bool {
        matches!(self, Slot::Node(SemanticNode::HeaderFooter(_)))
    }
}

impl From<ContentPrimitive> for Slot {
    fn from(primitive: ContentPrimitive) -> Self {
        Slot::Primitive(primitive)
    }
}

impl From<SemanticNode> for Slot {
    fn from(node: SemanticNode) -> Self {
        Slot::Node(node)
    }
}

/// Visit every node of `slots` in document order, children after their parent.
pub fn for_each_node_mut(slots: &mut [Slot], f: &mut dyn FnMut(&mut SemanticNode)) {
    for slot in slots.iter_mut() {
        let Slot::Node(node) = slot else {
            continue;
        };
        f(node);
        match node {
            SemanticNode::List(list) => {
                for item in &mut list.items {
                    for_each_node_mut(&mut item.contents, f);
                }
            }
            SemanticNode::Table(table) => {
                for cell in &mut table.cells {
                    for_each_node_mut(&mut cell.contents, f);
                }
            }
            SemanticNode::HeaderFooter(furniture) => for_each_node_mut(&mut furniture.contents, f),
            _ => {}
        }
    }
}

/// Drop every tombstone from `slots`.
pub fn compact(slots: &mut Vec<Slot>) {
    slots.retain(|s| !s.is_removed());
}

/// A single page in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page index (0-based)
    pub number: u32,

    /// Page width in points
    pub width: f64,

    /// Page height in points
    pub height: f64,

    /// Ordered content of the page
    pub slots: Vec<Slot>,
}

impl Page {
    /// Create a new empty page with the given dimensions.
    pub fn new(number: u32, width: f64, height: f64) -> Self {
        Self {
            number,
            width,
            height,
            slots: Vec::new(),
        }
    }

    /// Create a page from extracted primitives.
    pub fn with_primitives(number: u32, width: f64, height: f64, primitives: Vec<ContentPrimitive>) -> Self {
        Self {
            number,
            width,
            height,
            slots: primitives.into_iter().map(Slot::Primitive).collect(),
        }
    }

    /// Create a new page with standard A4 size (210 x 297 mm).
    pub fn a4(number: u32) -> Self {
        Self::new(number, 595.0, 842.0)
    }

    /// Drop tombstones.
    pub fn compact(&mut self) {
        compact(&mut self.slots);
    }

    /// Vertical centre of the page.
    pub fn center_y(&self) -> f64 {
        self.height / 2.0
    }

    /// Iterate over the semantic nodes of the page.
    pub fn nodes(&self) -> impl Iterator<Item = &SemanticNode> {
        self.slots.iter().filter_map(Slot::as_node)
    }

    /// Iterate over the raw primitives of the page.
    pub fn primitives(&self) -> impl Iterator<Item = &ContentPrimitive> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Primitive(p) => Some(p),
            _ => None,
        })
    }

    /// Check if the page has no content.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Slot::is_removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageRun, TextRun};

    #[test]
    fn test_compact_drops_tombstones() {
        let run = TextRun::new(0, BoundingBox::new(0, 0.0, 0.0, 10.0, 10.0), "a", 10.0);
        let mut page = Page::with_primitives(0, 595.0, 842.0, vec![ContentPrimitive::TextRun(run)]);
        page.slots.push(Slot::Removed);
        page.slots[0].take();
        assert!(page.is_empty());
        page.compact();
        assert!(page.slots.is_empty());
    }

    #[test]
    fn test_slot_serialization_is_tagged() {
        let slot = Slot::Primitive(ContentPrimitive::Image(ImageRun {
            index: 4,
            bbox: BoundingBox::new(0, 0.0, 0.0, 10.0, 10.0),
            hidden: false,
        }));
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["slot"], "primitive");
        assert_eq!(json["value"]["type"], "image");
        assert_eq!(json["value"]["index"], 4);
    }
}
