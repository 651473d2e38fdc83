//! Document model types for structure reconstruction.
//!
//! This module defines the representation shared by every pass: raw
//! geometric primitives, the intermediate lines and blocks, the semantic
//! node tree, and the page slot sequence that holds them.

mod document;
mod geometry;
mod node;
mod page;
mod paragraph;
mod primitive;
mod table;

pub use document::{Document, DocumentInput, PageInput, PageSelection};
pub use geometry::{are_close, BoundingBox, COORD_EPSILON};
pub use node::{
    Caption, Formula, FurnitureKind, HeaderFooter, Heading, ListItem, ListNode, NumberingStyle,
    Picture, SemanticNode, StructureId, TextNode,
};
pub use page::{compact, for_each_node_mut, Page, Slot};
pub use paragraph::{Alignment, StyleKey, TextBlock, TextLine};
pub use primitive::{ContentPrimitive, ImageRun, LineArt, LineSegment, TextRun};
pub use table::{CellSpan, TableBorder, TableCell, TableNode};
