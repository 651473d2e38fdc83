//! Heading promotion.
//!
//! Text nodes of a content sequence are scored against their neighbours;
//! nodes whose heading probability clears the threshold become headings.
//! One-cell tables used as framed text blocks are looked through, so their
//! text takes part in the same neighbourhood as the surrounding flow.

use crate::context::{IdSource, PageScope};
use crate::model::{Heading, SemanticNode, Slot, TextNode};

use super::labels::is_labeled_line;

/// Slot indices leading to a text node, descending through text-block tables.
type Path = Vec<usize>;

fn collect(slots: &[Slot], prefix: &mut Path, out: &mut Vec<Path>) {
    for (index, slot) in slots.iter().enumerate() {
        let Some(node) = slot.as_node() else {
            continue;
        };
        prefix.push(index);
        match node {
            SemanticNode::Table(table) if table.text_block => {
                if let Some(cell) = table.cell_at(0, 0) {
                    collect(&cell.contents, prefix, out);
                }
            }
            _ => {
                if node.text_node().map(|t| !t.is_space()).unwrap_or(false) {
                    out.push(prefix.clone());
                }
            }
        }
        prefix.pop();
    }
}

fn node_at<'a>(slots: &'a [Slot], path: &[usize]) -> Option<&'a SemanticNode> {
    let (&first, rest) = path.split_first()?;
    let node = slots.get(first)?.as_node()?;
    if rest.is_empty() {
        return Some(node);
    }
    match node {
        SemanticNode::Table(table) => node_at(&table.cells.first()?.contents, rest),
        _ => None,
    }
}

fn node_at_mut<'a>(slots: &'a mut [Slot], path: &[usize]) -> Option<&'a mut SemanticNode> {
    let (&first, rest) = path.split_first()?;
    let node = slots.get_mut(first)?.as_node_mut()?;
    if rest.is_empty() {
        return Some(node);
    }
    match node {
        SemanticNode::Table(table) => node_at_mut(&mut table.cells.first_mut()?.contents, rest),
        _ => None,
    }
}

fn text_at<'a>(slots: &'a [Slot], path: &[usize]) -> Option<&'a TextNode> {
    node_at(slots, path).and_then(SemanticNode::text_node)
}

/// Promote heading-like paragraphs of `slots` and register them on `scope`.
///
/// The last text node is never promoted since it has no following context.
/// Promoted headings receive their structure ID immediately; the level is
/// left for the document-wide level pass. Returns the number of promotions.
pub fn process_headings(scope: &mut PageScope, slots: &mut [Slot]) -> usize {
    let mut paths = Vec::new();
    collect(slots, &mut Vec::new(), &mut paths);
    if paths.len() < 2 {
        return 0;
    }

    let thresholds = scope.thresholds().clone();
    let mut promote = Vec::new();
    for index in 0..paths.len() - 1 {
        let Some(node) = node_at(slots, &paths[index]) else {
            continue;
        };
        let SemanticNode::Paragraph(text) = node else {
            continue;
        };
        let prev = match index {
            0 => None,
            _ => text_at(slots, &paths[index - 1]),
        };
        let Some(next) = text_at(slots, &paths[index + 1]) else {
            continue;
        };
        let mut probability = scope.model().heading_probability(text, prev, next);
        if is_labeled_line(text.first_line()) {
            probability += thresholds.bulleted_heading_bonus;
        }
        if probability > thresholds.heading {
            promote.push(index);
        }
    }

    let mut promoted = 0;
    for index in promote {
        let Some(node) = node_at_mut(slots, &paths[index]) else {
            continue;
        };
        let SemanticNode::Paragraph(text) = node else {
            continue;
        };
        let mut text = text.clone();
        let id = *text.id.get_or_insert_with(|| scope.next_id());
        scope.register_heading(id, text.style_key());
        *node = SemanticNode::Heading(Heading { text, level: None });
        promoted += 1;
    }
    if promoted > 0 {
        log::debug!("Page {}: promoted {} headings", scope.page + 1, promoted);
    }
    promoted
}
