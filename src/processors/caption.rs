//! Caption linking for figures and tables.

use crate::context::{IdSource, PageScope};
use crate::model::{compact, BoundingBox, Caption, ContentPrimitive, Picture, SemanticNode, Slot, StructureId, TextNode};

/// The figure the scan currently looks for a caption of.
#[derive(Clone, Copy)]
struct Figure {
    id: Option<StructureId>,
    bbox: BoundingBox,
}

/// Replace the image primitives of `slots` with picture nodes.
///
/// Images thinner than the subtle-image ratio are rules or separators and
/// are dropped. Pictures get an ID and the next document-wide picture index.
fn commit_pictures(scope: &PageScope, slots: &mut Vec<Slot>) {
    let ratio = scope.thresholds().subtle_image_ratio;
    for slot in slots.iter_mut() {
        let Slot::Primitive(ContentPrimitive::Image(image)) = slot else {
            continue;
        };
        if image.is_subtle(ratio) {
            log::debug!("Page {}: ignoring subtle image {}", scope.page + 1, image.index);
            *slot = Slot::Removed;
            continue;
        }
        let picture = Picture {
            id: Some(scope.next_id()),
            bbox: image.bbox,
            index: scope.next_picture_index(),
            description: None,
        };
        *slot = Slot::Node(SemanticNode::Picture(picture));
    }
    compact(slots);
}

fn caption_text(slot: &Slot) -> Option<&TextNode> {
    match slot.as_node()? {
        SemanticNode::Paragraph(text) => Some(text),
        SemanticNode::Heading(heading) => Some(&heading.text),
        _ => None,
    }
}

/// Whether `text` lies outside the figure box grown by its font size.
fn is_outside(figure: &Figure, text: Option<&TextNode>) -> bool {
    match text {
        Some(text) => {
            let margin = text.font_size();
            !figure.bbox.contains(&text.bbox, margin, margin)
        }
        None => true,
    }
}

/// Turn the better scoring neighbour of `figure` into its caption.
fn accept(scope: &PageScope, slots: &mut [Slot], figure: &Figure, prev: Option<usize>, next: Option<usize>) -> bool {
    let score = |index: Option<usize>| -> f64 {
        index
            .and_then(|i| caption_text(&slots[i]))
            .map(|text| scope.model().caption_probability(text, &figure.bbox))
            .unwrap_or(0.0)
    };
    let (prev_score, next_score) = (score(prev), score(next));
    let (index, probability) = if prev_score > next_score {
        (prev, prev_score)
    } else {
        (next, next_score)
    };
    let Some(index) = index else {
        return false;
    };
    if probability < scope.thresholds().caption {
        return false;
    }
    let text = match slots[index].take() {
        Slot::Node(SemanticNode::Paragraph(text)) => text,
        Slot::Node(SemanticNode::Heading(heading)) => heading.text,
        other => {
            slots[index] = other;
            return false;
        }
    };
    slots[index] = Slot::Node(SemanticNode::Caption(Caption {
        text,
        linked_id: figure.id,
    }));
    true
}

/// Commit pictures and link captions to the pictures and tables of `slots`.
///
/// Non-text-block tables count as figures. A figure is closed when the next
/// figure starts or a text node falls outside it; the node before or after
/// the figure, whichever scores higher, becomes the caption when its
/// probability reaches the caption threshold. Returns the number of captions.
pub fn process_captions(scope: &PageScope, slots: &mut Vec<Slot>) -> usize {
    commit_pictures(scope, slots);

    let mut figure: Option<Figure> = None;
    let mut last_text: Option<usize> = None;
    let mut captions = 0usize;
    for index in 0..slots.len() {
        let next_figure = match slots[index].as_node() {
            Some(SemanticNode::Picture(picture)) => Some(Figure {
                id: picture.id,
                bbox: picture.bbox,
            }),
            Some(SemanticNode::Table(table)) if !table.text_block => Some(Figure {
                id: table.id,
                bbox: table.bbox,
            }),
            _ => None,
        };

        if let Some(next_figure) = next_figure {
            if let Some(current) = figure.take() {
                if is_outside(&current, last_text.and_then(|i| caption_text(&slots[i]))) {
                    captions += usize::from(accept(scope, slots, &current, last_text, None));
                    last_text = None;
                }
            }
            figure = Some(next_figure);
            continue;
        }

        let Some(text) = caption_text(&slots[index]) else {
            continue;
        };
        if text.is_space() || text.text().trim().is_empty() {
            continue;
        }
        if let Some(current) = figure {
            if is_outside(&current, Some(text)) {
                captions += usize::from(accept(scope, slots, &current, last_text, Some(index)));
                figure = None;
            }
        }
        last_text = Some(index);
    }
    if let Some(current) = figure {
        captions += usize::from(accept(scope, slots, &current, last_text, None));
    }
    if captions > 0 {
        log::debug!("Page {}: linked {} captions", scope.page + 1, captions);
    }
    captions
}
