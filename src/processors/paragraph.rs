//! Paragraph reduction.
//!
//! Every line starts as a one-line block. A fixed sequence of passes then
//! folds neighbouring blocks together, each pass with its own alignment
//! rule; later passes only see what earlier passes left unmerged. The
//! surviving blocks become paragraphs at the position of their first line.

use crate::model::{Alignment, SemanticNode, Slot, TextBlock, TextNode};
use crate::probability::ProbabilityModel;

use super::labels::is_labeled_line;
use super::Thresholds;

/// A block and the slot index of its first line.
struct Pending {
    first: usize,
    block: TextBlock,
}

struct Reducer<'a> {
    model: &'a dyn ProbabilityModel,
    threshold: f64,
}

/// Replace the line slots of `slots` with paragraph nodes.
///
/// Existing nodes are left untouched, so running the reducer twice is a
/// no-op on the second run.
pub fn process_paragraphs(slots: &mut Vec<Slot>, model: &dyn ProbabilityModel, thresholds: &Thresholds) {
    let blocks: Vec<Pending> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| match slot {
            Slot::Line(line) => Some(Pending {
                first: i,
                block: TextBlock::new(line.clone()),
            }),
            _ => None,
        })
        .collect();
    if blocks.is_empty() {
        return;
    }

    let reducer = Reducer {
        model,
        threshold: thresholds.different_lines,
    };
    let blocks = reducer.reduce(blocks);
    log::debug!("{} paragraphs from {} slots", blocks.len(), slots.len());

    for slot in slots.iter_mut() {
        if matches!(slot, Slot::Line(_)) {
            *slot = Slot::Removed;
        }
    }
    for pending in blocks {
        slots[pending.first] = Slot::Node(SemanticNode::Paragraph(TextNode::new(pending.block)));
    }
    crate::model::compact(slots);
}

/// Left fold over the blocks; `step` decides whether `next` joins `prev`
/// and may update the flags of `prev` before the lines are appended.
fn fold(blocks: Vec<Pending>, mut step: impl FnMut(&mut TextBlock, &TextBlock) -> bool) -> Vec<Pending> {
    let mut out: Vec<Pending> = Vec::with_capacity(blocks.len());
    for next in blocks {
        if let Some(prev) = out.last_mut() {
            if step(&mut prev.block, &next.block) {
                prev.block.push_lines(next.block.into_lines());
                continue;
            }
        }
        out.push(next);
    }
    out
}

fn is_single(block: &TextBlock) -> bool {
    block.line_count() == 1
}

fn overlapping(prev: &TextBlock, next: &TextBlock) -> bool {
    prev.last_line().bbox.horizontal_overlap(&next.first_line().bbox)
}

fn close_style(prev: &TextBlock, next: &TextBlock) -> bool {
    (prev.font_size() - next.font_size()).abs() <= 0.1
        && (prev.first_line().font_weight() - next.first_line().font_weight()).abs() <= 0.1
}

impl Reducer<'_> {
    fn reduce(&self, blocks: Vec<Pending>) -> Vec<Pending> {
        // ==== 1. justify ====
        let blocks = fold(blocks, |prev, next| {
            let merge = self.alignment(prev, next) == Alignment::Justify
                && self.probability(prev, next, false, false) > self.threshold;
            if merge {
                prev.alignment = Some(Alignment::Justify);
            }
            merge
        });

        // ==== 2. first and last lines of justified blocks ====
        let blocks = fold(blocks, |prev, next| {
            let alignment = self.alignment(prev, next);
            let probability = self.probability(prev, next, false, false);
            if is_single(prev)
                && alignment == Alignment::Right
                && next.alignment == Some(Alignment::Justify)
                && !next.has_start_line
                && probability > self.threshold
            {
                prev.alignment = Some(Alignment::Justify);
                prev.has_start_line = true;
                prev.has_end_line = next.has_end_line;
                true
            } else if is_single(next)
                && alignment == Alignment::Left
                && prev.alignment == Some(Alignment::Justify)
                && !prev.has_end_line
                && probability > self.threshold
            {
                prev.has_end_line = true;
                true
            } else {
                false
            }
        });

        // ==== 3-4. left alignment, strict then loose style ====
        let mut blocks = blocks;
        for check_style in [true, false] {
            blocks = fold(blocks, |prev, next| {
                let merge = self.left_aligned(prev, next, check_style);
                if merge {
                    prev.alignment = Some(Alignment::Left);
                    prev.has_end_line = false;
                }
                merge
            });
        }

        // ==== 5. first line of a left-aligned block ====
        let blocks = fold(blocks, |prev, next| {
            let merge = is_single(prev)
                && prev.last_line().left() > next.first_line().left()
                && self.probability(prev, next, false, false) >= self.threshold
                && !is_labeled_line(next.first_line())
                && !next.has_start_line
                && next.alignment == Some(Alignment::Left)
                && overlapping(prev, next);
            if merge {
                prev.alignment = Some(Alignment::Left);
                prev.has_start_line = true;
            }
            merge
        });

        // ==== 6. two single-line paragraphs ====
        let blocks = fold(blocks, |prev, next| {
            let merge = is_single(prev)
                && is_single(next)
                && self.probability(prev, next, false, false) >= self.threshold
                && !is_labeled_line(next.first_line())
                && prev.last_line().left() >= next.first_line().left()
                && prev.last_line().right() >= next.first_line().right();
            if merge {
                prev.alignment = Some(Alignment::Left);
                prev.has_start_line = true;
                prev.has_end_line = true;
            }
            merge
        });

        // ==== 7. bulleted paragraphs ====
        let blocks = fold(blocks, |prev, next| {
            let merge = self.probability(prev, next, false, false) >= self.threshold
                && is_single(prev)
                && !next.has_start_line
                && !is_labeled_line(next.first_line())
                && is_labeled_line(prev.first_line())
                && prev.last_line().left() <= next.first_line().left()
                && (next.alignment == Some(Alignment::Left) || is_single(next))
                && overlapping(prev, next);
            if merge {
                prev.alignment = Some(Alignment::Left);
                prev.has_start_line = true;
            }
            merge
        });

        // ==== 8. center ====
        let blocks = fold(blocks, |prev, next| {
            let merge = self.alignment(prev, next) == Alignment::Center
                && self.probability(prev, next, false, false) > self.threshold;
            if merge {
                prev.alignment = Some(Alignment::Center);
            }
            merge
        });

        // ==== 9. right ====
        let blocks = fold(blocks, |prev, next| {
            let keeps_right = |b: &TextBlock| is_single(b) || b.alignment == Some(Alignment::Right);
            let merge = self.alignment(prev, next) == Alignment::Right
                && self.probability(prev, next, false, false) >= self.threshold
                && keeps_right(prev)
                && keeps_right(next);
            if merge {
                prev.alignment = Some(Alignment::Right);
            }
            merge
        });

        // ==== 10. everything else ====
        fold(blocks, |prev, next| {
            close_style(prev, next)
                && self.probability(prev, next, false, false) >= self.threshold
                && !is_labeled_line(next.first_line())
                && overlapping(prev, next)
                && (is_single(prev) || prev.alignment.is_none())
                && (is_single(next) || next.alignment.is_none())
        })
    }

    fn alignment(&self, prev: &TextBlock, next: &TextBlock) -> Alignment {
        self.model.alignment(prev.last_line(), next.first_line())
    }

    fn left_aligned(&self, prev: &TextBlock, next: &TextBlock, check_style: bool) -> bool {
        if self.alignment(prev, next) != Alignment::Left {
            return false;
        }
        let same_style = prev.last_line().same_style(next.first_line());
        if check_style && !same_style {
            return false;
        }
        if is_labeled_line(next.first_line()) {
            return false;
        }
        let mut should_be_close = false;
        for block in [prev, next] {
            if is_single(block) {
                continue;
            }
            match block.alignment {
                Some(Alignment::Justify) => {
                    if !same_style {
                        return false;
                    }
                    should_be_close = true;
                }
                Some(Alignment::Left) => {}
                _ => return false,
            }
        }
        self.probability(prev, next, true, should_be_close) >= self.threshold
    }

    /// Probability that `next` continues the paragraph of `prev`.
    fn probability(&self, prev: &TextBlock, next: &TextBlock, multi_line: bool, should_be_close: bool) -> f64 {
        if prev.hidden() != next.hidden() {
            return 0.0;
        }
        match (is_single(prev), is_single(next)) {
            (true, true) => self.model.leading_probability(prev.last_line(), next.first_line()),
            (true, false) | (false, true) => self.model.merge_probability(prev, next, should_be_close),
            (false, false) if multi_line => self.model.merge_probability(prev, next, false),
            _ => 0.0,
        }
    }
}
