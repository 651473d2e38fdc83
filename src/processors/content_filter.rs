//! Primitive-level filtering applied before any structural pass.

use std::collections::HashSet;

use crate::model::{BoundingBox, ContentPrimitive, Page, Slot};

use super::ProcessOptions;

fn is_degenerate(primitive: &ContentPrimitive) -> bool {
    let bbox = primitive.bbox();
    match primitive {
        // rules are legitimately zero-height or zero-width
        ContentPrimitive::LineSegment(_) => bbox.width() <= 0.0 && bbox.height() <= 0.0,
        _ => bbox.width() <= 0.0 || bbox.height() <= 0.0,
    }
}

fn is_background(bbox: &BoundingBox, page: &Page) -> bool {
    (bbox.width() > 0.5 * page.width && bbox.height() > 0.1 * page.height)
        || (bbox.width() > 0.1 * page.width && bbox.height() > 0.5 * page.height)
}

fn is_out_of_page(bbox: &BoundingBox, page: &Page) -> bool {
    bbox.right < 0.0 || bbox.left > page.width || bbox.top < 0.0 || bbox.bottom > page.height
}

fn compress_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !previous_space {
                out.push(c);
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    out
}

/// Drop primitives no pass should see.
///
/// Removes empty text runs, degenerate boxes, repeated identical runs
/// (fake-bold overprinting), and, depending on `options`, hidden text,
/// content outside the page and page-sized line-art backgrounds. Runs whose
/// contrast is below `min_contrast_ratio` count as hidden.
/// Returns the number of removed primitives.
pub fn filter_page(page: &mut Page, options: &ProcessOptions) -> usize {
    let before = page.slots.len();
    let mut seen_runs: HashSet<(String, [u64; 4])> = HashSet::new();
    let mut backgrounds = 0usize;
    let slots = std::mem::take(&mut page.slots);
    let mut kept = Vec::with_capacity(slots.len());
    for slot in slots {
        let Slot::Primitive(mut primitive) = slot else {
            kept.push(slot);
            continue;
        };
        if is_degenerate(&primitive) {
            continue;
        }
        if options.filter_out_of_page && is_out_of_page(primitive.bbox(), page) {
            continue;
        }
        match &mut primitive {
            ContentPrimitive::TextRun(run) => {
                if run
                    .contrast_ratio
                    .is_some_and(|ratio| ratio < options.thresholds.min_contrast_ratio)
                {
                    run.hidden = true;
                }
                if run.text.is_empty() || (options.drop_hidden_text && run.hidden) {
                    continue;
                }
                let key = (
                    run.text.clone(),
                    [
                        run.bbox.left.to_bits(),
                        run.bbox.bottom.to_bits(),
                        run.bbox.right.to_bits(),
                        run.bbox.top.to_bits(),
                    ],
                );
                if !seen_runs.insert(key) {
                    continue;
                }
                if run.text.contains("  ") {
                    run.text = compress_spaces(&run.text);
                }
            }
            ContentPrimitive::LineArt(art) => {
                if options.remove_backgrounds && is_background(&art.bbox, page) {
                    backgrounds += 1;
                    continue;
                }
            }
            _ => {}
        }
        kept.push(Slot::Primitive(primitive));
    }
    page.slots = kept;
    if backgrounds > 0 {
        log::debug!("Page {}: removed {} background shapes", page.number + 1, backgrounds);
    }
    before - page.slots.len()
}
