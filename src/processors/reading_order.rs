//! Reading-order sort: top to bottom, then left to right within a line.
//!
//! Boxes whose tops lie within the tolerance of a line's first box share
//! that line. Lines are formed first, then positions are sorted by the
//! total key (line, left, top, original index), so the comparator handed
//! to the sort is always transitive.

use crate::model::{BoundingBox, Slot};

/// Reading-order permutation of `boxes`.
///
/// Slots without a box (`None`) keep their relative order after every
/// boxed slot.
pub fn reading_order(boxes: &[Option<BoundingBox>], tolerance: f64) -> Vec<usize> {
    let mut by_top: Vec<usize> = (0..boxes.len()).filter(|&i| boxes[i].is_some()).collect();
    let top = |i: usize| boxes[i].map(|b| b.top).unwrap_or(f64::MIN);
    let left = |i: usize| boxes[i].map(|b| b.left).unwrap_or(f64::MAX);
    by_top.sort_by(|&a, &b| top(b).total_cmp(&top(a)).then(a.cmp(&b)));

    let mut line_of = vec![usize::MAX; boxes.len()];
    let mut line = 0usize;
    let mut anchor: Option<f64> = None;
    for &i in &by_top {
        match anchor {
            Some(a) if a - top(i) <= tolerance => {}
            Some(_) => {
                line += 1;
                anchor = Some(top(i));
            }
            None => anchor = Some(top(i)),
        }
        line_of[i] = line;
    }

    let mut order = by_top;
    order.sort_by(|&a, &b| {
        line_of[a]
            .cmp(&line_of[b])
            .then_with(|| left(a).total_cmp(&left(b)))
            .then_with(|| top(b).total_cmp(&top(a)))
            .then(a.cmp(&b))
    });
    order.extend((0..boxes.len()).filter(|&i| boxes[i].is_none()));
    order
}

/// Sort `slots` into reading order.
pub fn sort_slots(slots: &mut Vec<Slot>, tolerance: f64) {
    let boxes: Vec<Option<BoundingBox>> = slots.iter().map(|s| s.bbox().copied()).collect();
    let order = reading_order(&boxes, tolerance);
    let mut taken: Vec<Option<Slot>> = std::mem::take(slots).into_iter().map(Some).collect();
    slots.extend(order.into_iter().filter_map(|i| taken[i].take()));
}
