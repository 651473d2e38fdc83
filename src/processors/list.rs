//! List detection.
//!
//! Label lines are grouped into intervals: each new labeled line looks
//! back over the open intervals (most recently extended first) for one
//! whose last label it continues. Intervals with at least two items are
//! then materialized into list nodes, top level intervals last so that
//! nested lists end up inside the items of their parent.

use std::sync::OnceLock;

use regex::Regex;

use crate::context::{commit, IdSource, PageScope};
use crate::model::{
    compact, Alignment, ListItem, ListNode, NumberingStyle, SemanticNode, Slot, TextLine, TextNode,
};

use super::labels::{follows, is_decimal, is_labeled_line, is_one_sequence, Label, LabelKind};
use super::paragraph::process_paragraphs;

fn attachment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^붙\s*임\s*").expect("attachment pattern is valid"))
}

/// A candidate label line.
#[derive(Debug, Clone)]
struct ItemInfo {
    /// Content sequence (page) of the line
    seq: usize,
    /// Slot index within the sequence
    index: usize,
    /// The line as seen by label matching
    line: TextLine,
    /// `None` when the label could not be read
    label: Option<Label>,
    /// Characters stripped before the label
    skipped: usize,
}

impl ItemInfo {
    fn new(seq: usize, index: usize, line: &TextLine) -> Self {
        let mut skipped = 0;
        let mut stripped = None;
        if let Some(found) = attachment_pattern().find(&line.text) {
            if found.end() < line.text.len() {
                skipped = line.text[..found.end()].chars().count();
                stripped = Some(line.without_prefix(skipped));
            }
        }
        let line = stripped.unwrap_or_else(|| line.clone());
        let label = match Label::parse(&line.text) {
            Ok(label) => label,
            Err(err) => {
                log::warn!("Malformed list label, starting new list: {:?} ({})", line.text, err);
                None
            }
        };
        Self {
            seq,
            index,
            line,
            label,
            skipped,
        }
    }

    fn label_len(&self) -> usize {
        self.skipped + self.label.as_ref().map(|l| l.len).unwrap_or(0)
    }
}

#[derive(Debug)]
struct Interval {
    items: Vec<ItemInfo>,
    style: Option<NumberingStyle>,
}

impl Interval {
    fn last(&self) -> &ItemInfo {
        &self.items[self.items.len() - 1]
    }

    /// Style under which `info` extends this interval.
    fn accepts(&self, info: &ItemInfo, shifted: bool, allow_unordered: bool) -> Option<NumberingStyle> {
        let prev = self.last().label.as_ref()?;
        let next = info.label.as_ref()?;
        if next.is_bullet() && (shifted || !allow_unordered) {
            return None;
        }
        follows(prev, next, self.style)
    }

    fn numbering_style(&self) -> NumberingStyle {
        self.style.unwrap_or(NumberingStyle::Unknown)
    }

    fn common_prefix(&self) -> String {
        match self.items[0].label.as_ref().map(|l| (l.kind, l.prefix.as_str())) {
            Some((LabelKind::Bullet(glyph), _)) => glyph.to_string(),
            Some((_, prefix)) => prefix.to_string(),
            None => String::new(),
        }
    }

    /// Lists made only of decimal numbers are tables of figures, not lists.
    fn is_decimal_column(&self) -> bool {
        self.items.iter().all(|info| is_decimal(&info.line.text))
    }
}

/// Group label lines into intervals of at least two items.
///
/// The result is in reverse creation order.
fn collect_intervals(infos: Vec<ItemInfo>, scope: &PageScope) -> Vec<Interval> {
    let thresholds = scope.thresholds();
    let mut intervals: Vec<Interval> = Vec::new();
    // interval indexes in the order they were created or extended
    let mut recent: Vec<usize> = Vec::new();

    for info in infos {
        let max_x_gap = thresholds.max_x_gap(info.line.font_size());
        let mut joined = None;
        let mut same_left_seen = false;
        let mut same_difference_required = false;
        let mut allow_unordered = true;
        let mut previous_difference: Option<f64> = None;

        for &candidate in recent.iter().rev() {
            let interval = &intervals[candidate];
            let difference = info.line.left() - interval.last().line.left();
            let same_left = difference.abs() <= max_x_gap;
            if difference.abs() <= 4.0 * max_x_gap {
                if let Some(style) = interval.accepts(&info, !same_left, allow_unordered) {
                    joined = Some((candidate, style));
                    break;
                }
            }
            if same_difference_required
                && !previous_difference
                    .map(|p| crate::model::are_close(p, difference, crate::model::COORD_EPSILON))
                    .unwrap_or(false)
            {
                break;
            }
            if difference > max_x_gap {
                allow_unordered = false;
                same_difference_required = true;
            }
            previous_difference = Some(difference);
            if same_left {
                same_left_seen = true;
            } else if same_left_seen {
                allow_unordered = false;
            }
            if interval.items.len() > 1 && same_left && interval.style != Some(NumberingStyle::Unordered) {
                allow_unordered = false;
            }
        }

        match joined {
            Some((candidate, style)) => {
                let interval = &mut intervals[candidate];
                interval.items.push(info);
                interval.style = Some(style);
                recent.push(candidate);
            }
            None => {
                intervals.push(Interval {
                    items: vec![info],
                    style: None,
                });
                recent.push(intervals.len() - 1);
            }
        }
    }

    let mut kept: Vec<Interval> = intervals.into_iter().filter(|i| i.items.len() > 1).collect();
    kept.reverse();
    kept
}

/// Whether `line` continues the body of `item`.
fn is_item_line(scope: &PageScope, item: &ListItem, line: &TextLine, next: Option<&TextLine>) -> bool {
    let thresholds = scope.thresholds();
    let model = scope.model();
    let last = item.last_line();
    if model.leading_probability(last, line) < thresholds.list_item {
        return false;
    }
    if let Some(next) = next {
        let step = (last.baseline() - line.baseline()).abs();
        if step > thresholds.list_baseline_ratio * (line.baseline() - next.baseline()).abs() {
            return false;
        }
    }
    if item.line_count() > 1 {
        if !matches!(model.alignment(last, line), Alignment::Justify | Alignment::Left) {
            return false;
        }
    } else if line.left() < last.left() - thresholds.max_x_gap(last.font_size()) {
        return false;
    }
    !is_labeled_line(line) && !line.list_line
}

/// Absorb the slots between an item label and the next label.
///
/// Lines continue the item body while the continuation test holds; from
/// the first failure on, lines and other content become item contents.
fn absorb_between(scope: &PageScope, slots: &mut [Slot], start: usize, end: usize, item: &mut ListItem) {
    let mut continuing = true;
    let mut pending: Option<TextLine> = None;
    for index in start + 1..end {
        match slots[index].take() {
            Slot::Line(line) => {
                if let Some(prev) = pending.take() {
                    if continuing && is_item_line(scope, item, &prev, Some(&line)) {
                        item.push_line(prev);
                    } else {
                        continuing = false;
                        item.contents.push(Slot::Line(prev));
                    }
                }
                pending = Some(line);
            }
            Slot::Removed => {}
            other => {
                if let Some(prev) = pending.take() {
                    if continuing && is_item_line(scope, item, &prev, None) {
                        item.push_line(prev);
                    } else {
                        continuing = false;
                        item.contents.push(Slot::Line(prev));
                    }
                }
                item.contents.push(other);
            }
        }
    }
    if let Some(prev) = pending {
        if continuing && is_item_line(scope, item, &prev, None) {
            item.push_line(prev);
        } else {
            item.contents.push(Slot::Line(prev));
        }
    }
}

/// Absorb the continuation lines after the last label of a sequence.
///
/// Only consecutive lines are taken; anything else is left in place.
fn absorb_trailing(scope: &PageScope, slots: &mut [Slot], start: usize, end: usize, item: &mut ListItem) {
    let mut previous: Option<usize> = None;
    for index in start + 1..end {
        if slots[index].as_line().is_none() {
            continue;
        }
        if let Some(prev) = previous {
            let accepted = match (slots[prev].as_line(), slots[index].as_line()) {
                (Some(line), Some(next)) => is_item_line(scope, item, line, Some(next)),
                _ => false,
            };
            if !accepted {
                return;
            }
            if let Slot::Line(line) = slots[prev].take() {
                item.push_line(line);
            }
        }
        previous = Some(index);
    }
    if let Some(prev) = previous {
        let accepted = slots[prev]
            .as_line()
            .map(|line| is_item_line(scope, item, line, None))
            .unwrap_or(false);
        if accepted {
            if let Slot::Line(line) = slots[prev].take() {
                item.push_line(line);
            }
        }
    }
}

fn item_from_text(text: TextNode) -> ListItem {
    let mut lines = text.block.into_lines().into_iter();
    let mut item = match lines.next() {
        Some(first) => ListItem::new(first),
        None => ListItem::new(TextLine::from_run(crate::model::TextRun::new(0, text.bbox, "", 0.0))),
    };
    item.push_lines(lines);
    item
}

/// Build one list from `items`, all of which live in `slots`.
///
/// Returns the slot index the list belongs at, which is the slot of its
/// first item, left empty for the caller.
fn build_list(
    scope: &PageScope,
    interval: &Interval,
    items: &[ItemInfo],
    slots: &mut [Slot],
) -> Option<(usize, ListNode)> {
    let mut list = ListNode::new(interval.numbering_style(), interval.common_prefix());
    let mut anchor = None;
    for (k, info) in items.iter().enumerate() {
        let last = k + 1 == items.len();
        let end = if last { slots.len() } else { items[k + 1].index };
        let mut item = match slots[info.index].take() {
            Slot::Line(line) => ListItem::new(line),
            Slot::Node(SemanticNode::Paragraph(text)) => item_from_text(text),
            Slot::Node(SemanticNode::Heading(heading)) => item_from_text(heading.text),
            Slot::Node(SemanticNode::Caption(caption)) => item_from_text(caption.text),
            other => {
                slots[info.index] = other;
                log::info!("List item is connected with different lists");
                continue;
            }
        };
        anchor.get_or_insert(info.index);
        if last {
            absorb_trailing(scope, slots, info.index, end, &mut item);
        } else {
            absorb_between(scope, slots, info.index, end, &mut item);
        }
        item.label_len = info.label_len();
        list.push_item(item);
    }
    let anchor = anchor?;
    if list.is_empty() {
        log::warn!("List is not added to contents");
        return None;
    }
    list.id = Some(scope.next_id());
    Some((anchor, list))
}

/// Run paragraphs, text-node lists and neighbour stitching over the
/// contents of a list item.
fn process_item_contents(scope: &PageScope, contents: &mut Vec<Slot>) {
    if contents.is_empty() {
        return;
    }
    process_paragraphs(contents, scope.model(), scope.thresholds());
    process_text_node_lists(scope, contents);
    commit(scope, contents);
    check_neighbor_lists(scope, std::slice::from_mut(contents));
}

fn connect(prev: &mut ListNode, next: &mut ListNode, ids: &dyn IdSource) {
    let prev_id = *prev.id.get_or_insert_with(|| ids.next_id());
    let next_id = *next.id.get_or_insert_with(|| ids.next_id());
    prev.next_id = Some(next_id);
    next.prev_id = Some(prev_id);
}

fn list_at(contents: &mut [Vec<Slot>], seq: usize, index: usize) -> Option<&mut ListNode> {
    match contents.get_mut(seq)?.get_mut(index)? {
        Slot::Node(SemanticNode::List(list)) => Some(list),
        _ => None,
    }
}

/// Detect lists from the label lines of one or more content sequences.
///
/// An interval spanning several sequences (pages) becomes one list per
/// sequence, linked through their previous/next IDs. Requires line
/// slots; run before paragraphs.
pub fn process_lists(scope: &PageScope, contents: &mut [Vec<Slot>]) -> usize {
    let mut infos = Vec::new();
    for (seq, slots) in contents.iter().enumerate() {
        for (index, slot) in slots.iter().enumerate() {
            let Slot::Line(line) = slot else {
                continue;
            };
            if line.text.is_empty() || line.hidden() {
                continue;
            }
            let info = ItemInfo::new(seq, index, line);
            if info.label.is_some() {
                infos.push(info);
            }
        }
    }
    let intervals = collect_intervals(infos, scope);

    for interval in &intervals {
        for info in &interval.items {
            if let Some(Slot::Line(line)) = contents[info.seq].get_mut(info.index) {
                line.list_line = true;
            }
        }
    }

    let mut created = 0;
    for interval in &intervals {
        if interval.is_decimal_column() {
            continue;
        }
        let mut previous: Option<(usize, usize)> = None;
        for part in interval.items.chunk_by(|a, b| a.seq == b.seq) {
            let seq = part[0].seq;
            let Some((anchor, mut list)) = build_list(scope, interval, part, &mut contents[seq]) else {
                continue;
            };
            for item in &mut list.items {
                process_item_contents(scope, &mut item.contents);
            }
            if let Some((prev_seq, prev_index)) = previous {
                if let Some(prev) = list_at(contents, prev_seq, prev_index) {
                    connect(prev, &mut list, scope);
                }
            }
            contents[seq][anchor] = Slot::Node(SemanticNode::List(list));
            previous = Some((seq, anchor));
            created += 1;
        }
    }
    for slots in contents.iter_mut() {
        compact(slots);
    }
    if created > 0 {
        log::debug!("Detected {} lists from label lines", created);
    }
    created
}

/// Turn runs of consecutive text nodes whose first lines carry one label
/// sequence into lists.
pub fn process_text_node_lists(scope: &PageScope, slots: &mut Vec<Slot>) -> usize {
    let mut infos: Vec<ItemInfo> = Vec::new();
    for (index, slot) in slots.iter().enumerate() {
        let Some(text) = slot.as_node().and_then(SemanticNode::text_node) else {
            continue;
        };
        let Some(line) = text.lines().iter().find(|l| !l.is_empty()) else {
            continue;
        };
        infos.push(ItemInfo::new(0, index, line));
    }

    let mut runs: Vec<Interval> = Vec::new();
    let mut current: Option<Interval> = None;
    for info in infos {
        if let Some(run) = current.as_mut() {
            if let Some(style) = run.accepts(&info, false, true) {
                run.items.push(info);
                run.style = Some(style);
                continue;
            }
        }
        if let Some(run) = current.take() {
            runs.push(run);
        }
        current = info.label.is_some().then(|| Interval {
            items: vec![info],
            style: None,
        });
    }
    runs.extend(current);

    let mut created = 0;
    for run in runs.iter().filter(|r| r.items.len() > 1 && !r.is_decimal_column()) {
        let Some((anchor, mut list)) = build_list(scope, run, &run.items, slots) else {
            continue;
        };
        for item in &mut list.items {
            commit(scope, &mut item.contents);
        }
        slots[anchor] = Slot::Node(SemanticNode::List(list));
        created += 1;
    }
    compact(slots);
    created
}

/// Slots the neighbour scan looks through.
fn is_transparent(slot: &Slot) -> bool {
    use crate::model::ContentPrimitive;
    matches!(
        slot,
        Slot::Removed
            | Slot::Node(SemanticNode::HeaderFooter(_))
            | Slot::Primitive(ContentPrimitive::LineSegment(_))
            | Slot::Primitive(ContentPrimitive::LineArt(_))
            | Slot::Primitive(ContentPrimitive::Image(_))
    )
}

fn first_labels(item: &ListItem) -> Option<Label> {
    Label::parse(&item.first_line().text).ok().flatten()
}

/// Whether a stray text node between two lists belongs to them.
fn is_middle_part(scope: &PageScope, middle: &TextNode, next: &ListNode) -> bool {
    if middle.bbox.left < next.left() || middle.page() != next.page() {
        return false;
    }
    if let Some(item) = next.items.iter().find(|i| i.line_count() > 1) {
        let gap = scope.thresholds().max_x_gap(item.font_size().max(middle.font_size()));
        if let Some(second) = item.body.line(1) {
            if (second.left() - middle.bbox.left).abs() > gap {
                return false;
            }
        }
    }
    true
}

/// Whether `next` continues `prev` as one list.
fn is_neighbor_lists(scope: &PageScope, prev: &ListNode, next: &ListNode, middle: Option<&TextNode>) -> bool {
    let (Some(last), Some(first)) = (prev.items.last(), next.items.first()) else {
        return false;
    };
    let mut probe = Vec::with_capacity(4);
    if prev.items.len() > 1 {
        probe.push(&prev.items[prev.items.len() - 2]);
    }
    probe.push(last);
    probe.push(first);
    if let Some(second) = next.items.get(1) {
        probe.push(second);
    }
    let labels: Option<Vec<Label>> = probe.into_iter().map(first_labels).collect();
    if !labels.map(|l| is_one_sequence(&l)).unwrap_or(false) {
        return false;
    }
    middle.map(|m| is_middle_part(scope, m, next)).unwrap_or(true)
}

/// Attach the stray text between two lists to the lists.
fn absorb_middle(prev: &mut ListNode, next: &mut ListNode, middle: TextNode) {
    if let Some(last) = prev.items.last_mut() {
        if last.page() == middle.page() && last.bbox.horizontal_overlap(&middle.bbox) {
            last.push_lines(middle.block.into_lines());
            prev.bbox = prev.bbox.union(&middle.bbox);
            return;
        }
    }
    let id = middle.id;
    let mut item = item_from_text(middle);
    item.id = id;
    next.insert_first(item);
}

fn take_text(contents: &mut [Vec<Slot>], (seq, index): (usize, usize)) -> Option<TextNode> {
    let slot = contents.get_mut(seq)?.get_mut(index)?;
    match slot.take() {
        Slot::Node(SemanticNode::Paragraph(text)) => Some(text),
        Slot::Node(SemanticNode::Heading(heading)) => Some(heading.text),
        Slot::Node(SemanticNode::Caption(caption)) => Some(caption.text),
        other => {
            *slot = other;
            None
        }
    }
}

fn text_at(contents: &[Vec<Slot>], (seq, index): (usize, usize)) -> Option<&TextNode> {
    contents.get(seq)?.get(index)?.as_node()?.text_node()
}

fn take_list(contents: &mut [Vec<Slot>], (seq, index): (usize, usize)) -> Option<ListNode> {
    let slot = contents.get_mut(seq)?.get_mut(index)?;
    match slot.take() {
        Slot::Node(SemanticNode::List(list)) => Some(list),
        other => {
            *slot = other;
            None
        }
    }
}

fn put_list(contents: &mut [Vec<Slot>], (seq, index): (usize, usize), list: ListNode) {
    contents[seq][index] = Slot::Node(SemanticNode::List(list));
}

/// Stitch `current` onto `previous`; returns whether `current` survives
/// as a separate list.
fn stitch(
    scope: &PageScope,
    contents: &mut [Vec<Slot>],
    previous: (usize, usize),
    current: (usize, usize),
    middle: Option<(usize, usize)>,
) -> bool {
    let already_linked = {
        let (Some(prev), Some(cur)) = (list_ref(contents, previous), list_ref(contents, current)) else {
            return true;
        };
        let middle_text = middle.and_then(|m| text_at(contents, m));
        if prev.next_id.is_none() && cur.prev_id.is_none() {
            if !is_neighbor_lists(scope, prev, cur, middle_text) {
                return true;
            }
            false
        } else if prev.next_id.is_some() && prev.next_id == cur.id {
            match middle_text {
                Some(text) if is_middle_part(scope, text, cur) => true,
                _ => return true,
            }
        } else {
            return true;
        }
    };

    let (Some(mut prev), Some(mut cur)) = (take_list(contents, previous), take_list(contents, current)) else {
        return true;
    };
    if let Some(text) = middle.and_then(|m| take_text(contents, m)) {
        absorb_middle(&mut prev, &mut cur, text);
    }
    if already_linked {
        put_list(contents, previous, prev);
        put_list(contents, current, cur);
        return true;
    }

    let survives = if prev.page() == cur.page() && prev.bbox.horizontal_overlap(&cur.bbox) {
        prev.append(cur);
        false
    } else {
        connect(&mut prev, &mut cur, scope);
        put_list(contents, current, cur);
        true
    };
    put_list(contents, previous, prev);
    survives
}

fn list_ref(contents: &[Vec<Slot>], (seq, index): (usize, usize)) -> Option<&ListNode> {
    match contents.get(seq)?.get(index)? {
        Slot::Node(SemanticNode::List(list)) => Some(list),
        _ => None,
    }
}

/// Stitch adjacent lists that continue each other.
///
/// Same-page horizontally overlapping lists are merged; otherwise the
/// lists are linked through their IDs. One stray text node between the
/// lists may be absorbed. Header/footer nodes and line primitives are
/// transparent to the scan.
pub fn check_neighbor_lists(scope: &PageScope, contents: &mut [Vec<Slot>]) {
    let mut previous: Option<(usize, usize)> = None;
    let mut middle: Option<(usize, usize)> = None;
    for seq in 0..contents.len() {
        for index in 0..contents[seq].len() {
            let slot = &contents[seq][index];
            if matches!(slot, Slot::Node(SemanticNode::List(_))) {
                let survives = match previous {
                    Some(prev) => stitch(scope, contents, prev, (seq, index), middle),
                    None => true,
                };
                if survives {
                    previous = Some((seq, index));
                }
                middle = None;
            } else if is_transparent(slot) {
                continue;
            } else if middle.is_none() && slot.as_node().and_then(SemanticNode::text_node).is_some() {
                middle = Some((seq, index));
            } else {
                middle = None;
                previous = None;
            }
        }
    }
    for slots in contents.iter_mut() {
        compact(slots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcessingContext;
    use crate::model::{BoundingBox, TextBlock, TextRun};

    fn text_line(page: u32, text: &str, left: f64, top: f64) -> TextLine {
        let right = left + 6.0 * text.chars().count() as f64;
        TextLine::from_run(TextRun::new(0, BoundingBox::new(page, left, top - 12.0, right, top), text, 10.0))
    }

    fn line(text: &str, left: f64, top: f64) -> Slot {
        Slot::Line(text_line(0, text, left, top))
    }

    fn lists(slots: &[Slot]) -> Vec<&ListNode> {
        slots
            .iter()
            .filter_map(|s| match s {
                Slot::Node(SemanticNode::List(list)) => Some(list),
                _ => None,
            })
            .collect()
    }

    fn list_node(page: u32, labels: &[&str], top: f64) -> ListNode {
        let mut list = ListNode::new(NumberingStyle::Arabic, "");
        for (i, label) in labels.iter().enumerate() {
            list.push_item(ListItem::new(text_line(page, label, 50.0, top - 14.0 * i as f64)));
        }
        list
    }

    // ==== Interval Tests ====

    #[test]
    fn test_numbered_lines_form_list() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![vec![
            line("1. First", 50.0, 700.0),
            line("2. Second", 50.0, 686.0),
            line("3. Third", 50.0, 672.0),
        ]];
        assert_eq!(process_lists(&scope, &mut contents), 1);
        let found = lists(&contents[0]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].items.len(), 3);
        assert_eq!(found[0].numbering_style, NumberingStyle::Arabic);
        assert_eq!(found[0].items[0].label_len, 3);
        assert!(found[0].id.is_some());
        assert!(found[0].items.iter().all(|i| i.first_line().list_line));
    }

    #[test]
    fn test_continuation_line_joins_item() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![vec![
            line("1. First item", 50.0, 700.0),
            line("continues here", 62.0, 686.0),
            line("2. Second", 50.0, 672.0),
        ]];
        process_lists(&scope, &mut contents);
        let found = lists(&contents[0]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].items[0].line_count(), 2);
        assert!(found[0].items[0].contents.is_empty());
    }

    #[test]
    fn test_single_label_is_not_a_list() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![vec![line("1. Alone", 50.0, 700.0), line("plain text", 50.0, 686.0)]];
        assert_eq!(process_lists(&scope, &mut contents), 0);
        assert_eq!(contents[0].len(), 2);
        assert!(contents[0].iter().all(|s| s.as_line().is_some()));
    }

    #[test]
    fn test_decimal_column_rejected() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![vec![line("1.5", 50.0, 700.0), line("2.5", 50.0, 686.0)]];
        assert_eq!(process_lists(&scope, &mut contents), 0);
    }

    #[test]
    fn test_list_across_pages_is_linked() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![
            vec![
                Slot::Line(text_line(0, "1. a", 50.0, 100.0)),
                Slot::Line(text_line(0, "2. b", 50.0, 86.0)),
            ],
            vec![
                Slot::Line(text_line(1, "3. c", 50.0, 760.0)),
                Slot::Line(text_line(1, "4. d", 50.0, 746.0)),
            ],
        ];
        assert_eq!(process_lists(&scope, &mut contents), 2);
        let first = lists(&contents[0])[0].clone();
        let second = lists(&contents[1])[0].clone();
        assert_eq!(first.next_id, second.id);
        assert_eq!(second.prev_id, first.id);
        assert_eq!(second.items.len(), 2);
    }

    #[test]
    fn test_attachment_prefix_stripped() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![vec![line("붙임 1. 서류", 50.0, 700.0), line("붙임 2. 목록", 50.0, 686.0)]];
        assert_eq!(process_lists(&scope, &mut contents), 1);
        assert_eq!(lists(&contents[0])[0].items[0].label_len, 6);
    }

    // ==== Text Node List Tests ====

    #[test]
    fn test_paragraphs_with_labels_become_list() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let paragraph = |first: &str, top: f64| {
            let block = TextBlock::from_lines(vec![
                text_line(0, first, 50.0, top),
                text_line(0, "wrapped text", 62.0, top - 14.0),
            ])
            .unwrap();
            Slot::Node(SemanticNode::Paragraph(TextNode::new(block)))
        };
        let mut slots = vec![paragraph("a) alpha", 700.0), paragraph("b) beta", 660.0)];
        assert_eq!(process_text_node_lists(&scope, &mut slots), 1);
        assert_eq!(slots.len(), 1);
        let found = lists(&slots);
        assert_eq!(found[0].items.len(), 2);
        assert_eq!(found[0].items[1].line_count(), 2);
        assert_eq!(found[0].numbering_style, NumberingStyle::LowerLatin);
    }

    // ==== Neighbour List Tests ====

    #[test]
    fn test_neighbor_lists_on_next_page_are_linked() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut prev = list_node(0, &["1. a", "2. b"], 100.0);
        prev.id = Some(scope.next_id());
        let mut cur = list_node(1, &["3. c", "4. d"], 760.0);
        cur.id = Some(scope.next_id());
        let mut contents = vec![
            vec![Slot::Node(SemanticNode::List(prev))],
            vec![Slot::Node(SemanticNode::List(cur))],
        ];
        check_neighbor_lists(&scope, &mut contents);
        let first = lists(&contents[0])[0];
        let second = lists(&contents[1])[0];
        assert_eq!(first.next_id, second.id);
        assert_eq!(second.prev_id, first.id);
    }

    #[test]
    fn test_neighbor_lists_on_same_page_merge() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let prev = list_node(0, &["1. a", "2. b"], 700.0);
        let cur = list_node(0, &["3. c", "4. d"], 600.0);
        let mut contents = vec![vec![
            Slot::Node(SemanticNode::List(prev)),
            Slot::Node(SemanticNode::List(cur)),
        ]];
        check_neighbor_lists(&scope, &mut contents);
        let found = lists(&contents[0]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].items.len(), 4);
    }

    #[test]
    fn test_unrelated_lists_stay_apart() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let prev = list_node(0, &["1. a", "2. b"], 700.0);
        let cur = list_node(0, &["a. x", "b. y"], 600.0);
        let mut contents = vec![vec![
            Slot::Node(SemanticNode::List(prev)),
            Slot::Node(SemanticNode::List(cur)),
        ]];
        check_neighbor_lists(&scope, &mut contents);
        assert_eq!(lists(&contents[0]).len(), 2);
    }

    fn paragraph(page: u32, text: &str, left: f64, top: f64) -> Slot {
        Slot::Node(SemanticNode::Paragraph(TextNode::new(TextBlock::new(text_line(page, text, left, top)))))
    }

    #[test]
    fn test_contained_middle_joins_last_item() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![vec![
            Slot::Node(SemanticNode::List(list_node(0, &["1. a", "2. b"], 700.0))),
            paragraph(0, "continued text", 62.0, 672.0),
            Slot::Node(SemanticNode::List(list_node(0, &["3. c", "4. d"], 600.0))),
        ]];
        check_neighbor_lists(&scope, &mut contents);
        assert_eq!(contents[0].len(), 1);
        let found = lists(&contents[0]);
        assert_eq!(found[0].items.len(), 4);
        assert_eq!(found[0].items[1].line_count(), 2);
        assert_eq!(found[0].items[1].last_line().text, "continued text");
    }

    #[test]
    fn test_middle_on_next_page_opens_next_list() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![
            vec![Slot::Node(SemanticNode::List(list_node(0, &["1. a", "2. b"], 100.0)))],
            vec![
                paragraph(1, "carried over", 50.0, 774.0),
                Slot::Node(SemanticNode::List(list_node(1, &["3. c", "4. d"], 760.0))),
            ],
        ];
        check_neighbor_lists(&scope, &mut contents);
        assert_eq!(contents[1].len(), 1);
        let first = lists(&contents[0])[0];
        let second = lists(&contents[1])[0];
        assert_eq!(second.items.len(), 3);
        assert_eq!(second.items[0].first_line().text, "carried over");
        assert_eq!(first.items.len(), 2);
        assert!(first.next_id.is_some());
        assert_eq!(first.next_id, second.id);
        assert_eq!(second.prev_id, first.id);
    }

    #[test]
    fn test_middle_left_of_next_list_stops_stitch() {
        let ctx = ProcessingContext::default();
        let scope = ctx.detached_scope(0);
        let mut contents = vec![vec![
            Slot::Node(SemanticNode::List(list_node(0, &["1. a", "2. b"], 700.0))),
            paragraph(0, "outdented remark", 20.0, 660.0),
            Slot::Node(SemanticNode::List(list_node(0, &["3. c", "4. d"], 600.0))),
        ]];
        check_neighbor_lists(&scope, &mut contents);
        assert_eq!(contents[0].len(), 3);
        let found = lists(&contents[0]);
        assert_eq!(found.len(), 2);
        assert!(found[0].next_id.is_none());
        assert_eq!(found[1].items.len(), 2);
        assert!(matches!(&contents[0][1], Slot::Node(SemanticNode::Paragraph(_))));
    }
}
