//! Running header and footer detection.
//!
//! Pages are swept in reading order from the top (headers) and from the
//! bottom (footers). Depth grows on a page while its item at that depth
//! repeats on a neighbouring page: the same text, a page number advancing
//! with the page distance, or a non-text item on the same box. Two-page
//! layouts are covered by also comparing with the page two positions away.

use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;

use crate::context::{IdSource, ProcessingContext};
use crate::model::{
    are_close, BoundingBox, FurnitureKind, HeaderFooter, Page, SemanticNode, Slot, COORD_EPSILON,
};

use super::labels::ordinal_readings;
use super::process_contents;
use super::reading_order::reading_order;

const FONT_SIZE_EPSILON: f64 = 0.01;

/// What the sweep compares at one depth.
#[derive(Debug, Clone)]
enum Item {
    Text { bbox: BoundingBox, size: f64, text: String },
    Other(BoundingBox),
}

impl Item {
    fn from_slot(slot: &Slot) -> Option<Item> {
        if slot.is_removed() || slot.is_line_decoration() || slot.is_furniture() {
            return None;
        }
        let bbox = *slot.bbox()?;
        let text = match slot {
            Slot::Line(line) => Some((line.font_size(), line.text.clone())),
            Slot::Node(node) => node.text_node().map(|t| (t.font_size(), t.text())),
            _ => None,
        };
        Some(match text {
            Some((size, text)) => Item::Text {
                bbox,
                size,
                text: normalize(&text),
            },
            None => Item::Other(bbox),
        })
    }

    fn bbox(&self) -> &BoundingBox {
        match self {
            Item::Text { bbox, .. } | Item::Other(bbox) => bbox,
        }
    }
}

fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().trim().to_string()
}

fn same_token(x: char, y: char) -> bool {
    match (x.is_ascii_digit(), y.is_ascii_digit()) {
        (true, true) => true,
        (false, false) => x.is_alphanumeric() && y.is_alphanumeric(),
        _ => false,
    }
}

/// Whether `b` is `a` with its page number advanced by `increment`.
///
/// The texts must agree except for one ordinal token (arabic, roman,
/// latin letter or Korean syllable) read in the same style.
pub fn is_numbering_step(a: &str, b: &str, increment: u32) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (la, lb) = (a.len(), b.len());

    let mut p = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    while p > 0 {
        match a.get(p).or_else(|| b.get(p)) {
            Some(&next) if same_token(a[p - 1], next) => p -= 1,
            _ => break,
        }
    }
    let mut s = 0;
    while s < la - p && s < lb - p && a[la - 1 - s] == b[lb - 1 - s] {
        s += 1;
    }
    while s > 0 {
        let first = a[la - s];
        let before = if la - s > p { a[la - s - 1] } else { b[lb - s - 1] };
        if same_token(before, first) {
            s -= 1;
        } else {
            break;
        }
    }

    let middle_a: String = a[p..la - s].iter().collect();
    let middle_b: String = b[p..lb - s].iter().collect();
    if middle_a.is_empty() || middle_b.is_empty() {
        return false;
    }
    let readings_b = ordinal_readings(&middle_b);
    ordinal_readings(&middle_a)
        .into_iter()
        .any(|(style, n)| readings_b.contains(&(style, n + increment)))
}

fn items_match(a: &Item, b: &Item, increment: u32) -> bool {
    match (a, b) {
        (
            Item::Text {
                bbox: box_a,
                size: size_a,
                text: text_a,
            },
            Item::Text {
                bbox: box_b,
                size: size_b,
                text: text_b,
            },
        ) => {
            box_a.overlaps_ignoring_page(box_b)
                && are_close(*size_a, *size_b, FONT_SIZE_EPSILON)
                && (text_a == text_b || is_numbering_step(text_a, text_b, increment))
        }
        (Item::Other(box_a), Item::Other(box_b)) => box_a.same_ignoring_page(box_b, COORD_EPSILON),
        _ => false,
    }
}

/// Number of furniture items per page for one sweep direction.
fn depths(items: &[Vec<(usize, Item)>], numbers: &[u32], headers: bool) -> Vec<usize> {
    let mut counts = vec![0usize; items.len()];
    let mut depth = 0usize;
    loop {
        let current: Vec<Option<&Item>> = items
            .iter()
            .enumerate()
            .map(|(p, page)| {
                if counts[p] != depth || depth >= page.len() {
                    return None;
                }
                let index = if headers { depth } else { page.len() - 1 - depth };
                Some(&page[index].1)
            })
            .collect();

        let mut matched = BTreeSet::new();
        for distance in [1usize, 2] {
            for p in 0..current.len().saturating_sub(distance) {
                let q = p + distance;
                if let (Some(a), Some(b)) = (current[p], current[q]) {
                    let increment = numbers[q].saturating_sub(numbers[p]);
                    if items_match(a, b, increment) {
                        matched.insert(p);
                        matched.insert(q);
                    }
                }
            }
        }
        if matched.is_empty() {
            break;
        }
        for p in matched {
            counts[p] = depth + 1;
        }
        depth += 1;
    }
    counts
}

fn build(ctx: &mut ProcessingContext, page: &mut Page, indices: &[usize], kind: FurnitureKind) -> Option<Slot> {
    if indices.is_empty() {
        return None;
    }
    let contents: Vec<Slot> = indices.iter().map(|&i| page.slots[i].take()).collect();
    let bbox = BoundingBox::union_all(contents.iter().filter_map(Slot::bbox))?;
    let mut scope = ctx.detached_scope(page.number);
    let contents = process_contents(&mut scope, contents);
    ctx.finish_scope(scope);
    Some(Slot::Node(SemanticNode::HeaderFooter(HeaderFooter {
        id: Some(ctx.next_id()),
        bbox,
        kind,
        contents,
    })))
}

/// Detect running headers and footers over `pages` and wrap them in
/// furniture nodes placed first (header) and last (footer) on each page.
///
/// Header items whose bottom lies below the page centre, and footer items
/// whose top lies above it, are rejected. Returns the number of furniture
/// nodes created.
pub fn process_headers_and_footers(ctx: &mut ProcessingContext, pages: &mut [Page]) -> usize {
    if pages.len() < 2 {
        return 0;
    }
    let tolerance = ctx.thresholds().reading_order_tolerance;
    let items: Vec<Vec<(usize, Item)>> = pages
        .iter()
        .map(|page| {
            let candidates: Vec<(usize, Item)> = page
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| Item::from_slot(slot).map(|item| (i, item)))
                .collect();
            let boxes: Vec<Option<BoundingBox>> = candidates.iter().map(|(_, item)| Some(*item.bbox())).collect();
            let mut sorted: Vec<Option<(usize, Item)>> = candidates.into_iter().map(Some).collect();
            reading_order(&boxes, tolerance)
                .into_iter()
                .filter_map(|k| sorted[k].take())
                .collect()
        })
        .collect();
    let numbers: Vec<u32> = pages.iter().map(|p| p.number).collect();
    let footer_depths = depths(&items, &numbers, false);
    let header_depths = depths(&items, &numbers, true);

    let mut created = 0usize;
    for (p, page) in pages.iter_mut().enumerate() {
        let page_items = &items[p];
        let center = page.center_y();
        let footer: Vec<usize> = page_items[page_items.len() - footer_depths[p]..]
            .iter()
            .filter(|(_, item)| item.bbox().top <= center)
            .map(|(i, _)| *i)
            .collect();
        let header: Vec<usize> = page_items[..header_depths[p]]
            .iter()
            .filter(|(i, item)| item.bbox().bottom >= center && !footer.contains(i))
            .map(|(i, _)| *i)
            .collect();
        if header.is_empty() && footer.is_empty() {
            continue;
        }

        let header = build(ctx, page, &header, FurnitureKind::Header);
        let footer = build(ctx, page, &footer, FurnitureKind::Footer);
        let body = std::mem::take(&mut page.slots);
        page.slots = header
            .iter()
            .cloned()
            .chain(body.into_iter().filter(|s| !s.is_removed()))
            .chain(footer.iter().cloned())
            .collect();
        created += usize::from(header.is_some()) + usize::from(footer.is_some());
    }
    if created > 0 {
        log::debug!("Detected {} headers and footers", created);
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextNode;

    fn text(page: u32, value: &str, left: f64, top: f64) -> Slot {
        Slot::Node(SemanticNode::Paragraph(TextNode::from_text(
            BoundingBox::new(page, left, top - 10.0, left + 150.0, top),
            value,
            10.0,
        )))
    }

    fn page(number: u32, slots: Vec<Slot>) -> Page {
        let mut page = Page::a4(number);
        page.slots = slots;
        page
    }

    fn kinds(page: &Page) -> Vec<Option<FurnitureKind>> {
        page.slots
            .iter()
            .map(|s| match s {
                Slot::Node(SemanticNode::HeaderFooter(f)) => Some(f.kind),
                _ => None,
            })
            .collect()
    }

    // ==== Numbering Tests ====

    #[test]
    fn test_numbering_step() {
        assert!(is_numbering_step("Page 9", "Page 10", 1));
        assert!(is_numbering_step("- iv -", "- v -", 1));
        assert!(is_numbering_step("12", "13", 1));
        assert!(is_numbering_step("Page 3", "Page 5", 2));
        assert!(!is_numbering_step("Page 3", "Page 5", 1));
        assert!(!is_numbering_step("Chapter", "Summary", 1));
        assert!(!is_numbering_step("Report", "Report", 1));
    }

    // ==== Sweep Tests ====

    #[test]
    fn test_repeated_header_and_page_numbers() {
        let mut ctx = ProcessingContext::default();
        let bodies = ["Introduction text", "Methods text", "Results text"];
        let mut pages: Vec<Page> = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                page(
                    i as u32,
                    vec![
                        text(i as u32, "ACME Annual Report", 50.0, 820.0),
                        text(i as u32, body, 50.0, 600.0),
                        text(i as u32, &format!("Page {}", i + 1), 250.0, 30.0),
                    ],
                )
            })
            .collect();
        assert_eq!(process_headers_and_footers(&mut ctx, &mut pages), 6);
        for page in &pages {
            assert_eq!(kinds(page), vec![Some(FurnitureKind::Header), None, Some(FurnitureKind::Footer)]);
            if let Slot::Node(SemanticNode::HeaderFooter(header)) = &page.slots[0] {
                assert!(header.id.is_some());
                assert_eq!(header.contents.len(), 1);
            }
        }
    }

    #[test]
    fn test_distinct_pages_have_no_furniture() {
        let mut ctx = ProcessingContext::default();
        let mut pages = vec![
            page(0, vec![text(0, "Alpha heading", 50.0, 820.0)]),
            page(1, vec![text(1, "Different start", 50.0, 820.0)]),
        ];
        assert_eq!(process_headers_and_footers(&mut ctx, &mut pages), 0);
    }

    #[test]
    fn test_item_above_centre_is_never_a_footer() {
        let mut ctx = ProcessingContext::default();
        let mut pages = vec![
            page(0, vec![text(0, "Confidential", 50.0, 500.0)]),
            page(1, vec![text(1, "Confidential", 50.0, 500.0)]),
        ];
        assert_eq!(process_headers_and_footers(&mut ctx, &mut pages), 2);
        assert_eq!(kinds(&pages[0]), vec![Some(FurnitureKind::Header)]);
    }

    #[test]
    fn test_two_page_layout() {
        let mut ctx = ProcessingContext::default();
        let mut pages: Vec<Page> = (0..4)
            .map(|i| {
                let (value, left) = if i % 2 == 0 { ("Book Title", 50.0) } else { ("Chapter Name", 380.0) };
                page(i, vec![text(i, value, left, 820.0), text(i, &format!("Body {}", i * 7), 50.0, 500.0)])
            })
            .collect();
        process_headers_and_footers(&mut ctx, &mut pages);
        for page in &pages {
            assert_eq!(kinds(page)[0], Some(FurnitureKind::Header));
        }
    }
}
