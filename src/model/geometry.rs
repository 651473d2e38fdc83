//! Bounding boxes in canonical BOTTOMLEFT page coordinates.

use serde::{Deserialize, Serialize};

/// Default tolerance for coordinate comparisons (points).
pub const COORD_EPSILON: f64 = 1e-3;

/// Check whether two numbers differ by no more than `epsilon`.
pub fn are_close(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() <= epsilon
}

/// An axis-aligned box on a page.
///
/// `bottom <= top` and `left <= right`; y grows upwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Page index (0-based)
    pub page: u32,
    /// Left X
    pub left: f64,
    /// Bottom Y
    pub bottom: f64,
    /// Right X
    pub right: f64,
    /// Top Y
    pub top: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(page: u32, left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            page,
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.bottom + self.top) / 2.0
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Smallest box covering both. Keeps `self.page`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            page: self.page,
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }

    /// Union of all boxes, or `None` for an empty iterator.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<BoundingBox> {
        let mut iter = boxes.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, b| acc.union(b)))
    }

    /// Whether `other` lies within this box expanded by `dx` horizontally
    /// and `dy` vertically. Boxes on different pages never contain each other.
    pub fn contains(&self, other: &BoundingBox, dx: f64, dy: f64) -> bool {
        self.page == other.page
            && other.left >= self.left - dx
            && other.right <= self.right + dx
            && other.bottom >= self.bottom - dy
            && other.top <= self.top + dy
    }

    /// Area of the intersection (0 when disjoint or on different pages).
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        if self.page != other.page {
            return 0.0;
        }
        let width = self.right.min(other.right) - self.left.max(other.left);
        let height = self.top.min(other.top) - self.bottom.max(other.bottom);
        if width <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        width * height
    }

    /// Fraction of this box's area covered by `other`.
    pub fn intersection_percent(&self, other: &BoundingBox) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / area
    }

    /// Whether the horizontal extents overlap (same page only).
    pub fn horizontal_overlap(&self, other: &BoundingBox) -> bool {
        self.page == other.page && self.left < other.right && other.left < self.right
    }

    /// Whether the vertical extents overlap (same page only).
    pub fn vertical_overlap(&self, other: &BoundingBox) -> bool {
        self.page == other.page && self.bottom < other.top && other.bottom < self.top
    }

    /// Whether the boxes intersect when placed on the same page.
    pub fn overlaps_ignoring_page(&self, other: &BoundingBox) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.bottom <= other.top
            && other.bottom <= self.top
    }

    /// Whether the boxes coincide (within `epsilon`) when placed on the same page.
    pub fn same_ignoring_page(&self, other: &BoundingBox, epsilon: f64) -> bool {
        are_close(self.left, other.left, epsilon)
            && are_close(self.right, other.right, epsilon)
            && are_close(self.bottom, other.bottom, epsilon)
            && are_close(self.top, other.top, epsilon)
    }

    /// Convert a TOPLEFT-origin box (`top`/`bottom` measured downwards from
    /// the page top) into canonical coordinates.
    pub fn from_top_left(
        page: u32,
        left: f64,
        top_distance: f64,
        right: f64,
        bottom_distance: f64,
        page_height: f64,
    ) -> BoundingBox {
        BoundingBox {
            page,
            left,
            bottom: page_height - bottom_distance,
            right,
            top: page_height - top_distance,
        }
    }
}
