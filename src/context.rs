//! Per-document processing state.
//!
//! A [`ProcessingContext`] owns everything the passes share across pages:
//! the structure-ID counter, the picture counter, the table-border registry
//! and the heading registry. Workers never touch it directly; each page is
//! processed through a [`PageScope`] that owns that page's borders and
//! collects the headings it promotes. Only the ID and picture counters are
//! shared between concurrent scopes, and both are atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::model::{
    compact, SemanticNode, Slot, StructureId, StyleKey, TableBorder,
};
use crate::probability::{GeometricModel, ProbabilityModel};
use crate::processors::Thresholds;

/// Allocator of structure IDs.
pub trait IdSource {
    fn next_id(&self) -> StructureId;
}

/// A heading registered for level assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingEntry {
    pub id: StructureId,
    pub style: StyleKey,
}

/// State shared by every scope of one document.
pub(crate) struct SharedState {
    next_id: AtomicU64,
    next_picture: AtomicU32,
    thresholds: Thresholds,
    model: Arc<dyn ProbabilityModel>,
}

/// Document-wide registries and counters.
pub struct ProcessingContext {
    shared: Arc<SharedState>,
    borders: HashMap<u32, Vec<TableBorder>>,
    headings: Vec<HeadingEntry>,
}

impl ProcessingContext {
    /// Create a context using the bundled geometric model.
    pub fn new(thresholds: Thresholds) -> Self {
        Self::with_model(thresholds, Arc::new(GeometricModel::default()))
    }

    /// Create a context using a custom probability model.
    pub fn with_model(thresholds: Thresholds, model: Arc<dyn ProbabilityModel>) -> Self {
        Self {
            shared: Arc::new(SharedState {
                next_id: AtomicU64::new(1),
                next_picture: AtomicU32::new(1),
                thresholds,
                model,
            }),
            borders: HashMap::new(),
            headings: Vec::new(),
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.shared.thresholds
    }

    pub fn model(&self) -> &dyn ProbabilityModel {
        self.shared.model.as_ref()
    }

    /// Register candidate table grids; each lands on the page of its box.
    pub fn add_borders(&mut self, borders: impl IntoIterator<Item = TableBorder>) {
        for border in borders {
            self.borders.entry(border.bbox.page).or_default().push(border);
        }
    }

    /// Whether any border is registered for `page`.
    pub fn has_borders(&self, page: u32) -> bool {
        self.borders.get(&page).map(|b| !b.is_empty()).unwrap_or(false)
    }

    /// Borders currently registered for `page`.
    pub fn borders(&self, page: u32) -> &[TableBorder] {
        self.borders.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove and return the borders of `page`.
    pub fn take_borders(&mut self, page: u32) -> Vec<TableBorder> {
        self.borders.remove(&page).unwrap_or_default()
    }

    /// Scope for `page`, taking ownership of the page's borders.
    pub fn scope(&mut self, page: u32) -> PageScope {
        let borders = self.take_borders(page);
        PageScope::new(page, Arc::clone(&self.shared), borders)
    }

    /// Scope for work on a page whose borders are already consumed.
    pub fn detached_scope(&self, page: u32) -> PageScope {
        PageScope::new(page, Arc::clone(&self.shared), Vec::new())
    }

    /// Merge the headings a finished scope promoted into the registry.
    pub fn finish_scope(&mut self, scope: PageScope) {
        self.headings.extend(scope.headings);
    }

    pub fn headings(&self) -> &[HeadingEntry] {
        &self.headings
    }

    /// Allocate the next picture index.
    pub fn next_picture_index(&self) -> u32 {
        self.shared.next_picture.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl IdSource for ProcessingContext {
    fn next_id(&self) -> StructureId {
        self.shared.next_id()
    }
}

impl SharedState {
    fn next_id(&self) -> StructureId {
        StructureId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// The view of the context a single page worker uses.
pub struct PageScope {
    pub page: u32,
    shared: Arc<SharedState>,
    borders: Vec<TableBorder>,
    headings: Vec<HeadingEntry>,
}

impl PageScope {
    fn new(page: u32, shared: Arc<SharedState>, borders: Vec<TableBorder>) -> Self {
        Self {
            page,
            shared,
            borders,
            headings: Vec::new(),
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.shared.thresholds
    }

    pub fn model(&self) -> &dyn ProbabilityModel {
        self.shared.model.as_ref()
    }

    pub fn borders(&self) -> &[TableBorder] {
        &self.borders
    }

    /// Add a border proposed on this page.
    pub fn add_border(&mut self, border: TableBorder) {
        self.borders.push(border);
    }

    /// Remove and return the borders matching `predicate`, keeping the rest.
    pub fn take_borders_where(&mut self, mut predicate: impl FnMut(&TableBorder) -> bool) -> Vec<TableBorder> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.borders)
            .into_iter()
            .partition(|b| predicate(b));
        self.borders = kept;
        taken
    }

    /// Record a promoted heading for level assignment.
    pub fn register_heading(&mut self, id: StructureId, style: StyleKey) {
        self.headings.push(HeadingEntry { id, style });
    }

    pub fn headings(&self) -> &[HeadingEntry] {
        &self.headings
    }

    /// Allocate the next document-wide picture index.
    pub fn next_picture_index(&self) -> u32 {
        self.shared.next_picture.fetch_add(1, Ordering::Relaxed)
    }

    /// Assign IDs to every node in `slots` (and their children) that has none yet.
    pub fn commit(&self, slots: &mut Vec<Slot>) {
        commit(self, slots);
    }
}

impl IdSource for PageScope {
    fn next_id(&self) -> StructureId {
        self.shared.next_id()
    }
}

/// Compact `slots` and assign IDs to every node (and child) that has none.
///
/// Nodes that already carry an ID keep it.
pub fn commit(ids: &dyn IdSource, slots: &mut Vec<Slot>) {
    compact(slots);
    for slot in slots.iter_mut() {
        if let Slot::Node(node) = slot {
            commit_node(ids, node);
        }
    }
}

fn commit_node(ids: &dyn IdSource, node: &mut SemanticNode) {
    let id = node.id_mut();
    if id.is_none() {
        *id = Some(ids.next_id());
    }
    match node {
        SemanticNode::List(list) => {
            for item in &mut list.items {
                if item.id.is_none() {
                    item.id = Some(ids.next_id());
                }
                commit(ids, &mut item.contents);
            }
        }
        SemanticNode::Table(table) => {
            for cell in &mut table.cells {
                commit(ids, &mut cell.contents);
            }
        }
        SemanticNode::HeaderFooter(furniture) => commit(ids, &mut furniture.contents),
        _ => {}
    }
}
