//! Document-wide heading level assignment.

use std::collections::{BTreeMap, HashMap};

use crate::context::HeadingEntry;
use crate::model::{for_each_node_mut, Page, SemanticNode, StructureId, StyleKey};

/// Level of every registered heading.
///
/// Style keys are visited in their total order (larger, then heavier, then
/// by family name); the level starts at 1 and grows by one per distinct key.
pub fn heading_levels(headings: &[HeadingEntry]) -> HashMap<StructureId, u32> {
    let mut buckets: BTreeMap<&StyleKey, Vec<StructureId>> = BTreeMap::new();
    for heading in headings {
        buckets.entry(&heading.style).or_default().push(heading.id);
    }
    let mut levels = HashMap::with_capacity(headings.len());
    for (level, ids) in buckets.values().enumerate() {
        for id in ids {
            levels.insert(*id, level as u32 + 1);
        }
    }
    levels
}

/// Write heading levels into `pages`.
///
/// Headings that were not registered (for example those produced by a
/// backend) keep the level they already carry.
pub fn assign_levels(headings: &[HeadingEntry], pages: &mut [Page]) {
    let levels = heading_levels(headings);
    if levels.is_empty() {
        return;
    }
    let mut assigned = 0usize;
    for page in pages.iter_mut() {
        for_each_node_mut(&mut page.slots, &mut |node| {
            if let SemanticNode::Heading(heading) = node {
                if let Some(level) = heading.text.id.and_then(|id| levels.get(&id)) {
                    heading.level = Some(*level);
                    assigned += 1;
                }
            }
        });
    }
    log::debug!("Assigned levels to {} headings", assigned);
}
