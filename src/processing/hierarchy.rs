//! Cell forest construction and traversal.
//!
//! Input may mix nested cells (`Children`) with flat cells linked only through `ParentGUID`.
//! [`normalize`] folds both forms into a forest where `Children` is the only relation and every
//! identifier appears exactly once. The traversal helpers are pure and borrow the forest.

use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use super::types::SemanticCell;

/// Fold a mixed flat/nested cell list into a canonical forest.
///
/// A top-level cell whose `parent_id` names another known cell is moved under that parent,
/// after the parent's existing children and in input order. Cells without a resolvable parent
/// become roots. A top-level cell whose identifier already occurs nested elsewhere is a
/// duplicate and is dropped. When no root can be found the input is returned unchanged.
pub fn normalize(cells: Vec<SemanticCell>) -> Vec<SemanticCell> {
    if cells.is_empty() {
        return cells;
    }

    let mut known = HashSet::new();
    let mut nested = HashSet::new();
    for cell in &cells {
        known.insert(cell.id);
        index_descendants(cell, &mut known, &mut nested);
    }

    let mut roots = Vec::new();
    let mut attachments: HashMap<Uuid, Vec<usize>> = HashMap::new();
    let mut seen = HashSet::new();
    for (slot, cell) in cells.iter().enumerate() {
        if nested.contains(&cell.id) || !seen.insert(cell.id) {
            tracing::debug!(cell_id = %cell.id, "Dropping duplicate cell");
            continue;
        }
        match cell
            .parent_id
            .filter(|parent| *parent != cell.id && known.contains(parent))
        {
            Some(parent) => attachments.entry(parent).or_default().push(slot),
            None => {
                if let Some(parent) = cell.parent_id {
                    tracing::debug!(cell_id = %cell.id, parent_id = %parent, "Parent not found; treating cell as root");
                }
                roots.push(slot);
            }
        }
    }

    if roots.is_empty() {
        tracing::warn!(
            cells = cells.len(),
            "No root cell found while normalizing hierarchy; returning input unchanged"
        );
        return cells;
    }

    let mut slots: Vec<Option<SemanticCell>> = cells.into_iter().map(Some).collect();
    let mut forest = Vec::with_capacity(roots.len());
    for slot in roots {
        if let Some(root) = slots[slot].take() {
            forest.push(assemble(root, &mut slots, &mut attachments));
        }
    }

    let stranded: usize = attachments.values().map(Vec::len).sum();
    if stranded > 0 {
        tracing::warn!(
            cells = stranded,
            "Dropping cells whose parent chain never reaches a root"
        );
    }

    forest
}

fn index_descendants(cell: &SemanticCell, known: &mut HashSet<Uuid>, nested: &mut HashSet<Uuid>) {
    for child in &cell.children {
        known.insert(child.id);
        nested.insert(child.id);
        index_descendants(child, known, nested);
    }
}

fn assemble(
    mut cell: SemanticCell,
    slots: &mut [Option<SemanticCell>],
    attachments: &mut HashMap<Uuid, Vec<usize>>,
) -> SemanticCell {
    let existing = std::mem::take(&mut cell.children);
    cell.children = existing
        .into_iter()
        .map(|child| assemble(child, slots, attachments))
        .collect();

    if let Some(pending) = attachments.remove(&cell.id) {
        for slot in pending {
            if let Some(child) = slots[slot].take() {
                let child = assemble(child, slots, attachments);
                cell.children.push(child);
            }
        }
    }
    cell
}

/// Pre-order walk: each cell before its children, children in order.
pub fn flatten(forest: &[SemanticCell]) -> Vec<&SemanticCell> {
    let mut out = Vec::new();
    for cell in forest {
        flatten_into(cell, &mut out);
    }
    out
}

fn flatten_into<'a>(cell: &'a SemanticCell, out: &mut Vec<&'a SemanticCell>) {
    out.push(cell);
    for child in &cell.children {
        flatten_into(child, out);
    }
}

/// Cells bucketed by distance from their root (roots are depth 0), in forest order per bucket.
pub fn group_by_depth(forest: &[SemanticCell]) -> BTreeMap<usize, Vec<&SemanticCell>> {
    let mut buckets = BTreeMap::new();
    for cell in forest {
        group_into(cell, 0, &mut buckets);
    }
    buckets
}

fn group_into<'a>(
    cell: &'a SemanticCell,
    depth: usize,
    buckets: &mut BTreeMap<usize, Vec<&'a SemanticCell>>,
) {
    buckets.entry(depth).or_insert_with(Vec::new).push(cell);
    for child in &cell.children {
        group_into(child, depth + 1, buckets);
    }
}

/// Locate a cell anywhere in the forest.
pub fn find_by_id(forest: &[SemanticCell], id: Uuid) -> Option<&SemanticCell> {
    for cell in forest {
        if cell.id == id {
            return Some(cell);
        }
        if let Some(found) = find_by_id(&cell.children, id) {
            return Some(found);
        }
    }
    None
}

/// Mutable variant of [`find_by_id`].
pub fn find_by_id_mut(forest: &mut [SemanticCell], id: Uuid) -> Option<&mut SemanticCell> {
    for cell in forest {
        if cell.id == id {
            return Some(cell);
        }
        if let Some(found) = find_by_id_mut(&mut cell.children, id) {
            return Some(found);
        }
    }
    None
}

/// Child id -> parent id for every nested cell, derived from `Children` alone.
pub fn parent_index(forest: &[SemanticCell]) -> HashMap<Uuid, Uuid> {
    let mut index = HashMap::new();
    for cell in flatten(forest) {
        for child in &cell.children {
            index.insert(child.id, cell.id);
        }
    }
    index
}
