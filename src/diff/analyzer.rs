//! Structural diff between two trees.

use super::entry::{Diff, DiffEntry, DiffKind};
use super::union::{UnionNode, UnionWalk};
use crate::value::{NodeKind, Value};

/// Classifies a pair of nodes found at the same path.
///
/// Returns None when the pair does not differ, or when both are mappings:
/// mapping children are compared on their own paths.
pub fn classify_pair(old: Option<&Value>, new: Option<&Value>) -> Option<DiffKind> {
    match (old, new) {
        (None, None) => None,
        (Some(_), None) => Some(DiffKind::Deleted),
        (None, Some(_)) => Some(DiffKind::Added),
        (Some(o), Some(n)) if is_structural_mismatch(o, n) => Some(DiffKind::StructuralMismatch),
        (Some(o), Some(_)) if o.kind() == NodeKind::Mapping => None,
        (Some(o), Some(n)) => (o != n).then_some(DiffKind::Changed),
    }
}

/// Returns true if two nodes at the same path have incompatible kinds.
pub fn is_structural_mismatch(a: &Value, b: &Value) -> bool {
    a.kind() != b.kind()
}

/// Computes the structural diff from `old` to `new`.
///
/// Every path of the union is classified once. Sequences are compared as a
/// whole; elements are never matched by position. Paths below a structural
/// mismatch are not classified separately. Unless both roots are mappings,
/// the roots themselves are compared and yield at most one entry at the
/// empty path.
pub fn diff(old: &Value, new: &Value) -> Diff {
    let root = UnionNode::root(&[old, new]);
    if !root.is_interior() {
        return Diff::from_entries(entry_for(&root).into_iter().collect());
    }
    let entries = UnionWalk::new(&[old, new])
        .filter_map(|node| entry_for(&node))
        .collect();
    Diff::from_entries(entries)
}

fn entry_for(node: &UnionNode<'_>) -> Option<DiffEntry> {
    let old = node.node(0);
    let new = node.node(1);
    let kind = classify_pair(old, new)?;
    Some(DiffEntry {
        path: node.path.clone(),
        kind,
        old: old.cloned(),
        new: new.cloned(),
    })
}

/// Returns the site's customizations relative to a baseline template.
///
/// These are the paths whose site value differs from the baseline: changed
/// values, kind changes, and the topmost paths the baseline lacks. Paths only
/// the baseline has are not customizations.
pub fn customizations(site: &Value, baseline: &Value) -> Vec<DiffEntry> {
    let diff = diff(baseline, site);
    let mut result: Vec<DiffEntry> = Vec::new();
    for entry in diff {
        match entry.kind {
            DiffKind::Deleted => {}
            DiffKind::Added => {
                let nested = result
                    .last()
                    .is_some_and(|prev| prev.kind == DiffKind::Added && entry.path.is_descendant_of(&prev.path));
                if !nested {
                    result.push(entry);
                }
            }
            DiffKind::Changed | DiffKind::StructuralMismatch => result.push(entry),
        }
    }
    result
}
