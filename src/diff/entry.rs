//! Diff result types.

use crate::fieldpath::Path;
use crate::value::Value;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// DiffKind classifies how a path differs between two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffKind {
    /// Only in the new tree.
    Added,
    /// Only in the old tree.
    Deleted,
    /// In both, same kind, different scalar or sequence value.
    Changed,
    /// In both with different node kinds.
    StructuralMismatch,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiffKind::Added => "added",
            DiffKind::Deleted => "deleted",
            DiffKind::Changed => "changed",
            DiffKind::StructuralMismatch => "structural mismatch",
        };
        write!(f, "{}", s)
    }
}

/// DiffEntry is one classified path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub path: Path,
    pub kind: DiffKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

impl DiffEntry {
    /// Describes the entry for audit reasons.
    pub fn describe(&self) -> String {
        match (self.kind, &self.old, &self.new) {
            (DiffKind::StructuralMismatch, Some(old), Some(new)) => {
                format!("type changed from {} to {}", old.kind(), new.kind())
            }
            (DiffKind::Changed, Some(old), Some(new)) => format!("changed from {} to {}", old, new),
            (kind, _, _) => kind.to_string(),
        }
    }
}

/// Diff holds the classified paths between two trees, in union traversal
/// order. An empty diff means the trees are equal.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    entries: Vec<DiffEntry>,
    index: OnceCell<HashMap<Path, usize>>,
}

impl Diff {
    pub(crate) fn from_entries(entries: Vec<DiffEntry>) -> Self {
        Diff {
            entries,
            index: OnceCell::new(),
        }
    }

    /// Returns true if there are no differences.
    pub fn is_same(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter()
    }

    /// Returns the entries of one kind.
    pub fn of_kind(&self, kind: DiffKind) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn added(&self) -> impl Iterator<Item = &DiffEntry> {
        self.of_kind(DiffKind::Added)
    }

    pub fn deleted(&self) -> impl Iterator<Item = &DiffEntry> {
        self.of_kind(DiffKind::Deleted)
    }

    pub fn changed(&self) -> impl Iterator<Item = &DiffEntry> {
        self.of_kind(DiffKind::Changed)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &DiffEntry> {
        self.of_kind(DiffKind::StructuralMismatch)
    }

    /// Returns the entry recorded for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<&DiffEntry> {
        let index = self.index.get_or_init(|| {
            self.entries
                .iter()
                .enumerate()
                .map(|(i, e)| (e.path.clone(), i))
                .collect()
        });
        index.get(path).map(|i| &self.entries[*i])
    }

    /// Returns the classification of `path`, if it differs.
    pub fn kind_at(&self, path: &Path) -> Option<DiffKind> {
        self.get(path).map(|e| e.kind)
    }
}

impl PartialEq for Diff {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl IntoIterator for Diff {
    type Item = DiffEntry;
    type IntoIter = std::vec::IntoIter<DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("Added", DiffKind::Added, '+'),
            ("Deleted", DiffKind::Deleted, '-'),
            ("Changed", DiffKind::Changed, '~'),
            ("Structural mismatches", DiffKind::StructuralMismatch, '!'),
        ];
        let mut first = true;
        for (title, kind, marker) in sections {
            let mut entries = self.of_kind(kind).peekable();
            if entries.peek().is_none() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "- {}:", title)?;
            for entry in entries {
                write!(f, "\n  {} {}", marker, entry.path)?;
                if matches!(kind, DiffKind::Changed | DiffKind::StructuralMismatch) {
                    write!(f, " ({})", entry.describe())?;
                }
            }
        }
        Ok(())
    }
}
