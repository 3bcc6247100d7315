//! Non-recursive traversal of value trees.

use super::value::Value;
use crate::fieldpath::{Path, PathElement};

/// Maximum depth a walk descends to by default.
///
/// Containers sitting at this depth are still yielded but their children are
/// not visited, which bounds the traversal on pathological inputs. Real
/// configuration documents stay far below it.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Whether a walk descends into sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    /// Sequences are yielded as leaves; their elements are not visited.
    Atomic,
    /// Sequence elements are visited with index path elements.
    Descend,
}

/// Walk yields every node below a root as `(path, node)` pairs.
///
/// Order is depth-first pre-order following each mapping's own key order. The
/// root itself is not yielded. A walk is a plain value: cloning it or calling
/// [`Value::walk`] again restarts the traversal.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    stack: Vec<(Path, &'a Value)>,
    sequences: SequenceMode,
    max_depth: usize,
    truncated: bool,
}

impl<'a> Walk<'a> {
    /// Creates a walk over `root`.
    pub fn new(root: &'a Value, sequences: SequenceMode) -> Self {
        let mut walk = Walk {
            stack: Vec::new(),
            sequences,
            max_depth: DEFAULT_MAX_DEPTH,
            truncated: false,
        };
        walk.push_children(&Path::new(), root);
        walk
    }

    /// Sets the depth guard.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Returns true if some container was not descended into because of the
    /// depth guard.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn push_children(&mut self, path: &Path, node: &'a Value) {
        match node {
            Value::Map(map) => {
                for (key, child) in map.iter().rev() {
                    self.stack.push((path.with_key(key.clone()), child));
                }
            }
            Value::List(items) if self.sequences == SequenceMode::Descend => {
                for (i, child) in items.iter().enumerate().rev() {
                    self.stack.push((path.with(PathElement::index(i)), child));
                }
            }
            _ => {}
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (Path, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        let container = match node {
            Value::Map(m) => !m.is_empty(),
            Value::List(l) => self.sequences == SequenceMode::Descend && !l.is_empty(),
            _ => false,
        };
        if container {
            if path.len() >= self.max_depth {
                self.truncated = true;
            } else {
                self.push_children(&path, node);
            }
        }
        Some((path, node))
    }
}

impl Value {
    /// Walks every node below this one, treating sequences as leaves.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self, SequenceMode::Atomic)
    }

    /// Walks every node below this one, including sequence elements.
    pub fn walk_all(&self) -> Walk<'_> {
        Walk::new(self, SequenceMode::Descend)
    }
}
