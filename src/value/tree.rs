//! Path-addressed access to value trees.
//!
//! Lookups never fail hard: a missing path is `None` (or
//! [`TreeError::PathNotFound`] from [`Value::lookup`]) and callers decide what
//! absence means. The `with_*`/`without_*` operations return a new tree and
//! leave the receiver untouched; the `*_in_place` forms exist for stages that
//! build their own output tree.

use super::value::{Map, NodeKind, Value};
use crate::fieldpath::{Path, PathElement};
use thiserror::Error;

/// TreeError reports a path operation that cannot be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("{path}: not found")]
    PathNotFound { path: String },

    #[error("{path}: cannot descend into a {kind}")]
    NotAContainer { path: String, kind: NodeKind },

    #[error("{path}: index {index} out of range for sequence of length {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("the document root cannot be removed")]
    EmptyPath,
}

impl TreeError {
    /// Creates a not found error.
    pub fn path_not_found(path: &Path) -> Self {
        TreeError::PathNotFound {
            path: path.to_string(),
        }
    }
}

impl Value {
    /// Returns the node at `path`, or None if any segment is missing.
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for element in path {
            current = match (element, current) {
                (PathElement::FieldName(key), Value::Map(map)) => map.get(key)?,
                (PathElement::Index(i), Value::List(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns the node at `path` or a PathNotFound error.
    pub fn lookup(&self, path: &Path) -> Result<&Value, TreeError> {
        self.get_path(path)
            .ok_or_else(|| TreeError::path_not_found(path))
    }

    /// Returns true if `path` addresses a node.
    pub fn has_path(&self, path: &Path) -> bool {
        self.get_path(path).is_some()
    }

    fn get_path_mut(&mut self, path: &Path) -> Option<&mut Value> {
        let mut current = self;
        for element in path {
            current = match element {
                PathElement::FieldName(key) => match current {
                    Value::Map(map) => map.get_mut(key)?,
                    _ => return None,
                },
                PathElement::Index(i) => match current {
                    Value::List(items) => items.get_mut(*i)?,
                    _ => return None,
                },
            };
        }
        Some(current)
    }

    /// Returns a new tree with `value` stored at `path`.
    ///
    /// Missing intermediate mappings are created. An empty path replaces the
    /// whole document.
    pub fn with_value(&self, path: &Path, value: Value) -> Result<Value, TreeError> {
        let mut tree = self.clone();
        tree.set_in_place(path, value)?;
        Ok(tree)
    }

    /// Stores `value` at `path`, creating intermediate mappings as needed.
    ///
    /// A null intermediate node is replaced by an empty mapping. Sequence
    /// indices must already exist.
    pub fn set_in_place(&mut self, path: &Path, value: Value) -> Result<(), TreeError> {
        let elements = path.as_slice();
        let mut current = self;

        for (depth, element) in elements.iter().enumerate() {
            let is_last = depth + 1 == elements.len();
            if current.is_null() && element.is_field_name() {
                *current = Value::Map(Map::new());
            }
            let kind = current.kind();
            current = match element {
                PathElement::FieldName(key) => {
                    let map = match current {
                        Value::Map(map) => map,
                        _ => {
                            return Err(TreeError::NotAContainer {
                                path: prefix(elements, depth),
                                kind,
                            })
                        }
                    };
                    if is_last {
                        map.set(key.clone(), value);
                        return Ok(());
                    }
                    map.fields
                        .entry(key.clone())
                        .or_insert_with(|| Value::Map(Map::new()))
                }
                PathElement::Index(i) => {
                    let items = match current {
                        Value::List(items) => items,
                        _ => {
                            return Err(TreeError::NotAContainer {
                                path: prefix(elements, depth),
                                kind,
                            })
                        }
                    };
                    let len = items.len();
                    let child = match items.get_mut(*i) {
                        Some(child) => child,
                        None => {
                            return Err(TreeError::IndexOutOfRange {
                                path: prefix(elements, depth),
                                index: *i,
                                len,
                            })
                        }
                    };
                    if is_last {
                        *child = value;
                        return Ok(());
                    }
                    child
                }
            };
        }

        *current = value;
        Ok(())
    }

    /// Returns a new tree without the node at `path`, plus the removed node.
    pub fn without_path(&self, path: &Path) -> Result<(Value, Option<Value>), TreeError> {
        let mut tree = self.clone();
        let removed = tree.remove_in_place(path)?;
        Ok((tree, removed))
    }

    /// Removes the node at `path`. A missing path removes nothing.
    pub fn remove_in_place(&mut self, path: &Path) -> Result<Option<Value>, TreeError> {
        let parent_path = path.parent().ok_or(TreeError::EmptyPath)?;
        let parent = match self.get_path_mut(&parent_path) {
            Some(parent) => parent,
            None => return Ok(None),
        };
        let removed = match (path.last(), parent) {
            (Some(PathElement::FieldName(key)), Value::Map(map)) => map.delete(key),
            (Some(PathElement::Index(i)), Value::List(items)) if *i < items.len() => {
                Some(items.remove(*i))
            }
            _ => None,
        };
        Ok(removed)
    }

    /// Removes mappings on the way from `path` up to the root that were left
    /// empty, stopping at the first non-empty one or one `keep` accepts.
    pub fn prune_empty_parents<F>(&mut self, path: &Path, keep: F)
    where
        F: Fn(&Path) -> bool,
    {
        let mut cursor = path.parent();
        while let Some(current) = cursor {
            if current.is_empty() || keep(&current) {
                return;
            }
            let empty = matches!(self.get_path(&current), Some(Value::Map(m)) if m.is_empty());
            if !empty {
                return;
            }
            if self.remove_in_place(&current).is_err() {
                return;
            }
            cursor = current.parent();
        }
    }

    /// Counts scalar and sequence leaves below this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Value::Map(_) => self
                .walk()
                .filter(|(_, node)| !node.is_map())
                .count(),
            _ => 1,
        }
    }
}

fn prefix(elements: &[PathElement], depth: usize) -> String {
    Path::from_elements(elements[..depth].to_vec()).to_string()
}
