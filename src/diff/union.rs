//! Simultaneous traversal of several trees over the union of their paths.

use crate::fieldpath::Path;
use crate::value::{NodeKind, Value, DEFAULT_MAX_DEPTH};
use indexmap::IndexMap;

/// UnionNode is one path of the union together with the node each tree holds
/// there (None where the tree lacks the path).
#[derive(Debug, Clone)]
pub struct UnionNode<'a> {
    pub path: Path,
    pub nodes: Vec<Option<&'a Value>>,
}

impl<'a> UnionNode<'a> {
    /// Creates the root node of a union over `trees`.
    pub fn root(trees: &[&'a Value]) -> Self {
        UnionNode {
            path: Path::new(),
            nodes: trees.iter().map(|t| Some(*t)).collect(),
        }
    }

    /// Returns the nodes that are present, with their tree position.
    pub fn present(&self) -> impl Iterator<Item = (usize, &'a Value)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.map(|n| (i, n)))
    }

    /// Returns the node held by tree `i`.
    pub fn node(&self, i: usize) -> Option<&'a Value> {
        self.nodes.get(i).copied().flatten()
    }

    /// Returns true if every present node is a mapping.
    ///
    /// Only such nodes are descended into; anything else is resolved at this
    /// path as a unit.
    pub fn is_interior(&self) -> bool {
        let mut any = false;
        for (_, node) in self.present() {
            if node.kind() != NodeKind::Mapping {
                return false;
            }
            any = true;
        }
        any
    }

    /// Returns the children of an interior node.
    ///
    /// Keys are ordered by first appearance, scanning the trees in the order
    /// they were given and each mapping in its own key order.
    pub fn children(&self) -> Vec<UnionNode<'a>> {
        let width = self.nodes.len();
        let mut slots: IndexMap<&'a str, Vec<Option<&'a Value>>> = IndexMap::new();
        for (i, node) in self.present() {
            if let Value::Map(map) = node {
                for (key, child) in map.iter() {
                    let slot = slots
                        .entry(key.as_str())
                        .or_insert_with(|| vec![None; width]);
                    slot[i] = Some(child);
                }
            }
        }
        slots
            .into_iter()
            .map(|(key, nodes)| UnionNode {
                path: self.path.with_key(key),
                nodes,
            })
            .collect()
    }
}

/// UnionWalk yields every path of the union of several trees, pre-order.
///
/// Descent stops at any path whose present nodes are not all mappings, so
/// sequences and kind conflicts are yielded once as a unit.
#[derive(Debug, Clone)]
pub struct UnionWalk<'a> {
    stack: Vec<UnionNode<'a>>,
    max_depth: usize,
}

impl<'a> UnionWalk<'a> {
    pub fn new(trees: &[&'a Value]) -> Self {
        let root = UnionNode::root(trees);
        let mut stack = Vec::new();
        if root.is_interior() {
            stack.extend(root.children().into_iter().rev());
        }
        UnionWalk {
            stack,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the depth guard; interior nodes at this depth are not descended.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }
}

impl<'a> Iterator for UnionWalk<'a> {
    type Item = UnionNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if node.is_interior() && node.path.len() < self.max_depth {
            self.stack.extend(node.children().into_iter().rev());
        }
        Some(node)
    }
}
