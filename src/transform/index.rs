//! Duplicate-value index over a tree's scalar leaves.

use crate::fieldpath::Path;
use crate::rules::TransformOptions;
use crate::value::Value;
use indexmap::IndexMap;

/// Returns true for values too common to indicate a relocation: nulls,
/// booleans, empty strings and numbers below the noise threshold.
pub fn is_low_signal(value: &Value, noise_threshold: i64) -> bool {
    match value {
        Value::Null | Value::Bool(_) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Int(i) => i.unsigned_abs() < noise_threshold.unsigned_abs(),
        Value::Float(f) => f.abs() < noise_threshold as f64,
        Value::List(_) | Value::Map(_) => true,
    }
}

/// IndexKey groups leaves that hold the same value, and optionally the same
/// leaf key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub leaf_key: Option<String>,
    pub value: Value,
}

/// ValueIndex maps each indexed value to the paths holding it, in traversal
/// order.
#[derive(Debug, Clone, Default)]
pub struct ValueIndex {
    entries: IndexMap<IndexKey, Vec<Path>>,
}

impl ValueIndex {
    /// Indexes the scalar leaves of `tree`. Sequences are not searched.
    pub fn build(tree: &Value, options: &TransformOptions) -> Self {
        let mut entries: IndexMap<IndexKey, Vec<Path>> = IndexMap::new();
        for (path, node) in tree.walk() {
            if is_low_signal(node, options.noise_threshold) {
                continue;
            }
            let key = IndexKey {
                leaf_key: options
                    .match_leaf_key
                    .then(|| path.last_key().map(str::to_string))
                    .flatten(),
                value: node.clone(),
            };
            entries.entry(key).or_default().push(path);
        }
        ValueIndex { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the paths holding the value under `key`.
    pub fn paths(&self, key: &IndexKey) -> &[Path] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns every value found at two or more paths.
    pub fn duplicates(&self) -> impl Iterator<Item = (&IndexKey, &[Path])> {
        self.entries
            .iter()
            .filter(|(_, paths)| paths.len() >= 2)
            .map(|(key, paths)| (key, paths.as_slice()))
    }
}
