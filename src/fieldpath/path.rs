//! Concrete paths into a configuration tree.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::parse::{parse_path, PathParseError};

/// PathElement is one step from a node to a child.
///
/// Keys order before indices, and each compares by its own content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    /// Key of a mapping entry.
    FieldName(String),
    /// Position inside a sequence.
    Index(usize),
}

impl PathElement {
    pub fn field_name(name: impl Into<String>) -> Self {
        PathElement::FieldName(name.into())
    }

    pub fn index(i: usize) -> Self {
        PathElement::Index(i)
    }

    pub fn is_field_name(&self) -> bool {
        matches!(self, PathElement::FieldName(_))
    }

    pub fn as_field_name(&self) -> Option<&str> {
        match self {
            PathElement::FieldName(name) => Some(name),
            PathElement::Index(_) => None,
        }
    }
}

/// Path addresses a node by the steps leading to it from the root.
///
/// The empty path is the root itself. Paths render in dot notation and parse
/// back from it unchanged; ordering is element-wise, which sorts a parent
/// before its descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Path { elements }
    }

    /// Builds a path made only of mapping keys.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keys.into_iter().map(PathElement::field_name).collect()
    }

    /// Parses dot notation such as `a.b[0]["x.y"]`.
    pub fn parse(s: &str) -> Result<Self, PathParseError> {
        parse_path(s)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// The key this path ends in; None for the root or an index.
    pub fn last_key(&self) -> Option<&str> {
        self.last().and_then(PathElement::as_field_name)
    }

    /// Returns a child path one element deeper.
    pub fn with(&self, element: PathElement) -> Self {
        let mut child = self.clone();
        child.push(element);
        child
    }

    pub fn with_key(&self, key: impl Into<String>) -> Self {
        self.with(PathElement::field_name(key))
    }

    /// Returns the path one element shorter, or None at the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, init) = self.elements.split_last()?;
        Some(Path::from_elements(init.to_vec()))
    }

    /// Returns true if `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Path) -> bool {
        self.len() > ancestor.len() && self.elements.starts_with(&ancestor.elements)
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Path::from_elements(iter.into_iter().collect())
    }
}

impl IntoIterator for Path {
    type Item = PathElement;
    type IntoIter = std::vec::IntoIter<PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

/// Returns true if a key can be written without brackets and quotes.
pub(crate) fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key != "*"
        && !key
            .chars()
            .any(|c| matches!(c, '.' | '[' | ']' | '"' | '\\') || c.is_whitespace())
}

/// Writes `["key"]`, escaping quotes and backslashes.
pub(crate) fn write_quoted_key(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    f.write_str("[\"")?;
    for c in key.chars() {
        if matches!(c, '"' | '\\') {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"]")
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::FieldName(key) if is_bare_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathElement::FieldName(key) => write_quoted_key(f, key)?,
                PathElement::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_path(&s).map_err(serde::de::Error::custom)
    }
}
