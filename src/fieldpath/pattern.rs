//! Wildcard path patterns.

use super::parse::{tokenize, PathParseError, RawSegment};
use super::path::{is_bare_key, write_quoted_key, Path, PathElement};
use std::fmt;
use std::str::FromStr;

/// One segment of a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
    Key(String),
    Index(usize),
    /// Matches exactly one key or index.
    Any,
}

/// PathPattern is a path that may contain `*` / `[*]` segments.
///
/// A pattern matches a concrete path of the same length whose segments match
/// pairwise. Patterns never address nodes directly; they only select paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Parses a dot-notation pattern such as `components.*.image.tag`.
    pub fn parse(input: &str) -> Result<Self, PathParseError> {
        let segments = tokenize(input)?
            .into_iter()
            .map(|segment| match segment {
                RawSegment::Key(k) => PatternSegment::Key(k),
                RawSegment::Index(i) => PatternSegment::Index(i),
                RawSegment::Wildcard => PatternSegment::Any,
            })
            .collect();
        Ok(PathPattern { segments })
    }

    /// Returns true if the pattern contains no wildcard.
    pub fn is_exact(&self) -> bool {
        !self.segments.contains(&PatternSegment::Any)
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Returns true if `path` is selected by this pattern.
    pub fn matches(&self, path: &Path) -> bool {
        if self.segments.len() != path.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(path.iter())
            .all(|(segment, element)| match (segment, element) {
                (PatternSegment::Any, _) => true,
                (PatternSegment::Key(k), PathElement::FieldName(name)) => k == name,
                (PatternSegment::Index(i), PathElement::Index(idx)) => i == idx,
                _ => false,
            })
    }
}

impl From<&Path> for PathPattern {
    fn from(path: &Path) -> Self {
        let segments = path
            .iter()
            .map(|element| match element {
                PathElement::FieldName(name) => PatternSegment::Key(name.clone()),
                PathElement::Index(i) => PatternSegment::Index(*i),
            })
            .collect();
        PathPattern { segments }
    }
}

impl FromStr for PathPattern {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PatternSegment::Key(k) if is_bare_key(k) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", k)?;
                }
                PatternSegment::Key(k) => write_quoted_key(f, k)?,
                PatternSegment::Index(idx) => write!(f, "[{}]", idx)?,
                PatternSegment::Any => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "*")?;
                }
            }
        }
        Ok(())
    }
}
