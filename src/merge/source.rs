//! Merge inputs.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SourceRole tells template documents apart from site documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// A product template, e.g. the new schema version.
    Template,
    /// A site-customized document.
    Site,
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRole::Template => write!(f, "template"),
            SourceRole::Site => write!(f, "site"),
        }
    }
}

/// Source is one input tree of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: String,
    pub role: SourceRole,
    pub tree: Value,
}

impl Source {
    pub fn new(id: impl Into<String>, role: SourceRole, tree: Value) -> Self {
        Source {
            id: id.into(),
            role,
            tree,
        }
    }

    pub fn template(id: impl Into<String>, tree: Value) -> Self {
        Source::new(id, SourceRole::Template, tree)
    }

    pub fn site(id: impl Into<String>, tree: Value) -> Self {
        Source::new(id, SourceRole::Site, tree)
    }

    pub fn is_site(&self) -> bool {
        self.role == SourceRole::Site
    }
}

/// MergeError reports inputs a merge cannot start from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("no sources to merge")]
    NoSources,

    #[error("reference source {0:?} is not among the sources")]
    UnknownReference(String),

    #[error("duplicate source id {0:?}")]
    DuplicateSource(String),

    #[error("strategy {strategy} names unknown source {id:?}")]
    UnknownSource { strategy: String, id: String },
}
