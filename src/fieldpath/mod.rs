//! Field path module - Addresses nodes in nested configuration trees.
//!
//! Paths are written in dot notation (`a.b[0].c`) and are reversible to and
//! from their parsed form. Patterns add `*` wildcard segments for rule
//! configuration; they never address a node directly.

mod parse;
mod path;
mod pattern;

pub use parse::{parse_path, PathParseError};
pub use path::*;
pub use pattern::*;
