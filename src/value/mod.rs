//! Value module - In-memory representation of configuration documents.
//!
//! A document is a tree of scalars, sequences and mappings. This module
//! provides path-addressed access and the non-recursive walk every later
//! stage is built on.

mod tree;
mod value;
mod walk;

pub use tree::*;
pub use value::*;
pub use walk::*;
