//! Diff module - Structural classification of paths between two trees.
//!
//! Each path in the union of two trees is classified as Added, Deleted,
//! Changed or StructuralMismatch. Mappings are compared child by child;
//! sequences are atomic.

mod analyzer;
mod entry;
mod union;


pub use analyzer::*;
pub use entry::*;
pub use union::*;
