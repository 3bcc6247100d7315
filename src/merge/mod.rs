//! Merge module - Precedence-aware structural merge of configuration trees.
//!
//! The merge starts from a copy of the reference tree and resolves every path
//! of the union of all sources, recording each decision that changes or
//! withholds a value in a [`ConflictLog`].

mod conflict;
mod engine;
mod migrate;
mod source;
mod version;

#[cfg(test)]
mod merge_test;

pub use conflict::*;
pub use engine::*;
pub use migrate::*;
pub use source::*;
pub use version::*;
