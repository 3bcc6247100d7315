//! Transform module - Detection and resolution of path relocations.
//!
//! A value that moved between template versions shows up in a merged tree at
//! its old path, often alongside a stale or default value at its new path.
//! The resolver finds such values, rates each proposed move by confidence and
//! applies the moves a [`DecisionProvider`] accepts.

mod candidate;
mod decision;
mod detect;
mod index;
mod resolver;

#[cfg(test)]
mod resolver_test;

pub use candidate::*;
pub use decision::*;
pub use detect::*;
pub use index::*;
pub use resolver::*;
