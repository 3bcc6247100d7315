//! Rules module - Merge strategies, pattern classification and rule sets.
//!
//! A [`RuleSet`] is built once, from a [`RuleSetBuilder`] or a serialized
//! [`RuleBook`], and then only read by the merge engine and the transform
//! resolver.

mod classifier;
mod error;
mod rulebook;
mod ruleset;
mod strategy;

pub use classifier::*;
pub use error::*;
pub use rulebook::*;
pub use ruleset::*;
pub use strategy::*;
