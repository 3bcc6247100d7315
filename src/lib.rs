//! # Config Reshuffle
//!
//! Precedence-aware structural merge of hierarchical configuration documents.
//!
//! When a configuration template is upgraded, sites that customized the old
//! version need their values carried over to the new one. This library merges
//! a new reference template with one or more site trees, records every
//! decision in an audit log and detects values that moved to a different
//! path between template versions.
//!
//! ## Modules
//!
//! - [`value`] - In-memory configuration trees with path-addressed access
//! - [`fieldpath`] - Dot-notation paths and wildcard path patterns
//! - [`diff`] - Structural classification of paths between two trees
//! - [`rules`] - Merge strategies, pattern rules and the immutable rule set
//! - [`merge`] - The precedence-aware merge engine and its conflict log
//! - [`transform`] - Detection and resolution of relocated values

pub mod diff;
pub mod fieldpath;
pub mod merge;
pub mod rules;
pub mod transform;
pub mod value;

pub use diff::{diff, Diff, DiffEntry, DiffKind};
pub use fieldpath::{Path, PathElement, PathPattern};
pub use merge::{merge, ConflictAction, ConflictEvent, ConflictLog, MergeError, MergeResult, Merger, Source, SourceRole};
pub use rules::{MergeStrategy, RuleError, RuleSet, RuleSetBuilder};
pub use transform::{BatchDecider, Confidence, Decision, DecisionProvider, PathTransformCandidate, Resolution, Resolver};
pub use value::Value;
