//! Conflict events recorded during a merge.

use crate::fieldpath::Path;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ConflictAction is the kind of decision a conflict event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictAction {
    /// A source value replaced the reference value.
    Overwrite,
    /// A value present in a source was left out of the output.
    Deleted,
    /// A value absent from the reference was carried into the output.
    Added,
    /// Incompatible node kinds; the reference node was kept.
    StructuralMismatch,
    /// A value was relocated from one path to another.
    Migrated,
}

impl ConflictAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictAction::Overwrite => "OVERWRITE",
            ConflictAction::Deleted => "DELETED",
            ConflictAction::Added => "ADDED",
            ConflictAction::StructuralMismatch => "STRUCTURAL_MISMATCH",
            ConflictAction::Migrated => "MIGRATED",
        }
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ConflictEvent records one merge decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEvent {
    /// The path the decision applies to. For migrations, the new path.
    pub path: Path,
    pub action: ConflictAction,
    /// The value offered by the contributing source, or the migrated value.
    pub source_value: Option<Value>,
    /// The value written to the output, if any.
    pub target_value: Option<Value>,
    /// The reference tree's value at the path, if any.
    pub reference_default: Option<Value>,
    pub reason: String,
    pub manual_review: bool,
}

impl ConflictEvent {
    /// Creates an event with no values attached.
    pub fn new(path: Path, action: ConflictAction, reason: impl Into<String>) -> Self {
        ConflictEvent {
            path,
            action,
            source_value: None,
            target_value: None,
            reference_default: None,
            reason: reason.into(),
            manual_review: false,
        }
    }

    pub fn source_value(mut self, value: Option<&Value>) -> Self {
        self.source_value = value.cloned();
        self
    }

    pub fn target_value(mut self, value: Option<&Value>) -> Self {
        self.target_value = value.cloned();
        self
    }

    pub fn reference_default(mut self, value: Option<&Value>) -> Self {
        self.reference_default = value.cloned();
        self
    }

    pub fn manual_review(mut self, manual_review: bool) -> Self {
        self.manual_review = manual_review;
        self
    }
}

impl fmt::Display for ConflictEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.action, self.path, self.reason)?;
        if self.manual_review {
            write!(f, " [review]")?;
        }
        Ok(())
    }
}

/// MergeStatistics summarizes a conflict log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStatistics {
    pub total: usize,
    pub overwrites: usize,
    pub deleted: usize,
    pub added: usize,
    pub structural_mismatches: usize,
    pub migrated: usize,
    pub manual_review: usize,
    /// Overwrites that did not need review.
    pub clean_overwrites: usize,
}

impl fmt::Display for MergeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events: {} overwritten, {} added, {} deleted, {} mismatched, {} migrated ({} need review)",
            self.total,
            self.overwrites,
            self.added,
            self.deleted,
            self.structural_mismatches,
            self.migrated,
            self.manual_review
        )
    }
}

/// ConflictLog is the ordered list of events of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictLog {
    events: Vec<ConflictEvent>,
}

impl ConflictLog {
    /// Creates a new empty ConflictLog.
    pub fn new() -> Self {
        ConflictLog { events: Vec::new() }
    }

    /// Appends an event.
    pub fn push(&mut self, event: ConflictEvent) {
        self.events.push(event);
    }

    /// Appends every event of another log, keeping their order.
    pub fn append(&mut self, other: ConflictLog) {
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[ConflictEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConflictEvent> {
        self.events.iter()
    }

    /// Returns the events with the given action.
    pub fn of_action(&self, action: ConflictAction) -> impl Iterator<Item = &ConflictEvent> {
        self.events.iter().filter(move |e| e.action == action)
    }

    /// Returns the events flagged for manual review.
    pub fn needs_review(&self) -> impl Iterator<Item = &ConflictEvent> {
        self.events.iter().filter(|e| e.manual_review)
    }

    /// Returns the paths of all events, in log order.
    pub fn paths(&self) -> Vec<&Path> {
        self.events.iter().map(|e| &e.path).collect()
    }

    pub fn statistics(&self) -> MergeStatistics {
        let mut stats = MergeStatistics {
            total: self.events.len(),
            ..Default::default()
        };
        for event in &self.events {
            match event.action {
                ConflictAction::Overwrite => {
                    stats.overwrites += 1;
                    if !event.manual_review {
                        stats.clean_overwrites += 1;
                    }
                }
                ConflictAction::Deleted => stats.deleted += 1,
                ConflictAction::Added => stats.added += 1,
                ConflictAction::StructuralMismatch => stats.structural_mismatches += 1,
                ConflictAction::Migrated => stats.migrated += 1,
            }
            if event.manual_review {
                stats.manual_review += 1;
            }
        }
        stats
    }
}

impl Extend<ConflictEvent> for ConflictLog {
    fn extend<I: IntoIterator<Item = ConflictEvent>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

impl IntoIterator for ConflictLog {
    type Item = ConflictEvent;
    type IntoIter = std::vec::IntoIter<ConflictEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConflictLog {
    type Item = &'a ConflictEvent;
    type IntoIter = std::slice::Iter<'a, ConflictEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl fmt::Display for ConflictLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", event)?;
        }
        Ok(())
    }
}
