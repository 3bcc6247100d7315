//! Relocation resolution.

use super::candidate::{Confidence, Outcome, PathTransformCandidate, ResolvedCandidate};
use super::decision::{Decision, DecisionProvider};
use super::detect::detect;
use crate::fieldpath::Path;
use crate::merge::{ConflictAction, ConflictEvent, ConflictLog};
use crate::rules::TransformOptions;
use crate::value::{TreeError, Value};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Whether resolution ran to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResolutionStatus {
    Complete,
    /// A decision provider cancelled; `pending` candidates were never decided.
    Cancelled { pending: usize },
}

/// Resolution is the outcome of one resolver run.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tree: Value,
    pub candidates: Vec<ResolvedCandidate>,
    /// MIGRATED events, one per applied candidate.
    pub log: ConflictLog,
    pub status: ResolutionStatus,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.status == ResolutionStatus::Complete
    }

    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &PathTransformCandidate> {
        self.candidates
            .iter()
            .filter(move |c| c.outcome == outcome)
            .map(|c| &c.candidate)
    }

    pub fn applied(&self) -> impl Iterator<Item = &PathTransformCandidate> {
        self.with_outcome(Outcome::Applied)
    }

    /// Returns the candidates left unresolved, skipped or never decided.
    pub fn unresolved(&self) -> impl Iterator<Item = &PathTransformCandidate> {
        self.candidates
            .iter()
            .filter(|c| c.outcome != Outcome::Applied)
            .map(|c| &c.candidate)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ResolutionStatus::Complete => write!(f, "Transformations: {} candidate(s)", self.candidates.len())?,
            ResolutionStatus::Cancelled { pending } => write!(
                f,
                "Transformations: {} candidate(s), cancelled with {} pending",
                self.candidates.len(),
                pending
            )?,
        }
        for resolved in &self.candidates {
            write!(f, "\n  {:<7} {}", format!("{:?}", resolved.outcome), resolved.candidate)?;
        }
        Ok(())
    }
}

/// Resolver detects and applies path relocations against a reference tree.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    reference: &'a Value,
    options: TransformOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(reference: &'a Value, options: &TransformOptions) -> Self {
        Resolver {
            reference,
            options: *options,
        }
    }

    /// Lists relocation candidates without changing anything.
    pub fn detect(&self, merged: &Value) -> Vec<PathTransformCandidate> {
        detect(merged, self.reference, &self.options)
    }

    /// Detects candidates in `merged` and resolves them on a copy.
    ///
    /// High confidence candidates are decided first, then Medium, then Low.
    /// With `auto_apply_high` the High ones are applied without asking.
    /// A Cancel stops resolution; everything applied before it stays applied.
    pub fn resolve(&self, merged: &Value, decider: &mut dyn DecisionProvider) -> Resolution {
        let candidates = self.detect(merged);
        let mut outcomes = vec![Outcome::Pending; candidates.len()];
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by_key(|&i| candidates[i].confidence);

        let mut tree = merged.clone();
        let mut log = ConflictLog::new();
        let mut cancelled = false;

        for i in order {
            let candidate = &candidates[i];
            let decision = if candidate.confidence == Confidence::High && self.options.auto_apply_high {
                Decision::Apply
            } else {
                decider.decide(candidate)
            };
            match decision {
                Decision::Apply => {
                    let still_needed = |path: &Path| {
                        candidates.iter().enumerate().any(|(j, other)| {
                            j != i
                                && outcomes[j] != Outcome::Applied
                                && (other.old_path == *path || other.new_path == *path)
                        })
                    };
                    let outcome = match self.apply(&mut tree, candidate, still_needed) {
                        Ok(Some(event)) => {
                            log.push(event);
                            Outcome::Applied
                        }
                        Ok(None) => Outcome::Skipped,
                        Err(err) => {
                            warn!(from = %candidate.old_path, to = %candidate.new_path, error = %err, "relocation failed");
                            Outcome::Skipped
                        }
                    };
                    outcomes[i] = outcome;
                }
                Decision::Skip => {
                    debug!(from = %candidate.old_path, to = %candidate.new_path, "relocation skipped");
                    outcomes[i] = Outcome::Skipped;
                }
                Decision::Cancel => {
                    cancelled = true;
                    break;
                }
            }
        }

        let pending = outcomes.iter().filter(|o| **o == Outcome::Pending).count();
        let status = if cancelled {
            warn!(applied = log.len(), pending, "relocation resolution cancelled");
            ResolutionStatus::Cancelled { pending }
        } else {
            ResolutionStatus::Complete
        };
        info!(candidates = candidates.len(), applied = log.len(), "relocations resolved");

        Resolution {
            tree,
            candidates: candidates
                .into_iter()
                .zip(outcomes)
                .map(|(candidate, outcome)| ResolvedCandidate { candidate, outcome })
                .collect(),
            log,
            status,
        }
    }

    /// Moves one value. Returns None if the old path no longer holds the
    /// detected value.
    fn apply<F>(&self, tree: &mut Value, candidate: &PathTransformCandidate, still_needed: F) -> Result<Option<ConflictEvent>, TreeError>
    where
        F: Fn(&Path) -> bool,
    {
        let old = &candidate.old_path;
        let new = &candidate.new_path;
        if tree.get_path(old) != Some(&candidate.value) {
            debug!(from = %old, "relocation source changed, skipping");
            return Ok(None);
        }

        let mut next = tree.with_value(new, candidate.value.clone())?;
        if !self.reference.has_path(old) && !still_needed(old) {
            next.remove_in_place(old)?;
            next.prune_empty_parents(old, |p| self.reference.has_path(p));
        }
        *tree = next;

        debug!(from = %old, to = %new, confidence = %candidate.confidence, "relocated");
        Ok(Some(
            ConflictEvent::new(
                new.clone(),
                ConflictAction::Migrated,
                format!("moved from {} ({} confidence)", old, candidate.confidence),
            )
            .source_value(Some(&candidate.value))
            .target_value(Some(&candidate.value))
            .reference_default(self.reference.get_path(new)),
        ))
    }
}
