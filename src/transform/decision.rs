//! Decisions on ambiguous relocations.

use super::candidate::{Confidence, PathTransformCandidate};

/// The answer to a relocation candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Move the value.
    Apply,
    /// Leave the value where it is.
    Skip,
    /// Stop resolving. Moves already applied are kept.
    Cancel,
}

/// DecisionProvider answers relocation candidates the resolver cannot apply
/// on its own. Calls block until an answer is available.
pub trait DecisionProvider {
    fn decide(&mut self, candidate: &PathTransformCandidate) -> Decision;
}

impl<F> DecisionProvider for F
where
    F: FnMut(&PathTransformCandidate) -> Decision,
{
    fn decide(&mut self, candidate: &PathTransformCandidate) -> Decision {
        self(candidate)
    }
}

/// BatchDecider is the non-interactive provider: High confidence candidates
/// are applied, everything else is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchDecider;

impl DecisionProvider for BatchDecider {
    fn decide(&mut self, candidate: &PathTransformCandidate) -> Decision {
        match candidate.confidence {
            Confidence::High => Decision::Apply,
            Confidence::Medium | Confidence::Low => Decision::Skip,
        }
    }
}
