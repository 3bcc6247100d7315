//! Path transformation candidates.

use crate::fieldpath::Path;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence that a candidate is a real relocation. Orders High first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// PathTransformCandidate proposes moving the value at `old_path` to
/// `new_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTransformCandidate {
    pub old_path: Path,
    pub new_path: Path,
    pub confidence: Confidence,
    /// The value found at `old_path` when the candidate was detected.
    pub value: Value,
    pub reason: String,
}

impl fmt::Display for PathTransformCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} = {} ({})",
            self.confidence, self.old_path, self.new_path, self.value, self.reason
        )
    }
}

/// What happened to a candidate during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Skipped,
    /// Never decided, because resolution was cancelled first.
    Pending,
}

/// A candidate together with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCandidate {
    #[serde(flatten)]
    pub candidate: PathTransformCandidate,
    pub outcome: Outcome,
}
