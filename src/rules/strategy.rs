//! Merge strategies and rule actions.

use super::error::RuleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source id the `engnew` alias resolves to.
pub const TEMPLATE_SOURCE: &str = "template";
/// Source id the `nsprev` alias resolves to.
pub const SITE_SOURCE: &str = "site";

/// MergeStrategy decides which source supplies the value at a path.
///
/// Written as `highest`, `union` or `source:<id>` in rule books. The aliases
/// `engnew`, `nsprev` and `merge` stand for `source:template`, `source:site`
/// and `union`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MergeStrategy {
    /// The highest-precedence source that defines the path wins.
    #[default]
    TakeHighestPrecedenceSource,
    /// The named source wins where it defines the path.
    TakeSpecificSource(String),
    /// Mapping keys from all sources are kept; collisions go to the
    /// highest-precedence source.
    UnionMerge,
}

impl MergeStrategy {
    /// Returns the source id a TakeSpecificSource strategy names.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            MergeStrategy::TakeSpecificSource(id) => Some(id),
            _ => None,
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "highest" => return Ok(MergeStrategy::TakeHighestPrecedenceSource),
            "union" | "merge" => return Ok(MergeStrategy::UnionMerge),
            "engnew" => return Ok(MergeStrategy::TakeSpecificSource(TEMPLATE_SOURCE.to_string())),
            "nsprev" => return Ok(MergeStrategy::TakeSpecificSource(SITE_SOURCE.to_string())),
            _ => {}
        }
        match trimmed.split_once(':') {
            Some((kind, id)) if kind.eq_ignore_ascii_case("source") && !id.trim().is_empty() => {
                Ok(MergeStrategy::TakeSpecificSource(id.trim().to_string()))
            }
            _ => Err(RuleError::InvalidStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for MergeStrategy {
    type Error = RuleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MergeStrategy> for String {
    fn from(strategy: MergeStrategy) -> Self {
        strategy.to_string()
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::TakeHighestPrecedenceSource => write!(f, "highest"),
            MergeStrategy::TakeSpecificSource(id) => write!(f, "source:{}", id),
            MergeStrategy::UnionMerge => write!(f, "union"),
        }
    }
}

/// RuleAction is what a matching pattern rule does to a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RuleAction {
    /// Critical preservation: mappings are union-merged and leaves take the
    /// most site-specific source's value.
    #[default]
    Preserve,
    /// Resolve the path with this strategy instead of the default one.
    Strategy(MergeStrategy),
}

impl FromStr for RuleAction {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("preserve") {
            return Ok(RuleAction::Preserve);
        }
        s.parse().map(RuleAction::Strategy)
    }
}

impl TryFrom<String> for RuleAction {
    type Error = RuleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RuleAction> for String {
    fn from(action: RuleAction) -> Self {
        action.to_string()
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Preserve => write!(f, "preserve"),
            RuleAction::Strategy(strategy) => write!(f, "{}", strategy),
        }
    }
}
