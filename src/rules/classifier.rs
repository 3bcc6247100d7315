//! Pattern classification of paths and keys.

use super::error::RuleError;
use super::strategy::RuleAction;
use crate::fieldpath::Path;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// What a pattern rule's regular expression is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTarget {
    /// The full dotted path, e.g. `network.vlan.id`.
    #[default]
    Path,
    /// The last key of the path only.
    Key,
}

/// RuleSpec is the uncompiled form of a pattern rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub pattern: String,
    #[serde(default)]
    pub target: RuleTarget,
    pub category: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: RuleAction,
}

impl RuleSpec {
    /// Creates a path-target rule with the Preserve action.
    pub fn new(pattern: impl Into<String>, category: impl Into<String>, priority: i32) -> Self {
        RuleSpec {
            pattern: pattern.into(),
            target: RuleTarget::Path,
            category: category.into(),
            priority,
            description: String::new(),
            action: RuleAction::Preserve,
        }
    }

    /// Matches the rule against the last key instead of the full path.
    pub fn on_key(mut self) -> Self {
        self.target = RuleTarget::Key;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    fn compile(self, order: usize) -> Result<PatternRule, RuleError> {
        let regex = RegexBuilder::new(&self.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| RuleError::InvalidPattern {
                category: self.category.clone(),
                pattern: self.pattern.clone(),
                message: e.to_string(),
            })?;
        Ok(PatternRule {
            regex,
            spec: self,
            order,
        })
    }
}

/// PatternRule is a compiled, case-insensitive classification rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    regex: Regex,
    spec: RuleSpec,
    order: usize,
}

impl PatternRule {
    pub fn pattern(&self) -> &str {
        &self.spec.pattern
    }

    pub fn target(&self) -> RuleTarget {
        self.spec.target
    }

    pub fn category(&self) -> &str {
        &self.spec.category
    }

    pub fn priority(&self) -> i32 {
        self.spec.priority
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn action(&self) -> &RuleAction {
        &self.spec.action
    }

    /// Returns the uncompiled form of the rule.
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Returns true if the pattern matches anywhere in `subject`.
    pub fn is_match(&self, subject: &str) -> bool {
        self.regex.is_match(subject)
    }

    fn applies_to(&self, dotted: &str, key: Option<&str>) -> bool {
        match self.spec.target {
            RuleTarget::Path => self.is_match(dotted),
            RuleTarget::Key => key.is_some_and(|k| self.is_match(k)),
        }
    }
}

/// Classification is the outcome of classifying one path.
#[derive(Debug, Clone, Copy)]
pub enum Classification<'r> {
    /// The path is listed as a critical path.
    CriticalPath,
    /// The path's last key is listed as a critical key.
    CriticalKey,
    /// A pattern rule matched.
    Rule(&'r PatternRule),
}

impl<'r> Classification<'r> {
    /// Returns the action the classification asks for.
    pub fn action(&self) -> RuleAction {
        match self {
            Classification::CriticalPath | Classification::CriticalKey => RuleAction::Preserve,
            Classification::Rule(rule) => rule.action().clone(),
        }
    }

    /// Returns true for critical-preservation classifications.
    pub fn is_preserve(&self) -> bool {
        match self {
            Classification::CriticalPath | Classification::CriticalKey => true,
            Classification::Rule(rule) => *rule.action() == RuleAction::Preserve,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            Classification::CriticalPath => "critical-path",
            Classification::CriticalKey => "critical-key",
            Classification::Rule(rule) => rule.category(),
        }
    }
}

impl fmt::Display for Classification<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Rule(rule) if !rule.description().is_empty() => {
                write!(f, "{} ({})", rule.category(), rule.description())
            }
            Classification::Rule(rule) => {
                write!(f, "{} /{}/", rule.category(), rule.pattern())
            }
            other => write!(f, "{}", other.category()),
        }
    }
}

/// Classifier ranks pattern rules and critical entries against paths.
///
/// Exact critical paths and keys outrank every pattern rule. Rules are tried
/// by descending priority; rules of equal priority keep registration order.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<PatternRule>,
    critical_paths: HashSet<Path>,
    critical_keys: HashSet<String>,
}

impl Classifier {
    /// Compiles the rules. Any invalid pattern fails the whole classifier.
    pub fn new<I>(specs: I, critical_paths: HashSet<Path>, critical_keys: HashSet<String>) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = RuleSpec>,
    {
        let mut rules = specs
            .into_iter()
            .enumerate()
            .map(|(order, spec)| spec.compile(order))
            .collect::<Result<Vec<_>, _>>()?;
        rules.sort_by(|a, b| b.priority().cmp(&a.priority()).then(a.order.cmp(&b.order)));
        Ok(Classifier {
            rules,
            critical_paths,
            critical_keys,
        })
    }

    /// Returns the rules in evaluation order.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.critical_paths.is_empty() && self.critical_keys.is_empty()
    }

    pub fn is_critical_path(&self, path: &Path) -> bool {
        self.critical_paths.contains(path)
    }

    pub fn is_critical_key(&self, key: &str) -> bool {
        self.critical_keys.contains(key)
    }

    /// Classifies a path, considering both its full form and its last key.
    pub fn classify(&self, path: &Path) -> Option<Classification<'_>> {
        if self.critical_paths.contains(path) {
            return Some(Classification::CriticalPath);
        }
        let key = path.last_key();
        if key.is_some_and(|k| self.critical_keys.contains(k)) {
            return Some(Classification::CriticalKey);
        }
        let dotted = path.to_string();
        self.rules
            .iter()
            .find(|rule| rule.applies_to(&dotted, key))
            .map(Classification::Rule)
    }

    /// Classifies a bare key against critical keys and key-target rules.
    pub fn classify_key(&self, key: &str) -> Option<Classification<'_>> {
        if self.critical_keys.contains(key) {
            return Some(Classification::CriticalKey);
        }
        self.rules
            .iter()
            .filter(|rule| rule.target() == RuleTarget::Key)
            .find(|rule| rule.is_match(key))
            .map(Classification::Rule)
    }

    /// Returns true if any child key of the mapping is classified for
    /// critical preservation.
    pub fn has_critical_child<'k, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'k str>,
    {
        keys.into_iter()
            .any(|key| self.classify_key(key).is_some_and(|c| c.is_preserve()))
    }
}
