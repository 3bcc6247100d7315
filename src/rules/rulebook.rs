//! Serialized rule book documents.

use super::classifier::RuleSpec;
use super::error::RuleError;
use super::ruleset::{RuleSet, RuleSetBuilder, TransformOptions, VersionUpdateSpec};
use super::strategy::MergeStrategy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// OverrideSpec is a path override as written in a rule book: either a bare
/// strategy string or a table naming a strategy or a winning source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideSpec {
    Strategy(MergeStrategy),
    Table {
        #[serde(default)]
        strategy: Option<MergeStrategy>,
        #[serde(default)]
        source: Option<String>,
    },
}

impl OverrideSpec {
    fn resolve(self, path: &str) -> Result<MergeStrategy, RuleError> {
        match self {
            OverrideSpec::Strategy(strategy) => Ok(strategy),
            OverrideSpec::Table {
                strategy: Some(strategy),
                source: None,
            } => Ok(strategy),
            OverrideSpec::Table {
                strategy: None,
                source: Some(source),
            } => Ok(MergeStrategy::TakeSpecificSource(source)),
            OverrideSpec::Table { .. } => Err(RuleError::Parse(format!(
                "path_overrides.{}: exactly one of strategy or source is required",
                path
            ))),
        }
    }
}

/// Critical paths and keys, preserved from the most site-specific source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CriticalSpec {
    pub paths: Vec<String>,
    pub keys: Vec<String>,
}

/// RuleBook is the on-disk form of a [`RuleSet`].
///
/// ```yaml
/// default_strategy: highest
/// carry_orphan_keys: true
/// path_overrides:
///   cluster.name: nsprev
///   features: { strategy: union }
/// rules:
///   - pattern: "^network\\."
///     category: network
///     priority: 100
/// critical:
///   keys: [password]
/// migrations:
///   old.timeout: new.timeout
/// excluded_annotations:
///   - kubectl.kubernetes.io/last-applied-configuration
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleBook {
    pub default_strategy: Option<MergeStrategy>,
    pub carry_orphan_keys: Option<bool>,
    pub path_overrides: IndexMap<String, OverrideSpec>,
    pub rules: Vec<RuleSpec>,
    pub critical: CriticalSpec,
    pub version_update: Option<VersionUpdateSpec>,
    pub migrations: IndexMap<String, String>,
    pub excluded_annotations: Vec<String>,
    pub transform: Option<TransformOptions>,
}

impl RuleBook {
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleError> {
        serde_yaml::from_str(yaml).map_err(|e| RuleError::Parse(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        serde_json::from_str(json).map_err(|e| RuleError::Parse(e.to_string()))
    }

    /// Validates the rule book into a RuleSet.
    pub fn into_rule_set(self) -> Result<RuleSet, RuleError> {
        let mut builder = RuleSetBuilder::new();
        if let Some(strategy) = self.default_strategy {
            builder = builder.default_strategy(strategy);
        }
        if let Some(carry) = self.carry_orphan_keys {
            builder = builder.carry_orphan_keys(carry);
        }
        for (path, spec) in self.path_overrides {
            let strategy = spec.resolve(&path)?;
            builder = builder.path_override(path, strategy);
        }
        for rule in self.rules {
            builder = builder.rule(rule);
        }
        for path in self.critical.paths {
            builder = builder.critical_path(path);
        }
        for key in self.critical.keys {
            builder = builder.critical_key(key);
        }
        if let Some(spec) = self.version_update {
            builder = builder.version_update(spec);
        }
        for (old, new) in self.migrations {
            builder = builder.migration(old, new);
        }
        for key in self.excluded_annotations {
            builder = builder.excluded_annotation(key);
        }
        if let Some(options) = self.transform {
            builder = builder.transform(options);
        }
        builder.build()
    }
}

impl RuleSet {
    /// Parses and validates a YAML rule book.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleError> {
        RuleBook::from_yaml(yaml)?.into_rule_set()
    }

    /// Parses and validates a JSON rule book.
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        RuleBook::from_json(json)?.into_rule_set()
    }
}
