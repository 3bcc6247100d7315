//! Immutable merge configuration.

use super::classifier::{Classifier, RuleSpec};
use super::error::RuleError;
use super::strategy::MergeStrategy;
use crate::fieldpath::{Path, PathPattern};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// VersionUpdateSpec configures version string normalization after a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionUpdateSpec {
    /// Version written into matching fields. Derived from the reference
    /// document when unset.
    pub target_version: Option<String>,
    /// Version token to replace. Derived from the site document when unset.
    pub from_version: Option<String>,
    /// Exact paths holding a version string.
    pub version_paths: Vec<String>,
    /// Path patterns, `*` allowed, of fields embedding a version token.
    pub component_image_paths: Vec<String>,
}

/// VersionUpdate is the validated form of [`VersionUpdateSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionUpdate {
    pub target_version: Option<String>,
    pub from_version: Option<String>,
    pub version_paths: Vec<Path>,
    pub component_image_paths: Vec<PathPattern>,
}

impl VersionUpdate {
    fn from_spec(spec: VersionUpdateSpec) -> Result<Self, RuleError> {
        let version_paths = spec
            .version_paths
            .iter()
            .map(|s| Path::parse(s).map_err(|e| RuleError::invalid_path("version_paths", s, e)))
            .collect::<Result<Vec<_>, _>>()?;
        let component_image_paths = spec
            .component_image_paths
            .iter()
            .map(|s| PathPattern::parse(s).map_err(|e| RuleError::invalid_path("component_image_paths", s, e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(VersionUpdate {
            target_version: spec.target_version.filter(|v| !v.is_empty()),
            from_version: spec.from_version.filter(|v| !v.is_empty()),
            version_paths,
            component_image_paths,
        })
    }

    /// Returns true if the path is a configured version field.
    pub fn matches(&self, path: &Path) -> bool {
        self.version_paths.iter().any(|p| p == path)
            || self.component_image_paths.iter().any(|p| p.matches(path))
    }
}

/// TransformOptions tune path transformation detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformOptions {
    /// Integers and floats with an absolute value below this are not indexed.
    pub noise_threshold: i64,
    /// Cluster leaves on (leaf key, value) instead of value alone.
    pub match_leaf_key: bool,
    /// Apply High-confidence candidates without consulting the decider.
    pub auto_apply_high: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            noise_threshold: 10,
            match_leaf_key: true,
            auto_apply_high: true,
        }
    }
}

/// RuleSet is the complete, validated merge configuration.
///
/// A RuleSet never changes once built; share it by reference across merges.
#[derive(Debug, Clone)]
pub struct RuleSet {
    default_strategy: MergeStrategy,
    carry_orphan_keys: bool,
    path_overrides: IndexMap<Path, MergeStrategy>,
    classifier: Classifier,
    version_update: Option<VersionUpdate>,
    migrations: IndexMap<Path, Path>,
    excluded_annotations: HashSet<String>,
    transform: TransformOptions,
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            default_strategy: MergeStrategy::TakeHighestPrecedenceSource,
            carry_orphan_keys: true,
            path_overrides: IndexMap::new(),
            classifier: Classifier::default(),
            version_update: None,
            migrations: IndexMap::new(),
            excluded_annotations: HashSet::new(),
            transform: TransformOptions::default(),
        }
    }
}

impl RuleSet {
    /// Creates a builder for a RuleSet.
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::new()
    }

    pub fn default_strategy(&self) -> &MergeStrategy {
        &self.default_strategy
    }

    /// Whether keys absent from the reference tree are carried into the
    /// merged output.
    pub fn carry_orphan_keys(&self) -> bool {
        self.carry_orphan_keys
    }

    /// Returns the exact-path override for `path`, if any.
    pub fn override_for(&self, path: &Path) -> Option<&MergeStrategy> {
        self.path_overrides.get(path)
    }

    pub fn path_overrides(&self) -> impl Iterator<Item = (&Path, &MergeStrategy)> {
        self.path_overrides.iter()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn version_update(&self) -> Option<&VersionUpdate> {
        self.version_update.as_ref()
    }

    /// Returns the explicit old path to new path relocations.
    pub fn migrations(&self) -> &IndexMap<Path, Path> {
        &self.migrations
    }

    /// Keys removed from every annotation mapping of a merged tree.
    pub fn excluded_annotations(&self) -> &HashSet<String> {
        &self.excluded_annotations
    }

    pub fn transform(&self) -> &TransformOptions {
        &self.transform
    }

    /// Returns every strategy the rule set can select.
    pub fn strategies(&self) -> impl Iterator<Item = &MergeStrategy> {
        let from_rules = self.classifier.rules().iter().filter_map(|rule| match rule.action() {
            super::RuleAction::Strategy(s) => Some(s),
            super::RuleAction::Preserve => None,
        });
        std::iter::once(&self.default_strategy)
            .chain(self.path_overrides.values())
            .chain(from_rules)
    }
}

/// RuleSetBuilder collects unvalidated configuration for a [`RuleSet`].
///
/// Paths and patterns are checked in [`RuleSetBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RuleSetBuilder {
    default_strategy: Option<MergeStrategy>,
    carry_orphan_keys: Option<bool>,
    path_overrides: Vec<(String, MergeStrategy)>,
    rules: Vec<RuleSpec>,
    critical_paths: Vec<String>,
    critical_keys: Vec<String>,
    version_update: Option<VersionUpdateSpec>,
    migrations: Vec<(String, String)>,
    excluded_annotations: Vec<String>,
    transform: Option<TransformOptions>,
}

impl RuleSetBuilder {
    /// Creates a new RuleSetBuilder.
    pub fn new() -> Self {
        RuleSetBuilder::default()
    }

    /// Sets the strategy used where nothing more specific applies.
    pub fn default_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.default_strategy = Some(strategy);
        self
    }

    pub fn carry_orphan_keys(mut self, carry: bool) -> Self {
        self.carry_orphan_keys = Some(carry);
        self
    }

    /// Forces a strategy at an exact path. Later overrides of the same path
    /// replace earlier ones.
    pub fn path_override(mut self, path: impl Into<String>, strategy: MergeStrategy) -> Self {
        self.path_overrides.push((path.into(), strategy));
        self
    }

    /// Adds a pattern rule.
    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn critical_path(mut self, path: impl Into<String>) -> Self {
        self.critical_paths.push(path.into());
        self
    }

    pub fn critical_key(mut self, key: impl Into<String>) -> Self {
        self.critical_keys.push(key.into());
        self
    }

    pub fn version_update(mut self, spec: VersionUpdateSpec) -> Self {
        self.version_update = Some(spec);
        self
    }

    /// Relocates the value at `old` to `new` in site sources before merging.
    pub fn migration(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.migrations.push((old.into(), new.into()));
        self
    }

    /// Drops an annotation key from the merged output, whichever source
    /// supplied it.
    pub fn excluded_annotation(mut self, key: impl Into<String>) -> Self {
        self.excluded_annotations.push(key.into());
        self
    }

    pub fn transform(mut self, options: TransformOptions) -> Self {
        self.transform = Some(options);
        self
    }

    /// Validates everything and builds the RuleSet.
    pub fn build(self) -> Result<RuleSet, RuleError> {
        let defaults = RuleSet::default();

        let mut path_overrides = IndexMap::new();
        for (raw, strategy) in self.path_overrides {
            let path = parse_field("path_overrides", &raw)?;
            path_overrides.insert(path, strategy);
        }

        let critical_paths = self
            .critical_paths
            .iter()
            .map(|raw| parse_field("critical.paths", raw))
            .collect::<Result<HashSet<_>, _>>()?;
        let critical_keys: HashSet<String> = self.critical_keys.into_iter().collect();
        let classifier = Classifier::new(self.rules, critical_paths, critical_keys)?;

        let version_update = self.version_update.map(VersionUpdate::from_spec).transpose()?;

        let mut migrations = IndexMap::new();
        for (old, new) in &self.migrations {
            migrations.insert(parse_field("migrations", old)?, parse_field("migrations", new)?);
        }
        check_migration_cycles(&migrations)?;

        let rule_set = RuleSet {
            default_strategy: self.default_strategy.unwrap_or(defaults.default_strategy),
            carry_orphan_keys: self.carry_orphan_keys.unwrap_or(defaults.carry_orphan_keys),
            path_overrides,
            classifier,
            version_update,
            migrations,
            excluded_annotations: self.excluded_annotations.into_iter().filter(|k| !k.is_empty()).collect(),
            transform: self.transform.unwrap_or(defaults.transform),
        };
        debug!(
            default_strategy = %rule_set.default_strategy,
            rules = rule_set.classifier.rules().len(),
            overrides = rule_set.path_overrides.len(),
            migrations = rule_set.migrations.len(),
            "rule set built"
        );
        Ok(rule_set)
    }
}

fn parse_field(field: &str, raw: &str) -> Result<Path, RuleError> {
    let path = Path::parse(raw).map_err(|e| RuleError::invalid_path(field, raw, e))?;
    if path.is_empty() {
        return Err(RuleError::invalid_path(
            field,
            raw,
            crate::fieldpath::PathParseError::EmptySegment { input: raw.to_string(), offset: 0 },
        ));
    }
    Ok(path)
}

/// Rejects migration maps whose relocations chain back onto themselves.
fn check_migration_cycles(migrations: &IndexMap<Path, Path>) -> Result<(), RuleError> {
    for start in migrations.keys() {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(next) = migrations.get(current) {
            if chain.contains(&next) {
                chain.push(next);
                let rendered: Vec<String> = chain.iter().map(|p| p.to_string()).collect();
                return Err(RuleError::CircularMigration(rendered.join(" -> ")));
            }
            chain.push(next);
            current = next;
        }
    }
    Ok(())
}
