//! Precedence-driven structural merge.

use super::conflict::{ConflictAction, ConflictEvent, ConflictLog, MergeStatistics};
use super::migrate::apply_migrations;
use super::source::{MergeError, Source, SourceRole};
use super::version::{replace_version_tokens, version_text};
use crate::diff::{diff, is_structural_mismatch, Diff, DiffKind, UnionNode};
use crate::fieldpath::Path;
use crate::rules::{MergeStrategy, RuleAction, RuleSet, VersionUpdate, SITE_SOURCE, TEMPLATE_SOURCE};
use crate::value::{Map, Value, DEFAULT_MAX_DEPTH};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::{debug, info, warn};

static DEFAULT_RULES: Lazy<RuleSet> = Lazy::new(RuleSet::default);

/// MergeResult is the merged tree and the log of every decision taken.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub tree: Value,
    pub log: ConflictLog,
}

impl MergeResult {
    pub fn statistics(&self) -> MergeStatistics {
        self.log.statistics()
    }
}

/// Merger merges source trees under a [`RuleSet`].
///
/// Sources are given lowest to highest precedence. One of them is the
/// reference: the structural authority whose paths the output keeps and whose
/// nodes survive structural mismatches. Unless named, the reference is the
/// highest-precedence template source.
///
/// ```ignore
/// let result = Merger::new(&rules)
///     .baseline(&old_template)
///     .merge(&[Source::template("template", new_template), Source::site("site", site)])?;
/// ```
#[derive(Debug, Clone)]
pub struct Merger<'a> {
    rules: &'a RuleSet,
    reference: Option<String>,
    baseline: Option<&'a Value>,
    max_depth: usize,
}

impl Default for Merger<'static> {
    fn default() -> Self {
        Merger::new(&DEFAULT_RULES)
    }
}

impl<'a> Merger<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Merger {
            rules,
            reference: None,
            baseline: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Names the reference source.
    pub fn reference(mut self, id: impl Into<String>) -> Self {
        self.reference = Some(id.into());
        self
    }

    /// Sets the template the site documents were originally derived from.
    ///
    /// Site values equal to the baseline count as uncustomized: they do not
    /// outrank the reference, and they are dropped when the reference no
    /// longer has their path.
    pub fn baseline(mut self, baseline: &'a Value) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Sets the depth below which mappings are merged as a whole.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        self.rules
    }

    /// Merges `sources`, lowest precedence first.
    pub fn merge(&self, sources: &[Source]) -> Result<MergeResult, MergeError> {
        let reference = self.validate(sources)?;
        let mut log = ConflictLog::new();

        let effective: Vec<Cow<'_, Value>> = sources
            .iter()
            .map(|source| {
                if source.role != SourceRole::Site || self.rules.migrations().is_empty() {
                    return Cow::Borrowed(&source.tree);
                }
                let (tree, events) = apply_migrations(&source.tree, self.rules.migrations(), &source.id);
                log.extend(events);
                Cow::Owned(tree)
            })
            .collect();
        let trees: Vec<&Value> = effective.iter().map(|tree| tree.as_ref()).collect();

        // Union order: the reference first, then the others from highest
        // precedence down.
        let order: Vec<usize> = std::iter::once(reference)
            .chain((0..sources.len()).rev().filter(|&i| i != reference))
            .collect();
        let mut slots = vec![0; sources.len()];
        for (position, &source) in order.iter().enumerate() {
            slots[source] = position;
        }
        let ordered: Vec<&Value> = order.iter().map(|&i| trees[i]).collect();

        let run = Run {
            rules: self.rules,
            sources,
            trees: trees.clone(),
            slots,
            reference,
            baseline: self.baseline,
            template_changes: self.baseline.map(|b| diff(b, trees[reference])),
            max_depth: self.max_depth,
            output: trees[reference].clone(),
            log,
        };
        let result = run.run(&ordered);

        info!(
            reference = %sources[reference].id,
            sources = sources.len(),
            "{}",
            result.log.statistics()
        );
        Ok(result)
    }

    fn validate(&self, sources: &[Source]) -> Result<usize, MergeError> {
        if sources.is_empty() {
            return Err(MergeError::NoSources);
        }
        let mut seen = HashSet::new();
        for source in sources {
            if !seen.insert(source.id.as_str()) {
                return Err(MergeError::DuplicateSource(source.id.clone()));
            }
        }
        for strategy in self.rules.strategies() {
            if let Some(id) = strategy.source_id() {
                if !seen.contains(id) {
                    return Err(MergeError::UnknownSource {
                        strategy: strategy.to_string(),
                        id: id.to_string(),
                    });
                }
            }
        }
        match &self.reference {
            Some(id) => sources
                .iter()
                .position(|s| &s.id == id)
                .ok_or_else(|| MergeError::UnknownReference(id.clone())),
            None => Ok(sources
                .iter()
                .rposition(|s| s.role == SourceRole::Template)
                .unwrap_or(sources.len() - 1)),
        }
    }
}

/// Merges a site tree over a reference template with default source ids.
///
/// The template is the reference and has the lower precedence.
pub fn merge(reference: &Value, site: &Value, rules: &RuleSet) -> Result<MergeResult, MergeError> {
    Merger::new(rules).merge(&[
        Source::template(TEMPLATE_SOURCE, reference.clone()),
        Source::site(SITE_SOURCE, site.clone()),
    ])
}

/// How the path being resolved picks its winner.
#[derive(Debug, Clone)]
enum Directive {
    /// No rule applies; the default strategy decides.
    Default,
    /// Inside a union merge.
    Union,
    /// A mapping with critical child keys.
    CriticalChildren,
    /// Critical preservation from a critical entry or a preserve rule.
    Preserve(String),
    /// A path override or a rule with an explicit strategy.
    Explicit { strategy: MergeStrategy, origin: String },
}

impl Directive {
    /// Explicit single-source strategies take mappings as a whole.
    fn is_wholesale(&self) -> bool {
        matches!(self, Directive::Explicit { strategy, .. } if *strategy != MergeStrategy::UnionMerge)
    }

    /// Whether an orphan reached under this directive is always kept.
    fn keeps_orphans(&self) -> bool {
        match self {
            Directive::Preserve(_) | Directive::CriticalChildren | Directive::Union => true,
            Directive::Explicit { strategy, .. } => *strategy == MergeStrategy::UnionMerge,
            Directive::Default => false,
        }
    }

    fn enters_union(&self, default: &MergeStrategy) -> bool {
        match self {
            Directive::Default => *default == MergeStrategy::UnionMerge,
            other => other.keeps_orphans(),
        }
    }

    fn describe(&self, source: &str) -> String {
        match self {
            Directive::Default => format!("source '{}' takes precedence over the reference", source),
            Directive::Union | Directive::CriticalChildren => {
                format!("union merge: source '{}' takes precedence", source)
            }
            Directive::Preserve(origin) => format!("critical {}: kept from source '{}'", origin, source),
            Directive::Explicit { strategy, origin } => {
                format!("{} ({}) selects source '{}'", origin, strategy, source)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    union: bool,
    orphan: bool,
}

/// State of one merge run.
struct Run<'t> {
    rules: &'t RuleSet,
    sources: &'t [Source],
    trees: Vec<&'t Value>,
    /// Union position of each source.
    slots: Vec<usize>,
    reference: usize,
    baseline: Option<&'t Value>,
    template_changes: Option<Diff>,
    max_depth: usize,
    output: Value,
    log: ConflictLog,
}

type Pick<'t> = Option<(usize, &'t Value)>;

impl<'t> Run<'t> {
    fn run(mut self, ordered: &[&'t Value]) -> MergeResult {
        let mut stack = vec![(UnionNode::root(ordered), Scope::default())];
        while let Some((node, scope)) = stack.pop() {
            if let Some((children, child_scope)) = self.resolve(&node, scope) {
                stack.extend(children.into_iter().rev().map(|child| (child, child_scope)));
            }
        }
        self.filter_excluded_annotations();
        self.normalize_versions();
        MergeResult {
            tree: self.output,
            log: self.log,
        }
    }

    /// Resolves one path. Returns the children to visit, if any.
    fn resolve(&mut self, node: &UnionNode<'t>, scope: Scope) -> Option<(Vec<UnionNode<'t>>, Scope)> {
        let directive = self.directive(node, scope);
        let (winner, value) = self.pick(node, &directive)?;
        let reference = node.node(0);
        let descend = value.is_map()
            && reference.map_or(true, Value::is_map)
            && !directive.is_wholesale()
            && node.path.len() < self.max_depth;

        if scope.orphan {
            return self.carry(node, value, descend, scope);
        }
        let Some(reference) = reference else {
            if !self.keep_orphan(&node.path, winner, value, &directive, scope) {
                return None;
            }
            return self.carry(node, value, descend, Scope { orphan: true, ..scope });
        };
        if descend {
            let union = directive.enters_union(self.rules.default_strategy());
            return Some((node.children(), Scope { union, orphan: false }));
        }
        self.commit(&node.path, winner, value, reference, &directive);
        None
    }

    fn directive(&self, node: &UnionNode<'t>, scope: Scope) -> Directive {
        let path = &node.path;
        if path.is_empty() {
            return Directive::Default;
        }
        if let Some(strategy) = self.rules.override_for(path) {
            return Directive::Explicit {
                strategy: strategy.clone(),
                origin: "path override".to_string(),
            };
        }
        let classifier = self.rules.classifier();
        if let Some(classification) = classifier.classify(path) {
            return match classification.action() {
                RuleAction::Preserve => Directive::Preserve(classification.to_string()),
                RuleAction::Strategy(strategy) => Directive::Explicit {
                    strategy,
                    origin: format!("rule {}", classification),
                },
            };
        }
        let child_keys = node
            .present()
            .filter_map(|(_, n)| n.as_map())
            .flat_map(|map| map.keys());
        if classifier.has_critical_child(child_keys) {
            return Directive::CriticalChildren;
        }
        if scope.union {
            Directive::Union
        } else {
            Directive::Default
        }
    }

    fn pick(&self, node: &UnionNode<'t>, directive: &Directive) -> Pick<'t> {
        match directive {
            Directive::Explicit { strategy, .. } => self.by_strategy(node, strategy, false),
            Directive::Preserve(_) | Directive::CriticalChildren => {
                self.most_site_specific(node).or_else(|| self.highest(node, false))
            }
            Directive::Union => self.highest(node, true),
            Directive::Default => self.by_strategy(node, self.rules.default_strategy(), true),
        }
    }

    fn by_strategy(&self, node: &UnionNode<'t>, strategy: &MergeStrategy, baseline_aware: bool) -> Pick<'t> {
        match strategy {
            MergeStrategy::TakeSpecificSource(id) => self
                .specific(node, id)
                .filter(|&(i, value)| !(baseline_aware && self.is_uncustomized(node, i, value)))
                .or_else(|| self.highest(node, baseline_aware)),
            MergeStrategy::TakeHighestPrecedenceSource | MergeStrategy::UnionMerge => {
                self.highest(node, baseline_aware)
            }
        }
    }

    fn value_at(&self, node: &UnionNode<'t>, source: usize) -> Option<&'t Value> {
        node.node(self.slots[source])
    }

    /// The highest-precedence source defining the path. Uncustomized site
    /// values give way to the reference when `baseline_aware` is set.
    fn highest(&self, node: &UnionNode<'t>, baseline_aware: bool) -> Pick<'t> {
        (0..self.sources.len())
            .rev()
            .filter_map(|i| self.value_at(node, i).map(|value| (i, value)))
            .find(|&(i, value)| !(baseline_aware && self.is_uncustomized(node, i, value)))
            .or_else(|| node.node(0).map(|value| (self.reference, value)))
    }

    fn most_site_specific(&self, node: &UnionNode<'t>) -> Pick<'t> {
        (0..self.sources.len())
            .rev()
            .filter(|&i| self.sources[i].is_site())
            .find_map(|i| self.value_at(node, i).map(|value| (i, value)))
    }

    fn specific(&self, node: &UnionNode<'t>, id: &str) -> Pick<'t> {
        let i = self.sources.iter().position(|s| s.id == id)?;
        self.value_at(node, i).map(|value| (i, value))
    }

    /// A site value equal to the baseline and of the reference's kind.
    fn is_uncustomized(&self, node: &UnionNode<'t>, source: usize, value: &Value) -> bool {
        if source == self.reference || !self.sources[source].is_site() {
            return false;
        }
        let Some(reference) = node.node(0) else {
            return false;
        };
        !is_structural_mismatch(reference, value)
            && self
                .baseline
                .and_then(|b| b.get_path(&node.path))
                .is_some_and(|b| b == value)
    }

    fn commit(&mut self, path: &Path, winner: usize, value: &'t Value, reference: &'t Value, directive: &Directive) {
        if is_structural_mismatch(value, reference) {
            let reason = self.mismatch_reason(path, winner, value, reference);
            warn!(path = %path, %reason, "structural mismatch, keeping reference");
            self.log.push(
                ConflictEvent::new(path.clone(), ConflictAction::StructuralMismatch, reason)
                    .source_value(Some(value))
                    .target_value(Some(reference))
                    .reference_default(Some(reference))
                    .manual_review(true),
            );
            return;
        }
        if value == reference || !self.write(path, value.clone()) {
            return;
        }
        let source = &self.sources[winner].id;
        debug!(path = %path, source = %source, "overwrite");
        self.log.push(
            ConflictEvent::new(path.clone(), ConflictAction::Overwrite, directive.describe(source))
                .source_value(Some(value))
                .target_value(Some(value))
                .reference_default(Some(reference)),
        );
    }

    fn mismatch_reason(&self, path: &Path, winner: usize, value: &Value, reference: &Value) -> String {
        let source = &self.sources[winner].id;
        match self.template_changes.as_ref().and_then(|changes| changes.get(path)) {
            Some(entry) if entry.kind == DiffKind::StructuralMismatch => format!(
                "template {}; {} from source '{}' discarded",
                entry.describe(),
                value.kind(),
                source
            ),
            _ => format!(
                "source '{}' has a {} where the reference has a {}",
                source,
                value.kind(),
                reference.kind()
            ),
        }
    }

    /// Decides whether a path the reference lacks goes into the output, and
    /// records the decision.
    fn keep_orphan(&mut self, path: &Path, winner: usize, value: &Value, directive: &Directive, scope: Scope) -> bool {
        let source = self.sources[winner].id.clone();
        if scope.union || directive.keeps_orphans() {
            debug!(path = %path, source = %source, "orphan kept by union merge");
            self.log.push(
                ConflictEvent::new(
                    path.clone(),
                    ConflictAction::Added,
                    format!("kept from source '{}' by union merge", source),
                )
                .source_value(Some(value))
                .target_value(Some(value)),
            );
            return true;
        }

        let baseline = self.baseline.and_then(|b| b.get_path(path));
        if baseline == Some(value) {
            debug!(path = %path, "removed from template, not customized");
            self.log.push(
                ConflictEvent::new(
                    path.clone(),
                    ConflictAction::Deleted,
                    "removed from the template and not customized",
                )
                .source_value(Some(value)),
            );
            return false;
        }

        if self.rules.carry_orphan_keys() {
            let reason = match baseline {
                Some(_) => format!("removed from the template but customized in source '{}'; carried", source),
                None => format!("not in the reference; carried from source '{}'", source),
            };
            self.log.push(
                ConflictEvent::new(path.clone(), ConflictAction::Added, reason)
                    .source_value(Some(value))
                    .target_value(Some(value))
                    .manual_review(baseline.is_some()),
            );
            true
        } else {
            warn!(path = %path, source = %source, "orphan dropped");
            self.log.push(
                ConflictEvent::new(
                    path.clone(),
                    ConflictAction::Deleted,
                    format!("not in the reference; dropped from source '{}'", source),
                )
                .source_value(Some(value))
                .manual_review(true),
            );
            false
        }
    }

    /// Copies an orphan into the output, as an empty mapping when its
    /// children are resolved one by one.
    fn carry(
        &mut self,
        node: &UnionNode<'t>,
        value: &Value,
        descend: bool,
        scope: Scope,
    ) -> Option<(Vec<UnionNode<'t>>, Scope)> {
        if descend {
            self.write(&node.path, Value::Map(Map::new()));
            Some((node.children(), scope))
        } else {
            self.write(&node.path, value.clone());
            None
        }
    }

    fn write(&mut self, path: &Path, value: Value) -> bool {
        match self.output.set_in_place(path, value) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path, error = %err, "value could not be written");
                false
            }
        }
    }

    /// Removes excluded keys from annotation mappings, and from annotation
    /// sequences written as mappings or `key: value` strings.
    fn filter_excluded_annotations(&mut self) {
        let rules = self.rules;
        let excluded = rules.excluded_annotations();
        if excluded.is_empty() {
            return;
        }
        let annotations: Vec<(Path, Value)> = self
            .output
            .walk()
            .filter(|(path, _)| path.last_key().is_some_and(is_annotation_key))
            .map(|(path, node)| (path, node.clone()))
            .collect();

        for (path, node) in annotations {
            match node {
                Value::Map(map) => {
                    for key in map.keys().filter(|k| excluded.contains(*k)) {
                        let child = path.with_key(key);
                        if let Ok(Some(removed)) = self.output.remove_in_place(&child) {
                            debug!(path = %child, "excluded annotation removed");
                            self.log.push(
                                ConflictEvent::new(child.clone(), ConflictAction::Deleted, "excluded annotation")
                                    .source_value(Some(&removed))
                                    .reference_default(self.trees[self.reference].get_path(&child)),
                            );
                        }
                    }
                }
                Value::List(items) => {
                    let kept = without_excluded_items(&items, excluded);
                    if kept == items {
                        continue;
                    }
                    let filtered = Value::List(kept);
                    if self.write(&path, filtered.clone()) {
                        debug!(path = %path, "excluded annotations removed from sequence");
                        self.log.push(
                            ConflictEvent::new(path.clone(), ConflictAction::Deleted, "excluded annotation")
                                .source_value(Some(&Value::List(items)))
                                .target_value(Some(&filtered))
                                .reference_default(self.trees[self.reference].get_path(&path)),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn normalize_versions(&mut self) {
        let Some(update) = self.rules.version_update() else {
            return;
        };
        let Some((from, to)) = self.version_tokens(update) else {
            debug!("version update configured but no versions found");
            return;
        };
        let events = replace_version_tokens(&mut self.output, update, &from, &to, self.trees[self.reference]);
        info!(from = %from, to = %to, fields = events.len(), "versions normalized");
        self.log.extend(events);
    }

    /// Returns the (old, new) version tokens, falling back to the first
    /// version path in the site and reference trees.
    fn version_tokens(&self, update: &VersionUpdate) -> Option<(String, String)> {
        let first = update.version_paths.first();
        let to = match &update.target_version {
            Some(version) => version.clone(),
            None => first
                .and_then(|p| self.trees[self.reference].get_path(p))
                .and_then(version_text)?,
        };
        let from = match &update.from_version {
            Some(version) => version.clone(),
            None => {
                let path = first?;
                (0..self.sources.len())
                    .rev()
                    .filter(|&i| self.sources[i].is_site())
                    .find_map(|i| self.trees[i].get_path(path))
                    .or_else(|| self.baseline?.get_path(path))
                    .and_then(version_text)?
            }
        };
        Some((from, to))
    }
}

fn is_annotation_key(key: &str) -> bool {
    key.to_ascii_lowercase().contains("annotations")
}

/// Filters an annotation sequence. Mapping items lose their excluded keys
/// and are dropped once empty; `key: value` strings are dropped by key.
fn without_excluded_items(items: &[Value], excluded: &HashSet<String>) -> Vec<Value> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Map(map) => {
                let kept: Map = map
                    .iter()
                    .filter(|(key, _)| !excluded.contains(key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                (!kept.is_empty()).then_some(Value::Map(kept))
            }
            Value::String(s) => match s.split_once(':') {
                Some((key, _)) if excluded.contains(key.trim()) => None,
                _ => Some(item.clone()),
            },
            other => Some(other.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_yaml;

    fn y(s: &str) -> Value {
        from_yaml(s).unwrap()
    }

    #[test]
    fn test_validation_errors() {
        let rules = RuleSet::default();
        let merger = Merger::new(&rules);
        assert_eq!(merger.merge(&[]), Err(MergeError::NoSources));
        assert_eq!(
            merger.merge(&[Source::site("a", y("x: 1")), Source::site("a", y("x: 2"))]),
            Err(MergeError::DuplicateSource("a".into()))
        );
        assert_eq!(
            Merger::new(&rules).reference("nope").merge(&[Source::site("a", y("x: 1"))]),
            Err(MergeError::UnknownReference("nope".into()))
        );
    }

    #[test]
    fn test_unknown_source_in_strategy() {
        let rules = RuleSet::builder()
            .path_override("x", MergeStrategy::TakeSpecificSource("overlay".into()))
            .build()
            .unwrap();
        let err = merge(&y("x: 1"), &y("x: 2"), &rules).unwrap_err();
        assert_eq!(
            err,
            MergeError::UnknownSource {
                strategy: "source:overlay".into(),
                id: "overlay".into()
            }
        );
    }

    #[test]
    fn test_reference_defaults_to_highest_template() {
        let result = Merger::default()
            .merge(&[
                Source::template("old", y("a: 1\nb: 2\n")),
                Source::template("new", y("a: 1\n")),
                Source::site("site", y("a: 5\n")),
            ])
            .unwrap();
        // "new" is the reference, so b is an orphan from "old" and is carried.
        assert_eq!(result.tree, y("a: 5\nb: 2\n"));
        assert_eq!(result.log.of_action(ConflictAction::Added).count(), 1);
    }

    #[test]
    fn test_reference_is_not_mutated() {
        let reference = y("a:\n  b: 1\n");
        let site = y("a:\n  b: 2\n");
        let before = reference.clone();
        let result = merge(&reference, &site, &RuleSet::default()).unwrap();
        assert_eq!(reference, before);
        assert_eq!(result.tree, site);
    }

    #[test]
    fn test_annotation_sequence_filtering() {
        let excluded: HashSet<String> = ["skip".to_string()].into_iter().collect();
        let items = y("- skip: 1
- skip: 2
  keep: 3
- 'skip: 4'
- 'keep: 5'
- 6
");
        let Value::List(items) = items else {
            panic!("expected a sequence");
        };
        assert_eq!(
            Value::List(without_excluded_items(&items, &excluded)),
            y("- keep: 3
- 'keep: 5'
- 6
")
        );
        assert!(is_annotation_key("podAnnotations"));
        assert!(!is_annotation_key("labels"));
    }

    #[test]
    fn test_depth_guard_merges_deep_mappings_whole() {
        let reference = y("a:\n  b:\n    c: 1\n    d: 2\n");
        let site = y("a:\n  b:\n    c: 9\n");
        let rules = RuleSet::default();
        let result = Merger::new(&rules)
            .with_max_depth(1)
            .merge(&[
                Source::template("template", reference),
                Source::site("site", site.clone()),
            ])
            .unwrap();
        assert_eq!(result.tree, site);
        assert_eq!(result.log.len(), 1);
        assert_eq!(result.log.events()[0].path.to_string(), "a");
    }
}
