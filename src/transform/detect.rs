//! Relocation candidate detection.

use super::candidate::{Confidence, PathTransformCandidate};
use super::index::{is_low_signal, ValueIndex};
use crate::fieldpath::Path;
use crate::rules::TransformOptions;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::mem;
use tracing::debug;

/// Finds likely relocations in `merged` by comparing it against `reference`.
///
/// Two passes run in order. The duplicate pass clusters equal values found
/// at several paths and rates each cluster by how many of its paths the
/// reference has: exactly one is High, two or more is Medium, none is Low.
/// The orphan pass then looks at leaves the reference lacks and matches them
/// by leaf key against reference paths still holding their reference value
/// of the same type. Leaves already in a duplicate cluster take no part. A
/// match is High only if the reference leaves the target unset, the orphan
/// has no other target and no other orphan wants it; otherwise Medium.
pub fn detect(merged: &Value, reference: &Value, options: &TransformOptions) -> Vec<PathTransformCandidate> {
    let mut candidates = duplicate_candidates(merged, reference, options);
    let claimed: HashSet<Path> = candidates
        .iter()
        .flat_map(|c| [c.old_path.clone(), c.new_path.clone()])
        .collect();
    candidates.extend(orphan_candidates(merged, reference, options, &claimed));
    debug!(candidates = candidates.len(), "relocation candidates detected");
    candidates
}

fn duplicate_candidates(merged: &Value, reference: &Value, options: &TransformOptions) -> Vec<PathTransformCandidate> {
    let index = ValueIndex::build(merged, options);
    let mut candidates = Vec::new();

    for (key, paths) in index.duplicates() {
        let (known, unknown): (Vec<&Path>, Vec<&Path>) = paths.iter().partition(|p| reference.has_path(p));
        match known.len() {
            1 => {
                for old in &unknown {
                    candidates.push(PathTransformCandidate {
                        old_path: (*old).clone(),
                        new_path: known[0].clone(),
                        confidence: Confidence::High,
                        value: key.value.clone(),
                        reason: "value duplicated at a path the reference lacks".to_string(),
                    });
                }
            }
            n => {
                let (confidence, reason) = if n >= 2 {
                    (Confidence::Medium, "value duplicated across reference paths")
                } else {
                    (Confidence::Low, "value duplicated outside the reference")
                };
                let mut sorted: Vec<&Path> = paths.iter().collect();
                sorted.sort();
                for pair in sorted.windows(2) {
                    candidates.push(PathTransformCandidate {
                        old_path: pair[0].clone(),
                        new_path: pair[1].clone(),
                        confidence,
                        value: key.value.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }
    candidates
}

fn orphan_candidates(
    merged: &Value,
    reference: &Value,
    options: &TransformOptions,
    claimed: &HashSet<Path>,
) -> Vec<PathTransformCandidate> {
    // Reference leaves by key, limited to those the merge left at their
    // reference value.
    let mut targets: IndexMap<String, Vec<(Path, &Value)>> = IndexMap::new();
    for (path, node) in reference.walk() {
        if node.is_map() || merged.get_path(&path) != Some(node) {
            continue;
        }
        if let Some(key) = path.last_key().map(str::to_string) {
            targets.entry(key).or_default().push((path, node));
        }
    }

    let mut matches: Vec<(Path, Value, Vec<(Path, &Value)>)> = Vec::new();
    for (path, node) in merged.walk() {
        if node.is_map()
            || is_low_signal(node, options.noise_threshold)
            || reference.has_path(&path)
            || claimed.contains(&path)
        {
            continue;
        }
        let Some(key) = path.last_key() else { continue };
        let Some(found) = targets.get(key) else { continue };
        let compatible: Vec<(Path, &Value)> = found
            .iter()
            .filter(|(_, default)| default.is_null() || mem::discriminant(*default) == mem::discriminant(node))
            .cloned()
            .collect();
        if !compatible.is_empty() {
            matches.push((path, node.clone(), compatible));
        }
    }

    // A target wanted by several orphans is ambiguous for all of them.
    let mut demand: IndexMap<&Path, usize> = IndexMap::new();
    for (target, _) in matches.iter().flat_map(|(_, _, found)| found) {
        *demand.entry(target).or_default() += 1;
    }

    let mut candidates = Vec::new();
    for (old, value, found) in &matches {
        let high = match found.as_slice() {
            [(only, default)] => is_unset(default) && demand.get(only).copied() == Some(1),
            _ => false,
        };
        let (confidence, reason) = match (high, found.len()) {
            (true, _) => (Confidence::High, "key moved to the only matching reference path"),
            (false, 1) => (Confidence::Medium, "key matches a reference path holding a default"),
            (false, _) => (Confidence::Medium, "key matches several reference paths"),
        };
        for (target, _) in found {
            candidates.push(PathTransformCandidate {
                old_path: old.clone(),
                new_path: target.clone(),
                confidence,
                value: value.clone(),
                reason: reason.to_string(),
            });
        }
    }
    candidates
}

/// A reference default that carries no data of its own.
fn is_unset(default: &Value) -> bool {
    match default {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => false,
    }
}
