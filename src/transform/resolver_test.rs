//! Tests for relocation resolution.

#[cfg(test)]
mod tests {
    use crate::merge::{merge, ConflictAction};
    use crate::rules::{RuleSet, TransformOptions};
    use crate::transform::{
        BatchDecider, Confidence, Decision, Outcome, PathTransformCandidate, ResolutionStatus, Resolver,
    };
    use crate::value::{from_yaml, Value};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn y(s: &str) -> Value {
        from_yaml(s).unwrap()
    }

    #[test]
    fn test_relocated_timeout_moves_to_new_path() {
        let reference = y("new:\n  timeout:\nother: 1\n");
        let site = y("old:\n  timeout: 30\nother: 1\n");
        let merged = merge(&reference, &site, &RuleSet::default()).unwrap();
        assert_eq!(merged.tree, y("new:\n  timeout:\nother: 1\nold:\n  timeout: 30\n"));

        let resolver = Resolver::new(&reference, &TransformOptions::default());
        let resolution = resolver.resolve(&merged.tree, &mut BatchDecider);

        assert_eq!(resolution.tree, y("new:\n  timeout: 30\nother: 1\n"));
        assert!(resolution.is_complete());
        assert_eq!(resolution.candidates.len(), 1);
        let resolved = &resolution.candidates[0];
        assert_eq!(resolved.outcome, Outcome::Applied);
        assert_eq!(resolved.candidate.confidence, Confidence::High);
        assert_eq!(resolved.candidate.old_path.to_string(), "old.timeout");
        assert_eq!(resolved.candidate.new_path.to_string(), "new.timeout");

        let events: Vec<_> = resolution.log.iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ConflictAction::Migrated);
        assert_eq!(events[0].path.to_string(), "new.timeout");
        assert_eq!(events[0].reason, "moved from old.timeout (high confidence)");
        assert_eq!(events[0].reference_default, Some(Value::Null));
    }

    #[test]
    fn test_ambiguous_candidates_stay_unresolved_in_batch() {
        let reference = y("a:\n  host: x\nb:\n  host: y\nz: 1\n");
        let merged = y("a:\n  host: db.corp\nb:\n  host: db.corp\nz: 1\nx:\n  id: 4242\ny:\n  id: 4242\n");
        let resolution = Resolver::new(&reference, &TransformOptions::default()).resolve(&merged, &mut BatchDecider);

        assert_eq!(resolution.tree, merged);
        assert!(resolution.log.is_empty());
        let summary: Vec<(Confidence, Outcome)> = resolution
            .candidates
            .iter()
            .map(|c| (c.candidate.confidence, c.outcome))
            .collect();
        assert_eq!(
            summary,
            vec![(Confidence::Medium, Outcome::Skipped), (Confidence::Low, Outcome::Skipped)]
        );
        assert_eq!(resolution.unresolved().count(), 2);
    }

    #[test]
    fn test_decider_sees_medium_and_low_in_order() {
        let reference = y("a:\n  host: x\nb:\n  host: y\nz: 1\n");
        let merged = y("x:\n  id: 4242\ny:\n  id: 4242\na:\n  host: db.corp\nb:\n  host: db.corp\nz: 1\n");
        let mut seen = Vec::new();
        let mut decider = |c: &PathTransformCandidate| {
            seen.push(c.confidence);
            Decision::Apply
        };
        let resolution = Resolver::new(&reference, &TransformOptions::default()).resolve(&merged, &mut decider);

        assert_eq!(seen, vec![Confidence::Medium, Confidence::Low]);
        // a.host is a reference path and stays; x.id is not and is removed.
        assert_eq!(
            resolution.tree,
            y("y:\n  id: 4242\na:\n  host: db.corp\nb:\n  host: db.corp\nz: 1\n")
        );
        assert_eq!(resolution.applied().count(), 2);
    }

    #[test]
    fn test_high_confidence_can_require_a_decision() {
        let reference = y("new:\n  timeout:\n");
        let merged = y("new:\n  timeout:\nold:\n  timeout: 30\n");
        let options = TransformOptions {
            auto_apply_high: false,
            ..Default::default()
        };
        let mut asked = 0;
        let mut decider = |_: &PathTransformCandidate| {
            asked += 1;
            Decision::Skip
        };
        let resolution = Resolver::new(&reference, &options).resolve(&merged, &mut decider);
        assert_eq!(asked, 1);
        assert_eq!(resolution.tree, merged);
        assert_eq!(resolution.candidates[0].outcome, Outcome::Skipped);
    }

    #[test]
    fn test_cancel_keeps_applied_moves() {
        let reference = y("new:\n  timeout:\na:\n  host: x\nb:\n  host: y\nz: 1\n");
        let merged = y(
            "new:\n  timeout:\na:\n  host: db.corp\nb:\n  host: db.corp\nz: 1\nold:\n  timeout: 30\nx:\n  id: 4242\ny:\n  id: 4242\n",
        );
        let mut decider = |_: &PathTransformCandidate| Decision::Cancel;
        let resolution = Resolver::new(&reference, &TransformOptions::default()).resolve(&merged, &mut decider);

        assert_eq!(resolution.status, ResolutionStatus::Cancelled { pending: 2 });
        assert!(!resolution.is_complete());
        assert_eq!(resolution.applied().count(), 1);
        assert_eq!(resolution.log.len(), 1);
        assert_eq!(resolution.tree.get_path(&"new.timeout".parse().unwrap()), Some(&Value::Int(30)));
        assert!(!resolution.tree.has_path(&"old".parse().unwrap()));
        assert_eq!(resolution.with_outcome(Outcome::Pending).count(), 2);
        assert!(resolution.to_string().contains("cancelled with 2 pending"));
    }

    #[test]
    fn test_duplicate_high_cluster_removes_every_stale_copy() {
        let reference = y("client:\n  endpoint: https://default\n");
        let merged = y(
            "client:\n  endpoint: https://api.corp\nlegacy:\n  endpoint: https://api.corp\nv1:\n  endpoint: https://api.corp\n",
        );
        let resolution = Resolver::new(&reference, &TransformOptions::default()).resolve(&merged, &mut BatchDecider);
        assert_eq!(resolution.tree, y("client:\n  endpoint: https://api.corp\n"));
        assert_eq!(resolution.applied().count(), 2);
    }

    #[test]
    fn test_resolution_report() {
        let reference = y("new:\n  timeout:\n");
        let merged = y("new:\n  timeout:\nold:\n  timeout: 30\n");
        let resolution = Resolver::new(&reference, &TransformOptions::default()).resolve(&merged, &mut BatchDecider);
        assert_eq!(
            resolution.to_string(),
            "Transformations: 1 candidate(s)\n  Applied [high] old.timeout -> new.timeout = 30 (key moved to the only matching reference path)"
        );
    }

    #[test]
    fn test_second_run_finds_nothing_to_apply() {
        let reference = y("new:\n  timeout:\nclient:\n  endpoint: https://default\n");
        let merged = y(
            "new:\n  timeout:\nclient:\n  endpoint: https://api.corp\nold:\n  timeout: 30\nlegacy:\n  endpoint: https://api.corp\n",
        );
        let resolver = Resolver::new(&reference, &TransformOptions::default());
        let first = resolver.resolve(&merged, &mut BatchDecider);
        assert_eq!(first.applied().count(), 2);

        let second = resolver.resolve(&first.tree, &mut BatchDecider);
        assert!(second.candidates.is_empty());
        assert_eq!(second.tree, first.tree);
    }

    #[test]
    fn test_resolved_duplicate_target_is_not_reused() {
        let reference = y("a:\n  b:\n    a: b\n");
        let site = y("a:\n  a:\n    a: b\n  c:\n    a: 10\n");
        let merged = merge(&reference, &site, &RuleSet::default()).unwrap();
        let resolver = Resolver::new(&reference, &TransformOptions::default());

        let first = resolver.resolve(&merged.tree, &mut BatchDecider);
        assert_eq!(first.applied().count(), 1);
        assert_eq!(first.tree, y("a:\n  b:\n    a: b\n  c:\n    a: 10\n"));

        let second = resolver.resolve(&first.tree, &mut BatchDecider);
        assert_eq!(second.applied().count(), 0);
        assert_eq!(second.tree, first.tree);
    }

    #[test]
    fn test_same_typed_orphan_onto_resolved_target_needs_a_decision() {
        let reference = y("a:\n  b:\n    a: bb\n");
        let site = y("a:\n  a:\n    a: bb\n  c:\n    a: cc\n");
        let merged = merge(&reference, &site, &RuleSet::default()).unwrap();
        let resolver = Resolver::new(&reference, &TransformOptions::default());

        let first = resolver.resolve(&merged.tree, &mut BatchDecider);
        let second = resolver.resolve(&first.tree, &mut BatchDecider);
        assert_eq!(second.applied().count(), 0);
        assert_eq!(second.tree, first.tree);
        let pending: Vec<Confidence> = second.candidates.iter().map(|c| c.candidate.confidence).collect();
        assert_eq!(pending, vec![Confidence::Medium]);
    }

    #[test]
    fn test_populated_default_is_not_overwritten_in_batch() {
        let reference = y("app:\n  name: checkout\n  replicas: 3\n");
        let site = y("app:\n  name: checkout\n  replicas: 3\nsidecar:\n  name: envoy-proxy\n");
        let merged = merge(&reference, &site, &RuleSet::default()).unwrap();

        let resolution = Resolver::new(&reference, &TransformOptions::default()).resolve(&merged.tree, &mut BatchDecider);

        assert_eq!(resolution.tree, merged.tree);
        assert!(resolution.log.is_empty());
        let summary: Vec<(String, Confidence, Outcome)> = resolution
            .candidates
            .iter()
            .map(|c| (c.candidate.new_path.to_string(), c.candidate.confidence, c.outcome))
            .collect();
        assert_eq!(
            summary,
            vec![("app.name".to_string(), Confidence::Medium, Outcome::Skipped)]
        );
    }

    fn document() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            (0i64..40).prop_map(Value::Int),
            "[a-c]{1,2}".prop_map(Value::String),
            Just(Value::Null),
        ];
        let node = leaf.prop_recursive(3, 24, 3, |inner| {
            prop::collection::btree_map("[a-c]", inner, 0..3).prop_map(|m| Value::Map(m.into_iter().collect()))
        });
        prop::collection::btree_map("[a-d]", node, 1..4).prop_map(|m| Value::Map(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn test_resolve_is_idempotent(reference in document(), site in document()) {
            let merged = merge(&reference, &site, &RuleSet::default()).unwrap();
            let resolver = Resolver::new(&reference, &TransformOptions::default());

            let first = resolver.resolve(&merged.tree, &mut BatchDecider);
            let second = resolver.resolve(&first.tree, &mut BatchDecider);

            prop_assert_eq!(second.applied().count(), 0);
            prop_assert_eq!(&second.tree, &first.tree);
            prop_assert!(second.candidates.iter().all(|c| c.candidate.confidence != Confidence::High));
        }
    }
}
