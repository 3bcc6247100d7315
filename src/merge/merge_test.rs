//! Tests for merge scenarios and merge properties.

#[cfg(test)]
mod tests {
    use crate::fieldpath::Path;
    use crate::merge::{merge, ConflictAction, MergeResult, Merger, Source};
    use crate::rules::{MergeStrategy, RuleAction, RuleSet, RuleSpec, VersionUpdateSpec};
    use crate::value::{from_yaml, Map, Value};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn y(s: &str) -> Value {
        from_yaml(s).unwrap()
    }

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn actions(result: &MergeResult) -> Vec<(String, ConflictAction)> {
        result
            .log
            .iter()
            .map(|e| (e.path.to_string(), e.action))
            .collect()
    }

    fn upgrade(rules: &RuleSet, baseline: &Value, reference: &str, site: &str) -> MergeResult {
        Merger::new(rules)
            .baseline(baseline)
            .merge(&[Source::template("template", y(reference)), Source::site("site", y(site))])
            .unwrap()
    }

    #[test]
    fn test_site_value_overwrites_template_default() {
        let rules = RuleSet::builder()
            .default_strategy("nsprev".parse().unwrap())
            .build()
            .unwrap();
        let result = upgrade(&rules, &y("a:\n  b: 1\n"), "a:\n  b: 2\n  c: 3\n", "a:\n  b: 99\n");

        assert_eq!(result.tree, y("a:\n  b: 99\n  c: 3\n"));
        assert_eq!(actions(&result), vec![("a.b".to_string(), ConflictAction::Overwrite)]);
        let event = &result.log.events()[0];
        assert_eq!(event.source_value, Some(Value::Int(99)));
        assert_eq!(event.reference_default, Some(Value::Int(2)));
        assert!(!event.manual_review);
    }

    #[test]
    fn test_critical_mapping_is_union_merged() {
        let rules = RuleSet::builder()
            .critical_path("svc.annotations")
            .build()
            .unwrap();
        let result = merge(
            &y("svc:\n  annotations:\n    k2: v2\n"),
            &y("svc:\n  annotations:\n    k1: v1\n"),
            &rules,
        )
        .unwrap();

        assert_eq!(result.tree, y("svc:\n  annotations:\n    k1: v1\n    k2: v2\n"));
        assert_eq!(
            actions(&result),
            vec![("svc.annotations.k1".to_string(), ConflictAction::Added)]
        );
    }

    #[test]
    fn test_excluded_annotations_are_dropped() {
        let rules = RuleSet::builder()
            .critical_path("svc.annotations")
            .excluded_annotation("deployment.kubernetes.io/revision")
            .build()
            .unwrap();
        let result = merge(
            &y("svc:\n  annotations:\n    k2: v2\n    deployment.kubernetes.io/revision: '3'\nother:\n  deployment.kubernetes.io/revision: '3'\n"),
            &y("svc:\n  annotations:\n    k1: v1\n    deployment.kubernetes.io/revision: '7'\n"),
            &rules,
        )
        .unwrap();

        assert_eq!(
            result.tree,
            y("svc:\n  annotations:\n    k1: v1\n    k2: v2\nother:\n  deployment.kubernetes.io/revision: '3'\n")
        );
        let last = result.log.events().last().unwrap();
        assert_eq!(last.path, p(r#"svc.annotations["deployment.kubernetes.io/revision"]"#));
        assert_eq!(last.action, ConflictAction::Deleted);
        assert_eq!(last.source_value, Some(Value::from("7")));
        assert_eq!(last.reference_default, Some(Value::from("3")));
    }

    #[test]
    fn test_union_merge_survives_disabled_orphan_carry() {
        let rules = RuleSet::builder()
            .critical_path("svc.annotations")
            .carry_orphan_keys(false)
            .build()
            .unwrap();
        let result = merge(
            &y("svc:\n  annotations:\n    k2: v2\n"),
            &y("svc:\n  annotations:\n    k1: v1\n  extra: 1\n"),
            &rules,
        )
        .unwrap();
        assert_eq!(result.tree, y("svc:\n  annotations:\n    k1: v1\n    k2: v2\n"));
        assert_eq!(
            actions(&result),
            vec![
                ("svc.annotations.k1".to_string(), ConflictAction::Added),
                ("svc.extra".to_string(), ConflictAction::Deleted),
            ]
        );
    }

    #[test]
    fn test_critical_key_beats_general_precedence() {
        // The template outranks the site here; only the critical key keeps
        // the site value.
        let rules = RuleSet::builder().critical_key("password").build().unwrap();
        let result = Merger::new(&rules)
            .merge(&[
                Source::site("site", y("db:\n  password: s3cret\n  user: site\n  pool: 4\n")),
                Source::template("template", y("db:\n  password: changeme\n  user: admin\n")),
            ])
            .unwrap();

        assert_eq!(
            result.tree,
            y("db:\n  password: s3cret\n  user: admin\n  pool: 4\n")
        );
        assert_eq!(
            actions(&result),
            vec![
                ("db.password".to_string(), ConflictAction::Overwrite),
                ("db.pool".to_string(), ConflictAction::Added),
            ]
        );
    }

    #[test]
    fn test_scalar_against_new_mapping_keeps_reference() {
        let rules = RuleSet::default();
        let result = upgrade(
            &rules,
            &y("db:\n  timeout: 30\n"),
            "db:\n  timeout:\n    connect: 5\n    read: 30\n",
            "db:\n  timeout: 45\n",
        );

        assert_eq!(result.tree, y("db:\n  timeout:\n    connect: 5\n    read: 30\n"));
        assert_eq!(result.log.len(), 1);
        let event = &result.log.events()[0];
        assert_eq!(event.path, p("db.timeout"));
        assert_eq!(event.action, ConflictAction::StructuralMismatch);
        assert!(event.manual_review);
        assert_eq!(event.source_value, Some(Value::Int(45)));
        assert_eq!(
            event.reason,
            "template type changed from scalar to mapping; scalar from source 'site' discarded"
        );
    }

    #[test]
    fn test_mismatch_without_baseline() {
        let result = merge(&y("hosts:\n  primary: a\n"), &y("hosts: [a, b]\n"), &RuleSet::default()).unwrap();
        assert_eq!(result.tree, y("hosts:\n  primary: a\n"));
        assert_eq!(
            result.log.events()[0].reason,
            "source 'site' has a sequence where the reference has a mapping"
        );
    }

    #[test]
    fn test_self_merge_is_identity() {
        let tree = y("a:\n  b: 1\n  c: [1, 2]\nd: text\ne:\n  f:\n    g: null\n");
        let result = merge(&tree, &tree, &RuleSet::default()).unwrap();
        assert_eq!(result.tree, tree);
        assert!(result.log.is_empty());
    }

    #[test]
    fn test_orphans_follow_carry_flag() {
        let reference = y("a: 1\n");
        let site = y("a: 1\nlocal:\n  x: 1\n  y: 2\n");

        let carried = merge(&reference, &site, &RuleSet::default()).unwrap();
        assert_eq!(carried.tree, site);
        // One event at the orphan root, none for its children.
        assert_eq!(actions(&carried), vec![("local".to_string(), ConflictAction::Added)]);
        assert!(!carried.log.events()[0].manual_review);

        let rules = RuleSet::builder().carry_orphan_keys(false).build().unwrap();
        let dropped = merge(&reference, &site, &rules).unwrap();
        assert_eq!(dropped.tree, reference);
        assert_eq!(actions(&dropped), vec![("local".to_string(), ConflictAction::Deleted)]);
        assert!(dropped.log.events()[0].manual_review);
    }

    #[test]
    fn test_uncustomized_template_deletion_is_dropped() {
        let baseline = y("a: 1\nlegacy: on\ntuned: 5\n");
        let result = upgrade(&RuleSet::default(), &baseline, "a: 1\n", "a: 1\nlegacy: on\ntuned: 7\n");

        assert_eq!(result.tree, y("a: 1\ntuned: 7\n"));
        assert_eq!(
            actions(&result),
            vec![
                ("legacy".to_string(), ConflictAction::Deleted),
                ("tuned".to_string(), ConflictAction::Added),
            ]
        );
        assert!(!result.log.events()[0].manual_review);
        assert!(result.log.events()[1].manual_review);
    }

    #[test]
    fn test_uncustomized_site_value_takes_new_default() {
        let baseline = y("replicas: 1\nimage: app:v1\n");
        let result = upgrade(
            &RuleSet::default(),
            &baseline,
            "replicas: 2\nimage: app:v2\n",
            "replicas: 1\nimage: app:custom\n",
        );
        assert_eq!(result.tree, y("replicas: 2\nimage: app:custom\n"));
        assert_eq!(actions(&result), vec![("image".to_string(), ConflictAction::Overwrite)]);
    }

    #[test]
    fn test_higher_priority_rule_decides() {
        let sources = [
            Source::site("site", y("network:\n  vlan: 200\n")),
            Source::template("template", y("network:\n  vlan: 100\n")),
        ];
        let take_template = RuleAction::Strategy(MergeStrategy::TakeSpecificSource("template".into()));

        let rules = RuleSet::builder()
            .rule(RuleSpec::new("vlan", "vlan", 50).with_action(take_template.clone()))
            .rule(RuleSpec::new("^network\\.", "network", 100))
            .build()
            .unwrap();
        let result = Merger::new(&rules).merge(&sources).unwrap();
        assert_eq!(result.tree, y("network:\n  vlan: 200\n"));

        let rules = RuleSet::builder()
            .rule(RuleSpec::new("vlan", "vlan", 100).with_action(take_template))
            .rule(RuleSpec::new("^network\\.", "network", 50))
            .build()
            .unwrap();
        let result = Merger::new(&rules).merge(&sources).unwrap();
        assert_eq!(result.tree, y("network:\n  vlan: 100\n"));
    }

    #[test]
    fn test_path_override_takes_mapping_whole() {
        let rules = RuleSet::builder()
            .path_override("dns", MergeStrategy::TakeSpecificSource("site".into()))
            .carry_orphan_keys(false)
            .build()
            .unwrap();
        let result = merge(
            &y("dns:\n  servers: [10.0.0.1]\n  search: corp\n"),
            &y("dns:\n  servers: [192.168.1.1]\n  ndots: 2\n"),
            &rules,
        )
        .unwrap();
        assert_eq!(result.tree, y("dns:\n  servers: [192.168.1.1]\n  ndots: 2\n"));
        assert_eq!(actions(&result), vec![("dns".to_string(), ConflictAction::Overwrite)]);
        assert!(result.log.events()[0].reason.starts_with("path override (source:site)"));
    }

    #[test]
    fn test_override_to_template_ignores_site() {
        let rules = RuleSet::builder()
            .path_override("image", "engnew".parse().unwrap())
            .build()
            .unwrap();
        let result = merge(&y("image: app:v2\nport: 80\n"), &y("image: app:v1\nport: 81\n"), &rules).unwrap();
        assert_eq!(result.tree, y("image: app:v2\nport: 81\n"));
    }

    #[test]
    fn test_sequences_replaced_whole() {
        let result = merge(
            &y("ports:\n  - name: http\n    port: 80\n  - name: https\n    port: 443\n"),
            &y("ports:\n  - name: http\n    port: 8080\n"),
            &RuleSet::default(),
        )
        .unwrap();
        assert_eq!(result.tree, y("ports:\n  - name: http\n    port: 8080\n"));
        assert_eq!(actions(&result), vec![("ports".to_string(), ConflictAction::Overwrite)]);
    }

    #[test]
    fn test_union_default_strategy() {
        let rules = RuleSet::builder()
            .default_strategy(MergeStrategy::UnionMerge)
            .carry_orphan_keys(false)
            .build()
            .unwrap();
        let result = merge(&y("a:\n  x: 1\n"), &y("a:\n  x: 2\n  y: 3\nb: 4\n"), &rules).unwrap();
        assert_eq!(result.tree, y("a:\n  x: 2\n  y: 3\nb: 4\n"));
        assert_eq!(result.log.of_action(ConflictAction::Deleted).count(), 0);
    }

    #[test]
    fn test_three_sources_precedence() {
        let result = Merger::default()
            .merge(&[
                Source::template("template", y("a: 1\nb: 1\nc: 1\n")),
                Source::site("region", y("a: 2\nb: 2\n")),
                Source::site("host", y("a: 3\n")),
            ])
            .unwrap();
        assert_eq!(result.tree, y("a: 3\nb: 2\nc: 1\n"));
        let reasons: Vec<&str> = result.log.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(
            reasons,
            vec![
                "source 'host' takes precedence over the reference",
                "source 'region' takes precedence over the reference",
            ]
        );
    }

    #[test]
    fn test_migrations_run_before_merge() {
        let rules = RuleSet::builder()
            .migration("old.timeout", "net.timeout")
            .build()
            .unwrap();
        let result = merge(&y("net:\n  timeout: 10\n"), &y("old:\n  timeout: 30\n"), &rules).unwrap();
        assert_eq!(result.tree, y("net:\n  timeout: 30\n"));
        assert_eq!(
            actions(&result),
            vec![
                ("net.timeout".to_string(), ConflictAction::Migrated),
                ("net.timeout".to_string(), ConflictAction::Overwrite),
            ]
        );
    }

    #[test]
    fn test_version_normalization_after_merge() {
        let rules = RuleSet::builder()
            .version_update(VersionUpdateSpec {
                version_paths: vec!["release.version".into()],
                component_image_paths: vec!["components.*.image".into()],
                ..Default::default()
            })
            .build()
            .unwrap();
        let result = upgrade(
            &rules,
            &y("release:\n  version: 4.1.0\ncomponents:\n  api:\n    image: reg/api:4.1.0\n"),
            "release:\n  version: 4.2.0\ncomponents:\n  api:\n    image: reg/api:4.2.0\n",
            "release:\n  version: 4.1.0\ncomponents:\n  api:\n    image: mirror.local/api:4.1.0-hotfix\n",
        );
        assert_eq!(
            result.tree,
            y("release:\n  version: 4.2.0\ncomponents:\n  api:\n    image: mirror.local/api:4.2.0-hotfix\n")
        );
        let last = result.log.events().last().unwrap();
        assert_eq!(last.path, p("components.api.image"));
        assert_eq!(last.reason, "version 4.1.0 updated to 4.2.0");
    }

    #[test]
    fn test_numeric_versions_are_normalized() {
        let rules = RuleSet::builder()
            .version_update(VersionUpdateSpec {
                version_paths: vec!["release.version".into()],
                component_image_paths: vec!["components.*.image".into()],
                ..Default::default()
            })
            .build()
            .unwrap();
        let result = upgrade(
            &rules,
            &y("release:\n  version: 4.1\ncomponents:\n  api:\n    image: reg/api:4.1\n"),
            "release:\n  version: 4.2\ncomponents:\n  api:\n    image: reg/api:4.2\n",
            "release:\n  version: 4.1\ncomponents:\n  api:\n    image: mirror.local/api:4.1-hotfix\n",
        );
        assert_eq!(
            result.tree,
            y("release:\n  version: 4.2\ncomponents:\n  api:\n    image: mirror.local/api:4.2-hotfix\n")
        );
        let last = result.log.events().last().unwrap();
        assert_eq!(last.path, p("components.api.image"));
        assert_eq!(last.reason, "version 4.1 updated to 4.2");
    }

    #[test]
    fn test_merge_is_deterministic() {
        let reference = y("z: 1\na:\n  q: [1]\n  b: x\nm: 3\n");
        let site = y("m: 4\nnew: 1\na:\n  b: y\n  extra: true\n");
        let first = merge(&reference, &site, &RuleSet::default()).unwrap();
        let second = merge(&reference, &site, &RuleSet::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.tree).unwrap(),
            serde_json::to_string(&second.tree).unwrap()
        );
        assert_eq!(
            actions(&first),
            vec![
                ("a.b".to_string(), ConflictAction::Overwrite),
                ("a.extra".to_string(), ConflictAction::Added),
                ("m".to_string(), ConflictAction::Overwrite),
                ("new".to_string(), ConflictAction::Added),
            ]
        );
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::Int),
            any::<bool>().prop_map(Value::Bool),
            "[a-z]{0,6}".prop_map(Value::String),
            prop::collection::vec(any::<i64>().prop_map(Value::Int), 0..3).prop_map(Value::List),
        ]
    }

    fn document() -> impl Strategy<Value = Value> {
        let node = leaf().prop_recursive(3, 24, 4, |inner| {
            prop::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|m| Value::Map(m.into_iter().collect()))
        });
        prop::collection::btree_map("[a-e]", node, 1..5).prop_map(|m| Value::Map(m.into_iter().collect()))
    }

    fn next(seed: &mut u64) -> u64 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        *seed
    }

    /// Drops some keys and changes some leaves without changing any kind.
    fn customize(value: &Value, seed: &mut u64) -> Value {
        if let Value::Map(map) = value {
            let mut kept = Map::new();
            for (key, child) in map.iter() {
                if next(seed) % 3 != 0 {
                    kept.set(key.clone(), customize(child, seed));
                }
            }
            return Value::Map(kept);
        }
        let change = next(seed) % 2 == 0;
        match value {
            Value::Int(i) if change => Value::Int(i.wrapping_add(1)),
            Value::Bool(b) if change => Value::Bool(!b),
            Value::String(s) if change => Value::String(format!("{}x", s)),
            other => other.clone(),
        }
    }

    fn path_set(tree: &Value) -> BTreeSet<String> {
        tree.walk().map(|(path, _)| path.to_string()).collect()
    }

    proptest! {
        #[test]
        fn test_self_merge_identity_holds(tree in document()) {
            let result = merge(&tree, &tree, &RuleSet::default()).unwrap();
            prop_assert_eq!(&result.tree, &tree);
            prop_assert!(result.log.is_empty());
        }

        #[test]
        fn test_merge_keeps_reference_path_set(reference in document(), seed in 1u64..u64::MAX) {
            let mut seed = seed;
            let site = customize(&reference, &mut seed);
            let result = merge(&reference, &site, &RuleSet::default()).unwrap();

            prop_assert_eq!(path_set(&result.tree), path_set(&reference));
            for (path, value) in site.walk() {
                if !value.is_map() {
                    prop_assert_eq!(result.tree.get_path(&path), Some(value));
                }
            }
            prop_assert_eq!(result.log.of_action(ConflictAction::StructuralMismatch).count(), 0);
        }
    }
}
