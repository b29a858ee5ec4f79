//! Property tests for the decision engine
//!
//! Hierarchies are generated as random DAGs: node `i` may only inherit from
//! nodes with a smaller index, so every generated graph is acyclic.

use cretoai_acl::{CyclePolicy, Decision, Identity, Operation, Registry, RegistryConfig};
use proptest::prelude::*;

const OPERATIONS: [&str; 3] = ["read", "write", "delete"];

fn role(i: usize) -> Identity {
    Identity::name(format!("role-{}", i))
}

fn resource(i: usize) -> Identity {
    Identity::name(format!("resource-{}", i))
}

/// Parent index lists, one per node
fn dag(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..max_nodes, 0..3), 1..max_nodes)
}

/// (role, operation, resource) index triples
fn rules() -> impl Strategy<Value = Vec<(usize, usize, usize)>> {
    prop::collection::vec((0usize..8, 0usize..3, 0usize..8), 0..12)
}

fn build(config: RegistryConfig, roles: &[Vec<usize>], resources: &[Vec<usize>]) -> Registry {
    let mut acl = Registry::with_config(config);
    for (i, parents) in roles.iter().enumerate() {
        let parents = parents.iter().filter(|_| i > 0).map(|p| role(p % i)).collect();
        acl.add_role(role(i), parents).unwrap();
    }
    for (i, parents) in resources.iter().enumerate() {
        let parents = parents.iter().filter(|_| i > 0).map(|p| resource(p % i)).collect();
        acl.add_resource(resource(i), parents).unwrap();
    }
    acl
}

fn add_allows(acl: &mut Registry, allows: &[(usize, usize, usize)], roles: usize, resources: usize) {
    for &(r, o, s) in allows {
        acl.allow(role(r % roles), OPERATIONS[o], resource(s % resources))
            .unwrap();
    }
}

proptest! {
    #[test]
    fn test_no_rules_means_unknown(
        roles in dag(8),
        resources in dag(8),
        op in 0usize..3,
    ) {
        let acl = build(RegistryConfig::default(), &roles, &resources);

        for r in 0..roles.len() {
            for s in 0..resources.len() {
                prop_assert_eq!(
                    acl.is_allowed(role(r), OPERATIONS[op], resource(s)).unwrap(),
                    Decision::Unknown
                );
            }
        }
    }

    #[test]
    fn test_global_allow_without_denies(
        roles in dag(8),
        resources in dag(8),
        op in "[a-z]{1,8}",
    ) {
        let mut acl = build(RegistryConfig::default(), &roles, &resources);
        acl.allow(Identity::Any, Operation::Any, Identity::Any).unwrap();

        for r in 0..roles.len() {
            for s in 0..resources.len() {
                prop_assert_eq!(
                    acl.is_allowed(role(r), op.as_str(), resource(s)).unwrap(),
                    Decision::Allowed
                );
            }
        }
    }

    #[test]
    fn test_allows_are_inherited(
        roles in dag(8),
        resources in dag(8),
        allows in rules(),
    ) {
        let mut acl = build(RegistryConfig::default(), &roles, &resources);
        add_allows(&mut acl, &allows, roles.len(), resources.len());

        for r in 0..roles.len() {
            let descendant = role(r);
            for ancestor in acl.role_ancestors(&descendant).unwrap() {
                for op in OPERATIONS {
                    for s in 0..resources.len() {
                        if acl.is_allowed(&ancestor, op, resource(s)).unwrap().is_allowed() {
                            prop_assert_eq!(
                                acl.is_allowed(&descendant, op, resource(s)).unwrap(),
                                Decision::Allowed
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_ancestor_deny_overrides(
        roles in dag(8),
        resources in dag(8),
        allows in rules(),
        denied_role in 0usize..8,
        op in 0usize..3,
    ) {
        let mut acl = build(RegistryConfig::default(), &roles, &resources);
        add_allows(&mut acl, &allows, roles.len(), resources.len());
        acl.allow(Identity::Any, Operation::Any, Identity::Any).unwrap();

        let denied = role(denied_role % roles.len());
        acl.deny(&denied, OPERATIONS[op], Identity::Any).unwrap();

        for r in 0..roles.len() {
            let candidate = role(r);
            let inherits = candidate == denied
                || acl.role_ancestors(&candidate).unwrap().contains(&denied);
            for s in 0..resources.len() {
                let decision = acl.is_allowed(&candidate, OPERATIONS[op], resource(s)).unwrap();
                if inherits {
                    prop_assert_eq!(decision, Decision::Denied);
                } else {
                    prop_assert_eq!(decision, Decision::Allowed);
                }
            }
        }
    }

    #[test]
    fn test_any_denied_role_wins(
        roles in dag(8),
        resources in dag(8),
        allows in rules(),
        op in 0usize..3,
    ) {
        let mut acl = build(RegistryConfig::default(), &roles, &resources);
        add_allows(&mut acl, &allows, roles.len(), resources.len());
        acl.add_role("blocked", vec![]).unwrap();
        acl.deny("blocked", Operation::Any, Identity::Any).unwrap();

        for r in 0..roles.len() {
            for s in 0..resources.len() {
                prop_assert_eq!(
                    acl.is_any_allowed([role(r), Identity::from("blocked")], OPERATIONS[op], resource(s))
                        .unwrap(),
                    Decision::Denied
                );
            }
        }
    }

    #[test]
    fn test_cache_never_changes_decisions(
        roles in dag(8),
        resources in dag(8),
        allows in rules(),
    ) {
        let mut cached = build(RegistryConfig::default(), &roles, &resources);
        let mut uncached = build(
            RegistryConfig { cache_closures: false, ..Default::default() },
            &roles,
            &resources,
        );
        add_allows(&mut cached, &allows, roles.len(), resources.len());
        add_allows(&mut uncached, &allows, roles.len(), resources.len());

        for r in 0..roles.len() {
            for op in OPERATIONS {
                for s in 0..resources.len() {
                    prop_assert_eq!(
                        cached.is_allowed(role(r), op, resource(s)).unwrap(),
                        uncached.is_allowed(role(r), op, resource(s)).unwrap()
                    );
                }
            }
        }
        prop_assert_eq!(uncached.cache_stats().hits, 0);
    }

    #[test]
    fn test_ignored_cycles_terminate(
        size in 2usize..8,
        back_edge in 0usize..8,
    ) {
        let mut acl = Registry::with_config(RegistryConfig {
            cycle_policy: CyclePolicy::Ignore,
            ..Default::default()
        });
        for i in 1..size {
            acl.add_role(role(i), vec![role(i - 1)]).unwrap();
        }
        // close a loop from the root back into the chain
        acl.add_role(role(0), vec![role(back_edge % size)]).unwrap();

        for i in 0..size {
            let ancestors = acl.role_ancestors(&role(i)).unwrap();
            prop_assert!(ancestors.len() < size);
            prop_assert!(!ancestors.contains(&role(i)));
        }
    }
}
