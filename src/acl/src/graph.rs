//! Multi-parent inheritance graph with cached ancestor closures
//!
//! Each registered identity maps to the set of its direct parents. The
//! closure of a node is computed by a breadth-first walk that keeps a
//! visited set, so traversal terminates even when cycles were let in under
//! [`CyclePolicy::Ignore`]. With [`CyclePolicy::Reject`] a parent edge that
//! would close a cycle is refused and the full path is reported.

use crate::config::CyclePolicy;
use crate::error::{AclError, Result};
use crate::types::Identity;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Statistics about the closure cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Number of cached closures
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Role or resource hierarchy
#[derive(Debug)]
pub struct InheritanceGraph {
    /// "role" or "resource", used in log lines
    label: &'static str,

    /// Node -> direct parents
    parents: HashMap<Identity, BTreeSet<Identity>>,

    cycle_policy: CyclePolicy,

    /// Memoized ancestor closures, `None` when caching is disabled
    closures: Option<DashMap<Identity, Arc<[Identity]>>>,

    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl InheritanceGraph {
    pub fn new(label: &'static str, cycle_policy: CyclePolicy, cache_closures: bool) -> Self {
        Self {
            label,
            parents: HashMap::new(),
            cycle_policy,
            closures: cache_closures.then(DashMap::new),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Register `node`, unioning `parents` into its parent set
    ///
    /// Parents that are not registered yet become parentless nodes. Returns
    /// `true` when the graph changed. The graph is left untouched on error.
    pub fn add(&mut self, node: Identity, parents: Vec<Identity>) -> Result<bool> {
        if node.is_any() || parents.iter().any(Identity::is_any) {
            return Err(AclError::WildcardRegistration);
        }

        let existing = self.parents.get(&node);
        let new_parents: BTreeSet<Identity> = parents
            .into_iter()
            .filter(|p| existing.map_or(true, |set| !set.contains(p)))
            .collect();

        if existing.is_some() && new_parents.is_empty() {
            return Ok(false);
        }

        if self.cycle_policy == CyclePolicy::Reject {
            for parent in &new_parents {
                if let Some(path) = self.path_between(parent, &node) {
                    let cycle: Vec<String> = std::iter::once(&node)
                        .chain(path.iter())
                        .map(ToString::to_string)
                        .collect();
                    return Err(AclError::CircularInheritance(cycle.join(" -> ")));
                }
            }
        }

        for parent in &new_parents {
            self.parents.entry(parent.clone()).or_default();
        }

        debug!(
            "Registered {} {} with {} new parent(s)",
            self.label,
            node,
            new_parents.len()
        );
        self.parents.entry(node).or_default().extend(new_parents);
        self.invalidate();

        Ok(true)
    }

    /// Whether `node` is registered
    pub fn contains(&self, node: &Identity) -> bool {
        self.parents.contains_key(node)
    }

    /// Direct parents of `node`
    pub fn parents(&self, node: &Identity) -> Option<&BTreeSet<Identity>> {
        self.parents.get(node)
    }

    /// Every registered node
    pub fn nodes(&self) -> impl Iterator<Item = &Identity> {
        self.parents.keys()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Transitive parents of `node`, nearest first, excluding `node` itself
    pub fn ancestors(&self, node: &Identity) -> Arc<[Identity]> {
        let Some(cache) = &self.closures else {
            return self.walk_ancestors(node).into();
        };

        if let Some(hit) = cache.get(node) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(hit.value());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let closure: Arc<[Identity]> = self.walk_ancestors(node).into();
        cache.insert(node.clone(), Arc::clone(&closure));
        closure
    }

    /// `{node} ∪ ancestors(node) ∪ {Any}`, or `None` if `node` is unregistered
    ///
    /// The wildcard's family is just `[Any]`.
    pub fn family(&self, node: &Identity) -> Option<Vec<Identity>> {
        if node.is_any() {
            return Some(vec![Identity::Any]);
        }
        if !self.contains(node) {
            return None;
        }

        let ancestors = self.ancestors(node);
        let mut family = Vec::with_capacity(ancestors.len() + 2);
        family.push(node.clone());
        family.extend(ancestors.iter().cloned());
        family.push(Identity::Any);
        Some(family)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.closures.as_ref().map_or(0, DashMap::len),
        }
    }

    fn invalidate(&self) {
        if let Some(cache) = &self.closures {
            cache.clear();
        }
    }

    /// Breadth-first over parent sets, keeping a visited set
    fn walk_ancestors(&self, node: &Identity) -> Vec<Identity> {
        let mut visited: HashSet<&Identity> = HashSet::new();
        visited.insert(node);

        let mut ancestors = Vec::new();
        let mut frontier: Vec<&Identity> = vec![node];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for current in frontier {
                let Some(parents) = self.parents.get(current) else {
                    continue;
                };
                for parent in parents {
                    if visited.insert(parent) {
                        ancestors.push(parent.clone());
                        next.push(parent);
                    } else {
                        trace!("Skipping already visited {} {}", self.label, parent);
                    }
                }
            }
            frontier = next;
        }

        ancestors
    }

    /// Parent path from `from` up to `to`, both inclusive
    fn path_between(&self, from: &Identity, to: &Identity) -> Option<Vec<Identity>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if self.dfs_path(from, to, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs_path<'a>(
        &'a self,
        current: &'a Identity,
        target: &Identity,
        visited: &mut HashSet<&'a Identity>,
        path: &mut Vec<Identity>,
    ) -> bool {
        path.push(current.clone());
        if current == target {
            return true;
        }

        if visited.insert(current) {
            if let Some(parents) = self.parents.get(current) {
                for parent in parents {
                    if self.dfs_path(parent, target, visited, path) {
                        return true;
                    }
                }
            }
        }

        path.pop();
        false
    }
}
