//! Role/resource registry and decision engine
//!
//! The registry holds two independent inheritance graphs (roles and
//! resources) and two rule tables (allow and deny). A query walks the
//! product of the role family, the operation family and the resource family:
//!
//! ```text
//! RoleFamily      = {role}      ∪ ancestors(role)      ∪ {Any}
//! OperationFamily = {operation} ∪ {Any}
//! ResourceFamily  = {resource}  ∪ ancestors(resource)  ∪ {Any}
//! ```
//!
//! Any matching deny whose condition holds ends the scan with
//! [`Decision::Denied`]. Matching allows only record a pending
//! [`Decision::Allowed`], so a deny reached through any ancestor path still
//! vetoes a broader allow. With no match at all the answer is
//! [`Decision::Unknown`].
//!
//! Mutation takes `&mut self` and evaluation `&self`: populate the registry at
//! start-up, then share it read-only (e.g. behind an `Arc`).

use crate::condition::{Always, Condition};
use crate::config::RegistryConfig;
use crate::error::{AclError, Result};
use crate::graph::{CacheStats, InheritanceGraph};
use crate::policy::PolicyEffect;
use crate::types::{Decision, Identity, Operation};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

type ConditionRef = Arc<dyn Condition>;

/// (role, operation, resource) -> condition
#[derive(Default)]
struct RuleTable {
    rules: HashMap<Identity, HashMap<Operation, HashMap<Identity, ConditionRef>>>,
    len: usize,
}

impl RuleTable {
    /// Insert or overwrite; returns `true` when an existing rule was replaced
    fn insert(
        &mut self,
        role: Identity,
        operation: Operation,
        resource: Identity,
        condition: ConditionRef,
    ) -> bool {
        let replaced = self
            .rules
            .entry(role)
            .or_default()
            .entry(operation)
            .or_default()
            .insert(resource, condition)
            .is_some();
        if !replaced {
            self.len += 1;
        }
        replaced
    }

    fn get(&self, role: &Identity, operation: &Operation, resource: &Identity) -> Option<&ConditionRef> {
        self.rules.get(role)?.get(operation)?.get(resource)
    }
}

/// ACL registry
pub struct Registry {
    config: RegistryConfig,
    roles: InheritanceGraph,
    resources: InheritanceGraph,
    allow: RuleTable,
    deny: RuleTable,
}

impl Registry {
    /// Create an empty registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            roles: InheritanceGraph::new("role", config.cycle_policy, config.cache_closures),
            resources: InheritanceGraph::new(
                "resource",
                config.cycle_policy,
                config.cache_closures,
            ),
            allow: RuleTable::default(),
            deny: RuleTable::default(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a role, unioning `parents` into its parent set
    ///
    /// Idempotent. Parents that are not registered yet are added without
    /// parents of their own.
    ///
    /// # Errors
    ///
    /// - `WildcardRegistration` if the role or a parent is `Identity::Any`
    /// - `CircularInheritance` if a new parent edge closes a cycle and the
    ///   configured policy rejects cycles
    pub fn add_role(&mut self, role: impl Into<Identity>, parents: Vec<Identity>) -> Result<()> {
        self.roles.add(role.into(), parents)?;
        Ok(())
    }

    /// Register a resource, unioning `parents` into its parent set
    ///
    /// Same contract as [`Registry::add_role`], over the resource graph.
    pub fn add_resource(
        &mut self,
        resource: impl Into<Identity>,
        parents: Vec<Identity>,
    ) -> Result<()> {
        self.resources.add(resource.into(), parents)?;
        Ok(())
    }

    /// Allow `role` to perform `operation` on `resource` unconditionally
    pub fn allow(
        &mut self,
        role: impl Into<Identity>,
        operation: impl Into<Operation>,
        resource: impl Into<Identity>,
    ) -> Result<()> {
        self.allow_if(role, operation, resource, Always)
    }

    /// Allow when `condition` holds, replacing any previous allow condition
    /// for the same triple
    pub fn allow_if(
        &mut self,
        role: impl Into<Identity>,
        operation: impl Into<Operation>,
        resource: impl Into<Identity>,
        condition: impl Condition + 'static,
    ) -> Result<()> {
        self.add_rule(
            PolicyEffect::Allow,
            role.into(),
            operation.into(),
            resource.into(),
            Arc::new(condition),
        )
    }

    /// Deny `role` to perform `operation` on `resource` unconditionally
    pub fn deny(
        &mut self,
        role: impl Into<Identity>,
        operation: impl Into<Operation>,
        resource: impl Into<Identity>,
    ) -> Result<()> {
        self.deny_if(role, operation, resource, Always)
    }

    /// Deny when `condition` holds, replacing any previous deny condition for
    /// the same triple
    pub fn deny_if(
        &mut self,
        role: impl Into<Identity>,
        operation: impl Into<Operation>,
        resource: impl Into<Identity>,
        condition: impl Condition + 'static,
    ) -> Result<()> {
        self.add_rule(
            PolicyEffect::Deny,
            role.into(),
            operation.into(),
            resource.into(),
            Arc::new(condition),
        )
    }

    fn add_rule(
        &mut self,
        effect: PolicyEffect,
        role: Identity,
        operation: Operation,
        resource: Identity,
        condition: ConditionRef,
    ) -> Result<()> {
        if !role.is_any() && !self.roles.contains(&role) {
            return Err(AclError::UnregisteredRole(role));
        }
        if !resource.is_any() && !self.resources.contains(&resource) {
            return Err(AclError::UnregisteredResource(resource));
        }

        debug!("Adding {:?} rule ({}, {}, {})", effect, role, operation, resource);

        let table = match effect {
            PolicyEffect::Allow => &mut self.allow,
            PolicyEffect::Deny => &mut self.deny,
        };
        if table.insert(role, operation, resource, condition) {
            debug!("Replaced existing {:?} rule condition", effect);
        }

        Ok(())
    }

    /// Decide whether `role` may perform `operation` on `resource`
    ///
    /// Returns `Unknown` when no rule matches anywhere in the closures.
    ///
    /// # Errors
    ///
    /// - `UnregisteredRole` / `UnregisteredResource` for identities that are
    ///   neither registered nor the wildcard
    /// - any error returned by a rule condition
    pub fn is_allowed(
        &self,
        role: impl Into<Identity>,
        operation: impl Into<Operation>,
        resource: impl Into<Identity>,
    ) -> Result<Decision> {
        let role = role.into();
        let operation = operation.into();
        let resource = resource.into();

        let role_family = self
            .roles
            .family(&role)
            .ok_or_else(|| AclError::UnregisteredRole(role.clone()))?;
        let resource_family = self
            .resources
            .family(&resource)
            .ok_or_else(|| AclError::UnregisteredResource(resource.clone()))?;
        let mut operation_family = vec![operation.clone()];
        if !operation.is_any() {
            operation_family.push(Operation::Any);
        }

        let mut allowed = false;

        for r in &role_family {
            for o in &operation_family {
                for s in &resource_family {
                    if let Some(condition) = self.deny.get(r, o, s) {
                        if condition.evaluate(self, &role, &operation, &resource)? {
                            debug!(
                                "Decision: DENIED for ({}, {}, {}) by rule ({}, {}, {})",
                                role, operation, resource, r, o, s
                            );
                            return Ok(Decision::Denied);
                        }
                        trace!("Deny rule ({}, {}, {}) condition did not hold", r, o, s);
                    }

                    if let Some(condition) = self.allow.get(r, o, s) {
                        if condition.evaluate(self, &role, &operation, &resource)? {
                            trace!("Allow rule ({}, {}, {}) matched", r, o, s);
                            allowed = true;
                        } else {
                            trace!("Allow rule ({}, {}, {}) condition did not hold", r, o, s);
                        }
                    }
                }
            }
        }

        let decision = if allowed {
            Decision::Allowed
        } else {
            Decision::Unknown
        };
        debug!("Decision: {} for ({}, {}, {})", decision, role, operation, resource);

        Ok(decision)
    }

    /// Decide for a principal holding several roles
    ///
    /// Any `Denied` role wins immediately; otherwise `Allowed` if some role is
    /// allowed, else `Unknown`.
    pub fn is_any_allowed<I>(
        &self,
        roles: I,
        operation: impl Into<Operation>,
        resource: impl Into<Identity>,
    ) -> Result<Decision>
    where
        I: IntoIterator,
        I::Item: Into<Identity>,
    {
        let operation = operation.into();
        let resource = resource.into();
        let mut allowed = false;

        for role in roles {
            match self.is_allowed(role, &operation, &resource)? {
                Decision::Denied => return Ok(Decision::Denied),
                Decision::Allowed => allowed = true,
                Decision::Unknown => {}
            }
        }

        Ok(if allowed {
            Decision::Allowed
        } else {
            Decision::Unknown
        })
    }

    pub fn has_role(&self, role: &Identity) -> bool {
        self.roles.contains(role)
    }

    pub fn has_resource(&self, resource: &Identity) -> bool {
        self.resources.contains(resource)
    }

    /// Registered roles, sorted
    pub fn roles(&self) -> Vec<&Identity> {
        let mut roles: Vec<_> = self.roles.nodes().collect();
        roles.sort();
        roles
    }

    /// Registered resources, sorted
    pub fn resources(&self) -> Vec<&Identity> {
        let mut resources: Vec<_> = self.resources.nodes().collect();
        resources.sort();
        resources
    }

    /// Direct parents of a role
    pub fn role_parents(&self, role: &Identity) -> Option<&BTreeSet<Identity>> {
        self.roles.parents(role)
    }

    /// Direct parents of a resource
    pub fn resource_parents(&self, resource: &Identity) -> Option<&BTreeSet<Identity>> {
        self.resources.parents(resource)
    }

    /// Transitive parents of a role, nearest first
    pub fn role_ancestors(&self, role: &Identity) -> Result<Vec<Identity>> {
        if !self.roles.contains(role) {
            return Err(AclError::UnregisteredRole(role.clone()));
        }
        Ok(self.roles.ancestors(role).to_vec())
    }

    /// Transitive parents of a resource, nearest first
    pub fn resource_ancestors(&self, resource: &Identity) -> Result<Vec<Identity>> {
        if !self.resources.contains(resource) {
            return Err(AclError::UnregisteredResource(resource.clone()));
        }
        Ok(self.resources.ancestors(resource).to_vec())
    }

    /// Number of allow and deny rules
    pub fn rule_count(&self) -> usize {
        self.allow.len + self.deny.len
    }

    /// Closure cache statistics over both graphs
    pub fn cache_stats(&self) -> CacheStats {
        let roles = self.roles.cache_stats();
        let resources = self.resources.cache_stats();
        CacheStats {
            hits: roles.hits + resources.hits,
            misses: roles.misses + resources.misses,
            entries: roles.entries + resources.entries,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("roles", &self.roles.len())
            .field("resources", &self.resources.len())
            .field("allow_rules", &self.allow.len)
            .field("deny_rules", &self.deny.len)
            .finish()
    }
}
