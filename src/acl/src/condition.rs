//! Runtime conditions attached to allow/deny rules
//!
//! A condition receives the registry and the queried (role, operation,
//! resource) and decides whether its rule applies. Rules registered without a
//! condition carry [`Always`]. Conditions run synchronously inside the
//! decision loop, so they must be fast. Errors they return propagate out of
//! `is_allowed` unchanged; the engine never turns a failing condition into an
//! allow or a deny.

use crate::error::Result;
use crate::registry::Registry;
use crate::types::{Identity, Operation};
use std::fmt;

/// Predicate guarding a rule
pub trait Condition: Send + Sync {
    fn evaluate(
        &self,
        registry: &Registry,
        role: &Identity,
        operation: &Operation,
        resource: &Identity,
    ) -> Result<bool>;
}

/// Condition of an unconditional rule
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl Condition for Always {
    fn evaluate(&self, _: &Registry, _: &Identity, _: &Operation, _: &Identity) -> Result<bool> {
        Ok(true)
    }
}

/// Infallible closure condition, see [`when`]
pub struct When<F>(F);

impl<F> Condition for When<F>
where
    F: Fn(&Registry, &Identity, &Operation, &Identity) -> bool + Send + Sync,
{
    fn evaluate(
        &self,
        registry: &Registry,
        role: &Identity,
        operation: &Operation,
        resource: &Identity,
    ) -> Result<bool> {
        Ok((self.0)(registry, role, operation, resource))
    }
}

impl<F> fmt::Debug for When<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("When(..)")
    }
}

/// Fallible closure condition, see [`try_when`]
pub struct TryWhen<F>(F);

impl<F> Condition for TryWhen<F>
where
    F: Fn(&Registry, &Identity, &Operation, &Identity) -> Result<bool> + Send + Sync,
{
    fn evaluate(
        &self,
        registry: &Registry,
        role: &Identity,
        operation: &Operation,
        resource: &Identity,
    ) -> Result<bool> {
        (self.0)(registry, role, operation, resource)
    }
}

impl<F> fmt::Debug for TryWhen<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TryWhen(..)")
    }
}

/// Build a condition from a predicate
///
/// ```rust
/// use cretoai_acl::{condition::when, Identity, Registry};
///
/// let mut registry = Registry::new();
/// registry.add_role("author", vec![]).unwrap();
/// registry.add_resource("post:7", vec![]).unwrap();
/// registry.add_resource("post:8", vec![]).unwrap();
///
/// registry
///     .allow_if("author", "edit", Identity::Any, when(|_, _, _, resource| {
///         *resource == Identity::from("post:7")
///     }))
///     .unwrap();
///
/// assert!(registry.is_allowed("author", "edit", "post:7").unwrap().is_allowed());
/// assert!(registry.is_allowed("author", "edit", "post:8").unwrap().is_unknown());
/// ```
pub fn when<F>(predicate: F) -> When<F>
where
    F: Fn(&Registry, &Identity, &Operation, &Identity) -> bool + Send + Sync,
{
    When(predicate)
}

/// Build a condition from a predicate that can fail
pub fn try_when<F>(predicate: F) -> TryWhen<F>
where
    F: Fn(&Registry, &Identity, &Operation, &Identity) -> Result<bool> + Send + Sync,
{
    TryWhen(predicate)
}
