//! Identity normalization adapter
//!
//! Lets application values act as roles and resources without keeping a
//! parallel set of identities by hand. Every operation first passes its
//! role and resource arguments through a pluggable [`IdentityFactory`] and
//! then delegates to the wrapped [`Registry`].
//!
//! The [`ModelFactory`] maps application models to a two-level hierarchy:
//!
//! ```text
//! model:blog::Post            (type identity, no parents)
//!   └── model:blog::Post#42   (instance identity, parent = type identity)
//! ```
//!
//! Rules on the type cover every instance, while a rule on one instance (a
//! deny, typically) overrides it for that instance only. Derived nodes are
//! registered as a side effect of any adapter call, queries included, so the
//! adapter keeps its registry behind a lock.

use crate::condition::Condition;
use crate::error::Result;
use crate::registry::Registry;
use crate::types::{Decision, Identity, Operation};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Converts an application value into a canonical identity
///
/// Factories may register derived nodes in `registry` before returning.
pub trait IdentityFactory<V>: Send + Sync {
    fn make_identity(&self, registry: &mut Registry, value: V) -> Result<Identity>;
}

impl<V, F> IdentityFactory<V> for F
where
    F: Fn(&mut Registry, V) -> Result<Identity> + Send + Sync,
{
    fn make_identity(&self, registry: &mut Registry, value: V) -> Result<Identity> {
        self(registry, value)
    }
}

/// Returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<V: Into<Identity>> IdentityFactory<V> for PassThrough {
    fn make_identity(&self, _: &mut Registry, value: V) -> Result<Identity> {
        Ok(value.into())
    }
}

/// Application model with a unique per-instance identifier
pub trait Model {
    fn model_id(&self) -> String;
}

/// "Any instance of this type"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeIdentity {
    /// Fully-qualified type name
    pub type_name: String,
}

impl TypeIdentity {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }

    /// Type identity of `T`, named by [`std::any::type_name`]
    pub fn of<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }
}

/// One specific instance of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentity {
    /// Fully-qualified type name
    pub type_name: String,

    /// Unique instance identifier
    pub id: String,
}

impl InstanceIdentity {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Instance identity of `model`
    pub fn of<T: Model>(model: &T) -> Self {
        Self::new(std::any::type_name::<T>(), model.model_id())
    }

    pub fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::new(self.type_name.clone())
    }
}

/// Value handed to a [`ModelFactory`]
///
/// The caller states whether it passes a type or an instance. Values without
/// a unique identifier use [`Subject::Identity`] and pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Identity(Identity),
    Type(TypeIdentity),
    Instance(InstanceIdentity),
}

impl Subject {
    /// Every instance of `T`
    pub fn of_type<T: ?Sized>() -> Self {
        Self::Type(TypeIdentity::of::<T>())
    }

    /// One instance
    pub fn instance<T: Model>(model: &T) -> Self {
        Self::Instance(InstanceIdentity::of(model))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(identity) => write!(f, "{}", identity),
            Self::Type(t) => write!(f, "{}", t.type_name),
            Self::Instance(i) => write!(f, "{}#{}", i.type_name, i.id),
        }
    }
}

impl From<Identity> for Subject {
    fn from(identity: Identity) -> Self {
        Self::Identity(identity)
    }
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        Self::Identity(Identity::from(name))
    }
}

impl From<TypeIdentity> for Subject {
    fn from(t: TypeIdentity) -> Self {
        Self::Type(t)
    }
}

impl From<InstanceIdentity> for Subject {
    fn from(i: InstanceIdentity) -> Self {
        Self::Instance(i)
    }
}

/// Which graph a factory registers into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Role,
    Resource,
}

/// Default kind tag of model identities
pub const MODEL_KIND: &str = "model";

/// Maps [`Subject`]s to `Identity::Model` and registers them
#[derive(Debug, Clone)]
pub struct ModelFactory {
    kind: String,
    side: Side,
}

impl ModelFactory {
    pub fn new(kind: impl Into<String>, side: Side) -> Self {
        Self {
            kind: kind.into(),
            side,
        }
    }

    /// Factory for the role side, tagged [`MODEL_KIND`]
    pub fn roles() -> Self {
        Self::new(MODEL_KIND, Side::Role)
    }

    /// Factory for the resource side, tagged [`MODEL_KIND`]
    pub fn resources() -> Self {
        Self::new(MODEL_KIND, Side::Resource)
    }

    fn register(&self, registry: &mut Registry, node: Identity, parents: Vec<Identity>) -> Result<()> {
        trace!("Registering derived {:?} node {}", self.side, node);
        match self.side {
            Side::Role => registry.add_role(node, parents),
            Side::Resource => registry.add_resource(node, parents),
        }
    }
}

impl IdentityFactory<Subject> for ModelFactory {
    fn make_identity(&self, registry: &mut Registry, value: Subject) -> Result<Identity> {
        match value {
            Subject::Identity(identity) => Ok(identity),
            Subject::Type(t) => {
                let identity = Identity::model_type(self.kind.clone(), t.type_name);
                self.register(registry, identity.clone(), vec![])?;
                Ok(identity)
            }
            Subject::Instance(i) => {
                let type_identity = Identity::model_type(self.kind.clone(), i.type_name.clone());
                self.register(registry, type_identity.clone(), vec![])?;

                let identity = Identity::model_instance(self.kind.clone(), i.type_name, i.id);
                self.register(registry, identity.clone(), vec![type_identity])?;
                Ok(identity)
            }
        }
    }
}

/// Registry wrapper normalizing roles of type `R` and resources of type `S`
pub struct IdentityAdapter<R = Identity, S = Identity> {
    registry: RwLock<Registry>,
    role_factory: Box<dyn IdentityFactory<R>>,
    resource_factory: Box<dyn IdentityFactory<S>>,
}

impl IdentityAdapter<Subject, Subject> {
    /// Adapter using [`ModelFactory`] on both sides
    pub fn for_models(registry: Registry) -> Self {
        Self::new(registry, ModelFactory::roles(), ModelFactory::resources())
    }
}

impl<R, S> IdentityAdapter<R, S> {
    pub fn new(
        registry: Registry,
        role_factory: impl IdentityFactory<R> + 'static,
        resource_factory: impl IdentityFactory<S> + 'static,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            role_factory: Box::new(role_factory),
            resource_factory: Box::new(resource_factory),
        }
    }

    /// Read access to the wrapped registry
    pub fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read()
    }

    pub fn into_inner(self) -> Registry {
        self.registry.into_inner()
    }

    fn role_identity(&self, registry: &mut Registry, role: R) -> Result<Identity> {
        self.role_factory.make_identity(registry, role)
    }

    fn resource_identity(&self, registry: &mut Registry, resource: S) -> Result<Identity> {
        self.resource_factory.make_identity(registry, resource)
    }

    /// [`Registry::add_role`] on normalized identities
    pub fn add_role(&self, role: R, parents: Vec<R>) -> Result<()> {
        let mut registry = self.registry.write();
        let role = self.role_identity(&mut registry, role)?;
        let parents = parents
            .into_iter()
            .map(|p| self.role_identity(&mut registry, p))
            .collect::<Result<Vec<_>>>()?;
        registry.add_role(role, parents)
    }

    /// [`Registry::add_resource`] on normalized identities
    pub fn add_resource(&self, resource: S, parents: Vec<S>) -> Result<()> {
        let mut registry = self.registry.write();
        let resource = self.resource_identity(&mut registry, resource)?;
        let parents = parents
            .into_iter()
            .map(|p| self.resource_identity(&mut registry, p))
            .collect::<Result<Vec<_>>>()?;
        registry.add_resource(resource, parents)
    }

    pub fn allow(&self, role: R, operation: impl Into<Operation>, resource: S) -> Result<()> {
        let mut registry = self.registry.write();
        let (role, resource) = self.normalize(&mut registry, role, resource)?;
        registry.allow(role, operation, resource)
    }

    pub fn allow_if(
        &self,
        role: R,
        operation: impl Into<Operation>,
        resource: S,
        condition: impl Condition + 'static,
    ) -> Result<()> {
        let mut registry = self.registry.write();
        let (role, resource) = self.normalize(&mut registry, role, resource)?;
        registry.allow_if(role, operation, resource, condition)
    }

    pub fn deny(&self, role: R, operation: impl Into<Operation>, resource: S) -> Result<()> {
        let mut registry = self.registry.write();
        let (role, resource) = self.normalize(&mut registry, role, resource)?;
        registry.deny(role, operation, resource)
    }

    pub fn deny_if(
        &self,
        role: R,
        operation: impl Into<Operation>,
        resource: S,
        condition: impl Condition + 'static,
    ) -> Result<()> {
        let mut registry = self.registry.write();
        let (role, resource) = self.normalize(&mut registry, role, resource)?;
        registry.deny_if(role, operation, resource, condition)
    }

    /// [`Registry::is_allowed`] on normalized identities
    ///
    /// Normalization runs under the write lock, which is then downgraded so
    /// evaluation shares the registry with other readers.
    pub fn is_allowed(&self, role: R, operation: impl Into<Operation>, resource: S) -> Result<Decision> {
        let mut registry = self.registry.write();
        let (role, resource) = self.normalize(&mut registry, role, resource)?;
        let registry = RwLockWriteGuard::downgrade(registry);
        registry.is_allowed(role, operation, resource)
    }

    /// [`Registry::is_any_allowed`] on normalized identities
    pub fn is_any_allowed(
        &self,
        roles: impl IntoIterator<Item = R>,
        operation: impl Into<Operation>,
        resource: S,
    ) -> Result<Decision> {
        let mut registry = self.registry.write();
        let roles = roles
            .into_iter()
            .map(|r| self.role_identity(&mut registry, r))
            .collect::<Result<Vec<_>>>()?;
        let resource = self.resource_identity(&mut registry, resource)?;
        let registry = RwLockWriteGuard::downgrade(registry);
        registry.is_any_allowed(roles, operation, resource)
    }

    fn normalize(&self, registry: &mut Registry, role: R, resource: S) -> Result<(Identity, Identity)> {
        let role = self.role_identity(registry, role)?;
        let resource = self.resource_identity(registry, resource)?;
        Ok((role, resource))
    }
}

impl<R, S> fmt::Debug for IdentityAdapter<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityAdapter")
            .field("registry", &*self.registry.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AclError;

    struct Post {
        id: u64,
    }

    impl Model for Post {
        fn model_id(&self) -> String {
            self.id.to_string()
        }
    }

    struct User {
        name: &'static str,
    }

    impl Model for User {
        fn model_id(&self) -> String {
            self.name.to_string()
        }
    }

    fn post_type() -> Identity {
        Identity::model_type(MODEL_KIND, std::any::type_name::<Post>())
    }

    #[test]
    fn test_pass_through_keeps_identities() {
        let adapter: IdentityAdapter = IdentityAdapter::new(Registry::new(), PassThrough, PassThrough);
        adapter.add_role(Identity::from("editor"), vec![]).unwrap();
        adapter.add_resource(Identity::from("doc"), vec![]).unwrap();
        adapter
            .allow(Identity::from("editor"), "edit", Identity::from("doc"))
            .unwrap();

        assert_eq!(
            adapter
                .is_allowed(Identity::from("editor"), "edit", Identity::from("doc"))
                .unwrap(),
            Decision::Allowed
        );
        assert!(adapter.registry().has_role(&Identity::from("editor")));
    }

    #[test]
    fn test_type_subject_registers_parentless_node() {
        let adapter = IdentityAdapter::for_models(Registry::new());
        adapter.add_role("admin".into(), vec![]).unwrap();
        adapter
            .allow("admin".into(), "edit", Subject::of_type::<Post>())
            .unwrap();

        let registry = adapter.registry();
        assert!(registry.has_resource(&post_type()));
        assert!(registry.resource_parents(&post_type()).unwrap().is_empty());
    }

    #[test]
    fn test_instance_inherits_type_rules() {
        let adapter = IdentityAdapter::for_models(Registry::new());
        adapter.add_role("reader".into(), vec![]).unwrap();
        adapter
            .allow("reader".into(), "read", Subject::of_type::<Post>())
            .unwrap();

        let post = Post { id: 42 };
        assert_eq!(
            adapter
                .is_allowed("reader".into(), "read", Subject::instance(&post))
                .unwrap(),
            Decision::Allowed
        );

        let instance = Identity::model_instance(MODEL_KIND, std::any::type_name::<Post>(), "42");
        let registry = adapter.registry();
        assert_eq!(registry.resource_ancestors(&instance).unwrap(), vec![post_type()]);
    }

    #[test]
    fn test_instance_deny_overrides_type_allow() {
        let adapter = IdentityAdapter::for_models(Registry::new());
        adapter.add_role("reader".into(), vec![]).unwrap();
        adapter
            .allow("reader".into(), "read", Subject::of_type::<Post>())
            .unwrap();

        let secret = Post { id: 1 };
        let public = Post { id: 2 };
        adapter
            .deny("reader".into(), "read", Subject::instance(&secret))
            .unwrap();

        assert_eq!(
            adapter
                .is_allowed("reader".into(), "read", Subject::instance(&secret))
                .unwrap(),
            Decision::Denied
        );
        assert_eq!(
            adapter
                .is_allowed("reader".into(), "read", Subject::instance(&public))
                .unwrap(),
            Decision::Allowed
        );
    }

    #[test]
    fn test_model_roles() {
        let adapter = IdentityAdapter::for_models(Registry::new());
        adapter.add_resource("dashboard".into(), vec![]).unwrap();
        adapter
            .allow(Subject::of_type::<User>(), "view", "dashboard".into())
            .unwrap();

        let alice = User { name: "alice" };
        assert_eq!(
            adapter
                .is_any_allowed([Subject::instance(&alice)], "view", "dashboard".into())
                .unwrap(),
            Decision::Allowed
        );
    }

    #[test]
    fn test_repeated_registration_is_idempotent() {
        let adapter = IdentityAdapter::for_models(Registry::new());
        adapter.add_role("reader".into(), vec![]).unwrap();
        adapter
            .allow("reader".into(), "read", Subject::of_type::<Post>())
            .unwrap();

        let post = Post { id: 9 };
        adapter.add_resource(Subject::instance(&post), vec![]).unwrap();
        let before = adapter
            .is_allowed("reader".into(), "read", Subject::instance(&post))
            .unwrap();
        adapter.add_resource(Subject::instance(&post), vec![]).unwrap();
        let after = adapter
            .is_allowed("reader".into(), "read", Subject::instance(&post))
            .unwrap();

        assert_eq!(before, after);
        assert_eq!(adapter.registry().resources().len(), 2);
    }

    #[test]
    fn test_custom_factory_closure() {
        let prefixed = |_: &mut Registry, name: &str| -> Result<Identity> {
            Ok(Identity::from(format!("group:{}", name)))
        };
        let adapter: IdentityAdapter<&str, Identity> =
            IdentityAdapter::new(Registry::new(), prefixed, PassThrough);
        adapter.add_role("ops", vec![]).unwrap();
        adapter.add_resource(Identity::from("pager"), vec![]).unwrap();
        adapter.allow("ops", "ack", Identity::from("pager")).unwrap();

        assert!(adapter.registry().has_role(&Identity::from("group:ops")));
        assert_eq!(
            adapter.is_allowed("ops", "ack", Identity::from("pager")).unwrap(),
            Decision::Allowed
        );
    }

    #[test]
    fn test_unregistered_pass_through_still_fails() {
        let adapter = IdentityAdapter::for_models(Registry::new());
        adapter.add_resource("doc".into(), vec![]).unwrap();

        assert!(matches!(
            adapter.is_allowed("stranger".into(), "read", "doc".into()),
            Err(AclError::UnregisteredRole(_))
        ));
    }

    #[test]
    fn test_subject_display() {
        assert_eq!(Subject::from("doc").to_string(), "doc");
        assert_eq!(
            Subject::Instance(InstanceIdentity::new("blog::Post", "3")).to_string(),
            "blog::Post#3"
        );
        assert_eq!(
            InstanceIdentity::new("blog::Post", "3").type_identity(),
            TypeIdentity::new("blog::Post")
        );
    }
}
