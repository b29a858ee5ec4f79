//! Authorization context: turns decisions into enforcement
//!
//! An [`AuthContext`] binds "who is asking" to a [`Registry`] or an
//! [`IdentityAdapter`]. The current roles come from an installed loader that
//! is called again on every check, or are passed explicitly with
//! [`AuthContext::check_permission_for`].
//!
//! # Example
//!
//! ```rust
//! use cretoai_acl::{AuthContext, Identity, Registry};
//! use std::sync::Arc;
//!
//! # fn main() -> cretoai_acl::Result<()> {
//! let mut registry = Registry::new();
//! registry.add_role("editor", vec![])?;
//! registry.add_resource("article", vec![])?;
//! registry.allow("editor", "publish", "article")?;
//!
//! let mut auth = AuthContext::new(Arc::new(registry));
//! auth.set_roles_loader(|| vec![Identity::from("editor")]);
//!
//! let publish = auth
//!     .check_permission("publish", Identity::from("article"))
//!     .with_info("article_id", 7);
//! let published = publish.scope(|| "published")?;
//! assert_eq!(published, "published");
//!
//! let delete = auth.check_permission("delete", Identity::from("article"));
//! assert!(delete.check().unwrap_err().is_denial());
//! # Ok(())
//! # }
//! ```

use crate::adapter::IdentityAdapter;
use crate::error::{AclError, Result};
use crate::registry::Registry;
use crate::types::{Decision, Identity, Operation};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Anything that can decide for a set of roles
pub trait Authorizer: Send + Sync {
    type Role: Clone + PartialEq + Send + Sync + 'static;
    type Resource: Clone + fmt::Display + Send + Sync + 'static;

    fn is_any_allowed(
        &self,
        roles: Vec<Self::Role>,
        operation: &Operation,
        resource: &Self::Resource,
    ) -> Result<Decision>;
}

impl Authorizer for Registry {
    type Role = Identity;
    type Resource = Identity;

    fn is_any_allowed(
        &self,
        roles: Vec<Identity>,
        operation: &Operation,
        resource: &Identity,
    ) -> Result<Decision> {
        Registry::is_any_allowed(self, roles, operation, resource)
    }
}

impl<R, S> Authorizer for IdentityAdapter<R, S>
where
    R: Clone + PartialEq + Send + Sync + 'static,
    S: Clone + fmt::Display + Send + Sync + 'static,
{
    type Role = R;
    type Resource = S;

    fn is_any_allowed(&self, roles: Vec<R>, operation: &Operation, resource: &S) -> Result<Decision> {
        IdentityAdapter::is_any_allowed(self, roles, operation, resource.clone())
    }
}

type RolesLoader<R> = Arc<dyn Fn() -> Vec<R> + Send + Sync>;

/// Where a permission gets the principal's roles from
enum RolesSource<R> {
    Loader(RolesLoader<R>),
    Fixed(Vec<R>),
    Missing,
}

impl<R: Clone> RolesSource<R> {
    fn load(&self) -> Result<Vec<R>> {
        match self {
            Self::Loader(loader) => Ok(loader()),
            Self::Fixed(roles) => Ok(roles.clone()),
            Self::Missing => Err(AclError::MissingRolesLoader),
        }
    }
}

impl<R> Clone for RolesSource<R>
where
    R: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Loader(loader) => Self::Loader(Arc::clone(loader)),
            Self::Fixed(roles) => Self::Fixed(roles.clone()),
            Self::Missing => Self::Missing,
        }
    }
}

/// Binds the current principal to an authorizer
pub struct AuthContext<A: Authorizer> {
    authorizer: Arc<A>,
    roles_loader: Option<RolesLoader<A::Role>>,
}

impl<A: Authorizer> AuthContext<A> {
    pub fn new(authorizer: Arc<A>) -> Self {
        Self {
            authorizer,
            roles_loader: None,
        }
    }

    pub fn authorizer(&self) -> &Arc<A> {
        &self.authorizer
    }

    /// Install the callable producing the current principal's roles
    ///
    /// It is invoked on every check and never cached. Installing a new loader
    /// replaces the previous one.
    pub fn set_roles_loader<F>(&mut self, loader: F)
    where
        F: Fn() -> Vec<A::Role> + Send + Sync + 'static,
    {
        self.roles_loader = Some(Arc::new(loader));
    }

    /// Roles of the current principal, freshly loaded
    pub fn current_roles(&self) -> Result<Vec<A::Role>> {
        self.roles_source().load()
    }

    fn roles_source(&self) -> RolesSource<A::Role> {
        match &self.roles_loader {
            Some(loader) => RolesSource::Loader(Arc::clone(loader)),
            None => RolesSource::Missing,
        }
    }

    /// Permission for the current principal
    ///
    /// Nothing is evaluated until the permission is checked.
    pub fn check_permission(
        &self,
        operation: impl Into<Operation>,
        resource: A::Resource,
    ) -> Permission<A> {
        Permission {
            authorizer: Arc::clone(&self.authorizer),
            roles: self.roles_source(),
            operation: operation.into(),
            resource,
            info: HashMap::new(),
        }
    }

    /// Permission for an explicit role set, bypassing the loader
    pub fn check_permission_for(
        &self,
        roles: Vec<A::Role>,
        operation: impl Into<Operation>,
        resource: A::Resource,
    ) -> Permission<A> {
        Permission {
            authorizer: Arc::clone(&self.authorizer),
            roles: RolesSource::Fixed(roles),
            operation: operation.into(),
            resource,
            info: HashMap::new(),
        }
    }

    /// Whether the current principal may perform `operation` on `resource`
    pub fn has_permission(
        &self,
        operation: impl Into<Operation>,
        resource: A::Resource,
    ) -> Result<bool> {
        self.check_permission(operation, resource).granted()
    }

    /// Whether the current principal holds every role of at least one group
    ///
    /// Rule tables are not consulted.
    pub fn has_roles(&self, groups: &[Vec<A::Role>]) -> Result<bool> {
        let current = self.current_roles()?;
        Ok(groups
            .iter()
            .any(|group| group.iter().all(|role| current.contains(role))))
    }
}

impl<A: Authorizer> fmt::Debug for AuthContext<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("roles_loader", &self.roles_loader.is_some())
            .finish_non_exhaustive()
    }
}

/// Lazily evaluated permission returned by [`AuthContext::check_permission`]
pub struct Permission<A: Authorizer> {
    authorizer: Arc<A>,
    roles: RolesSource<A::Role>,
    operation: Operation,
    resource: A::Resource,
    info: HashMap<String, Value>,
}

impl<A: Authorizer> Permission<A> {
    /// Attach context carried by the denial error
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn resource(&self) -> &A::Resource {
        &self.resource
    }

    /// Underlying tri-state decision
    pub fn decision(&self) -> Result<Decision> {
        let roles = self.roles.load()?;
        self.authorizer
            .is_any_allowed(roles, &self.operation, &self.resource)
    }

    /// `true` only for `Allowed`; `Denied` and `Unknown` are both refusals
    pub fn granted(&self) -> Result<bool> {
        Ok(self.decision()?.is_allowed())
    }

    /// Fail with `PermissionDenied` unless granted
    pub fn check(&self) -> Result<()> {
        let decision = self.decision()?;
        if decision.is_allowed() {
            debug!("Permission granted: {} on {}", self.operation, self.resource);
            return Ok(());
        }

        info!(
            "Permission denied: {} on {} ({})",
            self.operation, self.resource, decision
        );
        Err(AclError::PermissionDenied {
            operation: self.operation.to_string(),
            resource: self.resource.to_string(),
            info: self.info.clone(),
        })
    }

    /// Run `block` if granted
    ///
    /// The check happens on entry; leaving the block does no cleanup.
    pub fn scope<T>(&self, block: impl FnOnce() -> T) -> Result<T> {
        self.check()?;
        Ok(block())
    }

    /// Wrap `f` so that every call checks the permission first
    pub fn wrap<F, T, U>(self, f: F) -> impl Fn(T) -> Result<U>
    where
        F: Fn(T) -> U,
    {
        move |arg| {
            self.check()?;
            Ok(f(arg))
        }
    }
}

impl<A: Authorizer> Clone for Permission<A> {
    fn clone(&self) -> Self {
        Self {
            authorizer: Arc::clone(&self.authorizer),
            roles: self.roles.clone(),
            operation: self.operation.clone(),
            resource: self.resource.clone(),
            info: self.info.clone(),
        }
    }
}

impl<A: Authorizer> fmt::Debug for Permission<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permission")
            .field("operation", &self.operation)
            .field("resource", &self.resource.to_string())
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
