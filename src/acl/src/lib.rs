//! # CretoAI ACL Engine
//!
//! Embeddable policy decision engine built on role and resource hierarchies.
//!
//! ## Features
//!
//! - **Multiple inheritance** for roles and resources, with cycle detection
//! - **Deny-overrides-allow** evaluation returning a tri-state [`Decision`]
//! - **Runtime conditions** attached to individual allow/deny rules
//! - **Identity normalization** so application models act as roles and resources
//! - **Authorization context** turning decisions into enforcement
//! - **Cached ancestor closures** shared across concurrent readers
//!
//! ## Example
//!
//! ```rust
//! use cretoai_acl::{Decision, Identity, Registry};
//!
//! fn main() -> cretoai_acl::Result<()> {
//!     let mut acl = Registry::new();
//!     acl.add_role("member", vec![])?;
//!     acl.add_role("student", vec![Identity::from("member")])?;
//!     acl.add_role("junior-student", vec![Identity::from("student")])?;
//!     acl.add_resource("course", vec![])?;
//!     acl.add_resource("senior-course", vec![Identity::from("course")])?;
//!
//!     acl.allow("member", "view", "course")?;
//!     acl.allow("student", "learn", "course")?;
//!     acl.deny("junior-student", "learn", "senior-course")?;
//!
//!     assert_eq!(acl.is_allowed("student", "view", "course")?, Decision::Allowed);
//!     assert_eq!(acl.is_allowed("junior-student", "learn", "senior-course")?, Decision::Denied);
//!     assert_eq!(acl.is_allowed("member", "learn", "course")?, Decision::Unknown);
//!
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod policy;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use types::{Decision, Identity, Operation};
pub use registry::Registry;
pub use config::{CyclePolicy, RegistryConfig};
pub use error::{AclError, Result};
pub use condition::{try_when, when, Always, Condition};
pub use adapter::{
    IdentityAdapter, IdentityFactory, InstanceIdentity, Model, ModelFactory, PassThrough, Subject,
    TypeIdentity,
};
pub use context::{AuthContext, Authorizer, Permission};
pub use policy::{PolicyDocument, PolicyEffect};
pub use graph::CacheStats;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
