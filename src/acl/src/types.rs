//! Core ACL types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role or resource identity
///
/// Identities are map keys in the role and resource graphs, so they must not
/// change while registered. The wildcard is an explicit variant rather than an
/// absent value, so no business identity can collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Implicit universal member of every hierarchy
    Any,

    /// Plain named identity (e.g., "editor", "document:42")
    Name(String),

    /// Canonical identity derived from an application model
    Model {
        /// Tag chosen by the identity factory (e.g., "model")
        kind: String,

        /// Fully-qualified type name
        type_name: String,

        /// Instance identifier, `None` for the type itself
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<String>,
    },
}

impl Identity {
    /// Create a named identity
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Canonical identity standing for every instance of a type
    pub fn model_type(kind: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::Model {
            kind: kind.into(),
            type_name: type_name.into(),
            instance: None,
        }
    }

    /// Canonical identity of a single model instance
    pub fn model_instance(
        kind: impl Into<String>,
        type_name: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self::Model {
            kind: kind.into(),
            type_name: type_name.into(),
            instance: Some(instance.into()),
        }
    }

    /// Whether this is the wildcard
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// The type-level identity of a model instance, if this is one
    pub fn type_identity(&self) -> Option<Identity> {
        match self {
            Self::Model {
                kind,
                type_name,
                instance: Some(_),
            } => Some(Self::model_type(kind.clone(), type_name.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Name(name) => write!(f, "{}", name),
            Self::Model {
                kind,
                type_name,
                instance: None,
            } => write!(f, "{}:{}", kind, type_name),
            Self::Model {
                kind,
                type_name,
                instance: Some(id),
            } => write!(f, "{}:{}#{}", kind, type_name, id),
        }
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&Identity> for Identity {
    fn from(identity: &Identity) -> Self {
        identity.clone()
    }
}

/// Operation being performed (view, edit, delete, ...)
///
/// Operations carry no hierarchy beyond the implicit wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Matches every operation
    Any,

    /// Named operation
    Name(String),
}

impl Operation {
    /// Create a named operation
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Whether this is the wildcard
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for Operation {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Operation {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&Operation> for Operation {
    fn from(operation: &Operation) -> Self {
        operation.clone()
    }
}

/// Outcome of an ACL query
///
/// `Unknown` means no rule matched anywhere in the closures. It is distinct
/// from an explicit `Denied`, but the enforcement layer treats both as
/// "not permitted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// An allow rule matched and no deny rule did
    Allowed,
    /// A deny rule matched
    Denied,
    /// No rule matched
    Unknown,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Tri-state view: `Some(true)`, `Some(false)` or `None` for unknown
    pub fn as_option(self) -> Option<bool> {
        match self {
            Self::Allowed => Some(true),
            Self::Denied => Some(false),
            Self::Unknown => None,
        }
    }
}

impl From<Option<bool>> for Decision {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Allowed,
            Some(false) => Self::Denied,
            None => Self::Unknown,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => write!(f, "ALLOWED"),
            Self::Denied => write!(f, "DENIED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
