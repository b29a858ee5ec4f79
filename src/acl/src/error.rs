//! Error types for the ACL engine

use crate::types::Identity;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// ACL engine errors
#[derive(Debug, Error)]
pub enum AclError {
    /// Role used before it was registered
    #[error("Unregistered role: {0}")]
    UnregisteredRole(Identity),

    /// Resource used before it was registered
    #[error("Unregistered resource: {0}")]
    UnregisteredResource(Identity),

    /// The wildcard is implicit and cannot be added to a hierarchy
    #[error("The wildcard cannot be registered as a role or resource")]
    WildcardRegistration,

    /// Parent edge would close an inheritance cycle
    #[error("Circular inheritance detected: {0}")]
    CircularInheritance(String),

    /// Permission check needed the current roles but no loader is installed
    #[error("No roles loader installed on the authorization context")]
    MissingRolesLoader,

    /// The current principal may not perform the operation
    #[error("Permission denied: {operation} on {resource}")]
    PermissionDenied {
        operation: String,
        resource: String,
        info: HashMap<String, Value>,
    },

    /// A rule condition failed to evaluate
    #[error("Condition evaluation failed: {0}")]
    EvaluationError(String),

    /// Invalid policy document
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AclError {
    /// Whether this is an authorization denial rather than a caller bug
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Failure info attached by the caller of `check_permission`
    pub fn denial_info(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Self::PermissionDenied { info, .. } => Some(info),
            _ => None,
        }
    }
}

/// Result type for ACL operations
pub type Result<T> = std::result::Result<T, AclError>;
