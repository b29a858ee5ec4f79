//! Declarative policy documents
//!
//! A policy document lists roles and resources with their parents, plus
//! unconditional allow/deny rules. Names map to [`Identity::Name`] and
//! [`Operation::Name`]; `"*"` stands for the wildcard.
//!
//! ```json
//! {
//!   "roles": [
//!     { "name": "member" },
//!     { "name": "student", "parents": ["member"] }
//!   ],
//!   "resources": [{ "name": "course" }],
//!   "rules": [
//!     { "effect": "ALLOW", "role": "member", "operation": "view", "resource": "course" },
//!     { "effect": "DENY", "role": "*", "operation": "delete", "resource": "*" }
//!   ]
//! }
//! ```

use crate::config::RegistryConfig;
use crate::error::{AclError, Result};
use crate::registry::Registry;
use crate::types::{Identity, Operation};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Wildcard spelling in policy documents
pub const WILDCARD: &str = "*";

/// Policy effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyEffect {
    /// Allow the operation
    Allow,
    /// Deny the operation
    Deny,
}

/// Role or resource declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Node name
    pub name: String,

    /// Direct parents
    #[serde(default)]
    pub parents: Vec<String>,
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>, parents: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parents,
        }
    }
}

/// Unconditional rule declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub effect: PolicyEffect,
    pub role: String,
    pub operation: String,
    pub resource: String,
}

/// Policy document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub roles: Vec<NodeDefinition>,

    #[serde(default)]
    pub resources: Vec<NodeDefinition>,

    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl PolicyDocument {
    /// Parse a policy document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    /// Serialize the document to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate names
    ///
    /// Node names and parents must be non-empty and must not be the wildcard;
    /// rule fields must be non-empty.
    pub fn validate(&self) -> Result<()> {
        for node in self.roles.iter().chain(self.resources.iter()) {
            if node.name.is_empty() {
                return Err(AclError::InvalidPolicy(
                    "Node name cannot be empty".to_string(),
                ));
            }
            if node.name == WILDCARD {
                return Err(AclError::InvalidPolicy(
                    "The wildcard cannot be declared as a node".to_string(),
                ));
            }
            for parent in &node.parents {
                if parent.is_empty() || parent == WILDCARD {
                    return Err(AclError::InvalidPolicy(format!(
                        "Node '{}' has an invalid parent '{}'",
                        node.name, parent
                    )));
                }
            }
        }

        for rule in &self.rules {
            if rule.role.is_empty() || rule.operation.is_empty() || rule.resource.is_empty() {
                return Err(AclError::InvalidPolicy(format!(
                    "Rule ({}, {}, {}) has an empty field",
                    rule.role, rule.operation, rule.resource
                )));
            }
        }

        Ok(())
    }
}

fn identity(name: &str) -> Identity {
    if name == WILDCARD {
        Identity::Any
    } else {
        Identity::Name(name.to_string())
    }
}

fn operation(name: &str) -> Operation {
    if name == WILDCARD {
        Operation::Any
    } else {
        Operation::Name(name.to_string())
    }
}

impl Registry {
    /// Register every node and rule of `document`
    ///
    /// Nodes are added before rules, so rules may reference nodes declared
    /// anywhere in the document.
    pub fn apply_policy(&mut self, document: &PolicyDocument) -> Result<()> {
        document.validate()?;

        for role in &document.roles {
            let parents = role.parents.iter().map(|p| identity(p)).collect();
            self.add_role(identity(&role.name), parents)?;
        }
        for resource in &document.resources {
            let parents = resource.parents.iter().map(|p| identity(p)).collect();
            self.add_resource(identity(&resource.name), parents)?;
        }

        for rule in &document.rules {
            let role = identity(&rule.role);
            let op = operation(&rule.operation);
            let resource = identity(&rule.resource);
            match rule.effect {
                PolicyEffect::Allow => self.allow(role, op, resource)?,
                PolicyEffect::Deny => self.deny(role, op, resource)?,
            }
        }

        info!(
            "Applied policy: {} role(s), {} resource(s), {} rule(s)",
            document.roles.len(),
            document.resources.len(),
            document.rules.len()
        );

        Ok(())
    }

    /// Build a registry from a policy document
    pub fn from_policy(config: RegistryConfig, document: &PolicyDocument) -> Result<Self> {
        let mut registry = Self::with_config(config);
        registry.apply_policy(document)?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decision;

    const SCHOOL: &str = r#"{
        "roles": [
            { "name": "member" },
            { "name": "student", "parents": ["member"] },
            { "name": "junior-student", "parents": ["student"] }
        ],
        "resources": [
            { "name": "course" },
            { "name": "senior-course", "parents": ["course"] }
        ],
        "rules": [
            { "effect": "ALLOW", "role": "member", "operation": "view", "resource": "course" },
            { "effect": "ALLOW", "role": "student", "operation": "learn", "resource": "course" },
            { "effect": "DENY", "role": "junior-student", "operation": "learn", "resource": "senior-course" }
        ]
    }"#;

    #[test]
    fn test_school_document() {
        let document = PolicyDocument::from_json(SCHOOL).unwrap();
        let acl = Registry::from_policy(RegistryConfig::default(), &document).unwrap();

        assert_eq!(acl.is_allowed("student", "view", "course").unwrap(), Decision::Allowed);
        assert_eq!(
            acl.is_allowed("junior-student", "learn", "senior-course").unwrap(),
            Decision::Denied
        );
        assert_eq!(
            acl.is_allowed("junior-student", "learn", "course").unwrap(),
            Decision::Allowed
        );
        assert_eq!(acl.is_allowed("member", "learn", "course").unwrap(), Decision::Unknown);
        assert_eq!(acl.rule_count(), 3);
    }

    #[test]
    fn test_wildcard_rules() {
        let document = PolicyDocument::from_json(
            r#"{
                "roles": [{ "name": "admin" }],
                "resources": [{ "name": "server" }],
                "rules": [{ "effect": "ALLOW", "role": "admin", "operation": "*", "resource": "*" }]
            }"#,
        )
        .unwrap();
        let acl = Registry::from_policy(RegistryConfig::default(), &document).unwrap();

        assert_eq!(acl.is_allowed("admin", "reboot", "server").unwrap(), Decision::Allowed);
    }

    #[test]
    fn test_rejects_wildcard_node() {
        let result = PolicyDocument::from_json(r#"{ "roles": [{ "name": "*" }] }"#);
        assert!(matches!(result, Err(AclError::InvalidPolicy(_))));
    }

    #[test]
    fn test_rejects_empty_rule_field() {
        let result = PolicyDocument::from_json(
            r#"{ "rules": [{ "effect": "DENY", "role": "", "operation": "x", "resource": "*" }] }"#,
        );
        assert!(matches!(result, Err(AclError::InvalidPolicy(_))));
    }

    #[test]
    fn test_rule_on_undeclared_role_fails() {
        let document = PolicyDocument {
            rules: vec![RuleDefinition {
                effect: PolicyEffect::Allow,
                role: "ghost".to_string(),
                operation: "read".to_string(),
                resource: "*".to_string(),
            }],
            ..Default::default()
        };

        let mut acl = Registry::new();
        assert!(matches!(
            acl.apply_policy(&document),
            Err(AclError::UnregisteredRole(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PolicyDocument::from_json("{ not json"),
            Err(AclError::Json(_))
        ));
    }

    #[test]
    fn test_document_json_roundtrip() {
        let document = PolicyDocument {
            roles: vec![NodeDefinition::new("editor", vec!["viewer".to_string()])],
            ..Default::default()
        };
        let parsed = PolicyDocument::from_json(&document.to_json().unwrap()).unwrap();
        assert_eq!(parsed, document);
    }
}
