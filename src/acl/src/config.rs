//! Registry configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// How the inheritance graphs treat parent edges that close a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Refuse the edge with `AclError::CircularInheritance`
    #[default]
    Reject,
    /// Store the edge; closure traversal stops at nodes it already visited
    Ignore,
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Cycle handling for role and resource parents
    pub cycle_policy: CyclePolicy,

    /// Memoize ancestor closures between mutations
    pub cache_closures: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cycle_policy: CyclePolicy::Reject,
            cache_closures: true,
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
