//! Core Tool trait and types
//!
//! Every diagnostic and traffic-control operation is exposed as a [`Tool`]:
//! JSON object in, JSON value out.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Security level for tool operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Inspects live state only
    #[default]
    ReadOnly,
    /// Changes qdiscs on an interface
    Modify,
}

/// Core trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name (unique identifier)
    fn name(&self) -> &str;

    /// Get human-readable description
    fn description(&self) -> &str;

    /// Get JSON schema for input validation
    fn input_schema(&self) -> Value;

    /// Execute the tool with given input
    async fn execute(&self, input: Value) -> Result<Value>;

    /// Get the security level for this tool
    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::ReadOnly
    }

    /// Get the category this tool belongs to
    fn category(&self) -> &str {
        "networking"
    }

    /// Primary toolset of the tool
    fn namespace(&self) -> &str;

    /// Every toolset the tool is offered in
    fn toolsets(&self) -> Vec<String> {
        vec![self.namespace().to_string()]
    }

    /// Get tags for tool discovery
    fn tags(&self) -> Vec<String> {
        vec![]
    }
}

/// Type alias for boxed tools
pub type BoxedTool = Arc<dyn Tool>;

/// Required string argument
pub fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {}", key))
}

/// Optional string argument with a default
pub fn str_or<'a>(input: &'a Value, key: &str, default: &'a str) -> &'a str {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}
