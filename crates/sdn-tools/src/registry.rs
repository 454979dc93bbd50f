//! Tool Registry
//!
//! Holds the registered tools with their definitions and per-tool call counters.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::tool::{BoxedTool, SecurityLevel};

/// Tool definition metadata (without the actual tool implementation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub category: String,
    pub tags: Vec<String>,
    pub namespace: String,
    pub toolsets: Vec<String>,
    pub security_level: SecurityLevel,
}

impl ToolDefinition {
    fn of(tool: &BoxedTool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
            category: tool.category().to_string(),
            tags: tool.tags(),
            namespace: tool.namespace().to_string(),
            toolsets: tool.toolsets(),
            security_level: tool.security_level(),
        }
    }
}

/// A registered tool with usage tracking
struct RegisteredTool {
    tool: BoxedTool,
    definition: ToolDefinition,
    use_count: AtomicU64,
}

/// Statistics about the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_registered: usize,
    pub total_calls: u64,
    pub failed_calls: u64,
    pub calls_by_tool: HashMap<String, u64>,
}

/// Tool Registry
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<Arc<str>, Arc<RegisteredTool>>>,
    failed_calls: AtomicU64,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with its definition
    pub async fn register(&self, name: Arc<str>, tool: BoxedTool, definition: ToolDefinition) -> Result<()> {
        let registered = Arc::new(RegisteredTool {
            tool,
            definition,
            use_count: AtomicU64::new(0),
        });

        let mut tools = self.tools.write().await;
        if tools.insert(name.clone(), registered).is_some() {
            warn!("Replaced existing tool: {}", name);
        } else {
            debug!("Registered tool: {}", name);
        }
        Ok(())
    }

    /// Helper to register a tool instance directly
    pub async fn register_tool(&self, tool: BoxedTool) -> Result<()> {
        let definition = ToolDefinition::of(&tool);
        self.register(Arc::from(tool.name()), tool, definition).await
    }

    /// Get a tool by name
    pub async fn get(&self, name: &str) -> Option<BoxedTool> {
        let tools = self.tools.read().await;
        tools.get(name).map(|registered| registered.tool.clone())
    }

    pub async fn get_definition(&self, name: &str) -> Option<ToolDefinition> {
        let tools = self.tools.read().await;
        tools.get(name).map(|registered| registered.definition.clone())
    }

    /// All tool definitions, sorted by name
    pub async fn list(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut definitions: Vec<ToolDefinition> =
            tools.values().map(|t| t.definition.clone()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Tool definitions offered in one toolset, sorted by name
    pub async fn list_namespace(&self, namespace: &str) -> Vec<ToolDefinition> {
        let mut definitions = self.list().await;
        definitions.retain(|d| d.toolsets.iter().any(|t| t == namespace));
        definitions
    }

    /// Look up `name` and run it with `input`
    pub async fn execute(&self, name: &str, input: Value) -> Result<Value> {
        let registered = {
            let tools = self.tools.read().await;
            tools.get(name).cloned()
        }
        .with_context(|| format!("Unknown tool: {}", name))?;

        registered.use_count.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = registered.tool.execute(input).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(tool = name, elapsed_ms, "Tool call succeeded"),
            Err(e) => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                warn!(tool = name, elapsed_ms, error = %e, "Tool call failed");
            }
        }
        result
    }

    pub async fn stats(&self) -> RegistryStats {
        let tools = self.tools.read().await;
        let calls_by_tool: HashMap<String, u64> = tools
            .iter()
            .map(|(name, t)| (name.to_string(), t.use_count.load(Ordering::Relaxed)))
            .collect();

        RegistryStats {
            total_registered: tools.len(),
            total_calls: calls_by_tool.values().sum(),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            calls_by_tool,
        }
    }
}
