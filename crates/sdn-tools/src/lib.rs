//! sdn-tools: Tool Registry and network toolsets
//!
//! Exposes the topology collector and traffic-control operations as JSON tools
//! grouped into the `network_manager` and `traffic_controller` toolsets.

pub mod builtin;
pub mod policy;
pub mod registry;
pub mod tool;

use std::sync::Arc;

use sdn_core::Settings;
use sdn_network::{Collector, Inventory, SharedRunner, SystemRunner, TcController};

// Re-export main types
pub use builtin::{
    register_network_manager_tools, register_traffic_controller_tools, NETWORK_MANAGER,
    TRAFFIC_CONTROLLER,
};
pub use policy::{MutationError, MutationPolicy, PolicyViolation};
pub use registry::{RegistryStats, ToolDefinition, ToolRegistry};
pub use tool::{BoxedTool, SecurityLevel, Tool};

/// State shared by every tool: the collector for reads and the policy for mutations
pub struct ToolContext {
    pub collector: Collector,
    pub policy: MutationPolicy,
}

impl ToolContext {
    pub fn new(runner: SharedRunner, settings: Settings, inventory: Inventory) -> Self {
        let collector = Collector::new(runner.clone(), settings.clone(), inventory);
        let controller = TcController::new(runner, settings);
        Self {
            policy: MutationPolicy::new(collector.clone(), controller),
            collector,
        }
    }

    /// Context running real commands, with the inventory named in `settings`
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let inventory = Inventory::from_settings(&settings)?;
        Ok(Self::new(Arc::new(SystemRunner), settings, inventory))
    }
}

/// Register both toolsets
pub async fn register_all_tools(registry: &ToolRegistry, ctx: Arc<ToolContext>) -> anyhow::Result<()> {
    register_network_manager_tools(registry, ctx.clone()).await?;
    register_traffic_controller_tools(registry, ctx).await?;
    Ok(())
}
