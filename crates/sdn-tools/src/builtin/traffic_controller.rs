//! Traffic controller tools - active links and qdisc mutations
//!
//! Mutations are refused unless the interface is on an active link at call time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::network_manager::GetTcSettingsTool;
use super::{to_json, TRAFFIC_CONTROLLER};
use crate::tool::{required_str, str_or, SecurityLevel, Tool};
use crate::{ToolContext, ToolRegistry};
use sdn_network::{DEFAULT_BURST, DEFAULT_RATE};

/// Tool listing links whose both veth directions are forwarding
pub struct GetActiveLinksTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for GetActiveLinksTool {
    fn name(&self) -> &str {
        "get_active_links"
    }

    fn description(&self) -> &str {
        "List the switch-to-switch links that carry traffic (both veth directions STP forwarding). Only interfaces on these links may be modified."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn namespace(&self) -> &str {
        TRAFFIC_CONTROLLER
    }

    fn tags(&self) -> Vec<String> {
        vec!["stp".to_string(), "links".to_string()]
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        to_json(&self.ctx.collector.active_links().await)
    }
}

/// Tool to delete the root qdisc of an active interface
pub struct RemoveTcTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for RemoveTcTool {
    fn name(&self) -> &str {
        "remove_tc"
    }

    fn description(&self) -> &str {
        "Remove all traffic control settings (root qdisc) from an interface on an active link. Succeeds when nothing was configured."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "interface": {
                    "type": "string",
                    "description": "Veth interface on an active link (e.g., 'veth-sw1-sw2')"
                }
            },
            "required": ["interface"]
        })
    }

    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Modify
    }

    fn namespace(&self) -> &str {
        TRAFFIC_CONTROLLER
    }

    fn tags(&self) -> Vec<String> {
        vec!["tc".to_string(), "write".to_string()]
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let iface = required_str(&input, "interface")?;
        let result = self
            .ctx
            .policy
            .remove_tc(iface)
            .await
            .with_context(|| format!("Failed to remove TC settings from {}", iface))?;
        to_json(&result)
    }
}

/// Tool to install a TBF bandwidth limit on an active interface
pub struct ApplyBandwidthLimitTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for ApplyBandwidthLimitTool {
    fn name(&self) -> &str {
        "apply_bandwidth_limit"
    }

    fn description(&self) -> &str {
        "Limit bandwidth on an interface of an active link with a TBF qdisc (latency 50ms), replacing any existing root qdisc."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "interface": {
                    "type": "string",
                    "description": "Veth interface on an active link (e.g., 'veth-sw1-sw2')"
                },
                "rate": {
                    "type": "string",
                    "description": "Rate limit such as '1Mbit', '10Mbit', '500Kbit'",
                    "default": DEFAULT_RATE
                },
                "burst": {
                    "type": "string",
                    "description": "Burst size such as '32Kb'",
                    "default": DEFAULT_BURST
                }
            },
            "required": ["interface"]
        })
    }

    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Modify
    }

    fn namespace(&self) -> &str {
        TRAFFIC_CONTROLLER
    }

    fn tags(&self) -> Vec<String> {
        vec!["tc".to_string(), "tbf".to_string(), "write".to_string()]
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let iface = required_str(&input, "interface")?;
        let rate = str_or(&input, "rate", DEFAULT_RATE);
        let burst = str_or(&input, "burst", DEFAULT_BURST);

        let result = self
            .ctx
            .policy
            .apply_bandwidth_limit(iface, rate, burst)
            .await
            .with_context(|| format!("Failed to apply bandwidth limit on {}", iface))?;
        to_json(&result)
    }
}

pub async fn register_traffic_controller_tools(
    registry: &ToolRegistry,
    ctx: Arc<ToolContext>,
) -> Result<()> {
    // Shared with the network manager toolset
    if registry.get("get_tc_settings").await.is_none() {
        registry.register_tool(Arc::new(GetTcSettingsTool::new(ctx.clone()))).await?;
    }
    registry.register_tool(Arc::new(GetActiveLinksTool { ctx: ctx.clone() })).await?;
    registry.register_tool(Arc::new(RemoveTcTool { ctx: ctx.clone() })).await?;
    registry.register_tool(Arc::new(ApplyBandwidthLimitTool { ctx })).await?;
    info!("Registered traffic controller tools");
    Ok(())
}
