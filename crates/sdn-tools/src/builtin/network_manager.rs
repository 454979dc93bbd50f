//! Network manager tools - read-only diagnostics
//!
//! Every call re-queries the live system; nothing is cached between calls.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{to_json, NETWORK_MANAGER, TRAFFIC_CONTROLLER};
use crate::tool::{required_str, Tool};
use crate::{ToolContext, ToolRegistry};
use sdn_network::build_summary;

fn interface_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "interface": {
                "type": "string",
                "description": description
            }
        },
        "required": ["interface"]
    })
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

// =============================================================================
// TRAFFIC CONTROL INSPECTION
// =============================================================================

/// Tool to read the qdisc configuration of one interface
pub struct GetTcSettingsTool {
    ctx: Arc<ToolContext>,
}

impl GetTcSettingsTool {
    pub(crate) fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GetTcSettingsTool {
    fn name(&self) -> &str {
        "get_tc_settings"
    }

    fn description(&self) -> &str {
        "Show traffic control (tc) settings on one interface: non-default qdiscs, TBF bandwidth limit and burst, and whether netem delay/loss is configured."
    }

    fn input_schema(&self) -> Value {
        interface_schema("Interface to inspect (e.g., 'veth-sw1-sw2', 'br-sw1')")
    }

    fn namespace(&self) -> &str {
        NETWORK_MANAGER
    }

    fn toolsets(&self) -> Vec<String> {
        vec![NETWORK_MANAGER.to_string(), TRAFFIC_CONTROLLER.to_string()]
    }

    fn tags(&self) -> Vec<String> {
        vec!["tc".to_string(), "qdisc".to_string()]
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let iface = required_str(&input, "interface")?;
        debug!(interface = %iface, "Reading TC settings");
        to_json(&self.ctx.collector.tc_settings(iface).await)
    }
}

/// Tool to read qdisc configuration of every bridge and veth
pub struct GetAllTcSettingsTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for GetAllTcSettingsTool {
    fn name(&self) -> &str {
        "get_all_tc_settings"
    }

    fn description(&self) -> &str {
        "Show traffic control settings for every bridge and veth interface, keyed by interface name."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn namespace(&self) -> &str {
        NETWORK_MANAGER
    }

    fn tags(&self) -> Vec<String> {
        vec!["tc".to_string(), "qdisc".to_string()]
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        to_json(&self.ctx.collector.all_tc_settings().await)
    }
}

/// Tool to list interfaces with restricting qdiscs
pub struct DetectTcIssuesTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for DetectTcIssuesTool {
    fn name(&self) -> &str {
        "detect_tc_issues"
    }

    fn description(&self) -> &str {
        "List interfaces whose tc configuration may restrict traffic (bandwidth limits, delay or loss). Interfaces with only default qdiscs are omitted."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn namespace(&self) -> &str {
        NETWORK_MANAGER
    }

    fn tags(&self) -> Vec<String> {
        vec!["tc".to_string(), "diagnostics".to_string()]
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        let issues = self.ctx.collector.detect_tc_issues().await;
        info!(count = issues.len(), "Detected TC issues");
        to_json(&issues)
    }
}

// =============================================================================
// INTERFACE STATE
// =============================================================================

/// Tool to read RX/TX counters of one interface
pub struct GetInterfaceStatsTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for GetInterfaceStatsTool {
    fn name(&self) -> &str {
        "get_interface_stats"
    }

    fn description(&self) -> &str {
        "Show RX/TX byte, packet and error counters for one interface. Returns exists=false when the interface is missing."
    }

    fn input_schema(&self) -> Value {
        interface_schema("Interface to inspect (e.g., 'veth-sw2-sw4', 'vnet0')")
    }

    fn namespace(&self) -> &str {
        NETWORK_MANAGER
    }

    fn tags(&self) -> Vec<String> {
        vec!["interface".to_string(), "statistics".to_string()]
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let iface = required_str(&input, "interface")?;
        to_json(&self.ctx.collector.interface_stats(iface).await)
    }
}

/// Tool combining TC settings with interface link states
pub struct GetNetworkStatusTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for GetNetworkStatusTool {
    fn name(&self) -> &str {
        "get_network_status"
    }

    fn description(&self) -> &str {
        "Show TC settings of every bridge and veth together with the UP/DOWN state of each existing bridge and veth interface."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn namespace(&self) -> &str {
        NETWORK_MANAGER
    }

    fn tags(&self) -> Vec<String> {
        vec!["tc".to_string(), "interface".to_string(), "status".to_string()]
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        to_json(&self.ctx.collector.network_status().await)
    }
}

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Tool returning the full topology snapshot
pub struct GetTopologyInfoTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for GetTopologyInfoTool {
    fn name(&self) -> &str {
        "get_topology_info"
    }

    fn description(&self) -> &str {
        "Collect the full topology: bridges, VMs and their bridge attachments, veth links, STP port states, active links, interface addresses, routes and VM configurations."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn namespace(&self) -> &str {
        NETWORK_MANAGER
    }

    fn tags(&self) -> Vec<String> {
        vec!["topology".to_string(), "stp".to_string()]
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        to_json(&self.ctx.collector.collect_all_topology_info().await)
    }
}

/// Tool returning the compact topology report
pub struct GetTopologySummaryTool {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl Tool for GetTopologySummaryTool {
    fn name(&self) -> &str {
        "get_topology_summary"
    }

    fn description(&self) -> &str {
        "Summarize the topology: existing bridges and VMs, bridge-to-bridge links, STP port states, active links, example paths from the root switch to hosts with the veths they cross, and key interface addresses."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn namespace(&self) -> &str {
        NETWORK_MANAGER
    }

    fn tags(&self) -> Vec<String> {
        vec!["topology".to_string(), "summary".to_string()]
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        let info = self.ctx.collector.collect_all_topology_info().await;
        to_json(&build_summary(&info, self.ctx.collector.inventory()))
    }
}

pub async fn register_network_manager_tools(
    registry: &ToolRegistry,
    ctx: Arc<ToolContext>,
) -> Result<()> {
    if registry.get("get_tc_settings").await.is_none() {
        registry.register_tool(Arc::new(GetTcSettingsTool::new(ctx.clone()))).await?;
    }
    registry.register_tool(Arc::new(GetAllTcSettingsTool { ctx: ctx.clone() })).await?;
    registry.register_tool(Arc::new(GetInterfaceStatsTool { ctx: ctx.clone() })).await?;
    registry.register_tool(Arc::new(GetNetworkStatusTool { ctx: ctx.clone() })).await?;
    registry.register_tool(Arc::new(DetectTcIssuesTool { ctx: ctx.clone() })).await?;
    registry.register_tool(Arc::new(GetTopologyInfoTool { ctx: ctx.clone() })).await?;
    registry.register_tool(Arc::new(GetTopologySummaryTool { ctx })).await?;
    info!("Registered network manager tools");
    Ok(())
}
