//! Live state collection for bridges, VMs, STP tables and traffic control
//!
//! Each query runs one OS command through the [`CommandRunner`](crate::command::CommandRunner) and hands its
//! output to a parser. Failures never propagate: a device that cannot be queried
//! comes back as an absent record.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::command::{SharedRunner, SystemRunner};
use crate::inventory::Inventory;
use crate::links::resolve_active_links;
use crate::model::{
    ActiveLink, BridgeRecord, InterfaceSettings, InterfaceState, InterfaceStats, NetworkStatus,
    RoutingInfo, StpInfo, SwitchId, TcIssue, TcSettings, VmRecord,
};
use crate::parse;
use crate::path::find_path;
use crate::tc::detect_issues;
use sdn_core::Settings;

/// Queries the live system for the devices named in an [`Inventory`]
#[derive(Clone)]
pub struct Collector {
    runner: SharedRunner,
    settings: Settings,
    inventory: Inventory,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("settings", &self.settings)
            .field("inventory", &self.inventory)
            .finish_non_exhaustive()
    }
}

impl Collector {
    pub fn new(runner: SharedRunner, settings: Settings, inventory: Inventory) -> Self {
        Self {
            runner,
            settings,
            inventory,
        }
    }

    /// Collector running real processes
    pub fn system(settings: Settings, inventory: Inventory) -> Self {
        Self::new(Arc::new(SystemRunner), settings, inventory)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn runner(&self) -> SharedRunner {
        Arc::clone(&self.runner)
    }

    /// Run a read-only command; `Some(stdout)` only on exit status 0
    async fn query(&self, program: &str, args: &[&str], timeout: Duration) -> Option<String> {
        match self.runner.run(program, args, timeout).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                debug!(
                    program,
                    args = ?args,
                    exit_code = output.exit_code,
                    stderr = output.message(),
                    "Query returned non-zero exit"
                );
                None
            }
            Err(e) => {
                warn!(program, args = ?args, error = %e, "Query failed");
                None
            }
        }
    }

    // ========================================================================
    // Bridges and VMs
    // ========================================================================

    pub async fn bridge_info(&self, bridge: &str) -> BridgeRecord {
        let timeout = self.settings.read_timeout;
        let Some(link) = self.query("ip", &["link", "show", bridge], timeout).await else {
            return BridgeRecord::absent(bridge);
        };

        let interfaces = self
            .query("ip", &["link", "show", "master", bridge], timeout)
            .await
            .map(|text| parse::parse_master_links(&text))
            .unwrap_or_default();

        BridgeRecord {
            name: bridge.to_string(),
            exists: true,
            state: parse::parse_link_state(&link),
            interfaces,
        }
    }

    pub async fn vm_config(&self, vm: &str) -> VmRecord {
        let timeout = self.settings.read_timeout;
        let Some(info) = self.query("virsh", &["dominfo", vm], timeout).await else {
            return VmRecord::absent(vm);
        };
        let info = parse::parse_dominfo(&info);

        let iflist_args = ["domiflist", vm];
        let blklist_args = ["domblklist", vm];
        let (interfaces, disks) = futures::join!(
            self.query("virsh", &iflist_args, timeout),
            self.query("virsh", &blklist_args, timeout),
        );

        VmRecord {
            name: vm.to_string(),
            exists: true,
            state: info.state.unwrap_or_else(|| "unknown".to_string()),
            vcpu: info.vcpu,
            memory: info.memory,
            interfaces: interfaces
                .map(|text| parse::parse_domiflist(&text))
                .unwrap_or_default(),
            disks: disks
                .map(|text| parse::parse_domblklist(&text))
                .unwrap_or_default(),
            os_type: info.os_type,
        }
    }

    // ========================================================================
    // STP
    // ========================================================================

    pub async fn stp_info(&self, bridge: &str) -> StpInfo {
        let ports = self
            .query("brctl", &["showstp", bridge], self.settings.read_timeout)
            .await
            .map(|text| parse::parse_showstp(&text))
            .unwrap_or_default();

        StpInfo {
            bridge: bridge.to_string(),
            ports,
        }
    }

    /// STP tables for every inventory bridge, in inventory order
    pub async fn all_stp_info(&self) -> Vec<StpInfo> {
        join_all(self.inventory.bridges.iter().map(|b| self.stp_info(b))).await
    }

    /// Links whose both veth directions are forwarding, from fresh STP tables
    pub async fn active_links(&self) -> Vec<ActiveLink> {
        resolve_active_links(&self.all_stp_info().await)
    }

    // ========================================================================
    // Interfaces and traffic control
    // ========================================================================

    pub async fn tc_settings(&self, iface: &str) -> TcSettings {
        match self
            .query("tc", &["qdisc", "show", "dev", iface], self.settings.read_timeout)
            .await
        {
            Some(text) => parse::parse_qdisc_show(iface, &text),
            None => TcSettings::empty(iface),
        }
    }

    /// TC settings for every bridge and veth interface in the inventory
    pub async fn all_tc_settings(&self) -> BTreeMap<String, TcSettings> {
        let interfaces = self.inventory.tc_interfaces();
        let settings = join_all(interfaces.iter().map(|iface| self.tc_settings(iface))).await;
        interfaces.into_iter().zip(settings).collect()
    }

    pub async fn interface_stats(&self, iface: &str) -> InterfaceStats {
        match self
            .query("ip", &["-s", "link", "show", iface], self.settings.read_timeout)
            .await
        {
            Some(text) => parse::parse_link_stats(iface, &text),
            None => InterfaceStats::absent(iface),
        }
    }

    pub async fn interface_state(&self, iface: &str) -> InterfaceState {
        match self
            .query("ip", &["link", "show", iface], self.settings.probe_timeout)
            .await
        {
            Some(text) => InterfaceState {
                exists: true,
                state: parse::parse_link_state(&text),
            },
            None => InterfaceState {
                exists: false,
                state: "DOWN".to_string(),
            },
        }
    }

    pub async fn link_exists(&self, iface: &str) -> bool {
        self.query("ip", &["link", "show", iface], self.settings.probe_timeout)
            .await
            .is_some()
    }

    /// Addresses of one interface; `None` when `ip addr show` fails
    pub async fn interface_settings(&self, iface: &str) -> Option<InterfaceSettings> {
        self.query("ip", &["addr", "show", iface], self.settings.query_timeout)
            .await
            .map(|text| parse::parse_addr_show(&text))
    }

    pub async fn routing_info(&self) -> RoutingInfo {
        self.query("ip", &["route", "show"], self.settings.query_timeout)
            .await
            .map(|text| parse::parse_route_show(&text))
            .unwrap_or_default()
    }

    /// TC settings plus the link state of every existing bridge and veth
    pub async fn network_status(&self) -> NetworkStatus {
        let interfaces = self.inventory.tc_interfaces();
        let (tc_settings, states) = futures::join!(
            self.all_tc_settings(),
            join_all(interfaces.iter().map(|iface| self.interface_state(iface))),
        );

        NetworkStatus {
            tc_settings,
            interfaces: interfaces
                .into_iter()
                .zip(states)
                .filter(|(_, state)| state.exists)
                .collect(),
        }
    }

    pub async fn detect_tc_issues(&self) -> Vec<TcIssue> {
        detect_issues(&self.all_tc_settings().await)
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Switch hops from the root switch to the switch `host` is attached to
    pub async fn calculate_path_to_host(&self, host: &str) -> Vec<SwitchId> {
        let topology = self.network_topology().await;
        find_path(
            &topology.vm_to_bridge,
            &topology.active_links,
            host,
            &self.inventory.root_switch,
        )
    }
}
