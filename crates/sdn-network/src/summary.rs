//! Compact topology report
//!
//! Projects an [`AggregatedTopologyInfo`] onto the handful of facts a reader (or an
//! agent) needs to reason about traffic: what exists, which links forward, and which
//! veths a host's traffic crosses.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::inventory::Inventory;
use crate::model::{ActiveLink, AggregatedTopologyInfo, MemoryInfo, SwitchId, VmBridgeConnection};
use crate::path::{find_path, interfaces_along};

const EXAMPLE_PATH_LIMIT: usize = 4;
const KEY_INTERFACE_LIMIT: usize = 10;

/// Fixed explanations attached to every summary
pub const NETWORK_NOTES: [&str; 7] = [
    "VMs attach to bridges through vnet tap interfaces (host1 on br-sw1 via vnet0, for example)",
    "Bridges are joined by veth pairs: br-sw1 and br-sw2 share veth-sw1-sw2 / veth-sw2-sw1",
    "STP decides which links carry traffic. A BLOCKING port carries none, so limits on it have no effect",
    "Traffic path: VM -> vnet -> bridge -> veth (FORWARDING only) -> bridge -> vnet -> VM",
    "Traffic control (tc) on a vnet or veth interface can cap bandwidth or add delay and loss",
    "Only tc settings on FORWARDING links along the active path affect a flow",
    "To find which link has tc applied, inspect the veth interfaces (veth-sw1-sw2, veth-sw1-sw3, ...)",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSummary {
    pub name: String,
    pub state: String,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSummary {
    pub name: String,
    pub state: String,
    pub vcpu: Option<u32>,
    pub memory: Option<MemoryInfo>,
    pub bridge_connections: Vec<VmBridgeConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConnectionSummary {
    pub from_bridge: String,
    pub to_bridge: String,
    pub interface: String,
    pub from_node: SwitchId,
    pub to_node: SwitchId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StpPortSummary {
    pub interface: String,
    pub state: String,
    pub is_forwarding: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StpSummary {
    pub ports: Vec<StpPortSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePath {
    pub host: String,
    pub path_switches: Vec<SwitchId>,
    pub interfaces_used: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInterfaceInfo {
    pub interface: String,
    pub state: String,
    pub ips: Vec<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub bridges: Vec<BridgeSummary>,
    pub vms: Vec<VmSummary>,
    pub bridge_connections: Vec<BridgeConnectionSummary>,
    pub stp_info: BTreeMap<String, StpSummary>,
    pub active_links: Vec<ActiveLink>,
    pub example_paths: Vec<ExamplePath>,
    pub network_notes: Vec<String>,
    pub key_interfaces: Vec<KeyInterfaceInfo>,
}

pub fn build_summary(info: &AggregatedTopologyInfo, inventory: &Inventory) -> NetworkSummary {
    let topology = &info.topology;

    let bridges = topology
        .bridges
        .values()
        .filter(|b| b.exists)
        .map(|b| BridgeSummary {
            name: b.name.clone(),
            state: b.state.clone(),
            interfaces: b.interfaces.clone(),
        })
        .collect();

    let vms = topology
        .vms
        .values()
        .filter(|vm| vm.exists)
        .map(|vm| VmSummary {
            name: vm.name.clone(),
            state: vm.state.clone(),
            vcpu: vm.vcpu,
            memory: vm.memory.clone(),
            bridge_connections: topology.vm_to_bridge.get(&vm.name).cloned().unwrap_or_default(),
        })
        .collect();

    let mut seen = BTreeSet::new();
    let bridge_connections = topology
        .veth_connections
        .iter()
        .filter(|veth| {
            let key = if veth.source <= veth.target {
                (veth.source.clone(), veth.target.clone())
            } else {
                (veth.target.clone(), veth.source.clone())
            };
            seen.insert(key)
        })
        .map(|veth| BridgeConnectionSummary {
            from_bridge: veth.source.bridge_name(),
            to_bridge: veth.target.bridge_name(),
            interface: veth.interface.clone(),
            from_node: veth.source.clone(),
            to_node: veth.target.clone(),
        })
        .collect();

    let stp_info = topology
        .stp_info
        .iter()
        .filter(|(_, stp)| !stp.ports.is_empty())
        .map(|(bridge, stp)| {
            let ports = stp
                .ports
                .iter()
                .map(|port| StpPortSummary {
                    interface: port.interface.clone(),
                    state: port.state.clone(),
                    is_forwarding: port.is_forwarding(),
                })
                .collect();
            (bridge.clone(), StpSummary { ports })
        })
        .collect();

    let example_paths = inventory
        .example_hosts
        .iter()
        .take(EXAMPLE_PATH_LIMIT)
        .filter_map(|host| {
            let path = find_path(
                &topology.vm_to_bridge,
                &topology.active_links,
                host,
                &inventory.root_switch,
            );
            if path.is_empty() {
                return None;
            }
            Some(ExamplePath {
                host: host.clone(),
                interfaces_used: interfaces_along(&path, &topology.active_links),
                path_switches: path,
            })
        })
        .collect();

    let key_interfaces = info
        .network_settings
        .interfaces
        .iter()
        .take(KEY_INTERFACE_LIMIT)
        .map(|(name, settings)| KeyInterfaceInfo {
            interface: name.clone(),
            state: settings.state.clone(),
            ips: settings.ips.clone(),
            mac: settings.mac.clone(),
        })
        .collect();

    NetworkSummary {
        bridges,
        vms,
        bridge_connections,
        stp_info,
        active_links: topology.active_links.clone(),
        example_paths,
        network_notes: NETWORK_NOTES.iter().map(|n| n.to_string()).collect(),
        key_interfaces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::tests::collector_with;
    use crate::topology::tests::lab_runner;

    #[tokio::test]
    async fn test_summary_of_lab() {
        let collector = collector_with(lab_runner());
        let info = collector.collect_all_topology_info().await;
        let summary = build_summary(&info, collector.inventory());

        assert_eq!(summary.bridges.len(), 4);
        assert_eq!(summary.vms.len(), 4);
        assert_eq!(summary.vms[0].bridge_connections[0].bridge, "br-sw1");

        // Eight veths, four switch pairs
        assert_eq!(summary.bridge_connections.len(), 4);
        let first = &summary.bridge_connections[0];
        assert_eq!(first.from_bridge, "br-sw1");
        assert_eq!(first.to_bridge, "br-sw2");
        assert_eq!(first.interface, "veth-sw1-sw2");

        let sw4 = &summary.stp_info["br-sw4"];
        let blocked = sw4.ports.iter().find(|p| p.interface == "veth-sw4-sw3").unwrap();
        assert!(!blocked.is_forwarding);
        assert!(!summary.stp_info.contains_key("br-wan"));

        assert_eq!(summary.active_links.len(), 3);
        assert_eq!(summary.example_paths.len(), 4);
        let host4 = summary.example_paths.iter().find(|p| p.host == "host4").unwrap();
        assert_eq!(
            host4.path_switches,
            vec![SwitchId::new("s1"), SwitchId::new("s2"), SwitchId::new("s4")]
        );
        assert_eq!(host4.interfaces_used, vec!["veth-sw1-sw2", "veth-sw2-sw4"]);

        let host1 = summary.example_paths.iter().find(|p| p.host == "host1").unwrap();
        assert!(host1.interfaces_used.is_empty());

        assert_eq!(summary.network_notes.len(), NETWORK_NOTES.len());
        assert_eq!(summary.key_interfaces.len(), 4);
    }

    #[tokio::test]
    async fn test_summary_skips_unreachable_hosts() {
        let runner = lab_runner();
        // Block the only forwarding link towards sw4
        runner.on_ok(
            "brctl showstp br-sw2",
            "veth-sw2-sw1 (1)\n port id\t\t8001\t\t\tstate\t\tforwarding\n\n\
             veth-sw2-sw4 (2)\n port id\t\t8002\t\t\tstate\t\tblocking\n\n",
        );
        let collector = collector_with(runner);
        let info = collector.collect_all_topology_info().await;
        let summary = build_summary(&info, collector.inventory());

        assert!(summary.example_paths.iter().all(|p| p.host != "host4"));
        assert!(summary.example_paths.iter().any(|p| p.host == "host2"));
    }
}
