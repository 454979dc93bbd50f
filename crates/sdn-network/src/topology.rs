//! Topology assembly from per-device queries

use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::collector::Collector;
use crate::inventory::veth_endpoints;
use crate::links::resolve_active_links;
use crate::model::{
    AggregatedTopologyInfo, BridgeState, NetworkSettings, Topology, VethConnection,
    VmBridgeConnection, VmRecord,
};

/// Bridge attachments of a VM: interfaces of type `bridge` with a source
pub fn bridge_connections(vm: &VmRecord) -> Vec<VmBridgeConnection> {
    vm.interfaces
        .iter()
        .filter(|iface| iface.kind == "bridge" && !iface.source.is_empty())
        .map(|iface| VmBridgeConnection {
            bridge: iface.source.clone(),
            interface: Some(iface.interface.clone()),
            mac: iface.mac.clone(),
        })
        .collect()
}

impl Collector {
    /// Bridges, VMs, veth links and STP state for the whole inventory
    pub async fn network_topology(&self) -> Topology {
        let inventory = self.inventory();

        let (bridges, vms, veths, stp) = futures::join!(
            join_all(inventory.bridges.iter().map(|b| self.bridge_info(b))),
            join_all(inventory.vms.iter().map(|vm| self.vm_config(vm))),
            join_all(inventory.veth_interfaces.iter().map(|v| self.veth_connection(v))),
            self.all_stp_info(),
        );

        let active_links = resolve_active_links(&stp);

        let vm_to_bridge = vms
            .iter()
            .map(|vm| (vm.name.clone(), bridge_connections(vm)))
            .filter(|(_, connections)| !connections.is_empty())
            .collect();

        let topology = Topology {
            bridges: bridges.into_iter().map(|b| (b.name.clone(), b)).collect(),
            vms: vms.into_iter().map(|vm| (vm.name.clone(), vm)).collect(),
            vm_to_bridge,
            veth_connections: veths.into_iter().flatten().collect(),
            stp_info: stp.into_iter().map(|s| (s.bridge.clone(), s)).collect(),
            active_links,
        };
        debug!(
            bridges = topology.bridges.len(),
            vms = topology.vms.len(),
            veths = topology.veth_connections.len(),
            active_links = topology.active_links.len(),
            "Collected network topology"
        );
        topology
    }

    /// A veth connection for `veth` if its name follows the convention and it exists
    async fn veth_connection(&self, veth: &str) -> Option<VethConnection> {
        let (source, target) = veth_endpoints(veth)?;
        if !self.link_exists(veth).await {
            return None;
        }
        Some(VethConnection {
            source,
            target,
            interface: veth.to_string(),
            kind: "veth".to_string(),
        })
    }

    /// Bridge states, addresses of every bridge member and the routing table
    pub async fn network_settings(&self) -> NetworkSettings {
        let bridges = join_all(self.inventory().bridges.iter().map(|b| self.bridge_info(b))).await;

        let members: BTreeSet<String> = bridges
            .iter()
            .flat_map(|b| b.interfaces.iter().cloned())
            .collect();

        let (addresses, routing) = futures::join!(
            join_all(members.iter().map(|iface| self.interface_settings(iface))),
            self.routing_info(),
        );

        NetworkSettings {
            bridges: bridges
                .into_iter()
                .map(|b| {
                    (
                        b.name,
                        BridgeState {
                            state: b.state,
                            interfaces: b.interfaces,
                        },
                    )
                })
                .collect(),
            interfaces: members
                .into_iter()
                .zip(addresses)
                .filter_map(|(iface, settings)| settings.map(|s| (iface, s)))
                .collect(),
            routing,
        }
    }

    /// Topology, network settings and VM configurations in one snapshot
    pub async fn collect_all_topology_info(&self) -> AggregatedTopologyInfo {
        let (topology, network_settings) =
            futures::join!(self.network_topology(), self.network_settings());

        let vm_configs: BTreeMap<String, VmRecord> = topology.vms.clone();

        AggregatedTopologyInfo {
            topology,
            network_settings,
            vm_configs,
            collected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collector::tests::collector_with;
    use crate::command::{CommandOutput, ScriptedRunner};
    use crate::inventory::Inventory;
    use crate::model::SwitchId;
    use std::sync::Arc;

    fn showstp(ports: &[(&str, &str)]) -> String {
        ports
            .iter()
            .enumerate()
            .map(|(i, (name, state))| {
                format!(
                    "{name} ({n})\n port id\t\t8{n:03}\t\t\tstate\t\t{state}\n designated root\t8000.5254000000aa\tpath cost\t\t2\n\n",
                    name = name,
                    n = i + 1,
                    state = state
                )
            })
            .collect()
    }

    /// The default lab with `veth-sw4-sw3` blocking and hosts spread over the switches
    pub(crate) fn lab_runner() -> Arc<ScriptedRunner> {
        let runner = Arc::new(ScriptedRunner::new());

        let stp: [(&str, &[(&str, &str)]); 4] = [
            ("br-sw1", &[("veth-sw1-sw2", "forwarding"), ("veth-sw1-sw3", "forwarding"), ("vnet0", "forwarding")]),
            ("br-sw2", &[("veth-sw2-sw1", "forwarding"), ("veth-sw2-sw4", "forwarding"), ("vnet1", "forwarding")]),
            ("br-sw3", &[("veth-sw3-sw1", "forwarding"), ("veth-sw3-sw4", "forwarding"), ("vnet2", "forwarding")]),
            ("br-sw4", &[("veth-sw4-sw2", "forwarding"), ("veth-sw4-sw3", "blocking"), ("vnet3", "forwarding")]),
        ];
        for (bridge, ports) in stp {
            runner.on_ok(&format!("brctl showstp {}", bridge), &showstp(ports));
            runner.on_ok(
                &format!("ip link show {}", bridge),
                &format!("3: {}: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 state UP\n", bridge),
            );
            let members: String = ports
                .iter()
                .enumerate()
                .map(|(i, (name, _))| {
                    format!("{}: {}: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 master {}\n", 10 + i, name, bridge)
                })
                .collect();
            runner.on_ok(&format!("ip link show master {}", bridge), &members);
        }

        for veth in Inventory::default().veth_interfaces {
            runner.on_ok(
                &format!("ip link show {}", veth),
                &format!("20: {}: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n", veth),
            );
        }

        for (n, host) in ["host1", "host2", "host3", "host4"].iter().enumerate() {
            let n = n + 1;
            runner.on_ok(
                &format!("virsh dominfo {}", host),
                "State:          running\nCPU(s):         1\nMax memory:     1048576 KiB\n",
            );
            runner.on_ok(
                &format!("virsh domiflist {}", host),
                &format!(
                    " Interface   Type     Source   Model    MAC\n---------------------------------\n vnet{}       bridge   br-sw{}   virtio   52:54:00:00:00:0{}\n",
                    n - 1,
                    n,
                    n
                ),
            );
            runner.on_ok(
                &format!("ip addr show vnet{}", n - 1),
                &format!("{}: vnet{}: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n    link/ether fe:54:00:00:00:0{} brd ff:ff:ff:ff:ff:ff\n", 30 + n, n - 1, n),
            );
        }

        runner.on_ok(
            "ip route show",
            "default via 192.168.122.1 dev eth0\n192.168.122.0/24 dev eth0 proto kernel scope link\n",
        );
        runner
    }

    #[tokio::test]
    async fn test_network_topology() {
        let collector = collector_with(lab_runner());
        let topology = collector.network_topology().await;

        assert_eq!(topology.bridges.len(), 6);
        assert!(topology.bridges["br-sw1"].exists);
        assert!(!topology.bridges["br-wan"].exists);

        assert_eq!(topology.vms.len(), 7);
        assert_eq!(topology.vm_to_bridge.len(), 4);
        assert_eq!(topology.vm_to_bridge["host3"][0].bridge, "br-sw3");

        assert_eq!(topology.veth_connections.len(), 8);
        assert_eq!(topology.veth_connections[0].source, SwitchId::new("s1"));
        assert_eq!(topology.veth_connections[0].kind, "veth");

        assert_eq!(topology.stp_info.len(), 6);
        assert_eq!(topology.active_links.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_veth_not_connected() {
        let runner = lab_runner();
        runner.on(
            "ip link show veth-sw3-sw4",
            CommandOutput::failed(1, "Device \"veth-sw3-sw4\" does not exist.\n"),
        );
        let topology = collector_with(runner).network_topology().await;
        assert_eq!(topology.veth_connections.len(), 7);
        assert!(topology
            .veth_connections
            .iter()
            .all(|v| v.interface != "veth-sw3-sw4"));
    }

    #[tokio::test]
    async fn test_network_settings() {
        let settings = collector_with(lab_runner()).network_settings().await;

        assert_eq!(settings.bridges.len(), 6);
        assert_eq!(settings.bridges["br-sw2"].interfaces.len(), 3);
        // Only vnet members answer `ip addr show` in the scripted lab
        assert_eq!(settings.interfaces.len(), 4);
        assert_eq!(settings.interfaces["vnet2"].mac.as_deref(), Some("fe:54:00:00:00:03"));
        assert_eq!(settings.routing.route_count, 2);
    }

    #[tokio::test]
    async fn test_path_to_host() {
        let collector = collector_with(lab_runner());
        let path = collector.calculate_path_to_host("host4").await;
        let hops: Vec<&str> = path.iter().map(SwitchId::as_str).collect();
        assert_eq!(hops, vec!["s1", "s2", "s4"]);

        assert_eq!(collector.calculate_path_to_host("host1").await, vec![SwitchId::new("s1")]);
        assert!(collector.calculate_path_to_host("router1").await.is_empty());
    }

    #[tokio::test]
    async fn test_collect_all_topology_info() {
        let info = collector_with(lab_runner()).collect_all_topology_info().await;
        assert_eq!(info.vm_configs.len(), 7);
        assert!(info.vm_configs["host1"].exists);
        assert!(!info.vm_configs["ss"].exists);
        assert!(info.collected_at <= Utc::now());
    }
}
