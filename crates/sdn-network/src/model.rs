//! Typed records derived from live system state
//!
//! Every record is rebuilt on each query; nothing here is cached.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

lazy_static! {
    static ref SWITCH_TOKEN: Regex = Regex::new(r"^(?:br-)?sw?(\d+)$").unwrap();
    static ref SWITCH_BRIDGE: Regex = Regex::new(r"^br-sw(\d+)$").unwrap();
}

// ============================================================================
// SWITCH IDENTIFIERS
// ============================================================================

/// Normalized switch identifier (`s1`, `s2`, ...).
///
/// `sw3`, `s3` and `br-sw3` all normalize to `s3`; tokens that do not follow the
/// switch naming convention are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SwitchId(String);

impl SwitchId {
    pub fn new(token: &str) -> Self {
        match SWITCH_TOKEN.captures(token) {
            Some(caps) => SwitchId(format!("s{}", &caps[1])),
            None => SwitchId(token.to_string()),
        }
    }

    /// Switch served by a `br-sw<N>` bridge; `None` for any other bridge name
    pub fn from_bridge(bridge: &str) -> Option<Self> {
        SWITCH_BRIDGE
            .captures(bridge)
            .map(|caps| SwitchId(format!("s{}", &caps[1])))
    }

    /// Bridge implementing this switch (`s3` → `br-sw3`)
    pub fn bridge_name(&self) -> String {
        match self.0.strip_prefix('s') {
            Some(n) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => {
                format!("br-sw{}", n)
            }
            _ => format!("br-{}", self.0),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SwitchId {
    fn from(token: &str) -> Self {
        SwitchId::new(token)
    }
}

impl From<String> for SwitchId {
    fn from(token: String) -> Self {
        SwitchId::new(&token)
    }
}

impl From<SwitchId> for String {
    fn from(id: SwitchId) -> Self {
        id.0
    }
}

// ============================================================================
// BRIDGES AND VMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRecord {
    pub name: String,
    pub exists: bool,
    /// "UP" or "DOWN"
    pub state: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

impl BridgeRecord {
    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exists: false,
            state: "DOWN".to_string(),
            interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub value: u64,
    pub unit: String,
}

/// One row of `virsh domiflist`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInterface {
    pub interface: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub model: Option<String>,
    pub mac: Option<String>,
}

/// One row of `virsh domblklist`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub target: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub name: String,
    pub exists: bool,
    pub state: String,
    pub vcpu: Option<u32>,
    pub memory: Option<MemoryInfo>,
    #[serde(default)]
    pub interfaces: Vec<VmInterface>,
    #[serde(default)]
    pub disks: Vec<DiskInfo>,
    pub os_type: Option<String>,
}

impl VmRecord {
    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exists: false,
            state: "unknown".to_string(),
            vcpu: None,
            memory: None,
            interfaces: Vec::new(),
            disks: Vec::new(),
            os_type: None,
        }
    }
}

// ============================================================================
// STP
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StpPortRecord {
    pub interface: String,
    pub state: String,
}

impl StpPortRecord {
    pub fn is_forwarding(&self) -> bool {
        self.state.eq_ignore_ascii_case("forwarding")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StpInfo {
    pub bridge: String,
    #[serde(default)]
    pub ports: Vec<StpPortRecord>,
}

/// A switch-to-switch link whose both veth directions are forwarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLink {
    pub source: SwitchId,
    pub target: SwitchId,
    pub interface: String,
    pub reverse_interface: String,
    pub state: String,
    pub bridge: String,
}

impl ActiveLink {
    /// True if `iface` is either direction of this link
    pub fn uses_interface(&self, iface: &str) -> bool {
        self.interface == iface || self.reverse_interface == iface
    }

    /// True if this link joins `a` and `b` in either direction
    pub fn connects(&self, a: &SwitchId, b: &SwitchId) -> bool {
        (&self.source == a && &self.target == b) || (&self.source == b && &self.target == a)
    }
}

// ============================================================================
// TOPOLOGY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmBridgeConnection {
    pub bridge: String,
    pub interface: Option<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VethConnection {
    pub source: SwitchId,
    pub target: SwitchId,
    pub interface: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub bridges: BTreeMap<String, BridgeRecord>,
    pub vms: BTreeMap<String, VmRecord>,
    pub vm_to_bridge: BTreeMap<String, Vec<VmBridgeConnection>>,
    pub veth_connections: Vec<VethConnection>,
    pub stp_info: BTreeMap<String, StpInfo>,
    pub active_links: Vec<ActiveLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeState {
    pub state: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSettings {
    #[serde(default)]
    pub ips: Vec<String>,
    pub mac: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingInfo {
    pub route_count: usize,
    #[serde(default)]
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub bridges: BTreeMap<String, BridgeState>,
    pub interfaces: BTreeMap<String, InterfaceSettings>,
    pub routing: RoutingInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTopologyInfo {
    pub topology: Topology,
    pub network_settings: NetworkSettings,
    pub vm_configs: BTreeMap<String, VmRecord>,
    pub collected_at: DateTime<Utc>,
}

// ============================================================================
// TRAFFIC CONTROL AND INTERFACE STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcSettings {
    pub interface: String,
    pub has_tc: bool,
    #[serde(default)]
    pub qdiscs: Vec<String>,
    pub bandwidth_limit: Option<String>,
    pub burst: Option<String>,
    pub has_netem: Option<bool>,
}

impl TcSettings {
    pub fn empty(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            has_tc: false,
            qdiscs: Vec::new(),
            bandwidth_limit: None,
            burst: None,
            has_netem: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub interface: String,
    pub exists: bool,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

impl InterfaceStats {
    pub fn absent(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            exists: false,
            rx_bytes: 0,
            tx_bytes: 0,
            rx_packets: 0,
            tx_packets: 0,
            rx_errors: 0,
            tx_errors: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceState {
    pub exists: bool,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub tc_settings: BTreeMap<String, TcSettings>,
    pub interfaces: BTreeMap<String, InterfaceState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcIssueKind {
    BandwidthLimit,
    TcConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcIssue {
    pub interface: String,
    #[serde(rename = "type")]
    pub kind: TcIssueKind,
    pub bandwidth_limit: Option<String>,
    pub burst: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcOperationResult {
    pub success: bool,
    pub details: String,
    pub interface: String,
    pub rate: Option<String>,
    pub burst: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_id_normalization() {
        assert_eq!(SwitchId::new("sw1").as_str(), "s1");
        assert_eq!(SwitchId::new("s1").as_str(), "s1");
        assert_eq!(SwitchId::new("br-sw12").as_str(), "s12");
        assert_eq!(SwitchId::new("wan").as_str(), "wan");
        assert_eq!(SwitchId::new("sw1"), SwitchId::new("s1"));
    }

    #[test]
    fn test_switch_id_bridges() {
        assert_eq!(SwitchId::from_bridge("br-sw4"), Some(SwitchId::new("s4")));
        assert_eq!(SwitchId::from_bridge("br-wan"), None);
        assert_eq!(SwitchId::from_bridge("br-sw"), None);
        assert_eq!(SwitchId::new("s3").bridge_name(), "br-sw3");
        assert_eq!(SwitchId::new("wan").bridge_name(), "br-wan");
    }

    #[test]
    fn test_serialized_field_names() {
        let issue = TcIssue {
            interface: "veth-sw1-sw2".into(),
            kind: TcIssueKind::BandwidthLimit,
            bandwidth_limit: Some("1Mbit".into()),
            burst: None,
            description: String::new(),
        };
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "bandwidth_limit");

        let link = ActiveLink {
            source: SwitchId::new("sw1"),
            target: SwitchId::new("sw2"),
            interface: "veth-sw1-sw2".into(),
            reverse_interface: "veth-sw2-sw1".into(),
            state: "forwarding".into(),
            bridge: "br-sw1".into(),
        };
        let value = serde_json::to_value(&link).unwrap();
        assert_eq!(value["source"], "s1");
        assert!(link.uses_interface("veth-sw2-sw1"));
        assert!(link.connects(&SwitchId::new("s2"), &SwitchId::new("s1")));
    }
}
