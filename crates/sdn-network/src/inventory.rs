//! Device inventory: the bridges, VMs and veth interfaces that are queried
//!
//! The lab layout is fixed by default. A TOML file can replace any of the lists:
//!
//! ```toml
//! bridges = ["br-sw1", "br-sw2"]
//! vms = ["host1", "host2"]
//! veth_interfaces = ["veth-sw1-sw2", "veth-sw2-sw1"]
//! root_switch = "s1"
//! example_hosts = ["host1", "host2"]
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{NetError, Result};
use crate::model::SwitchId;
use sdn_core::Settings;

lazy_static! {
    static ref VETH_NAME: Regex = Regex::new(r"^veth-([A-Za-z0-9_]+)-([A-Za-z0-9_]+)$").unwrap();
}

/// Switch endpoints encoded in a `veth-<from>-<to>` interface name
pub fn veth_endpoints(name: &str) -> Option<(SwitchId, SwitchId)> {
    VETH_NAME
        .captures(name)
        .map(|caps| (SwitchId::new(&caps[1]), SwitchId::new(&caps[2])))
}

/// Name of the opposite direction of a veth pair (`veth-a-b` → `veth-b-a`)
pub fn reverse_veth(name: &str) -> Option<String> {
    VETH_NAME
        .captures(name)
        .map(|caps| format!("veth-{}-{}", &caps[2], &caps[1]))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub bridges: Vec<String>,
    pub vms: Vec<String>,
    pub veth_interfaces: Vec<String>,
    pub root_switch: SwitchId,
    /// Hosts whose paths are included in the topology summary (at most four are used)
    pub example_hosts: Vec<String>,
}

impl Default for Inventory {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            bridges: strings(&["br-sw1", "br-sw2", "br-sw3", "br-sw4", "br-wan", "br-lan"]),
            vms: strings(&["host1", "host2", "host3", "host4", "router1", "router2", "ss"]),
            veth_interfaces: strings(&[
                "veth-sw1-sw2",
                "veth-sw2-sw1",
                "veth-sw1-sw3",
                "veth-sw3-sw1",
                "veth-sw2-sw4",
                "veth-sw4-sw2",
                "veth-sw3-sw4",
                "veth-sw4-sw3",
            ]),
            root_switch: SwitchId::new("s1"),
            example_hosts: strings(&["host1", "host2", "host3", "host4"]),
        }
    }
}

impl Inventory {
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self> {
        toml::from_str(text).map_err(|source| NetError::InventoryParse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| NetError::InventoryRead {
            path: origin.clone(),
            source,
        })?;
        let inventory = Self::from_toml_str(&text, &origin)?;
        info!(
            path = %origin,
            bridges = inventory.bridges.len(),
            vms = inventory.vms.len(),
            veths = inventory.veth_interfaces.len(),
            "Loaded device inventory"
        );
        Ok(inventory)
    }

    /// Inventory file from settings if configured, otherwise the default lab layout
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        match &settings.inventory_file {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Bridges followed by veth interfaces: everything traffic control is checked on
    pub fn tc_interfaces(&self) -> Vec<String> {
        self.bridges
            .iter()
            .chain(self.veth_interfaces.iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_inventory() {
        let inv = Inventory::default();
        assert_eq!(inv.bridges.len(), 6);
        assert_eq!(inv.vms.len(), 7);
        assert_eq!(inv.veth_interfaces.len(), 8);
        assert_eq!(inv.tc_interfaces().len(), 14);
        assert_eq!(inv.root_switch.as_str(), "s1");
    }

    #[test]
    fn test_veth_names() {
        assert_eq!(
            veth_endpoints("veth-sw2-sw4"),
            Some((SwitchId::new("s2"), SwitchId::new("s4")))
        );
        assert_eq!(reverse_veth("veth-sw2-sw4").as_deref(), Some("veth-sw4-sw2"));
        assert_eq!(veth_endpoints("vnet3"), None);
        assert_eq!(veth_endpoints("veth-sw1-sw2-extra"), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let inv = Inventory::from_toml_str("bridges = [\"br-a\"]\nroot_switch = \"sw2\"\n", "inline").unwrap();
        assert_eq!(inv.bridges, vec!["br-a"]);
        assert_eq!(inv.vms.len(), 7);
        assert_eq!(inv.root_switch.as_str(), "s2");
    }

    #[test]
    fn test_load_errors() {
        let err = Inventory::load(Path::new("/nonexistent/sdn-inventory.toml")).unwrap_err();
        assert!(matches!(err, NetError::InventoryRead { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bridges = 3").unwrap();
        let err = Inventory::load(file.path()).unwrap_err();
        assert!(matches!(err, NetError::InventoryParse { .. }));
    }
}
