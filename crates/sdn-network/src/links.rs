//! Active-link resolution from STP port states
//!
//! A switch-to-switch link carries traffic only when both veth directions are
//! FORWARDING. Blocking links are never returned, which is what the traffic-control
//! policy relies on to keep mutations off standby paths.

use std::collections::{BTreeSet, HashMap};

use crate::inventory::{reverse_veth, veth_endpoints};
use crate::model::{ActiveLink, StpInfo, SwitchId};

/// Deduplicated active links, in the order their first direction is encountered.
///
/// `stp` should be in inventory order so the winning direction is stable.
pub fn resolve_active_links(stp: &[StpInfo]) -> Vec<ActiveLink> {
    let port_states: HashMap<&str, String> = stp
        .iter()
        .flat_map(|bridge| bridge.ports.iter())
        .filter(|port| !port.interface.is_empty())
        .map(|port| (port.interface.as_str(), port.state.to_lowercase()))
        .collect();

    let is_forwarding = |iface: &str| port_states.get(iface).map(String::as_str) == Some("forwarding");

    let mut links = Vec::new();
    let mut seen: BTreeSet<(SwitchId, SwitchId)> = BTreeSet::new();

    for bridge in stp {
        for port in &bridge.ports {
            if !port.is_forwarding() {
                continue;
            }
            let (Some((from, to)), Some(reverse)) =
                (veth_endpoints(&port.interface), reverse_veth(&port.interface))
            else {
                continue;
            };

            let key = if from <= to {
                (from.clone(), to.clone())
            } else {
                (to.clone(), from.clone())
            };
            if seen.contains(&key) {
                continue;
            }

            if is_forwarding(&port.interface) && is_forwarding(&reverse) {
                links.push(ActiveLink {
                    source: from,
                    target: to,
                    interface: port.interface.clone(),
                    reverse_interface: reverse,
                    state: "forwarding".to_string(),
                    bridge: bridge.bridge.clone(),
                });
                seen.insert(key);
            }
        }
    }

    links
}

/// True if `iface` is either direction of one of `links`
pub fn is_active_interface(links: &[ActiveLink], iface: &str) -> bool {
    links.iter().any(|link| link.uses_interface(iface))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StpPortRecord;

    const STATES: [&str; 5] = ["forwarding", "blocking", "learning", "listening", "disabled"];

    fn port(interface: &str, state: &str) -> StpPortRecord {
        StpPortRecord {
            interface: interface.to_string(),
            state: state.to_string(),
        }
    }

    fn bridge(name: &str, ports: Vec<StpPortRecord>) -> StpInfo {
        StpInfo {
            bridge: name.to_string(),
            ports,
        }
    }

    #[test]
    fn test_link_requires_both_directions_forwarding() {
        for forward in STATES {
            for reverse in STATES {
                for upper in [false, true] {
                    let (f, r) = if upper {
                        (forward.to_uppercase(), reverse.to_uppercase())
                    } else {
                        (forward.to_string(), reverse.to_string())
                    };
                    let stp = vec![
                        bridge("br-sw1", vec![port("veth-sw1-sw2", &f)]),
                        bridge("br-sw2", vec![port("veth-sw2-sw1", &r)]),
                    ];
                    let links = resolve_active_links(&stp);
                    let expected = forward == "forwarding" && reverse == "forwarding";
                    assert_eq!(
                        !links.is_empty(),
                        expected,
                        "forward={} reverse={}",
                        f,
                        r
                    );
                }
            }
        }
    }

    #[test]
    fn test_bidirectional_pair_deduplicated() {
        let stp = vec![
            bridge("br-sw1", vec![port("veth-sw1-sw2", "forwarding")]),
            bridge("br-sw2", vec![port("veth-sw2-sw1", "forwarding")]),
        ];
        let links = resolve_active_links(&stp);
        assert_eq!(links.len(), 1);

        let link = &links[0];
        assert_eq!(link.source.as_str(), "s1");
        assert_eq!(link.target.as_str(), "s2");
        assert_eq!(link.interface, "veth-sw1-sw2");
        assert_eq!(link.reverse_interface, "veth-sw2-sw1");
        assert_eq!(link.state, "forwarding");
        assert_eq!(link.bridge, "br-sw1");
    }

    #[test]
    fn test_missing_reverse_state_excludes_link() {
        let stp = vec![bridge("br-sw1", vec![port("veth-sw1-sw3", "forwarding")])];
        assert!(resolve_active_links(&stp).is_empty());
    }

    #[test]
    fn test_non_veth_ports_ignored() {
        let stp = vec![bridge(
            "br-sw1",
            vec![port("vnet0", "forwarding"), port("eth0", "forwarding")],
        )];
        assert!(resolve_active_links(&stp).is_empty());
    }

    #[test]
    fn test_lab_topology_with_one_blocked_pair() {
        let stp = vec![
            bridge(
                "br-sw1",
                vec![port("veth-sw1-sw2", "forwarding"), port("veth-sw1-sw3", "forwarding")],
            ),
            bridge(
                "br-sw2",
                vec![port("veth-sw2-sw1", "forwarding"), port("veth-sw2-sw4", "forwarding")],
            ),
            bridge(
                "br-sw3",
                vec![port("veth-sw3-sw1", "forwarding"), port("veth-sw3-sw4", "forwarding")],
            ),
            bridge(
                "br-sw4",
                vec![port("veth-sw4-sw2", "forwarding"), port("veth-sw4-sw3", "blocking")],
            ),
        ];
        let links = resolve_active_links(&stp);
        let pairs: Vec<(&str, &str)> = links
            .iter()
            .map(|l| (l.source.as_str(), l.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("s1", "s2"), ("s1", "s3"), ("s2", "s4")]);

        assert!(is_active_interface(&links, "veth-sw4-sw2"));
        assert!(!is_active_interface(&links, "veth-sw3-sw4"));
        assert!(!is_active_interface(&links, "veth-sw4-sw3"));
    }
}
