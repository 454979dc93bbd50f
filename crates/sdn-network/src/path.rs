//! Shortest active path from the root switch to a host's switch

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::model::{ActiveLink, SwitchId, VmBridgeConnection};

/// Switch hops from `root` to the switch `host` is attached to.
///
/// Only forwarding links are traversed. Returns an empty path when the host has no
/// bridge attachment, its first attachment is not a `br-sw<N>` bridge, or the switch
/// is unreachable over active links.
pub fn find_path(
    vm_to_bridge: &BTreeMap<String, Vec<VmBridgeConnection>>,
    active_links: &[ActiveLink],
    host: &str,
    root: &SwitchId,
) -> Vec<SwitchId> {
    let Some(host_bridge) = vm_to_bridge
        .get(host)
        .and_then(|connections| connections.first())
        .map(|connection| connection.bridge.as_str())
        .filter(|bridge| !bridge.is_empty())
    else {
        return Vec::new();
    };

    let Some(host_switch) = SwitchId::from_bridge(host_bridge) else {
        return Vec::new();
    };

    if &host_switch == root {
        return vec![root.clone()];
    }

    shortest_path(active_links, root, &host_switch)
}

/// Breadth-first search over active links treated as undirected edges
pub fn shortest_path(active_links: &[ActiveLink], from: &SwitchId, to: &SwitchId) -> Vec<SwitchId> {
    let mut adjacency: HashMap<&SwitchId, Vec<&SwitchId>> = HashMap::new();
    for link in active_links {
        adjacency.entry(&link.source).or_default().push(&link.target);
        adjacency.entry(&link.target).or_default().push(&link.source);
    }

    let mut visited: HashSet<&SwitchId> = HashSet::from([from]);
    let mut queue: VecDeque<Vec<&SwitchId>> = VecDeque::from([vec![from]]);

    while let Some(path) = queue.pop_front() {
        let current = path[path.len() - 1];
        if current == to {
            return path.into_iter().cloned().collect();
        }

        for &neighbor in adjacency.get(current).into_iter().flatten() {
            if visited.insert(neighbor) {
                let mut next = path.clone();
                next.push(neighbor);
                queue.push_back(next);
            }
        }
    }

    Vec::new()
}

/// Forward interface of the active link between each pair of consecutive hops
pub fn interfaces_along(path: &[SwitchId], active_links: &[ActiveLink]) -> Vec<String> {
    path.windows(2)
        .filter_map(|hop| {
            active_links
                .iter()
                .find(|link| link.connects(&hop[0], &hop[1]))
                .map(|link| link.interface.clone())
        })
        .collect()
}
