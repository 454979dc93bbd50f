//! Parsers for `ip`, `tc`, `brctl` and `virsh` text output
//!
//! One pure function per output format. None of them fail: a line that does not
//! match leaves the corresponding field at its default.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{
    DiskInfo, InterfaceSettings, InterfaceStats, MemoryInfo, RoutingInfo, StpPortRecord,
    TcSettings, VmInterface,
};

lazy_static! {
    static ref LINK_FLAGS: Regex = Regex::new(r"<([A-Z0-9_,-]*)>").unwrap();
    static ref MASTER_LINK: Regex = Regex::new(r"(?m)^\d+:\s+([^:@\s]+)[@:]").unwrap();
    static ref DOM_STATE: Regex = Regex::new(r"(?m)^State:\s+(\S.*?)\s*$").unwrap();
    static ref DOM_VCPU: Regex = Regex::new(r"(?m)^CPU\(s\):\s+(\d+)").unwrap();
    static ref DOM_MEMORY: Regex = Regex::new(r"(?m)^Max memory:\s+(\d+)\s+(\w+)").unwrap();
    static ref DOM_OS_TYPE: Regex = Regex::new(r"(?m)^OS Type:\s+(\S+)").unwrap();
    static ref STP_PORT_HEADER: Regex = Regex::new(r"^(\S+)\s+\((\d+)\)\s*$").unwrap();
    static ref STP_STATE: Regex = Regex::new(r"state\s+(\w+)").unwrap();
    static ref DEFAULT_QDISC: Regex = Regex::new(r"\b(noqueue|pfifo_fast|mq|fq_codel)\b").unwrap();
    static ref QDISC_KIND: Regex = Regex::new(r"\b(tbf|netem|htb)\b").unwrap();
    static ref TBF_RATE: Regex = Regex::new(r"rate\s+([\d.]+)([A-Za-z]+)").unwrap();
    static ref TBF_BURST: Regex = Regex::new(r"burst\s+([\d.]+)([A-Za-z]*)").unwrap();
    static ref INET_ADDR: Regex = Regex::new(r"inet\s+([\d.]+/\d+)").unwrap();
    static ref ETHER_ADDR: Regex = Regex::new(r"link/ether\s+([0-9a-fA-F:]+)").unwrap();
}

// ============================================================================
// ip link / ip addr / ip route
// ============================================================================

/// "UP" when the `<...>` flag list of `ip link show` contains `UP`, else "DOWN"
pub fn parse_link_state(text: &str) -> String {
    let up = match LINK_FLAGS.captures(text) {
        Some(caps) => caps[1].split(',').any(|flag| flag == "UP"),
        None => text.contains("state UP"),
    };
    let state = if up { "UP" } else { "DOWN" };
    state.to_string()
}

/// Interface names from `ip link show master <bridge>`
///
/// Veth peers are printed as `name@peer`; only `name` is kept.
pub fn parse_master_links(text: &str) -> Vec<String> {
    MASTER_LINK
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Addresses, MAC and state from `ip addr show <dev>`
pub fn parse_addr_show(text: &str) -> InterfaceSettings {
    InterfaceSettings {
        ips: INET_ADDR
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect(),
        mac: ETHER_ADDR.captures(text).map(|caps| caps[1].to_lowercase()),
        state: parse_link_state(text),
    }
}

/// Route count and the first ten routes from `ip route show`
pub fn parse_route_show(text: &str) -> RoutingInfo {
    let routes: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    RoutingInfo {
        route_count: routes.len(),
        routes: routes.into_iter().take(10).collect(),
    }
}

/// Byte/packet/error counters from `ip -s link show <dev>`
///
/// The `RX:`/`TX:` line names the columns and the following line holds the values,
/// so counters are looked up by column name rather than position.
pub fn parse_link_stats(interface: &str, text: &str) -> InterfaceStats {
    let mut stats = InterfaceStats {
        exists: true,
        ..InterfaceStats::absent(interface)
    };

    let lines: Vec<&str> = text.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let (is_rx, header) = if let Some(rest) = trimmed.strip_prefix("RX:") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix("TX:") {
            (false, rest)
        } else {
            continue;
        };

        let Some(values) = lines.get(i + 1) else {
            continue;
        };

        for (column, value) in header.split_whitespace().zip(values.split_whitespace()) {
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };
            match (is_rx, column) {
                (true, "bytes") => stats.rx_bytes = value,
                (true, "packets") => stats.rx_packets = value,
                (true, "errors") => stats.rx_errors = value,
                (false, "bytes") => stats.tx_bytes = value,
                (false, "packets") => stats.tx_packets = value,
                (false, "errors") => stats.tx_errors = value,
                _ => {}
            }
        }
    }

    stats
}

// ============================================================================
// virsh
// ============================================================================

/// Fields of interest from `virsh dominfo <vm>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomInfo {
    pub state: Option<String>,
    pub vcpu: Option<u32>,
    pub memory: Option<MemoryInfo>,
    pub os_type: Option<String>,
}

pub fn parse_dominfo(text: &str) -> DomInfo {
    DomInfo {
        state: DOM_STATE.captures(text).map(|c| c[1].to_string()),
        vcpu: DOM_VCPU.captures(text).and_then(|c| c[1].parse().ok()),
        memory: DOM_MEMORY.captures(text).and_then(|c| {
            Some(MemoryInfo {
                value: c[1].parse().ok()?,
                unit: c[2].to_string(),
            })
        }),
        os_type: DOM_OS_TYPE.captures(text).map(|c| c[1].to_string()),
    }
}

/// Data rows of a `virsh` table (header and `----` separator dropped)
fn table_rows<'a>(text: &'a str, header_word: &str) -> impl Iterator<Item = Vec<&'a str>> + 'a {
    let header_word = header_word.to_string();
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.chars().all(|c| c == '-'))
        .filter(move |l| !l.starts_with(header_word.as_str()))
        .map(|l| l.split_whitespace().collect::<Vec<_>>())
}

/// Interface rows from `virsh domiflist <vm>`
pub fn parse_domiflist(text: &str) -> Vec<VmInterface> {
    table_rows(text, "Interface")
        .filter(|parts| parts.len() >= 3)
        .map(|parts| VmInterface {
            interface: parts[0].to_string(),
            kind: parts[1].to_string(),
            source: parts[2].to_string(),
            model: parts.get(3).map(|s| s.to_string()),
            mac: parts.get(4).map(|s| s.to_string()),
        })
        .collect()
}

/// Disk rows from `virsh domblklist <vm>`
pub fn parse_domblklist(text: &str) -> Vec<DiskInfo> {
    table_rows(text, "Target")
        .filter(|parts| parts.len() >= 2)
        .map(|parts| DiskInfo {
            target: parts[0].to_string(),
            source: parts[1..].join(" "),
        })
        .collect()
}

// ============================================================================
// brctl
// ============================================================================

/// Port states from `brctl showstp <bridge>`
///
/// A port section starts with an unindented `<name> (<n>)` line. Its state is read
/// from the `port id ... state <word>` line; a port without one stays "unknown".
pub fn parse_showstp(text: &str) -> Vec<StpPortRecord> {
    let mut ports: Vec<StpPortRecord> = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        if !line.starts_with(char::is_whitespace) {
            if let Some(caps) = STP_PORT_HEADER.captures(line) {
                ports.push(StpPortRecord {
                    interface: caps[1].to_string(),
                    state: "unknown".to_string(),
                });
                in_section = true;
                continue;
            }
        }

        if !in_section {
            continue;
        }

        if line.trim().is_empty() {
            in_section = false;
            continue;
        }

        let lower = line.to_lowercase();
        if lower.contains("port id") && lower.contains("state") {
            if let (Some(caps), Some(port)) = (STP_STATE.captures(line), ports.last_mut()) {
                port.state = caps[1].to_string();
            }
            in_section = false;
        }
    }

    ports
}

// ============================================================================
// tc
// ============================================================================

/// Qdisc settings from `tc qdisc show dev <dev>`
///
/// Default qdiscs (noqueue, pfifo_fast, mq, fq_codel) do not restrict traffic and
/// are skipped. TBF lines carry the rate and burst; netem lines with a delay or loss
/// set `has_netem`.
pub fn parse_qdisc_show(interface: &str, text: &str) -> TcSettings {
    let mut settings = TcSettings::empty(interface);

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if DEFAULT_QDISC.is_match(line) {
            continue;
        }

        let Some(kind) = QDISC_KIND.captures(line).map(|c| c[1].to_string()) else {
            continue;
        };

        settings.has_tc = true;
        settings.qdiscs.push(line.to_string());

        match kind.as_str() {
            "tbf" => {
                if let Some(caps) = TBF_RATE.captures(line) {
                    settings.bandwidth_limit = Some(format!("{}{}", &caps[1], &caps[2]));
                }
                if let Some(caps) = TBF_BURST.captures(line) {
                    let unit = if caps[2].is_empty() { "b" } else { &caps[2] };
                    settings.burst = Some(format!("{}{}", &caps[1], unit));
                }
            }
            "netem" => {
                if line.contains("delay") || line.contains("loss") {
                    settings.has_netem = Some(true);
                }
            }
            _ => {}
        }
    }

    settings
}
