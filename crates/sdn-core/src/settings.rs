//! Runtime settings shared by the collector and the traffic-control operations.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{get_config_bool, get_config_int, get_config_opt};

/// Command timeouts and privilege handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Inspection commands (`ip link`, `tc qdisc show`, `brctl`, `virsh`)
    pub read_timeout: Duration,
    /// Existence probes for veth interfaces
    pub probe_timeout: Duration,
    /// `ip addr show` / `ip route show`
    pub query_timeout: Duration,
    /// `tc qdisc del`
    pub delete_timeout: Duration,
    /// `tc qdisc add`
    pub apply_timeout: Duration,
    /// Prefix mutating commands with `sudo -n`
    pub use_sudo: bool,
    /// Optional TOML device inventory
    pub inventory_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_secs(3),
            delete_timeout: Duration::from_secs(15),
            apply_timeout: Duration::from_secs(30),
            use_sudo: true,
            inventory_file: None,
        }
    }
}

impl Settings {
    /// Build settings from `SDN_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            read_timeout: secs("SDN_READ_TIMEOUT_SECS", defaults.read_timeout),
            probe_timeout: secs("SDN_PROBE_TIMEOUT_SECS", defaults.probe_timeout),
            query_timeout: secs("SDN_QUERY_TIMEOUT_SECS", defaults.query_timeout),
            delete_timeout: secs("SDN_DELETE_TIMEOUT_SECS", defaults.delete_timeout),
            apply_timeout: secs("SDN_APPLY_TIMEOUT_SECS", defaults.apply_timeout),
            use_sudo: get_config_bool("SDN_USE_SUDO", defaults.use_sudo),
            inventory_file: get_config_opt("SDN_INVENTORY_FILE").map(PathBuf::from),
        }
    }
}

fn secs(key: &str, default: Duration) -> Duration {
    let value = get_config_int(key, default.as_secs() as i64);
    if value <= 0 {
        default
    } else {
        Duration::from_secs(value as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.read_timeout, Duration::from_secs(5));
        assert_eq!(settings.apply_timeout, Duration::from_secs(30));
        assert!(settings.use_sudo);
        assert!(settings.inventory_file.is_none());
    }

    #[test]
    fn test_secs_rejects_non_positive() {
        std::env::set_var("SDN_TEST_ZERO_SECS", "0");
        std::env::set_var("SDN_TEST_NINE_SECS", "9");
        assert_eq!(secs("SDN_TEST_ZERO_SECS", Duration::from_secs(4)), Duration::from_secs(4));
        assert_eq!(secs("SDN_TEST_NINE_SECS", Duration::from_secs(4)), Duration::from_secs(9));
    }
}
