//! Error types for command execution and traffic-control mutations
//!
//! Read paths never surface these to callers (they degrade to absent records);
//! mutations and inventory loading do.

use std::time::Duration;
use thiserror::Error;

/// Network operation errors
#[derive(Error, Debug)]
pub enum NetError {
    // ========================================================================
    // Process Errors
    // ========================================================================
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    // ========================================================================
    // Mutation Errors
    // ========================================================================
    #[error("TC command failed: {0}")]
    CommandFailed(String),

    #[error("Sudo authentication required. Configure sudoers to allow passwordless tc commands")]
    SudoRequired,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Failed to read inventory file {path}: {source}")]
    InventoryRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid inventory file {path}: {source}")]
    InventoryParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Result alias for network operations
pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Get a helpful suggestion for resolving this error
    pub fn suggestion(&self) -> &'static str {
        match self {
            NetError::Spawn { .. } => "Install iproute2, bridge-utils and libvirt-clients",
            NetError::Timeout { .. } => "Increase the SDN_*_TIMEOUT_SECS setting or check system load",
            NetError::SudoRequired => {
                "Add a NOPASSWD sudoers rule for /usr/sbin/tc or run with --no-sudo as root"
            }
            NetError::InvalidArgument(_) => "Rates and bursts look like 1Mbit, 500Kbit, 32Kb",
            NetError::InventoryRead { .. } | NetError::InventoryParse { .. } => {
                "Check SDN_INVENTORY_FILE points at a valid TOML inventory"
            }
            NetError::CommandFailed(_) => "Check the interface name and `tc qdisc show dev <iface>`",
        }
    }

    /// Returns true if this error might be resolved by running with privileges
    pub fn needs_root(&self) -> bool {
        match self {
            NetError::SudoRequired => true,
            NetError::CommandFailed(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("operation not permitted") || msg.contains("permission denied")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_suggestions() {
        let err = NetError::SudoRequired;
        assert!(!err.suggestion().is_empty());
        assert!(err.needs_root());
        assert!(err.to_string().contains("Sudo authentication required"));
    }

    #[test]
    fn test_needs_root_from_message() {
        let err = NetError::CommandFailed("RTNETLINK answers: Operation not permitted".into());
        assert!(err.needs_root());

        let err = NetError::CommandFailed("Cannot find device \"veth-x\"".into());
        assert!(!err.needs_root());
    }
}
