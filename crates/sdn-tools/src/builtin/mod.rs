//! Built-in toolsets
//!
//! - **network_manager**: read-only diagnostics (TC settings, interface statistics,
//!   topology and its summary)
//! - **traffic_controller**: active links plus the two qdisc mutations, which go
//!   through [`MutationPolicy`](crate::policy::MutationPolicy)
//!
//! `get_tc_settings` is offered in both toolsets.

mod network_manager;
mod traffic_controller;

pub use network_manager::register_network_manager_tools;
pub use traffic_controller::register_traffic_controller_tools;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

pub const NETWORK_MANAGER: &str = "network_manager";
pub const TRAFFIC_CONTROLLER: &str = "traffic_controller";

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
