//! sdn-network: topology collection and traffic control for Linux bridge labs
//!
//! Shells out to `ip`, `tc`, `brctl` and `virsh`, parses their output into typed
//! records and derives the STP-active forwarding graph from them.
//!
//! ## Modules
//!
//! - `command`: process execution behind the [`CommandRunner`] trait
//! - `parse`: one parser per tool output format
//! - `collector` / `topology`: per-device queries and topology assembly
//! - `links` / `path`: active-link resolution and shortest active paths
//! - `summary`: compact topology report
//! - `tc`: applying and removing TBF bandwidth limits
//!
//! ## Example
//!
//! ```rust,no_run
//! use sdn_network::{Collector, Inventory};
//! use sdn_core::Settings;
//!
//! # async fn example() {
//! let collector = Collector::system(Settings::default(), Inventory::default());
//! for link in collector.active_links().await {
//!     println!("{} <-> {} via {}", link.source, link.target, link.interface);
//! }
//! # }
//! ```

pub mod collector;
pub mod command;
pub mod error;
pub mod inventory;
pub mod links;
pub mod model;
pub mod parse;
pub mod path;
pub mod summary;
pub mod tc;
pub mod topology;

pub use collector::Collector;
pub use command::{CommandOutput, CommandRunner, ScriptedRunner, SharedRunner, SystemRunner};
pub use error::{NetError, Result};
pub use inventory::Inventory;
pub use links::{is_active_interface, resolve_active_links};
pub use model::*;
pub use path::find_path;
pub use summary::{build_summary, NetworkSummary};
pub use tc::{TcController, DEFAULT_BURST, DEFAULT_RATE};

/// Prelude for common imports
pub mod prelude {
    pub use crate::collector::Collector;
    pub use crate::command::{CommandRunner, SharedRunner, SystemRunner};
    pub use crate::error::{NetError, Result};
    pub use crate::inventory::Inventory;
    pub use crate::model::{ActiveLink, SwitchId, TcOperationResult, TcSettings};
    pub use crate::tc::TcController;
}
