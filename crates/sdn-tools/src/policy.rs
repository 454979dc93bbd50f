//! Mutation policy for traffic-control tools
//!
//! Qdisc changes are only allowed on interfaces that belong to a link whose both
//! directions are STP forwarding. Active links are re-derived from live STP state
//! under the interface lock right before each mutation, so a link that started
//! blocking since the last query is refused.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use sdn_network::{is_active_interface, Collector, NetError, TcController, TcOperationResult};

/// A mutation refused before any command ran
#[derive(Debug, Error)]
pub enum PolicyViolation {
    #[error("Interface {interface} is not on an active forwarding link (active: {active:?})")]
    NotActive {
        interface: String,
        active: Vec<String>,
    },
}

/// Errors returned by [`MutationPolicy`]
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error(transparent)]
    Network(#[from] NetError),
}

/// Gatekeeper between the traffic-control tools and [`TcController`]
pub struct MutationPolicy {
    collector: Collector,
    controller: TcController,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MutationPolicy {
    pub fn new(collector: Collector, controller: TcController) -> Self {
        Self {
            collector,
            controller,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn interface_lock(&self, iface: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(iface.to_string()).or_default().clone()
    }

    /// Ok if `iface` is either direction of a currently active link
    pub async fn check(&self, iface: &str) -> Result<(), PolicyViolation> {
        let links = self.collector.active_links().await;
        if is_active_interface(&links, iface) {
            return Ok(());
        }

        let active: Vec<String> = links
            .iter()
            .flat_map(|l| [l.interface.clone(), l.reverse_interface.clone()])
            .collect();
        warn!(interface = %iface, active = ?active, "Refusing to modify inactive interface");
        Err(PolicyViolation::NotActive {
            interface: iface.to_string(),
            active,
        })
    }

    pub async fn remove_tc(&self, iface: &str) -> Result<TcOperationResult, MutationError> {
        self.serialized(iface, async {
            self.check(iface).await?;
            info!(interface = %iface, "Removing TC settings");
            Ok(self.controller.remove_tc(iface).await?)
        })
        .await
    }

    pub async fn apply_bandwidth_limit(
        &self,
        iface: &str,
        rate: &str,
        burst: &str,
    ) -> Result<TcOperationResult, MutationError> {
        self.serialized(iface, async {
            self.check(iface).await?;
            info!(interface = %iface, rate, burst, "Applying bandwidth limit");
            Ok(self.controller.apply_bandwidth_limit(iface, rate, burst).await?)
        })
        .await
    }

    /// Run `op` while holding the lock of `iface`
    async fn serialized<T>(&self, iface: &str, op: impl Future<Output = T>) -> T {
        let lock = self.interface_lock(iface).await;
        let result = {
            let _guard = lock.lock().await;
            op.await
        };
        self.release(iface, lock).await;
        result
    }

    /// Drop the map entry once no other caller holds or waits on it
    async fn release(&self, iface: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(iface);
        }
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }
}
