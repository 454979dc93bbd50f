//! Traffic-control mutations and TC issue detection
//!
//! `TcController` only knows how to talk to `tc`. Deciding *whether* an interface
//! may be touched is the caller's job (see the tool layer's mutation policy).

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{CommandOutput, SharedRunner, SystemRunner};
use crate::error::{NetError, Result};
use crate::model::{TcIssue, TcIssueKind, TcOperationResult, TcSettings};
use sdn_core::Settings;

pub const DEFAULT_RATE: &str = "1Mbit";
pub const DEFAULT_BURST: &str = "32Kb";
pub const TBF_LATENCY: &str = "50ms";

/// stderr fragments meaning there was no root qdisc to delete
const NOTHING_TO_REMOVE: [&str; 3] = [
    "Cannot find",
    "Cannot delete qdisc with handle of zero",
    "No such file or directory",
];

lazy_static! {
    static ref TC_QUANTITY: Regex = Regex::new(r"^\d+(\.\d+)?[A-Za-z]*$").unwrap();
}

/// Reject anything that is not `<number>[unit]` before it reaches a command line
pub fn validate_quantity(field: &str, value: &str) -> Result<()> {
    if TC_QUANTITY.is_match(value) {
        Ok(())
    } else {
        Err(NetError::InvalidArgument(format!(
            "{} '{}' must look like 1Mbit, 32Kb or 1600",
            field, value
        )))
    }
}

/// Interfaces whose TC settings restrict traffic
pub fn detect_issues(settings: &BTreeMap<String, TcSettings>) -> Vec<TcIssue> {
    settings
        .values()
        .filter(|tc| tc.has_tc && !tc.qdiscs.is_empty())
        .map(|tc| {
            let (kind, description) = match &tc.bandwidth_limit {
                Some(rate) => (
                    TcIssueKind::BandwidthLimit,
                    format!("Interface {} is limited to {} by a TBF qdisc", tc.interface, rate),
                ),
                None => (
                    TcIssueKind::TcConfigured,
                    format!(
                        "Interface {} has a non-default qdisc configured ({})",
                        tc.interface,
                        if tc.has_netem == Some(true) { "netem delay/loss" } else { "shaping" }
                    ),
                ),
            };
            TcIssue {
                interface: tc.interface.clone(),
                kind,
                bandwidth_limit: tc.bandwidth_limit.clone(),
                burst: tc.burst.clone(),
                description,
            }
        })
        .collect()
}

/// Applies and removes root qdiscs with `tc`
#[derive(Clone)]
pub struct TcController {
    runner: SharedRunner,
    settings: Settings,
}

impl TcController {
    pub fn new(runner: SharedRunner, settings: Settings) -> Self {
        Self { runner, settings }
    }

    pub fn system(settings: Settings) -> Self {
        Self::new(Arc::new(SystemRunner), settings)
    }

    /// Run `tc <args>`, behind `sudo -n` when configured
    async fn tc(&self, args: &[&str], timeout: std::time::Duration) -> Result<CommandOutput> {
        if self.settings.use_sudo {
            let argv: Vec<&str> = std::iter::once("-n")
                .chain(std::iter::once("tc"))
                .chain(args.iter().copied())
                .collect();
            self.runner.run("sudo", &argv, timeout).await
        } else {
            self.runner.run("tc", args, timeout).await
        }
    }

    /// Delete the root qdisc on `iface`. Succeeds when there is nothing to delete.
    pub async fn remove_tc(&self, iface: &str) -> Result<TcOperationResult> {
        let output = self
            .tc(&["qdisc", "del", "dev", iface, "root"], self.settings.delete_timeout)
            .await?;

        let details = if output.success() {
            info!(interface = %iface, "Removed root qdisc");
            format!("Removed TC settings from {}", iface)
        } else if NOTHING_TO_REMOVE.iter().any(|m| output.stderr.contains(m)) {
            debug!(interface = %iface, "No root qdisc to remove");
            format!("No TC settings on {}", iface)
        } else {
            return Err(failure(&output));
        };

        Ok(TcOperationResult {
            success: true,
            details,
            interface: iface.to_string(),
            rate: None,
            burst: None,
        })
    }

    /// Replace the root qdisc of `iface` with a TBF limited to `rate`
    pub async fn apply_bandwidth_limit(
        &self,
        iface: &str,
        rate: &str,
        burst: &str,
    ) -> Result<TcOperationResult> {
        validate_quantity("rate", rate)?;
        validate_quantity("burst", burst)?;

        // Clear whatever is there; a missing qdisc is fine
        if let Err(e) = self.remove_tc(iface).await {
            debug!(interface = %iface, error = %e, "Pre-apply qdisc removal failed");
        }

        let output = self
            .tc(
                &[
                    "qdisc", "add", "dev", iface, "root", "tbf", "rate", rate, "burst", burst,
                    "latency", TBF_LATENCY,
                ],
                self.settings.apply_timeout,
            )
            .await?;

        if !output.success() {
            let err = failure(&output);
            warn!(interface = %iface, rate, burst, error = %err, "Failed to apply bandwidth limit");
            return Err(err);
        }

        info!(interface = %iface, rate, burst, "Applied bandwidth limit");
        Ok(TcOperationResult {
            success: true,
            details: format!(
                "Applied TBF limit on {}: rate {} burst {} latency {}",
                iface, rate, burst, TBF_LATENCY
            ),
            interface: iface.to_string(),
            rate: Some(rate.to_string()),
            burst: Some(burst.to_string()),
        })
    }
}

/// Map a failed `tc` run to the matching error
fn failure(output: &CommandOutput) -> NetError {
    let message = output.message();
    let lower = message.to_lowercase();
    if lower.contains("password") || lower.contains("sudo") {
        NetError::SudoRequired
    } else {
        NetError::CommandFailed(message.to_string())
    }
}
