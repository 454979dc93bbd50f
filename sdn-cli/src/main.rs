//! sdn-cli
//!
//! Command-line front end for the network diagnostics toolsets:
//! - list and call tools with JSON arguments
//! - shortcuts for the topology summary, active links, host paths and tc

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sdn_core::Settings;
use sdn_network::DEFAULT_BURST;
use sdn_tools::{register_all_tools, MutationError, ToolContext, ToolRegistry};

#[derive(Parser, Debug)]
#[command(name = "sdn-cli")]
#[command(about = "Inspect the lab network topology and manage tc on active links")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// TOML device inventory (overrides SDN_INVENTORY_FILE)
    #[arg(long, global = true)]
    inventory: Option<PathBuf>,

    /// Run tc directly instead of through `sudo -n`
    #[arg(long, global = true)]
    no_sudo: bool,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tool definitions
    Tools {
        /// Only tools offered in this toolset (network_manager, traffic_controller)
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Execute a tool with JSON arguments
    Call {
        tool: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Compact topology report
    Summary,
    /// Links with both veth directions forwarding
    Links,
    /// Switch path from the root switch to a host
    Path { host: String },
    /// Traffic control on one interface
    Tc {
        #[command(subcommand)]
        action: TcAction,
    },
}

#[derive(Subcommand, Debug)]
enum TcAction {
    /// Show qdisc settings
    Show { interface: String },
    /// Install a TBF bandwidth limit
    Limit {
        interface: String,
        #[arg(long)]
        rate: String,
        #[arg(long, default_value = DEFAULT_BURST)]
        burst: String,
    },
    /// Remove the root qdisc
    Clear { interface: String },
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("sdn_cli=info".parse()?)
        .add_directive("sdn_tools=info".parse()?)
        .add_directive("sdn_network=info".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Add the NetError hint for failed mutations
fn with_suggestion(err: anyhow::Error) -> anyhow::Error {
    let hint = err.chain().find_map(|cause| match cause.downcast_ref::<MutationError>() {
        Some(MutationError::Network(e)) => Some(e.suggestion()),
        _ => None,
    });
    match hint {
        Some(hint) => err.context(format!("hint: {}", hint)),
        None => err,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from /etc/sdn-diag/environment (if exists)
    let env_file = sdn_core::config::load_environment();

    let args = Args::parse();
    init_tracing(args.log_format)?;
    if let Some(path) = env_file {
        debug!(path = %path, "Loaded environment file");
    }

    let mut settings = Settings::from_env();
    if let Some(path) = args.inventory.clone() {
        settings.inventory_file = Some(path);
    }
    if args.no_sudo {
        settings.use_sudo = false;
    }

    let ctx = Arc::new(ToolContext::from_settings(settings)?);
    let registry = ToolRegistry::new();
    register_all_tools(&registry, ctx.clone()).await?;
    info!(tools = registry.list().await.len(), "Initialized tool registry");

    let output = match args.command {
        Commands::Tools { namespace } => {
            let definitions = match namespace {
                Some(ns) => registry.list_namespace(&ns).await,
                None => registry.list().await,
            };
            serde_json::to_value(definitions)?
        }
        Commands::Call { tool, args } => {
            let input: Value = serde_json::from_str(&args)
                .with_context(|| format!("--args is not valid JSON: {}", args))?;
            registry.execute(&tool, input).await.map_err(with_suggestion)?
        }
        Commands::Summary => registry.execute("get_topology_summary", json!({})).await?,
        Commands::Links => registry.execute("get_active_links", json!({})).await?,
        Commands::Path { host } => {
            let path = ctx.collector.calculate_path_to_host(&host).await;
            json!({ "host": host, "path": path })
        }
        Commands::Tc { action } => match action {
            TcAction::Show { interface } => {
                registry
                    .execute("get_tc_settings", json!({ "interface": interface }))
                    .await?
            }
            TcAction::Limit {
                interface,
                rate,
                burst,
            } => registry
                .execute(
                    "apply_bandwidth_limit",
                    json!({ "interface": interface, "rate": rate, "burst": burst }),
                )
                .await
                .map_err(with_suggestion)?,
            TcAction::Clear { interface } => registry
                .execute("remove_tc", json!({ "interface": interface }))
                .await
                .map_err(with_suggestion)?,
        },
    };

    print_json(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "sdn-cli",
            "tc",
            "limit",
            "veth-sw1-sw2",
            "--rate",
            "10Mbit",
            "--no-sudo",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(args.no_sudo);
        assert_eq!(args.log_format, LogFormat::Json);
        match args.command {
            Commands::Tc {
                action: TcAction::Limit { rate, burst, .. },
            } => {
                assert_eq!(rate, "10Mbit");
                assert_eq!(burst, "32Kb");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_limit_requires_rate() {
        assert!(Args::try_parse_from(["sdn-cli", "tc", "limit", "veth-sw1-sw2"]).is_err());
    }

    #[test]
    fn test_suggestion_is_attached_to_network_errors() {
        let err = anyhow::Error::new(MutationError::Network(sdn_network::NetError::SudoRequired))
            .context("Failed to remove TC settings from veth-sw1-sw2");
        let text = format!("{:#}", with_suggestion(err));
        assert!(text.starts_with("hint: "));
        assert!(text.contains("sudoers"));
    }
}
