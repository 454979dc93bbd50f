//! Toolset wiring and end-to-end tool calls against a scripted lab

use sdn_core::Settings;
use sdn_network::{CommandOutput, Inventory, ScriptedRunner};
use sdn_tools::{
    register_all_tools, register_traffic_controller_tools, SecurityLevel, ToolContext,
    ToolRegistry, NETWORK_MANAGER, TRAFFIC_CONTROLLER,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn showstp(ports: &[(&str, &str)]) -> String {
    ports
        .iter()
        .enumerate()
        .map(|(i, (name, state))| {
            format!(
                "{} ({})\n port id\t\t800{}\t\t\tstate\t\t{}\n\n",
                name,
                i + 1,
                i + 1,
                state
            )
        })
        .collect()
}

/// Lab where sw3 <-> sw4 is the blocked redundant link
fn lab() -> Arc<ScriptedRunner> {
    let runner = Arc::new(ScriptedRunner::new());
    runner
        .on_ok(
            "brctl showstp br-sw1",
            &showstp(&[("veth-sw1-sw2", "forwarding"), ("veth-sw1-sw3", "forwarding")]),
        )
        .on_ok(
            "brctl showstp br-sw2",
            &showstp(&[("veth-sw2-sw1", "forwarding"), ("veth-sw2-sw4", "forwarding")]),
        )
        .on_ok(
            "brctl showstp br-sw3",
            &showstp(&[("veth-sw3-sw1", "forwarding"), ("veth-sw3-sw4", "forwarding")]),
        )
        .on_ok(
            "brctl showstp br-sw4",
            &showstp(&[("veth-sw4-sw2", "forwarding"), ("veth-sw4-sw3", "blocking")]),
        )
        .on(
            "sudo -n tc qdisc del dev veth-sw1-sw2 root",
            CommandOutput::failed(2, "Error: Cannot delete qdisc with handle of zero.\n"),
        )
        .on_ok(
            "sudo -n tc qdisc add dev veth-sw1-sw2 root tbf rate 1Mbit burst 32Kb latency 50ms",
            "",
        )
        .on_ok(
            "tc qdisc show dev veth-sw1-sw2",
            "qdisc tbf 8001: root refcnt 2 rate 1Mbit burst 32Kb lat 50.0ms\n",
        );
    runner
}

async fn registry_for(runner: Arc<ScriptedRunner>) -> ToolRegistry {
    let ctx = Arc::new(ToolContext::new(runner, Settings::default(), Inventory::default()));
    let registry = ToolRegistry::new();
    register_all_tools(&registry, ctx).await.unwrap();
    registry
}

fn names(defs: &[sdn_tools::ToolDefinition]) -> Vec<&str> {
    defs.iter().map(|d| d.name.as_str()).collect()
}

#[tokio::test]
async fn test_toolsets_are_wired() {
    let registry = registry_for(lab()).await;

    assert_eq!(registry.list().await.len(), 10);
    assert_eq!(
        names(&registry.list_namespace(NETWORK_MANAGER).await),
        vec![
            "detect_tc_issues",
            "get_all_tc_settings",
            "get_interface_stats",
            "get_network_status",
            "get_tc_settings",
            "get_topology_info",
            "get_topology_summary",
        ]
    );
    assert_eq!(
        names(&registry.list_namespace(TRAFFIC_CONTROLLER).await),
        vec!["apply_bandwidth_limit", "get_active_links", "get_tc_settings", "remove_tc"]
    );

    for def in registry.list().await {
        assert_eq!(def.category, "networking");
        assert_eq!(def.input_schema["type"], "object");
        let mutating = def.name == "remove_tc" || def.name == "apply_bandwidth_limit";
        let expected = if mutating {
            SecurityLevel::Modify
        } else {
            SecurityLevel::ReadOnly
        };
        assert_eq!(def.security_level, expected, "{}", def.name);
    }
}

#[tokio::test]
async fn test_traffic_controller_alone_includes_tc_settings() {
    let ctx = Arc::new(ToolContext::new(lab(), Settings::default(), Inventory::default()));
    let registry = ToolRegistry::new();
    register_traffic_controller_tools(&registry, ctx).await.unwrap();
    assert_eq!(registry.list().await.len(), 4);
    assert!(registry.get("get_tc_settings").await.is_some());
}

#[tokio::test]
async fn test_active_links_tool() {
    let registry = registry_for(lab()).await;
    let links = registry.execute("get_active_links", json!({})).await.unwrap();
    let pairs: Vec<(String, String)> = links
        .as_array()
        .unwrap()
        .iter()
        .map(|l| {
            (
                l["source"].as_str().unwrap().to_string(),
                l["target"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("s1".to_string(), "s2".to_string()),
            ("s1".to_string(), "s3".to_string()),
            ("s2".to_string(), "s4".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_remove_tc_tool_is_idempotent() {
    let registry = registry_for(lab()).await;
    for _ in 0..2 {
        let result = registry
            .execute("remove_tc", json!({"interface": "veth-sw1-sw2"}))
            .await
            .unwrap();
        assert_eq!(result["success"], true);
    }
}

#[tokio::test]
async fn test_apply_bandwidth_limit_defaults() {
    let runner = lab();
    let registry = registry_for(runner.clone()).await;

    let result = registry
        .execute("apply_bandwidth_limit", json!({"interface": "veth-sw1-sw2"}))
        .await
        .unwrap();
    assert_eq!(result["rate"], "1Mbit");
    assert_eq!(result["burst"], "32Kb");

    let tc = registry
        .execute("get_tc_settings", json!({"interface": "veth-sw1-sw2"}))
        .await
        .unwrap();
    assert_eq!(tc["has_tc"], true);
    assert_eq!(tc["bandwidth_limit"], "1Mbit");

    let issues = registry.execute("detect_tc_issues", json!({})).await.unwrap();
    assert_eq!(issues[0]["type"], "bandwidth_limit");
    assert_eq!(issues[0]["interface"], "veth-sw1-sw2");
}

#[tokio::test]
async fn test_blocked_interface_is_never_touched() {
    let runner = lab();
    let registry = registry_for(runner.clone()).await;

    for iface in ["veth-sw4-sw3", "veth-sw3-sw4"] {
        let err = registry
            .execute(
                "apply_bandwidth_limit",
                json!({"interface": iface, "rate": "10Mbit"}),
            )
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("not on an active forwarding link"));
    }
    assert!(runner.calls_starting_with("sudo").is_empty());
}

#[tokio::test]
async fn test_missing_arguments() {
    let registry = registry_for(lab()).await;
    for tool in ["get_tc_settings", "get_interface_stats", "remove_tc", "apply_bandwidth_limit"] {
        let err = registry.execute(tool, Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("interface"), "{}", tool);
    }
}

#[tokio::test]
async fn test_read_tools_degrade_on_missing_devices() {
    let registry = registry_for(Arc::new(ScriptedRunner::new())).await;

    let stats = registry
        .execute("get_interface_stats", json!({"interface": "veth-nope"}))
        .await
        .unwrap();
    assert_eq!(stats["exists"], false);
    assert_eq!(stats["rx_bytes"], 0);

    let status = registry.execute("get_network_status", json!({})).await.unwrap();
    assert_eq!(status["interfaces"], json!({}));

    let summary = registry.execute("get_topology_summary", json!({})).await.unwrap();
    assert_eq!(summary["bridges"], json!([]));
    assert_eq!(summary["network_notes"].as_array().unwrap().len(), 7);

    let info = registry.execute("get_topology_info", json!({})).await.unwrap();
    assert!(info["collected_at"].is_string());
}
