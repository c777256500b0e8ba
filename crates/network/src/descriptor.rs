use ab_common::{RunConfig, Workload};
use ab_topology::{ConfigSynthesizer, HostLayout};
use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

use crate::config::NetworkConfig;

/// Network description consumed by the workload driver
///
/// Its node list is exactly the synthesizer's sealer endpoints.
pub fn network_description(
    config: &RunConfig,
    network: &NetworkConfig,
    topology: &ConfigSynthesizer,
) -> Value {
    let nodes: Vec<Value> = topology
        .sealer_endpoints(&network.ports)
        .into_iter()
        .map(|endpoint| {
            json!({
                "ip": endpoint.host,
                "rpcPort": endpoint.rpc_port.to_string(),
                "channelPort": endpoint.channel_port.to_string(),
            })
        })
        .collect();

    let sdk_dir = topology
        .hosts()
        .first()
        .map(|host| relative(&network.nodes_dir).join(host).join("sdk"))
        .unwrap_or_default();
    let sdk_file = |name: &str| {
        let path = sdk_dir.join(name);
        if path.is_absolute() {
            path.display().to_string()
        } else {
            format!("./{}", path.display())
        }
    };

    json!({
        "caliper": {
            "blockchain": "fisco-bcos",
        },
        "fisco-bcos": {
            "config": {
                "privateKey": network.private_key,
                "account": network.account,
            },
            "network": {
                "nodes": nodes,
                "authentication": {
                    "key": sdk_file("node.key"),
                    "cert": sdk_file("node.crt"),
                    "ca": sdk_file("ca.crt"),
                },
                "groupID": network.group,
                "timeout": 100000,
            },
            "smartContracts": [smart_contract(config.workload)],
        },
        "info": {
            "Version": "1.0.0",
            "Size": format!("{} Nodes", config.node_count),
            "Distribution": format!("{} Host(s)", config.host_count()),
        }
    })
}

fn smart_contract(workload: Workload) -> Value {
    match workload {
        Workload::HelloWorld => json!({
            "id": "helloworld",
            "path": "smart_contracts/HelloWorld.sol",
            "language": "solidity",
            "version": "v0",
        }),
        Workload::Transfer => json!({
            "id": "dagtransfer",
            "address": "0x0000000000000000000000000000000000005002",
            "language": "precompiled",
            "version": "v0",
        }),
    }
}

fn relative(path: &Path) -> &Path {
    path.strip_prefix("./").unwrap_or(path)
}

#[derive(Debug, Serialize)]
struct BenchmarkDescriptor {
    test: TestSection,
    monitor: MonitorSection,
}

#[derive(Debug, Serialize)]
struct TestSection {
    name: String,
    description: String,
    workers: Workers,
    rounds: Vec<Round>,
}

#[derive(Debug, Serialize)]
struct Workers {
    #[serde(rename = "type")]
    kind: &'static str,
    number: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Round {
    label: String,
    description: String,
    tx_number: u64,
    rate_control: RateControl,
    callback: String,
}

#[derive(Debug, Serialize)]
struct RateControl {
    #[serde(rename = "type")]
    kind: &'static str,
    opts: RateOpts,
}

#[derive(Debug, Serialize)]
struct RateOpts {
    tps: u64,
}

#[derive(Debug, Serialize)]
struct MonitorSection {
    interval: u32,
    #[serde(rename = "type")]
    kinds: Vec<&'static str>,
    docker: DockerMonitor,
}

#[derive(Debug, Serialize)]
struct DockerMonitor {
    containers: Vec<String>,
}

fn workload_title(workload: Workload) -> &'static str {
    match workload {
        Workload::HelloWorld => "Hello World",
        Workload::Transfer => "DAG Transfer",
    }
}

/// Benchmark descriptor YAML: one fixed-rate round per workload label
pub fn benchmark_descriptor(
    config: &RunConfig,
    agency: &str,
    layout: &HostLayout,
) -> serde_yaml::Result<String> {
    let title = workload_title(config.workload);
    let descriptor = BenchmarkDescriptor {
        test: TestSection {
            name: title.to_string(),
            description: format!("{} benchmark of FISCO BCOS for caliper", title),
            workers: Workers {
                kind: "local",
                number: config.worker_num,
            },
            rounds: config
                .round_labels()
                .iter()
                .map(|label| Round {
                    label: label.to_string(),
                    description: format!("Test performance of {}", label),
                    tx_number: config.tx_num,
                    rate_control: RateControl {
                        kind: "fixed-rate",
                        opts: RateOpts {
                            tps: config.tx_speed,
                        },
                    },
                    callback: format!("benchmark/{}.js", label),
                })
                .collect(),
        },
        monitor: MonitorSection {
            interval: 1,
            kinds: vec!["docker"],
            docker: DockerMonitor {
                containers: config
                    .hosts
                    .iter()
                    .map(|host| format!("http://{}/all", layout.docker_endpoint(host)))
                    .collect(),
            },
        },
    };

    let body = serde_yaml::to_string(&descriptor)?;
    Ok(format!(
        "# benchmark config\n# author: {}\n# time: {}\n\n{}",
        agency,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        body
    ))
}
