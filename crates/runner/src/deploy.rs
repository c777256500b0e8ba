use ab_common::{Error, Result};
use ab_container::{NodeRuntime, RemoteExecutor};
use ab_topology::{ConfigSynthesizer, HostLayout};
use futures::future::join_all;
use std::path::Path;
use tracing::{error, info};

/// Remove node containers and node trees from every host.
///
/// Hosts are cleaned one after another; a host without nodes is clean already.
pub async fn clean_hosts(
    hosts: &[String],
    executor: &dyn RemoteExecutor,
    runtime: &dyn NodeRuntime,
    layout: &HostLayout,
) -> Result<()> {
    let remove = format!("rm -rf {}", layout.remote_nodes_dir());
    for host in hosts {
        let stopped = runtime
            .stop_nodes(host)
            .await
            .map_err(|e| Error::CleanFailure(format!("{}: {:#}", host, e)))?;
        executor
            .execute(host, &remove)
            .await
            .map_err(|e| Error::CleanFailure(format!("{}: {:#}", host, e)))?;
        info!(
            "{}: {} node containers stopped, {} removed",
            host,
            stopped,
            layout.remote_nodes_dir()
        );
    }
    Ok(())
}

async fn deploy_host(
    host_index: usize,
    host: &str,
    topology: &ConfigSynthesizer,
    nodes_dir: &Path,
    executor: &dyn RemoteExecutor,
    runtime: &dyn NodeRuntime,
    layout: &HostLayout,
) -> anyhow::Result<usize> {
    executor
        .execute(host, &format!("mkdir -p {}", layout.data_dir))
        .await?;
    executor
        // Cleaning removed the remote tree, so the copy lands under its fixed name.
        .copy_directory(host, nodes_dir, &layout.remote_nodes_dir())
        .await?;

    let mut started = 0;
    for slot in topology.host_slots(host_index) {
        runtime.start_node(host, slot.local_index).await?;
        started += 1;
    }
    Ok(started)
}

/// Copy the node trees to every host and start its nodes.
///
/// All hosts are deployed concurrently and every one is awaited; the stage
/// fails if any host failed, naming each failed host.
pub async fn deploy_hosts(
    topology: &ConfigSynthesizer,
    nodes_dir: &Path,
    executor: &dyn RemoteExecutor,
    runtime: &dyn NodeRuntime,
    layout: &HostLayout,
) -> Result<()> {
    let outcomes = join_all(topology.hosts().iter().enumerate().map(|(index, host)| {
        deploy_host(index, host, topology, nodes_dir, executor, runtime, layout)
    }))
    .await;

    let mut failures = Vec::new();
    for (host, outcome) in topology.hosts().iter().zip(outcomes) {
        match outcome {
            Ok(started) => info!("{}: {} nodes started", host, started),
            Err(e) => {
                error!("{}: deploy failed: {:#}", host, e);
                failures.push(format!("{} ({:#})", host, e));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::DeployFailure(format!(
            "{} of {} hosts failed: {}",
            failures.len(),
            topology.hosts().len(),
            failures.join(", ")
        )))
    }
}
