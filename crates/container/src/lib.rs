//! Remote side of a benchmark run: shell access to hosts and node containers

pub mod config;
pub mod docker;
pub mod ssh;

use ab_topology::{HostLayout, PortLayout};
use anyhow::Result;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub use docker::DockerNodeRuntime;
pub use ssh::SshExecutor;

/// Command execution and file transfer on a benchmark host
#[async_trait::async_trait]
pub trait RemoteExecutor: Send + Sync + Debug {
    /// Run a shell command on a host and return its stdout
    async fn execute(&self, host: &str, command: &str) -> Result<String>;

    /// Copy a local directory, recursively, into `remote` on a host
    async fn copy_directory(&self, host: &str, local: &Path, remote: &str) -> Result<()>;
}

/// Lifecycle of the node containers on a benchmark host
#[async_trait::async_trait]
pub trait NodeRuntime: Send + Sync + Debug {
    /// Start the node occupying `local_index` on a host
    async fn start_node(&self, host: &str, local_index: usize) -> Result<()>;

    /// Stop and remove every node container on a host, returning how many there were
    async fn stop_nodes(&self, host: &str) -> Result<usize>;
}

/// Create a remote executor based on the configuration
pub fn create_remote_executor(config: config::SshConfig) -> Arc<dyn RemoteExecutor> {
    info!(
        "Creating ssh remote executor for user {} ({} login)",
        config.user,
        if config.password.is_some() {
            "password"
        } else {
            "key"
        }
    );
    Arc::new(SshExecutor::new(config))
}

/// Create a node runtime based on the configuration
pub fn create_node_runtime(
    config: config::DockerConfig,
    layout: HostLayout,
    ports: PortLayout,
) -> Arc<dyn NodeRuntime> {
    info!("Creating Docker node runtime with image {}", layout.node_image);
    Arc::new(DockerNodeRuntime::new(config, layout, ports))
}
