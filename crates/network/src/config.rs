use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use ab_topology::PortLayout;

/// Local workspace layout and chain parameters used to generate a run's artifacts
///
/// Relative paths are resolved against `workspace`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Directory the workload driver runs in
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Chain generator script
    #[serde(default = "default_chain_script")]
    pub chain_script: PathBuf,

    /// Output directory of the chain generator
    #[serde(default = "default_nodes_dir")]
    pub nodes_dir: PathBuf,

    #[serde(default = "default_ipconfig")]
    pub ipconfig: PathBuf,

    /// Network description handed to the workload driver
    #[serde(default = "default_network_descriptor")]
    pub network_descriptor: PathBuf,

    /// Benchmark descriptor handed to the workload driver
    #[serde(default = "default_benchmark_descriptor")]
    pub benchmark_descriptor: PathBuf,

    /// Leftovers of a previous driver invocation, removed while cleaning
    #[serde(default = "default_stale_files")]
    pub stale_files: Vec<PathBuf>,

    /// Agency name written to ipconfig; also the fingerprint flag
    #[serde(default = "default_agency")]
    pub agency: String,

    #[serde(default = "default_group")]
    pub group: u32,

    #[serde(default)]
    pub ports: PortLayout,

    /// Account the driver signs transactions with
    #[serde(default = "default_account")]
    pub account: String,

    #[serde(default = "default_private_key")]
    pub private_key: String,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}
fn default_chain_script() -> PathBuf {
    PathBuf::from("network/build_chain.sh")
}
fn default_nodes_dir() -> PathBuf {
    PathBuf::from("network/nodes")
}
fn default_ipconfig() -> PathBuf {
    PathBuf::from("network/ipconfig")
}
fn default_network_descriptor() -> PathBuf {
    PathBuf::from("network/fisco-bcos.json")
}
fn default_benchmark_descriptor() -> PathBuf {
    PathBuf::from("benchmark/config.yaml")
}
fn default_stale_files() -> Vec<PathBuf> {
    vec![
        PathBuf::from("caliper.log"),
        PathBuf::from("report.html"),
        PathBuf::from("smart_contracts/HelloWorld.address"),
    ]
}
fn default_agency() -> String {
    "dfface".to_string()
}
fn default_group() -> u32 {
    1
}
fn default_account() -> String {
    "0x64fa644d2a694681bd6addd6c5e36cccd8dcdde3".to_string()
}
fn default_private_key() -> String {
    "bcec428d5205abe0f0cc8a734083908d9eb8563e31f943d760786edf42ad67dd".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            chain_script: default_chain_script(),
            nodes_dir: default_nodes_dir(),
            ipconfig: default_ipconfig(),
            network_descriptor: default_network_descriptor(),
            benchmark_descriptor: default_benchmark_descriptor(),
            stale_files: default_stale_files(),
            agency: default_agency(),
            group: default_group(),
            ports: PortLayout::default(),
            account: default_account(),
            private_key: default_private_key(),
        }
    }
}

impl NetworkConfig {
    /// Resolve a configured path against the workspace
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.resolve(&self.nodes_dir)
    }

    /// Directory the generator writes for one node slot
    pub fn node_path(&self, host: &str, local_index: usize) -> PathBuf {
        self.nodes_path()
            .join(host)
            .join(ab_topology::node_name(local_index))
    }

    pub fn genesis_path(&self, host: &str, local_index: usize) -> PathBuf {
        self.node_path(host, local_index)
            .join("conf")
            .join(format!("group.{}.genesis", self.group))
    }
}
