use serde::{Deserialize, Serialize};

/// Base ports of a host; local slot `i` listens on `base + i`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLayout {
    #[serde(default = "default_p2p_base")]
    pub p2p_base: u16,
    #[serde(default = "default_channel_base")]
    pub channel_base: u16,
    #[serde(default = "default_rpc_base")]
    pub rpc_base: u16,
}

fn default_p2p_base() -> u16 {
    30300
}
fn default_channel_base() -> u16 {
    20200
}
fn default_rpc_base() -> u16 {
    8545
}

impl Default for PortLayout {
    fn default() -> Self {
        Self {
            p2p_base: default_p2p_base(),
            channel_base: default_channel_base(),
            rpc_base: default_rpc_base(),
        }
    }
}

impl PortLayout {
    pub fn p2p_port(&self, local_index: usize) -> u16 {
        offset(self.p2p_base, local_index)
    }

    pub fn channel_port(&self, local_index: usize) -> u16 {
        offset(self.channel_base, local_index)
    }

    pub fn rpc_port(&self, local_index: usize) -> u16 {
        offset(self.rpc_base, local_index)
    }
}

fn offset(base: u16, local_index: usize) -> u16 {
    base.saturating_add(u16::try_from(local_index).unwrap_or(u16::MAX))
}

/// Where node directories and containers live on a benchmark host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLayout {
    /// Remote directory receiving the generated `nodes` tree
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// TCP port of each host's Docker daemon
    #[serde(default = "default_docker_port")]
    pub docker_port: u16,

    /// Image every node container runs
    #[serde(default = "default_node_image")]
    pub node_image: String,
}

fn default_data_dir() -> String {
    "/data".to_string()
}
fn default_docker_port() -> u16 {
    2375
}
fn default_node_image() -> String {
    "fiscoorg/fiscobcos:latest".to_string()
}

impl Default for HostLayout {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            docker_port: default_docker_port(),
            node_image: default_node_image(),
        }
    }
}

impl HostLayout {
    /// Remote root of the generated node tree
    pub fn remote_nodes_dir(&self) -> String {
        format!("{}/nodes", self.data_dir.trim_end_matches('/'))
    }

    /// Remote directory of one node, mounted into its container
    pub fn remote_node_dir(&self, host: &str, local_index: usize) -> String {
        format!("{}/{}/{}", self.remote_nodes_dir(), host, node_name(local_index))
    }

    pub fn docker_endpoint(&self, host: &str) -> String {
        format!("{}:{}", host, self.docker_port)
    }
}

/// Directory and container name of a node slot on its host
pub fn node_name(local_index: usize) -> String {
    format!("node{}", local_index)
}
