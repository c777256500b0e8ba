use ab_topology::HostLayout;
use serde::{Deserialize, Serialize};

/// SSH access to the benchmark hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_user")]
    pub user: String,

    /// Password fed through `sshpass`; key based login when absent
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Remote directory receiving the node trees
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// Docker daemons exposed by the benchmark hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_port")]
    pub port: u16,

    /// Node image
    #[serde(default = "default_image")]
    pub image: String,

    /// Request timeout in seconds
    #[serde(default = "default_docker_timeout")]
    pub timeout: u64,

    /// Seconds a node gets to exit before it is killed
    #[serde(default = "default_stop_grace")]
    pub stop_grace: i64,
}

fn default_user() -> String {
    "root".to_string()
}
fn default_ssh_port() -> u16 {
    22
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_data_dir() -> String {
    "/data".to_string()
}
fn default_docker_port() -> u16 {
    2375
}
fn default_image() -> String {
    "fiscoorg/fiscobcos:latest".to_string()
}
fn default_docker_timeout() -> u64 {
    120
}
fn default_stop_grace() -> i64 {
    5
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            password: None,
            port: default_ssh_port(),
            connect_timeout: default_connect_timeout(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            port: default_docker_port(),
            image: default_image(),
            timeout: default_docker_timeout(),
            stop_grace: default_stop_grace(),
        }
    }
}

/// Remote layout shared by deployment, cleaning and the operator scripts
pub fn host_layout(ssh: &SshConfig, docker: &DockerConfig) -> HostLayout {
    HostLayout {
        data_dir: ssh.data_dir.clone(),
        docker_port: docker.port,
        node_image: docker.image.clone(),
    }
}
