use ab_common::RunConfig;
use ab_container::config::{DockerConfig, SshConfig};
use ab_executor::config::CaliperConfig;
use ab_network::config::NetworkConfig;
use ab_runner::RetryPolicy;
use ab_state::config::SinkConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Prefix of environment overrides, e.g. `AUTOBENCH_SSH__PASSWORD`
pub const ENV_PREFIX: &str = "AUTOBENCH";

/// Benchmark configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub bench: NetworkConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub caliper: CaliperConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    /// Runs executed in order by `autobench run`
    #[serde(default)]
    pub runs: Vec<RunConfig>,
}

impl AppConfig {
    /// Every host named by any run, first occurrence first
    pub fn all_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for host in self.runs.iter().flat_map(|run| &run.hosts) {
            if !hosts.contains(host) {
                hosts.push(host.clone());
            }
        }
        hosts
    }
}

/// Load configuration from file, overridden by the environment
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from(config_path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    config
        .try_deserialize()
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_common::{ConsensusKind, Workload};
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[bench]
agency = "lab"

[retry]
cooldown_secs = 5

[ssh]
password = "123456"

[caliper]
node_bin_path = "/opt/node/bin"

[[runs]]
node_count = 5
sealer_count = 3
hosts = ["10.0.0.1", "10.0.0.2"]
tx_num = 10000
tx_speed = 5000
block_tx_num = 2000

[[runs]]
node_count = 4
sealer_count = 4
hosts = ["10.0.0.2", "10.0.0.3"]
workload = "transfer"
consensus = "rpbft"
tx_num = 2000
tx_speed = 1000
block_tx_num = 1000
"#;

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autobench.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.bench.agency, "lab");
        assert_eq!(config.bench.group, 1);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.cooldown_secs, 5);
        assert_eq!(config.ssh.password.as_deref(), Some("123456"));
        assert_eq!(config.docker.port, 2375);
        assert_eq!(config.runs.len(), 2);
        assert_eq!(config.runs[0].worker_num, 5);
        assert_eq!(config.runs[1].workload, Workload::Transfer);
        assert_eq!(config.runs[1].consensus, ConsensusKind::Rpbft);
        assert_eq!(
            config.all_hosts(),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]
        );
    }

    #[test]
    fn test_unknown_consensus_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autobench.toml");
        std::fs::write(
            &path,
            SAMPLE.replace("consensus = \"rpbft\"", "consensus = \"poa\""),
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }
}
