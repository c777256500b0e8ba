//! Per-run artifact generation for benchmark networks

pub mod config;
pub mod descriptor;
pub mod genesis;
pub mod scripts;

use ab_common::RunConfig;
use ab_topology::{ConfigSynthesizer, HostLayout};
use anyhow::{anyhow, Context, Result};
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use config::NetworkConfig;

/// Files one attempt hands to the deploy and execute stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub nodes_dir: PathBuf,
    pub network_descriptor: PathBuf,
    pub benchmark_descriptor: PathBuf,
}

impl RunArtifacts {
    /// Artifact whose modification time the workload log must not predate
    pub fn config_artifact(&self) -> &Path {
        &self.benchmark_descriptor
    }
}

/// Generator of the local files describing one run
#[async_trait::async_trait]
pub trait ArtifactGenerator: Send + Sync + Debug {
    /// Remove every artifact of a previous run; missing files are not an error
    async fn clean(&self) -> Result<()>;

    /// Generate node trees and descriptors for a run
    async fn generate(
        &self,
        config: &RunConfig,
        topology: &ConfigSynthesizer,
    ) -> Result<RunArtifacts>;
}

/// Create an artifact generator writing into the configured workspace
pub fn create_artifact_generator(
    config: NetworkConfig,
    layout: HostLayout,
) -> Arc<dyn ArtifactGenerator> {
    Arc::new(FileArtifactGenerator::new(config, layout))
}

/// Artifact generator driving the chain generator script on the local filesystem
#[derive(Debug, Clone)]
pub struct FileArtifactGenerator {
    config: NetworkConfig,
    layout: HostLayout,
}

impl FileArtifactGenerator {
    pub fn new(config: NetworkConfig, layout: HostLayout) -> Self {
        Self { config, layout }
    }

    async fn build_chain(&self, config: &RunConfig) -> Result<()> {
        let output = Command::new("bash")
            .arg(self.config.resolve(&self.config.chain_script))
            .arg("-o")
            .arg(self.config.nodes_path())
            .arg("-T")
            .arg("-f")
            .arg(self.config.resolve(&self.config.ipconfig))
            .arg("-d")
            .arg("-i")
            .args(["-s", config.storage.as_str()])
            .args(["-c", config.consensus.as_str()])
            .current_dir(&self.config.workspace)
            .output()
            .await
            .context("Failed to spawn chain generator")?;

        debug!(
            "[NETWORK] Chain generator output: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        if !output.status.success() {
            return Err(anyhow!(
                "Chain generator exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    /// Rewrite the first node's genesis and copy it to every other node
    async fn write_genesis(&self, config: &RunConfig, topology: &ConfigSynthesizer) -> Result<()> {
        let Some(first) = topology.slots().next() else {
            return Err(anyhow!("Topology has no nodes"));
        };
        let first_path = self.config.genesis_path(&first.host, first.local_index);
        let content = fs::read_to_string(&first_path)
            .await
            .with_context(|| format!("Failed to read {}", first_path.display()))?;
        let rewritten = genesis::rewrite_genesis(&content, config, topology);

        for slot in topology.slots() {
            let path = self.config.genesis_path(&slot.host, slot.local_index);
            fs::write(&path, &rewritten)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        info!(
            "[NETWORK] Group genesis written for {} nodes, sealers {:?}",
            topology.node_count(),
            topology.sealer_set()
        );
        Ok(())
    }

    async fn write_node_configs(&self, config: &RunConfig, topology: &ConfigSynthesizer) -> Result<()> {
        if config.bandwidth_limit == 0 {
            return Ok(());
        }
        for slot in topology.slots() {
            let path = self
                .config
                .node_path(&slot.host, slot.local_index)
                .join("config.ini");
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            fs::write(&path, genesis::rewrite_node_ini(&content, config.bandwidth_limit)).await?;
        }
        info!(
            "[NETWORK] Outgoing bandwidth limited to {} MB/s",
            config.bandwidth_limit
        );
        Ok(())
    }

    async fn write_scripts(&self, topology: &ConfigSynthesizer) -> Result<()> {
        let (start, stop) = scripts::docker_scripts(topology, &self.config.ports, &self.layout);
        let nodes = self.config.nodes_path();
        for (name, content) in [("start_all.sh", start), ("stop_all.sh", stop)] {
            let path = nodes.join(name);
            fs::write(&path, content).await?;
            make_executable(&path).await?;
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o775)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

async fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn remove_path(path: &Path) -> Result<()> {
    let result = if fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => {
            debug!("[NETWORK] Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow!("Failed to remove {}: {}", path.display(), e)),
    }
}

#[async_trait::async_trait]
impl ArtifactGenerator for FileArtifactGenerator {
    async fn clean(&self) -> Result<()> {
        let config = &self.config;
        let mut targets = vec![
            config.nodes_path(),
            config.resolve(&config.ipconfig),
            config.resolve(&config.network_descriptor),
            config.resolve(&config.benchmark_descriptor),
        ];
        targets.extend(config.stale_files.iter().map(|path| config.resolve(path)));

        for target in &targets {
            remove_path(target).await?;
        }
        info!("[NETWORK] Local artifacts cleaned");
        Ok(())
    }

    async fn generate(
        &self,
        config: &RunConfig,
        topology: &ConfigSynthesizer,
    ) -> Result<RunArtifacts> {
        let network = &self.config;

        let ipconfig = scripts::ipconfig(topology, &network.agency, network.group, &network.ports);
        write_file(&network.resolve(&network.ipconfig), &ipconfig).await?;
        info!("[NETWORK] ipconfig generated:\n{}", ipconfig.trim_end());

        self.build_chain(config).await?;
        info!("[NETWORK] Nodes generated in {}", network.nodes_path().display());

        self.write_genesis(config, topology).await?;
        self.write_node_configs(config, topology).await?;
        self.write_scripts(topology).await?;

        let network_descriptor = network.resolve(&network.network_descriptor);
        let description = descriptor::network_description(config, network, topology);
        write_file(
            &network_descriptor,
            serde_json::to_string_pretty(&description)?,
        )
        .await?;
        info!(
            "[NETWORK] Network description lists {} sealers",
            topology.sealer_count()
        );

        let benchmark_descriptor = network.resolve(&network.benchmark_descriptor);
        let benchmark = descriptor::benchmark_descriptor(config, &network.agency, &self.layout)?;
        write_file(&benchmark_descriptor, benchmark).await?;
        info!("[NETWORK] Benchmark descriptor generated");

        Ok(RunArtifacts {
            nodes_dir: network.nodes_path(),
            network_descriptor,
            benchmark_descriptor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_topology::plan_topology;
    use tempfile::TempDir;

    /// Stand-in chain generator: one node tree per ipconfig slot, every
    /// genesis listing all nodes.
    const FAKE_BUILD_CHAIN: &str = r#"#!/bin/bash
while getopts "o:f:s:c:Tdi" opt; do
  case $opt in
    o) out=$OPTARG ;;
    f) ipconfig=$OPTARG ;;
  esac
done
total=0
while read -r entry _; do total=$((total + ${entry##*:})); done < "$ipconfig"
genesis="[consensus]
    max_trans_num=1000
    consensus_timeout=3
    epoch_sealer_num=3
    epoch_block_num=1000"
for ((k = 0; k < total; k++)); do genesis="$genesis
    node.$k=id$k"; done
while read -r entry _; do
  host=${entry%%:*}
  count=${entry##*:}
  mkdir -p "$out/$host/sdk"
  for ((i = 0; i < count; i++)); do
    mkdir -p "$out/$host/node$i/conf"
    echo "$genesis" > "$out/$host/node$i/conf/group.1.genesis"
    printf '[flow_control]\n    ; outgoing_bandwidth_limit=2\n' > "$out/$host/node$i/config.ini"
  done
done < "$ipconfig"
"#;

    fn workspace() -> (TempDir, FileArtifactGenerator) {
        let dir = TempDir::new().unwrap();
        let network = NetworkConfig {
            workspace: dir.path().to_path_buf(),
            ..Default::default()
        };
        let script = network.resolve(&network.chain_script);
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, FAKE_BUILD_CHAIN).unwrap();
        (dir, FileArtifactGenerator::new(network, HostLayout::default()))
    }

    #[tokio::test]
    async fn test_generate_artifacts() {
        let (dir, generator) = workspace();
        let mut config = RunConfig::new(5, 3, vec!["h1".into(), "h2".into()]);
        config.bandwidth_limit = 4;
        let (_, topology) = plan_topology(&config).unwrap();

        let artifacts = generator.generate(&config, &topology).await.unwrap();
        assert_eq!(artifacts.config_artifact(), artifacts.benchmark_descriptor);
        assert!(artifacts.network_descriptor.exists());
        assert!(artifacts.nodes_dir.join("start_all.sh").exists());

        let ipconfig = std::fs::read_to_string(dir.path().join("network/ipconfig")).unwrap();
        assert_eq!(ipconfig.lines().count(), 2);

        for (host, node) in [("h1", 1), ("h2", 2)] {
            let genesis = std::fs::read_to_string(
                artifacts
                    .nodes_dir
                    .join(host)
                    .join(format!("node{}", node))
                    .join("conf/group.1.genesis"),
            )
            .unwrap();
            let members: Vec<&str> = genesis
                .lines()
                .filter(|line| line.trim_start().starts_with("node."))
                .map(str::trim)
                .collect();
            assert_eq!(members, vec!["node.0=id0", "node.2=id2", "node.3=id3"]);
            assert!(genesis.contains("max_trans_num=2000"));
        }

        let ini =
            std::fs::read_to_string(artifacts.nodes_dir.join("h2/node0/config.ini")).unwrap();
        assert!(ini.contains("    outgoing_bandwidth_limit=4"));

        let description: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.network_descriptor).unwrap())
                .unwrap();
        assert_eq!(
            description["fisco-bcos"]["network"]["nodes"]
                .as_array()
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_clean_is_idempotent() {
        let (dir, generator) = workspace();
        generator.clean().await.unwrap();

        let config = RunConfig::new(2, 1, vec!["h1".into()]);
        let (_, topology) = plan_topology(&config).unwrap();
        let artifacts = generator.generate(&config, &topology).await.unwrap();
        std::fs::write(dir.path().join("caliper.log"), "old").unwrap();

        generator.clean().await.unwrap();
        assert!(!artifacts.nodes_dir.exists());
        assert!(!artifacts.benchmark_descriptor.exists());
        assert!(!dir.path().join("network/ipconfig").exists());
        assert!(!dir.path().join("caliper.log").exists());
        assert!(dir.path().join("network/build_chain.sh").exists());

        generator.clean().await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_chain_generator() {
        let (dir, generator) = workspace();
        std::fs::write(dir.path().join("network/build_chain.sh"), "exit 3\n").unwrap();
        let config = RunConfig::new(2, 1, vec!["h1".into()]);
        let (_, topology) = plan_topology(&config).unwrap();
        assert!(generator.generate(&config, &topology).await.is_err());
    }
}
