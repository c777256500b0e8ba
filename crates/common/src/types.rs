use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::ConfigFingerprint;

/// Consensus algorithms supported by the chain generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusKind {
    #[default]
    Pbft,
    Raft,
    Rpbft,
}

impl ConsensusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusKind::Pbft => "pbft",
            ConsensusKind::Raft => "raft",
            ConsensusKind::Rpbft => "rpbft",
        }
    }
}

impl fmt::Display for ConsensusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage backends supported by the chain generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Rocksdb,
    Mysql,
    External,
    Scalable,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Rocksdb => "rocksdb",
            StorageKind::Mysql => "mysql",
            StorageKind::External => "external",
            StorageKind::Scalable => "scalable",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Benchmark workload executed by the driver
///
/// The workload decides which rounds are run and therefore which rows the
/// extractor must find in the driver's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    #[default]
    HelloWorld,
    Transfer,
}

impl Workload {
    pub fn name(&self) -> &'static str {
        match self {
            Workload::HelloWorld => "helloworld",
            Workload::Transfer => "transfer",
        }
    }

    /// Round labels in execution order
    pub fn round_labels(&self) -> &'static [&'static str] {
        match self {
            Workload::HelloWorld => &["get", "set"],
            Workload::Transfer => &["addUser", "transfer"],
        }
    }

    pub fn contract_kind(&self) -> &'static str {
        match self {
            Workload::HelloWorld => "solidity",
            Workload::Transfer => "precompiled",
        }
    }
}

/// Parameters of one benchmark run
///
/// Immutable once validated; every per-run artifact is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total number of nodes (sealers and followers)
    pub node_count: usize,

    /// Number of consensus participants
    pub sealer_count: usize,

    /// Host addresses, in allocation order
    pub hosts: Vec<String>,

    #[serde(default)]
    pub workload: Workload,

    /// Transactions sent per round
    pub tx_num: u64,

    /// Target sending rate in tps
    pub tx_speed: u64,

    /// Max transactions packed into one block
    pub block_tx_num: u64,

    #[serde(default = "default_worker_num")]
    pub worker_num: u32,

    #[serde(default)]
    pub consensus: ConsensusKind,

    #[serde(default)]
    pub storage: StorageKind,

    /// Block consensus timeout in seconds
    #[serde(default = "default_consensus_timeout")]
    pub consensus_timeout: u64,

    /// Working sealers per consensus epoch (rpbft)
    #[serde(default = "default_epoch_sealer_num")]
    pub epoch_sealer_num: usize,

    /// Blocks generated per epoch (rpbft)
    #[serde(default = "default_epoch_block_num")]
    pub epoch_block_num: u64,

    /// Outgoing bandwidth limit per node in MB/s, 0 means unlimited
    #[serde(default)]
    pub bandwidth_limit: u64,
}

fn default_worker_num() -> u32 {
    5
}
fn default_consensus_timeout() -> u64 {
    3
}
fn default_epoch_sealer_num() -> usize {
    2
}
fn default_epoch_block_num() -> u64 {
    1000
}

/// Shortest block consensus timeout the nodes accept
pub const MIN_CONSENSUS_TIMEOUT: u64 = 3;

impl RunConfig {
    pub fn new(node_count: usize, sealer_count: usize, hosts: Vec<String>) -> Self {
        Self {
            node_count,
            sealer_count,
            hosts,
            workload: Workload::default(),
            tx_num: 10000,
            tx_speed: 5000,
            block_tx_num: 2000,
            worker_num: default_worker_num(),
            consensus: ConsensusKind::default(),
            storage: StorageKind::default(),
            consensus_timeout: default_consensus_timeout(),
            epoch_sealer_num: default_epoch_sealer_num(),
            epoch_block_num: default_epoch_block_num(),
            bandwidth_limit: 0,
        }
    }

    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.workload = workload;
        self
    }

    pub fn with_load(mut self, tx_num: u64, tx_speed: u64) -> Self {
        self.tx_num = tx_num;
        self.tx_speed = tx_speed;
        self
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn round_labels(&self) -> &'static [&'static str] {
        self.workload.round_labels()
    }

    /// Check every constraint a run must satisfy before any side effect
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(invalid("at least one host is required"));
        }
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.trim().is_empty() {
                return Err(invalid("host address must not be empty"));
            }
            if !seen.insert(host.as_str()) {
                return Err(invalid(format!("duplicate host address {}", host)));
            }
        }

        if self.node_count == 0 {
            return Err(invalid("node_count must be positive"));
        }
        if self.sealer_count == 0 {
            return Err(invalid("sealer_count must be positive"));
        }
        if self.sealer_count > self.node_count {
            return Err(invalid(format!(
                "sealer_count {} exceeds node_count {}",
                self.sealer_count, self.node_count
            )));
        }
        if self.node_count < self.hosts.len() {
            return Err(invalid(format!(
                "node_count {} is smaller than host count {}",
                self.node_count,
                self.hosts.len()
            )));
        }
        if self.epoch_sealer_num == 0 || self.epoch_sealer_num > self.sealer_count {
            return Err(invalid(format!(
                "epoch_sealer_num {} must be within 1..={}",
                self.epoch_sealer_num, self.sealer_count
            )));
        }

        for (name, value) in [
            ("tx_num", self.tx_num),
            ("tx_speed", self.tx_speed),
            ("block_tx_num", self.block_tx_num),
            ("epoch_block_num", self.epoch_block_num),
            ("worker_num", u64::from(self.worker_num)),
        ] {
            if value == 0 {
                return Err(invalid(format!("{} must be positive", name)));
            }
        }

        if self.consensus_timeout < MIN_CONSENSUS_TIMEOUT {
            return Err(invalid(format!(
                "consensus_timeout must be at least {}s",
                MIN_CONSENSUS_TIMEOUT
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidArgument(message.into())
}

/// Measurements of one benchmark round as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub succeeded: u64,
    pub failed: u64,
    /// Send rate in tps
    pub send_rate: f64,
    /// Latencies in seconds
    pub max_latency: f64,
    pub min_latency: f64,
    pub avg_latency: f64,
    /// Throughput in tps
    pub throughput: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Measured(RoundMetrics),
    /// The run could not be measured
    Unmeasured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub label: String,
    pub outcome: RoundOutcome,
}

/// Outcome of one run: a timestamp plus one result per round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub timestamp: NaiveDateTime,
    pub rounds: Vec<RoundResult>,
}

impl RunResult {
    /// Sentinel result recorded when every attempt failed
    pub fn unmeasured(labels: &[&str], timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            rounds: labels
                .iter()
                .map(|label| RoundResult {
                    label: label.to_string(),
                    outcome: RoundOutcome::Unmeasured,
                })
                .collect(),
        }
    }

    pub fn is_measured(&self) -> bool {
        self.rounds
            .iter()
            .all(|round| matches!(round.outcome, RoundOutcome::Measured(_)))
    }
}

/// Timestamp format used in persisted records and archive file names
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One persisted row: a round flattened with its run configuration
///
/// Field order is the column order of the result table. Metric columns are
/// empty for unmeasured rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp: String,
    pub total_tx: u64,
    pub target_rate: u64,
    pub observed_rate: Option<f64>,
    pub worker_count: u32,
    pub round_label: String,
    pub contract_kind: String,
    pub block_tx_cap: u64,
    pub epoch_sealer_num: usize,
    pub epoch_block_num: u64,
    pub consensus_kind: String,
    pub consensus_timeout: u64,
    pub sealer_count: usize,
    pub host_count: usize,
    pub node_count: usize,
    pub bandwidth_limit: u64,
    pub config_fingerprint: String,
    pub succeeded: Option<u64>,
    pub failed: Option<u64>,
    pub max_latency: Option<f64>,
    pub min_latency: Option<f64>,
    pub avg_latency: Option<f64>,
    pub throughput: Option<f64>,
}

impl ResultRecord {
    /// Column names in table order
    pub const COLUMNS: [&'static str; 23] = [
        "timestamp",
        "total_tx",
        "target_rate",
        "observed_rate",
        "worker_count",
        "round_label",
        "contract_kind",
        "block_tx_cap",
        "epoch_sealer_num",
        "epoch_block_num",
        "consensus_kind",
        "consensus_timeout",
        "sealer_count",
        "host_count",
        "node_count",
        "bandwidth_limit",
        "config_fingerprint",
        "succeeded",
        "failed",
        "max_latency",
        "min_latency",
        "avg_latency",
        "throughput",
    ];

    /// Flatten a run result into one record per round
    pub fn from_run(
        config: &RunConfig,
        fingerprint: &ConfigFingerprint,
        result: &RunResult,
    ) -> Vec<ResultRecord> {
        let timestamp = result.timestamp.format(RECORD_TIME_FORMAT).to_string();
        result
            .rounds
            .iter()
            .map(|round| {
                let metrics = match round.outcome {
                    RoundOutcome::Measured(metrics) => Some(metrics),
                    RoundOutcome::Unmeasured => None,
                };
                ResultRecord {
                    timestamp: timestamp.clone(),
                    total_tx: config.tx_num,
                    target_rate: config.tx_speed,
                    observed_rate: metrics.map(|m| m.send_rate),
                    worker_count: config.worker_num,
                    round_label: round.label.clone(),
                    contract_kind: config.workload.contract_kind().to_string(),
                    block_tx_cap: config.block_tx_num,
                    epoch_sealer_num: config.epoch_sealer_num,
                    epoch_block_num: config.epoch_block_num,
                    consensus_kind: config.consensus.to_string(),
                    consensus_timeout: config.consensus_timeout,
                    sealer_count: config.sealer_count,
                    host_count: config.host_count(),
                    node_count: config.node_count,
                    bandwidth_limit: config.bandwidth_limit,
                    config_fingerprint: fingerprint.to_string(),
                    succeeded: metrics.map(|m| m.succeeded),
                    failed: metrics.map(|m| m.failed),
                    max_latency: metrics.map(|m| m.max_latency),
                    min_latency: metrics.map(|m| m.min_latency),
                    avg_latency: metrics.map(|m| m.avg_latency),
                    throughput: metrics.map(|m| m.throughput),
                }
            })
            .collect()
    }
}
