//! Benchmark execution: workload driver and log extraction

pub mod config;
pub mod driver;
pub mod extractor;

use anyhow::Result;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub use driver::CaliperDriver;
pub use extractor::{extract, extract_file};

/// Files left behind by one workload invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOutput {
    /// Raw log the result is extracted from
    pub log: PathBuf,
    pub report: PathBuf,
}

/// Load generator run against a deployed network
#[async_trait::async_trait]
pub trait WorkloadDriver: Send + Sync + Debug {
    /// Run the benchmark described by `benchmark` against the network in `network`
    async fn run(&self, benchmark: &Path, network: &Path) -> Result<DriverOutput>;
}

/// Create a workload driver based on the configuration
pub fn create_workload_driver(config: config::CaliperConfig) -> Arc<dyn WorkloadDriver> {
    info!("Creating caliper workload driver in {}", config.workspace.display());
    Arc::new(CaliperDriver::new(config))
}
