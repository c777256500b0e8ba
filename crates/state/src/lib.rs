//! Durable storage of benchmark results

pub mod archive;
pub mod config;
pub mod csv_sink;

use ab_common::{ResultRecord, Result};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

pub use archive::RunArchive;
pub use csv_sink::CsvResultSink;

/// Append-only store of result records
///
/// There is no update or delete; corrections are new records.
pub trait ResultSink: Send + Sync + Debug {
    /// Append one record per round, returning how many were written
    fn append(&self, records: &[ResultRecord]) -> Result<usize>;
}

/// Create a result sink based on the configuration
pub fn create_result_sink(config: &config::SinkConfig) -> Arc<dyn ResultSink> {
    info!("Creating CSV result sink at {}", config.path.display());
    Arc::new(CsvResultSink::new(config.path.clone()))
}

/// Create the run history archive, if enabled
pub fn create_run_archive(config: &config::SinkConfig) -> Option<RunArchive> {
    config
        .archive
        .then(|| RunArchive::new(config.history_dir.clone()))
}
